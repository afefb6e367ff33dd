use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of remote analysis server a module runs on
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    GenePattern,
    Galaxy,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Platform::GenePattern => write!(f, "genepattern"),
            Platform::Galaxy => write!(f, "galaxy"),
        }
    }
}

impl Platform {
    /// Marker used to recognise a report among job outputs when a module doesn't set one.
    ///
    /// GenePattern reports are matched against output file names, Galaxy reports against
    /// workflow output labels.
    pub fn default_report_marker(&self) -> &'static str {
        match self {
            Platform::GenePattern => ".html",
            Platform::Galaxy => "report",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_from_config_json() {
        let platform: Platform = serde_json::from_str("\"genepattern\"").unwrap();
        assert_eq!(platform, Platform::GenePattern);
        let platform: Platform = serde_json::from_str("\"galaxy\"").unwrap();
        assert_eq!(platform.to_string(), "galaxy");
    }
}
