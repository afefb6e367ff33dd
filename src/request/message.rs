use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use jsonschema::JSONSchema;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, PartialEq, Eq)]
pub enum MessageError {
    JSONValidationError,
    JSONDecodeError,
    DeserialisationError,
    MessageReadError,
}

/// A request message waiting on disk
pub struct Message<'a> {
    pub path: PathBuf,
    pub compiled_schema: &'a JSONSchema,
}

/// A module run over a dataset, as requested by a FlowGate user
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisRequest {
    pub name: String,
    pub server: String,
    pub module: String,
    pub dataset: Dataset,
    /// User supplied values, keyed by module parameter name
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Dataset {
    pub name: String,
    pub files: Vec<ExpFile>,
}

/// An FCS file and the experiment metadata annotated on it
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExpFile {
    pub file_name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Message<'_> {
    pub fn read(&self) -> Result<AnalysisRequest, MessageError> {
        let content = self.read_file()?;
        self.parse(&content)
    }

    /// Validate and deserialise raw message content
    pub fn parse(&self, content: &str) -> Result<AnalysisRequest, MessageError> {
        let json: Value = parse_untyped_json(content)?;

        match self.validate(&json) {
            Ok(_) => {
                info!("Message is valid");
                parse_json(json)
            }
            Err(err) => {
                warn!("Message {} fails validation", self.path.display());
                Err(err)
            }
        }
    }

    fn validate(&self, json: &Value) -> Result<(), MessageError> {
        info!("Validating raw message against JSON schema");
        self.compiled_schema.validate(json).map_err(|errors| {
            for error in errors {
                warn!("{}: {}", error.instance_path, error);
            }
            MessageError::JSONValidationError
        })
    }

    pub fn read_file(&self) -> Result<String, MessageError> {
        let path: &Path = self.path.as_path();
        info!("Reading message at {}", path.display());
        fs::read_to_string(path).map_err(|err| {
            warn!("Can't read analysis request at path {}: {}", path.display(), err);
            MessageError::MessageReadError
        })
    }
}

fn parse_json(value: Value) -> Result<AnalysisRequest, MessageError> {
    info!("Deserialising valid JSON into typed Rust object");
    serde_json::from_value::<AnalysisRequest>(value)
        .map_err(|_| MessageError::DeserialisationError)
}

fn parse_untyped_json(content: &str) -> Result<Value, MessageError> {
    info!("Parsing JSON into untyped structure");
    serde_json::from_str::<Value>(content).map_err(|_| MessageError::JSONDecodeError)
}
