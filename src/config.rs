use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::platform::Platform;

/// Remote analysis servers and the modules that run on them, read from a JSON file
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub servers: Vec<ServerConfig>,
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,
}

/// A remote GenePattern or Galaxy instance
///
/// Passwords never live in the config file. `password_env` names the environment variable
/// holding the password for `username`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub name: String,
    pub platform: Platform,
    pub url: Url,
    pub username: String,
    pub password_env: String,
}

/// Basic auth credentials for a server
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish()
    }
}

/// An analysis pipeline on a server
///
/// `invocation` is the GenePattern task name (or LSID) or the Galaxy workflow id.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModuleConfig {
    pub name: String,
    pub server: String,
    pub invocation: String,
    #[serde(default)]
    pub report: Option<String>,
    #[serde(default)]
    pub params: Vec<ModuleParam>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModuleParam {
    pub name: String,
    pub kind: ParamKind,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

/// How a module parameter gets its value
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// A plain value supplied by the user or taken from the default
    Value,
    /// The FCS files of the dataset
    Dataset,
    /// A local file named by the user
    File,
    /// The dataset's experiment metadata rendered as an annotation table
    Meta,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        info!("Reading server configuration from {}", path.display());
        let json = fs::read_to_string(path)
            .with_context(|| format!("Can't read config {}", path.display()))?;
        Config::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Config> {
        let config: Config = serde_json::from_str(json).context("Invalid config JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn server(&self, name: &str) -> Result<&ServerConfig> {
        self.servers
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| anyhow!("Unknown analysis server {name}"))
    }

    pub fn module(&self, server: &str, name: &str) -> Result<&ModuleConfig> {
        self.modules
            .iter()
            .find(|m| m.server == server && m.name == name)
            .ok_or_else(|| anyhow!("Unknown module {name} on server {server}"))
    }

    fn validate(&self) -> Result<()> {
        let mut servers = HashSet::new();
        for server in &self.servers {
            if !servers.insert(server.name.as_str()) {
                bail!("Server {} is defined twice", server.name);
            }
        }

        let mut modules = HashSet::new();
        for module in &self.modules {
            if !servers.contains(module.server.as_str()) {
                bail!("Module {} refers to unknown server {}", module.name, module.server);
            }
            if !modules.insert((module.server.as_str(), module.name.as_str())) {
                bail!("Module {} is defined twice on {}", module.name, module.server);
            }
            let mut params = HashSet::new();
            for param in &module.params {
                if !params.insert(param.name.as_str()) {
                    bail!("Module {} has duplicate parameter {}", module.name, param.name);
                }
            }
        }
        Ok(())
    }
}

impl ServerConfig {
    pub fn credentials(&self) -> Result<Credentials> {
        let password = env::var(&self.password_env).with_context(|| {
            format!("Password for {} not set in ${}", self.name, self.password_env)
        })?;
        Ok(Credentials {
            username: self.username.clone(),
            password,
        })
    }
}

impl ModuleConfig {
    pub fn report_marker(&self, platform: Platform) -> &str {
        self.report
            .as_deref()
            .unwrap_or_else(|| platform.default_report_marker())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static CONFIG: &str = r#"{
        "servers": [
            {"name": "gp", "platform": "genepattern", "url": "https://gp.example.org/",
             "username": "flowgate", "password_env": "FLOWGATE_TEST_GP_PASSWORD"}
        ],
        "modules": [
            {"name": "flock", "server": "gp", "invocation": "FLOCK",
             "params": [
                {"name": "Input.zip", "kind": "dataset"},
                {"name": "bins", "kind": "value", "default": "14"}
             ]}
        ]
    }"#;

    #[test]
    fn test_load_and_lookup() {
        let config = Config::from_json(CONFIG).unwrap();
        let module = config.module("gp", "flock").unwrap();
        assert_eq!(module.invocation, "FLOCK");
        assert_eq!(module.params[0].kind, ParamKind::Dataset);
        assert_eq!(module.params[1].default.as_deref(), Some("14"));
        assert_eq!(module.report_marker(Platform::GenePattern), ".html");
        assert!(config.module("gp", "missing").is_err());
        assert!(config.server("galaxy").is_err());
    }

    #[test]
    fn test_module_on_unknown_server() {
        let json = CONFIG.replace("\"server\": \"gp\"", "\"server\": \"nope\"");
        assert!(Config::from_json(&json).is_err());
    }

    #[test]
    fn test_duplicate_param() {
        let json = CONFIG.replace("\"bins\"", "\"Input.zip\"");
        assert!(Config::from_json(&json).is_err());
    }

    #[test]
    fn test_credentials_from_env() {
        let config = Config::from_json(CONFIG).unwrap();
        let server = config.server("gp").unwrap();
        env::remove_var("FLOWGATE_TEST_GP_PASSWORD");
        assert!(server.credentials().is_err());
        env::set_var("FLOWGATE_TEST_GP_PASSWORD", "s3cret");
        let credentials = server.credentials().unwrap();
        assert_eq!(credentials.username, "flowgate");
        assert_eq!(credentials.password, "s3cret");
        assert!(!format!("{credentials:?}").contains("s3cret"));
    }
}
