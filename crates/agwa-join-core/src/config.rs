use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Project file describing the active map.
    #[serde(default = "default_project_path")]
    pub project_path: String,
    #[serde(default)]
    pub debug: bool,
    /// Accepted for parity with the tool's parameter surface; nothing reads it yet.
    #[serde(default)]
    pub save_intermediate_outputs: bool,
}

fn default_project_path() -> String {
    "project.toml".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            project_path: default_project_path(),
            debug: false,
            save_intermediate_outputs: false,
        }
    }
}

pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("AGWA"))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
