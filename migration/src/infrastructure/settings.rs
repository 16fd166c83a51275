use std::env;
use std::path::Path;

use anyhow::{Context, bail};
use config::{Config, Environment, File};
use dotenvy::dotenv;
use publisher_common::database::DatabaseSettings;
use serde::Deserialize;

const CONFIG_DIR: &str = "./config";
const ENV_PREFIX: &str = "app";

/// Settings of the migration binary.
///
/// Layered from `default.yaml`, an optional `{RUN_MODE}.yaml` and `APP__*`
/// environment variables, e.g. `APP__DATABASE__HOST`.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// directory with one JSON declaration per record type
    pub schema_config_path: String,
    pub database: DatabaseSettings,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        Self::load(Path::new(CONFIG_DIR), &run_mode)
    }

    pub fn load(config_dir: &Path, run_mode: &str) -> anyhow::Result<Self> {
        let default_file = config_dir.join("default");
        let run_mode_file = config_dir.join(run_mode);

        let settings: Settings = Config::builder()
            .add_source(File::with_name(&default_file.to_string_lossy()))
            .add_source(File::with_name(&run_mode_file.to_string_lossy()).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()
            .with_context(|| format!("failed to read config from {}", config_dir.display()))?;

        settings.validate()?;
        tracing::debug!(run_mode, schema_config_path = %settings.schema_config_path, "settings loaded");
        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !Path::new(&self.schema_config_path).is_dir() {
            bail!(
                "schema_config_path '{}' is not a directory",
                self.schema_config_path
            );
        }
        self.database.validate()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn write_default(dir: &Path, schema_config_path: &Path) {
        let yaml = format!(
            "schema_config_path: {}
database:
  host: localhost
  db: publisher
  schema: public
  credentials:
    username: publisher
    password: publisher
  connection:
    min_connections: 1
    max_connections: 5
    acquire_timeout_seconds: 5
",
            schema_config_path.display()
        );
        fs::write(dir.join("default.yaml"), yaml).unwrap();
    }

    #[test]
    fn run_mode_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        write_default(dir.path(), dir.path());
        fs::write(dir.path().join("staging.yaml"), "database:\n  schema: staging\n").unwrap();

        let settings = Settings::load(dir.path(), "staging").unwrap();

        assert_eq!(settings.database.schema, "staging");
        assert_eq!(settings.database.port, 5432);

        let settings = Settings::load(dir.path(), "development").unwrap();
        assert_eq!(settings.database.schema, "public");
    }

    #[test]
    fn missing_schema_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_default(dir.path(), &dir.path().join("missing"));

        let err = Settings::load(dir.path(), "development").unwrap_err();

        assert!(err.to_string().contains("is not a directory"));
    }
}
