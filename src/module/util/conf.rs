//! Config Handler.

use serde::{Deserialize, Serialize};

/// Provides TOML config file handling.
pub mod toml {

    use super::DEFAULT_CONFIG;
    use crate::module::define;
    use crate::module::error::{Error, Result};
    use std::fs;
    use std::path::Path;

    /// Loads a configuration file from the given directory.
    /// If not found, generates a default config file.
    ///
    /// # Arguments
    ///
    /// * `dir` - The directory where the configuration file is located or should be created.
    ///
    pub fn load(dir: &str) -> Result<super::Config> {
        let path = Path::new(dir).join(define::path::CONF_FILE);

        if !path.is_file() {
            // Create the default config if it doesn't exist
            let config: super::Config = toml::from_str(DEFAULT_CONFIG)?;
            save(dir, &config)?;
        }

        let conf_str = fs::read_to_string(&path)?;
        let conf: super::Config = toml::from_str(&conf_str)?;
        conf.validate()?;
        Ok(conf)
    }

    /// Saves a configuration file to the given directory.
    ///
    /// # Arguments
    ///
    /// * `dir` - The directory where the configuration file should be saved.
    /// * `conf` - The configuration data to be saved.
    ///
    pub fn save(dir: &str, conf: &super::Config) -> Result<()> {
        let toml_str = toml::to_string(conf).map_err(|e| Error::Config(e.to_string()))?;
        let path = crate::module::util::path::join(&[dir, define::path::CONF_FILE]);
        fs::write(path, toml_str)?;
        Ok(())
    }
}

/// Represents the configuration data structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub system: System,
    pub server: Server,
    pub model: Model,
    pub output: Output,
}

impl Config {
    /// Rejects values the service can't start with.
    pub fn validate(&self) -> crate::module::error::Result<()> {
        use crate::module::error::Error;
        if !(0.0..=1.0).contains(&self.model.score_threshold) {
            return Err(Error::Config(format!(
                "model.score_threshold must be within [0, 1], got {}",
                self.model.score_threshold
            )));
        }
        if self.model.weights_file.is_empty() {
            return Err(Error::Config("model.weights_file is empty".into()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        // The built-in default is a compile-time constant and always parses.
        ::toml::from_str(DEFAULT_CONFIG).unwrap_or_else(|e| panic!("bad DEFAULT_CONFIG: {}", e))
    }
}

/// Represents system-related configuration parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct System {
    pub log_level: String,
}

/// Represents HTTP server configuration parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

/// Represents model-related configuration parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Model {
    pub dir: String,
    pub migrate: bool,
    pub strict_migration: bool,
    pub score_threshold: f32,
    pub device: String,
    pub weights_file: String,
}

/// Represents output-related configuration parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Output {
    pub cache_dir: String,
    pub prefix: String,
    pub filetype: String,
}

// Default configuration data in TOML format
const DEFAULT_CONFIG: &str = r#"
[system]
  log_level = 'info' # Log level ('error', 'warn', 'info', 'debug', 'trace')

[server]
  host = '127.0.0.1' # Bind address
  port = 5000 # Bind port

[model]
  dir = 'model' # Directory holding CustomTrainer_config.yaml and the weights
  migrate = true # Strip keys the inference engine no longer understands
  strict_migration = false # Fail if a deprecated key is missing
  score_threshold = 0.85 # Detections below this score are dropped
  device = 'cpu' # Compute device ('cpu', 'cuda', 'cuda:N')
  weights_file = 'model_final.pth' # Weights file name inside the model directory

[output]
  cache_dir = '' # Directory for overlay images (empty: system temp directory)
  prefix = 'mutaSCAN_predict_result' # Overlay file name prefix
  filetype = 'jpg' # Overlay file extension
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_load() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_str().unwrap();
        let res = toml::load(dir).unwrap();
        assert_eq!(res.model.score_threshold, 0.85);
        assert_eq!(res.model.device, "cpu");
        assert_eq!(res.model.weights_file, "model_final.pth");
        assert!(res.model.migrate);
        assert!(!res.model.strict_migration);
        assert!(tmp.path().join("conf.toml").is_file());
    }

    #[test]
    fn load_keeps_saved_changes() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_str().unwrap();
        let mut conf = Config::default();
        conf.server.port = 8123;
        conf.model.device = "cuda:1".into();
        toml::save(dir, &conf).unwrap();
        let res = toml::load(dir).unwrap();
        assert_eq!(res.server.port, 8123);
        assert_eq!(res.model.device, "cuda:1");
    }

    #[test]
    fn rejects_threshold_out_of_range() {
        let mut conf = Config::default();
        conf.model.score_threshold = 1.5;
        assert!(conf.validate().is_err());
    }
}
