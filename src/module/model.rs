//! Detection model configuration.
//!
//! Loads `CustomTrainer_config.yaml` from the model directory (migrated when
//! asked to) and applies the runtime overrides: weights path, score
//! threshold and compute device.

pub mod migrate;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_yaml::{Mapping, Value};

use crate::module::define;
use crate::module::error::{Error, Result};
use crate::module::util::conf;

use migrate::{ConfigFile, MigrationPolicy};

/// Square input size used when the config doesn't name one.
pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// Compute device for the inference engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda(u32),
}

impl FromStr for Device {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda(0)),
            other => other
                .strip_prefix("cuda:")
                .and_then(|id| id.parse().ok())
                .map(Self::Cuda)
                .ok_or_else(|| Error::Config(format!("unknown device '{}'", s))),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(id) => write!(f, "cuda:{}", id),
        }
    }
}

/// Everything the engine needs to start.
///
/// A migrated copy of the config lives as long as this value.
#[derive(Debug)]
pub struct EngineConfig {
    /// The file the config was read from (the migrated copy when migrated).
    pub config_file: ConfigFile,
    /// Full model config, overrides included.
    pub raw: Value,
    pub weights: PathBuf,
    pub score_threshold: f32,
    pub device: Device,
}

impl EngineConfig {
    /// Loads the model config from `model.dir` and applies the overrides.
    ///
    /// The overrides apply whether or not the config was migrated.
    pub fn load(model: &conf::Model) -> Result<Self> {
        let dir = Path::new(&model.dir);
        let source = dir.join(define::path::MODEL_CONFIG_FILE);
        let policy = MigrationPolicy::from_strict(model.strict_migration);
        let config_file = migrate::prepare(&source, model.migrate, policy)?;

        let raw: Value = serde_yaml::from_str(&std::fs::read_to_string(config_file.path())?)?;
        let mut cfg = Self {
            config_file,
            raw,
            weights: dir.join(&model.weights_file),
            score_threshold: model.score_threshold,
            device: model.device.parse()?,
        };
        cfg.apply_overrides()?;
        Ok(cfg)
    }

    /// Mirrors the overrides into the raw config.
    fn apply_overrides(&mut self) -> Result<()> {
        let weights = Value::String(self.weights.to_string_lossy().into_owned());
        let thresh = Value::Number(serde_yaml::Number::from(self.score_threshold as f64));
        let device = Value::String(self.device.to_string());
        set_nested(&mut self.raw, define::keys::WEIGHTS, weights)?;
        set_nested(&mut self.raw, define::keys::SCORE_THRESH, thresh)?;
        set_nested(&mut self.raw, define::keys::DEVICE, device)?;
        Ok(())
    }

    /// Engine input side length from `INPUT.MIN_SIZE_TEST`.
    pub fn input_size(&self) -> u32 {
        let mut node = &self.raw;
        for key in define::keys::INPUT_SIZE {
            match node.get(*key) {
                Some(v) => node = v,
                None => return DEFAULT_INPUT_SIZE,
            }
        }
        let size = match node {
            Value::Sequence(seq) => seq.first().and_then(Value::as_u64),
            other => other.as_u64(),
        };
        size.filter(|s| *s > 0)
            .map(|s| s as u32)
            .unwrap_or(DEFAULT_INPUT_SIZE)
    }
}

/// Sets `keys` in `value`, creating intermediate mappings as needed.
fn set_nested(value: &mut Value, keys: &[&str], new: Value) -> Result<()> {
    let Some((last, parents)) = keys.split_last() else {
        return Ok(());
    };
    let mut node = value;
    for key in parents {
        let map = node
            .as_mapping_mut()
            .ok_or_else(|| Error::Config(format!("{} is not a mapping", keys.join("."))))?;
        node = map
            .entry(Value::String((*key).to_string()))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
    }
    let map = node
        .as_mapping_mut()
        .ok_or_else(|| Error::Config(format!("{} is not a mapping", keys.join("."))))?;
    map.insert(Value::String((*last).to_string()), new);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn model_dir(yaml: &str) -> (tempfile::TempDir, conf::Model) {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(define::path::MODEL_CONFIG_FILE), yaml).unwrap();
        let mut model = conf::Config::default().model;
        model.dir = tmp.path().to_string_lossy().into_owned();
        (tmp, model)
    }

    #[test]
    fn device_parsing() {
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("CUDA".parse::<Device>().unwrap(), Device::Cuda(0));
        assert_eq!("cuda:2".parse::<Device>().unwrap(), Device::Cuda(2));
        assert!("tpu".parse::<Device>().is_err());
        assert!("cuda:x".parse::<Device>().is_err());
        assert_eq!(Device::Cuda(1).to_string(), "cuda:1");
    }

    #[test]
    fn overrides_apply_without_migration() {
        let (tmp, mut model) = model_dir("MODEL:\n  DEVICE: cuda\nINPUT:\n  MIN_SIZE_TEST: 800\n");
        model.migrate = false;
        model.score_threshold = 0.5;
        let cfg = EngineConfig::load(&model).unwrap();

        assert_eq!(cfg.config_file.path(), tmp.path().join(define::path::MODEL_CONFIG_FILE));
        assert_eq!(cfg.weights, tmp.path().join("model_final.pth"));
        assert_eq!(cfg.device, Device::Cpu);
        assert_eq!(cfg.raw["MODEL"]["DEVICE"].as_str(), Some("cpu"));
        assert_eq!(cfg.raw["MODEL"]["ROI_HEADS"]["SCORE_THRESH_TEST"].as_f64(), Some(0.5));
        assert!(cfg.raw["MODEL"]["WEIGHTS"]
            .as_str()
            .unwrap()
            .ends_with("model_final.pth"));
        assert_eq!(cfg.input_size(), 800);
    }

    #[test]
    fn migrated_config_is_loaded() {
        let (_tmp, mut model) = model_dir("SOLVER:\n  NUM_DECAYS: 3\n  MAX_ITER: 10\n");
        model.migrate = true;
        let cfg = EngineConfig::load(&model).unwrap();
        assert!(cfg.raw["SOLVER"].get("NUM_DECAYS").is_none());
        assert_eq!(cfg.raw["SOLVER"]["MAX_ITER"].as_u64(), Some(10));
        let migrated = cfg.config_file.path().to_path_buf();
        assert_ne!(migrated, Path::new(&model.dir).join(define::path::MODEL_CONFIG_FILE));
        assert!(migrated.is_file());
        assert_eq!(cfg.input_size(), DEFAULT_INPUT_SIZE);
        drop(cfg);
        assert!(!migrated.exists());
    }

    #[test]
    fn strict_migration_surfaces_missing_keys() {
        let (_tmp, mut model) = model_dir("SOLVER:\n  MAX_ITER: 10\n");
        model.migrate = true;
        model.strict_migration = true;
        assert!(matches!(
            EngineConfig::load(&model),
            Err(Error::ConfigMigration { .. })
        ));
    }

    #[test]
    fn input_size_from_sequence() {
        let (_tmp, mut model) = model_dir("INPUT:\n  MIN_SIZE_TEST: [512, 640]\n");
        model.migrate = false;
        assert_eq!(EngineConfig::load(&model).unwrap().input_size(), 512);
    }
}
