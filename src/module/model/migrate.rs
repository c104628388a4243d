//! Model config migration.
//!
//! Configs written by newer trainers carry keys the inference engine rejects.
//! They are stripped and the result is written to a fresh file in the
//! temporary directory, leaving the original untouched. The fresh file is
//! removed again once its [`ConfigFile`] is dropped.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tempfile::TempPath;

use crate::module::define;
use crate::module::error::{Error, Result};
use crate::module::util::path::cache::CacheFile;

/// What to do when a deprecated key is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MigrationPolicy {
    /// Fail with [`Error::ConfigMigration`].
    Strict,
    /// Skip the key.
    #[default]
    Tolerant,
}

impl MigrationPolicy {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            Self::Strict
        } else {
            Self::Tolerant
        }
    }
}

/// The config file handed to the engine.
#[derive(Debug)]
pub enum ConfigFile {
    /// The model's own config, used as is.
    Source(PathBuf),
    /// A migrated copy, deleted on drop.
    Migrated(TempPath),
}

impl ConfigFile {
    pub fn path(&self) -> &Path {
        match self {
            Self::Source(path) => path.as_path(),
            Self::Migrated(path) => path,
        }
    }
}

/// Returns the config file the engine should load.
///
/// Without `migrate` this is `config_file` itself and nothing is written.
pub fn prepare(config_file: &Path, migrate: bool, policy: MigrationPolicy) -> Result<ConfigFile> {
    if !migrate {
        return Ok(ConfigFile::Source(config_file.to_path_buf()));
    }
    migrate_into(config_file, &std::env::temp_dir(), policy)
}

/// Migrates `config_file` into a uniquely named file under `out_dir`.
pub fn migrate_into(
    config_file: &Path,
    out_dir: &Path,
    policy: MigrationPolicy,
) -> Result<ConfigFile> {
    let mut data: Value = serde_yaml::from_str(&fs::read_to_string(config_file)?)?;
    let removed = strip_deprecated(&mut data, policy)?;

    let target = CacheFile::new(out_dir)
        .prefix(define::path::MIGRATED_CONFIG_NAME)
        .filetype(define::path::MIGRATED_CONFIG_EXT)
        .random()?;
    // Exact name, created exclusively.
    let mut file = tempfile::Builder::new()
        .prefix(target.file_name().unwrap_or_default())
        .rand_bytes(0)
        .tempfile_in(out_dir)?;
    file.write_all(serde_yaml::to_string(&data)?.as_bytes())?;
    let out = file.into_temp_path();

    log::info!(
        "Migrated {} -> {} ({} keys removed)",
        config_file.display(),
        out.display(),
        removed.len()
    );
    Ok(ConfigFile::Migrated(out))
}

/// Removes every deprecated key from `data`, returning the dotted names that were present.
pub fn strip_deprecated(data: &mut Value, policy: MigrationPolicy) -> Result<Vec<String>> {
    let mut removed = Vec::new();
    for keys in define::keys::DEPRECATED {
        let dotted = keys.join(".");
        match remove_nested(data, keys) {
            Some(_) => removed.push(dotted),
            None if policy == MigrationPolicy::Strict => {
                return Err(Error::ConfigMigration { key: dotted });
            }
            None => log::debug!("{} not present, skipped", dotted),
        }
    }
    Ok(removed)
}

/// Removes `keys` (a nested path) from `value`, keeping the order of sibling keys.
fn remove_nested(value: &mut Value, keys: &[&str]) -> Option<Value> {
    let (last, parents) = keys.split_last()?;
    let mut node = value;
    for key in parents {
        node = node.get_mut(*key)?;
    }
    let map = node.as_mapping_mut()?;
    let target = map.get(*last)?.clone();

    let old = std::mem::take(map);
    *map = old
        .into_iter()
        .filter(|(k, _)| k.as_str() != Some(*last))
        .collect::<Mapping>();
    Some(target)
}
