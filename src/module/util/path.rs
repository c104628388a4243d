//! Path Operations Module
//!
//! This module handles path operations for directories, generated file names and cache files.

use std::path::PathBuf;

/// Join Paths
///
/// This function takes a slice of strings as input and joins them into a single path string.
/// It uses the PathBuf type to handle platform-specific separators and conversions.
/// Non UTF-8 segments are replaced lossily.
pub fn join(paths: &[&str]) -> String {
    let mut path: PathBuf = PathBuf::new();
    for p in paths {
        path.push(p);
    }
    path.to_string_lossy().into_owned()
}

pub mod dir {
    //! Directory Operations Submodule
    //!
    //! This submodule provides functions for directory operations.

    use std::fs;
    use std::path::Path;

    use super::{MutascanDir, MutascanPath};
    use crate::module::define;
    use crate::module::error::Result;

    /// Create Directory from Path List
    ///
    /// This function takes a slice of strings as input and creates a directory with the joined path.
    /// Existing directories are left alone.
    /// It returns the joined path.
    pub fn create_dir_from_path_list(paths: &[&str]) -> Result<String> {
        let path = super::join(paths);
        fs::create_dir_all(Path::new(&path))?;
        Ok(path)
    }

    /// Create Application Subdirectories and Paths
    ///
    /// Creates the data directory and its log directory, and resolves the cache root.
    /// An empty `cache_dir` selects the system temporary directory.
    pub fn create_app_sub_dir(data_dir: &str, cache_dir: &str) -> Result<MutascanPath> {
        let data = create_dir_from_path_list(&[data_dir])?;
        let log = create_dir_from_path_list(&[&data, define::path::LOG_DIR])?;
        let cache = if cache_dir.is_empty() {
            std::env::temp_dir().to_string_lossy().into_owned()
        } else {
            create_dir_from_path_list(&[cache_dir])?
        };
        Ok(MutascanPath {
            dir: MutascanDir { data, log, cache },
        })
    }
}

pub mod name {
    //! Base Name Generators
    //!
    //! The two strategies used to name generated files.

    /// Random base name: a UUID v4 string.
    pub fn uuid() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Timestamp base name in local time: `YYYYMMDD_HHMMSS_ffffff`.
    ///
    /// Two calls within the same microsecond return the same name.
    pub fn datetime() -> String {
        chrono::Local::now().format("%Y%m%d_%H%M%S_%6f").to_string()
    }
}

pub mod cache {
    //! Cache File Generator
    //!
    //! Builds `root[/subdir]/[prefix_]base[_suffix][.filetype]` and makes sure the
    //! enclosing directory exists. The file itself is never created or checked.

    use std::fs;
    use std::path::PathBuf;

    use crate::module::error::Result;

    /// Where and how to name a cache file.
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct CacheFile {
        pub root: PathBuf,
        pub subdir: Option<String>,
        pub filetype: String,
        pub suffix: String,
        pub prefix: String,
    }

    impl CacheFile {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self {
                root: root.into(),
                ..Default::default()
            }
        }

        pub fn subdir(mut self, subdir: impl Into<String>) -> Self {
            self.subdir = Some(subdir.into());
            self
        }

        pub fn filetype(mut self, filetype: impl Into<String>) -> Self {
            self.filetype = filetype.into();
            self
        }

        pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
            self.suffix = suffix.into();
            self
        }

        pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
            self.prefix = prefix.into();
            self
        }

        /// The directory the file lands in.
        pub fn dir(&self) -> PathBuf {
            match &self.subdir {
                Some(sub) => self.root.join(sub),
                None => self.root.clone(),
            }
        }

        /// File name for the given base, without touching the filesystem.
        pub fn file_name(&self, base: &str) -> String {
            let mut name = String::new();
            if !self.prefix.is_empty() {
                name.push_str(&self.prefix);
                name.push('_');
            }
            name.push_str(base);
            if !self.suffix.is_empty() {
                name.push('_');
                name.push_str(&self.suffix);
            }
            if !self.filetype.is_empty() {
                name.push('.');
                name.push_str(&self.filetype);
            }
            name
        }

        /// Creates the enclosing directory and returns the path for `base`.
        pub fn generate(&self, base: &str) -> Result<PathBuf> {
            let dir = self.dir();
            fs::create_dir_all(&dir)?;
            Ok(dir.join(self.file_name(base)))
        }

        /// Path with a random UUID base.
        pub fn random(&self) -> Result<PathBuf> {
            self.generate(&super::name::uuid())
        }

        /// Path with a timestamp base.
        pub fn timestamp(&self) -> Result<PathBuf> {
            self.generate(&super::name::datetime())
        }
    }
}

/// Paths of Resources
///
/// This struct represents the paths of the resources used by the application.
#[derive(Debug, Clone)]
pub struct MutascanPath {
    /// Directories Paths
    pub dir: MutascanDir,
}

/// Paths of Directories
///
/// This struct represents the paths of the directories used by the application.
#[derive(Debug, Clone)]
pub struct MutascanDir {
    /// Data Directory Path
    pub data: String,
    /// Log Directory Path
    pub log: String,
    /// Cache Root for generated artifacts
    pub cache: String,
}
