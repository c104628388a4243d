//! This module provides miscellaneous utilities.

// Import the submodules for configuration, initialization, paths and file helpers
pub mod common; // Filesystem and JSON helpers
pub mod conf; // Configuration module
pub mod init; // Initialization module
pub mod path; // Path module
