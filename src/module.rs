//! This module contains all the sub-modules of the project.

pub mod define; // Definition module: Contains definitions and constants used throughout the project.
pub mod error; // Error module: The error type shared by every other module.
pub mod model; // Model module: Loads and migrates the detection model configuration.
pub mod server; // Server module: Serves the prediction endpoint over HTTP.
pub mod util; // Utility module: Provides various utility functions and helpers.
pub mod vision; // Vision module: Handles object detection, overlays and image geometry.
