//! Module for Constants and Paths Definitions
//!
//! This module defines various constants and paths used throughout the application.

/// System Constants
pub mod system {
    /// Name of the system
    pub const NAME: &str = "mutascan";

    /// Default data directory (holds conf.toml and logs)
    pub const DEFAULT_DATA_DIR: &str = "./mutascan";
}

/// File Paths
pub mod path {

    // Log Directory
    pub const LOG_DIR: &str = "log";

    // Configuration File
    pub const CONF_FILE: &str = "conf.toml";

    // Model configuration inside the model directory
    pub const MODEL_CONFIG_FILE: &str = "CustomTrainer_config.yaml";

    // Weights inside the model directory
    pub const MODEL_WEIGHTS_FILE: &str = "model_final.pth";

    // Base name of the migrated model configuration
    pub const MIGRATED_CONFIG_NAME: &str = "CustomTrainer_config";

    // Extension of the migrated model configuration
    pub const MIGRATED_CONFIG_EXT: &str = "yaml";
}

/// Prediction Output
pub mod output {
    // Prefix of the overlay images written by /predict
    pub const RESULT_PREFIX: &str = "mutaSCAN_predict_result";

    // Extension of the overlay images written by /predict
    pub const RESULT_FILETYPE: &str = "jpg";

    // Display scale of the overlay image
    pub const OVERLAY_SCALE: f32 = 1.5;
}

/// Keys of the model configuration
pub mod keys {
    /// Keys the target inference engine no longer understands.
    pub const DEPRECATED: [&[&str]; 7] = [
        &["MODEL", "ROI_BOX_HEAD", "FED_LOSS_NUM_CLASSES"],
        &["MODEL", "ROI_BOX_HEAD", "FED_LOSS_FREQ_WEIGHT_POWER"],
        &["MODEL", "ROI_BOX_HEAD", "USE_FED_LOSS"],
        &["MODEL", "ROI_BOX_HEAD", "USE_SIGMOID_CE"],
        &["SOLVER", "BASE_LR_END"],
        &["SOLVER", "NUM_DECAYS"],
        &["SOLVER", "RESCALE_INTERVAL"],
    ];

    pub const WEIGHTS: &[&str] = &["MODEL", "WEIGHTS"];
    pub const SCORE_THRESH: &[&str] = &["MODEL", "ROI_HEADS", "SCORE_THRESH_TEST"];
    pub const DEVICE: &[&str] = &["MODEL", "DEVICE"];
    pub const INPUT_SIZE: &[&str] = &["INPUT", "MIN_SIZE_TEST"];
}
