//! Error type shared across mutascan.

use thiserror::Error;

/// Everything that can go wrong between startup and a finished prediction.
#[derive(Debug, Error)]
pub enum Error {
    /// A deprecated key was expected but absent under the strict policy.
    #[error("model config is missing deprecated key {key}")]
    ConfigMigration { key: String },

    /// Invalid application or model configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml: {0}")]
    Toml(#[from] toml::de::Error),

    /// The image path is missing or does not decode.
    #[error("can't decode image {path}: {reason}")]
    ImageDecode { path: String, reason: String },

    /// The image could not be written.
    #[error("can't encode image {path}: {reason}")]
    ImageEncode { path: String, reason: String },

    /// The inference engine failed.
    #[error("inference failed: {0}")]
    Inference(String),

    /// The request body is malformed or lacks a required field.
    #[error("invalid request: {0}")]
    RequestValidation(String),

    /// The image does not fit into the requested canvas.
    #[error("image {width}x{height} does not fit into canvas {canvas_width}x{canvas_height}")]
    CanvasTooSmall {
        width: u32,
        height: u32,
        canvas_width: u32,
        canvas_height: u32,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the caller, not the server, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::RequestValidation(_))
    }

    /// Short machine-readable tag used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigMigration { .. } => "config_migration_error",
            Self::Config(_) | Self::Yaml(_) | Self::Toml(_) => "config_error",
            Self::Json(_) | Self::Io(_) => "internal_error",
            Self::ImageDecode { .. } => "image_decode_error",
            Self::ImageEncode { .. } => "image_encode_error",
            Self::Inference(_) => "inference_error",
            Self::RequestValidation(_) => "request_validation_error",
            Self::CanvasTooSmall { .. } => "geometry_error",
        }
    }
}

impl From<ort::Error> for Error {
    fn from(e: ort::Error) -> Self {
        Self::Inference(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_validation_is_client_error() {
        assert!(Error::RequestValidation("img_path".into()).is_client_error());
        assert!(!Error::Inference("oom".into()).is_client_error());
        assert!(!Error::ImageDecode {
            path: "a.jpg".into(),
            reason: "missing".into()
        }
        .is_client_error());
    }

    #[test]
    fn migration_error_names_key() {
        let e = Error::ConfigMigration {
            key: "SOLVER.NUM_DECAYS".into(),
        };
        assert_eq!(e.kind(), "config_migration_error");
        assert!(e.to_string().contains("SOLVER.NUM_DECAYS"));
    }
}
