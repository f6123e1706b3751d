// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 错误类型 (Error types for the fusion engine and face archive)

use std::path::PathBuf;

use thiserror::Error;

use crate::detection::types::BBox;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, TrackingError>;

/// 跟踪/归档错误
///
/// Conditions that arise during normal operation (no detections, every track
/// failing, nothing archived) are never reported through this type.
#[derive(Error, Debug)]
pub enum TrackingError {
    /// Unknown tracker name, or a kind the factory cannot build.
    #[error("motion tracker `{kind}` is not supported")]
    CapabilityUnsupported { kind: String },

    /// Zero or negative area box handed in by a caller.
    #[error("degenerate bounding box {0:?}")]
    DegenerateInput(BBox),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("malformed configuration file: {0}")]
    ConfigFormat(#[from] serde_json::Error),

    #[error("failed to persist {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Error raised by an external detector capability.
    #[error("detector failed: {0}")]
    Detector(anyhow::Error),
}

impl TrackingError {
    pub fn unsupported<S: Into<String>>(kind: S) -> Self {
        Self::CapabilityUnsupported { kind: kind.into() }
    }

    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    /// 是否为致命的配置错误 (must stop the run before the frame loop)
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::CapabilityUnsupported { .. } | Self::InvalidConfig(_) | Self::ConfigFormat(_)
        )
    }
}
