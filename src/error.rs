use thiserror::Error;

/// Ошибки генерации. Фатальны только ошибки конфигурации,
/// `SinkFillDidNotConverge` вызывающий может обработать сам.
#[derive(Error, Debug)]
pub enum MapgenError {
    #[error("invalid mesh configuration: {0}")]
    InvalidMeshConfig(String),

    #[error("field mismatch: {0}")]
    FieldMismatch(String),

    #[error("sink filling did not converge after {passes} passes")]
    SinkFillDidNotConverge { passes: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MapgenError>;
