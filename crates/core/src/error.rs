use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("env var not found: {0}")]
    MissingEnv(String),

    #[error("invalid duration '{0}'")]
    InvalidDuration(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
