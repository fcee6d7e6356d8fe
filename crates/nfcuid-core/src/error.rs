use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Format errors
    #[error("Invalid character flag: {0}")]
    InvalidCharFlag(String),

    #[error("Invalid UID: {0}")]
    InvalidUid(String),

    // Device selection errors
    #[error("Device number should be between 1 and {available}, got: {selected}")]
    DeviceOutOfRange { selected: usize, available: usize },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
