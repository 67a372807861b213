//! Error types for Outpost

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read config: {0}")]
    ConfigRead(String),

    #[error("Failed to parse config: {0}")]
    ConfigParse(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No provider configured")]
    NoProviders,

    #[error("Duplicate provider name: {0}")]
    DuplicateProvider(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::ConfigRead(_) => "ConfigRead",
            Error::ConfigParse(_) => "ConfigParse",
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::NoProviders => "NoProviders",
            Error::DuplicateProvider(_) => "DuplicateProvider",
            Error::Io(_) => "Io",
            Error::Other(_) => "Internal",
        }
    }
}
