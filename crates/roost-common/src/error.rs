use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("no MAC address supplied")]
    NoMacAddress,

    #[error("invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("invalid metadata value for '{key}': {message}")]
    InvalidMetadata { key: String, message: String },
}
