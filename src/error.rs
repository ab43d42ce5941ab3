use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("Distinguished name parse error: {0}")]
    Parse(String),

    #[error("DER decode error: {0}")]
    Decode(String),

    #[error("PEM format error: {0}")]
    Format(String),

    #[error("Unknown distinguished name attribute: {0}")]
    UnknownAttribute(String),

    #[error("Unknown attribute OID: {0}")]
    UnknownOid(String),

    #[error("Unknown key usage: {0}")]
    UnknownUsage(String),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("No certificate data supplied")]
    MissingCertificate,

    #[error("Not loaded: {0}")]
    NotLoaded(&'static str),

    #[error("Model has no root CA; call initialize first")]
    Uninitialized,

    #[error("Invalid IP address: {0}")]
    InvalidAddress(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Error::Validation {
            field,
            reason: reason.into(),
        }
    }
}

impl From<x509_parser::nom::Err<x509_parser::error::X509Error>> for Error {
    fn from(err: x509_parser::nom::Err<x509_parser::error::X509Error>) -> Self {
        Error::Decode(err.to_string())
    }
}

impl From<x509_parser::error::X509Error> for Error {
    fn from(err: x509_parser::error::X509Error) -> Self {
        Error::Decode(err.to_string())
    }
}

impl From<yasna::ASN1Error> for Error {
    fn from(err: yasna::ASN1Error) -> Self {
        Error::Decode(format!("{:?}", err))
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Format(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
