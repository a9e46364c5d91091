use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CdsError {
    #[error("Failed to read CDS API configuration '{0}'")]
    ConfigRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to determine home directory for .cdsapirc")]
    HomeDirResolution,

    #[error("Missing '{0}' in CDS API configuration")]
    MissingSetting(&'static str),

    #[error("CDS API key must have the form UID:KEY")]
    InvalidKey,

    #[error("Invalid CDS URL '{0}'")]
    InvalidUrl(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("CDS API returned {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("CDS request failed: {message} ({reason})")]
    TaskFailed { message: String, reason: String },

    #[error("CDS reply has unexpected state '{0}'")]
    UnknownState(String),

    #[error("CDS reply has no request id")]
    MissingRequestId,

    #[error("CDS reply for a completed request has no download location")]
    MissingLocation,
}
