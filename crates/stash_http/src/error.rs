use thiserror::Error;

use crate::responses::Status;

/// Everything that stops a request short of a normal 200 or a passthrough.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("relative request target without a Host header")]
    MissingHost,

    #[error("method '{0}' is not allowed")]
    MethodNotAllowed(String),

    #[error("origin {addr} unreachable: {reason}")]
    OriginUnreachable { addr: String, reason: String },

    #[error("origin {addr} response exceeds {limit} bytes")]
    OriginTooLarge { addr: String, limit: usize },

    #[error("origin answered 304 for {0} but no usable cache entry exists")]
    CacheInconsistency(String),
}

impl ProxyError {
    /// Status written back to the client for this error.
    pub fn status(&self) -> Status {
        match self {
            ProxyError::MalformedRequest(_) | ProxyError::MissingHost => Status::BadRequest,
            ProxyError::MethodNotAllowed(_) => Status::MethodNotAllowed,
            ProxyError::OriginUnreachable { .. }
            | ProxyError::OriginTooLarge { .. }
            | ProxyError::CacheInconsistency(_) => Status::BadGateway,
        }
    }
}
