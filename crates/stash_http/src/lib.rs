pub mod error;
pub mod request;
pub mod responses;

use tokio::io::{AsyncRead, AsyncWrite};

pub use error::ProxyError;
pub use request::ParsedRequest;
pub use responses::Status;

/// Byte transport for one client connection (TCP in production, in-memory
/// pipes in tests).
pub trait ClientStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> ClientStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}
