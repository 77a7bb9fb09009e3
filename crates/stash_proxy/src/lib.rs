//! Origin side of the proxy: where a request goes, and how it is fetched.

pub mod origin;
mod response;
pub mod target;

pub use origin::{OriginClient, OriginError};
pub use response::OriginResponse;
pub use target::{ResolvedTarget, TargetResolver};
