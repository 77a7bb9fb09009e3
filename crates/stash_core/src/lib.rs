pub mod context;
pub mod master;
pub mod worker;

pub use context::ProxyContext;
