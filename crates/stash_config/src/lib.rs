mod cache;
mod global;
mod http;
mod proxy;
mod stash;
mod validation;

pub use cache::CacheConfig;
pub use global::GlobalConfig;
pub use http::HttpConfig;
pub use proxy::ProxyConfig;
pub use stash::StashConfig;
pub use validation::{validate, ConfigReport};
