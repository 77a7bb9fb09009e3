use std::fmt;

/// Canonical absolute URL (`http://{host}{path}`) identifying a cached body.
#[derive(Hash, Eq, PartialEq, Debug, Clone)]
pub struct CacheKey {
    url: String,
}

impl CacheKey {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}
