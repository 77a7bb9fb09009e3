use serde::Deserialize;

// =======================================================
// HTTP CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    // Timeouts (seconds)
    pub client_read_timeout_secs: u64,
    pub origin_connect_timeout_secs: u64,
    pub origin_read_timeout_secs: u64,
    pub origin_write_timeout_secs: u64,

    // Limits (bytes)
    pub max_request_headers_bytes: u64,
    pub max_origin_response_bytes: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            client_read_timeout_secs: 15,
            origin_connect_timeout_secs: 5,
            origin_read_timeout_secs: 30,
            origin_write_timeout_secs: 30,
            max_request_headers_bytes: 64 * 1024,
            max_origin_response_bytes: 10 * 1024 * 1024,
        }
    }
}

impl HttpConfig {
    pub fn client_read_timeout_secs(&self) -> u64 {
        self.client_read_timeout_secs
    }

    pub fn origin_connect_timeout_secs(&self) -> u64 {
        self.origin_connect_timeout_secs
    }

    pub fn origin_read_timeout_secs(&self) -> u64 {
        self.origin_read_timeout_secs
    }

    pub fn origin_write_timeout_secs(&self) -> u64 {
        self.origin_write_timeout_secs
    }

    pub fn max_request_headers_bytes(&self) -> u64 {
        self.max_request_headers_bytes
    }

    pub fn max_origin_response_bytes(&self) -> u64 {
        self.max_origin_response_bytes
    }

    pub(crate) fn apply_defaults_from(&mut self, defaults: &HttpConfig) {
        if self.client_read_timeout_secs == 0 {
            self.client_read_timeout_secs = defaults.client_read_timeout_secs;
        }
        if self.origin_connect_timeout_secs == 0 {
            self.origin_connect_timeout_secs = defaults.origin_connect_timeout_secs;
        }
        if self.origin_read_timeout_secs == 0 {
            self.origin_read_timeout_secs = defaults.origin_read_timeout_secs;
        }
        if self.origin_write_timeout_secs == 0 {
            self.origin_write_timeout_secs = defaults.origin_write_timeout_secs;
        }
        if self.max_request_headers_bytes == 0 {
            self.max_request_headers_bytes = defaults.max_request_headers_bytes;
        }
        if self.max_origin_response_bytes == 0 {
            self.max_origin_response_bytes = defaults.max_origin_response_bytes;
        }
    }
}
