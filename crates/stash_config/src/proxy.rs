use serde::Deserialize;

// =======================================================
// PROXY CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProxyConfig {
    /// Port bound on all interfaces.
    pub listen_port: u16,
    /// Listen backlog handed to the kernel.
    pub backlog: u32,

    /// Authority that means "this proxy" (e.g. "localhost:8080").
    /// Requests addressed to it are served from the local origin.
    pub self_address: String,
    pub local_origin_host: String,
    pub local_origin_port: u16,

    /// Port used for remote hosts that do not carry one.
    pub default_port: u16,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_port: 8080,
            backlog: 1024,
            self_address: "localhost:8080".into(),
            local_origin_host: "localhost".into(),
            local_origin_port: 8000,
            default_port: 80,
        }
    }
}

impl ProxyConfig {
    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.listen_port)
    }

    pub fn local_origin(&self) -> String {
        format!("{}:{}", self.local_origin_host, self.local_origin_port)
    }

    pub(crate) fn apply_defaults_from(&mut self, defaults: &ProxyConfig) {
        if self.listen_port == 0 {
            self.listen_port = defaults.listen_port;
        }
        if self.backlog == 0 {
            self.backlog = defaults.backlog;
        }
        if self.self_address.trim().is_empty() {
            self.self_address = defaults.self_address.clone();
        }
        if self.local_origin_host.trim().is_empty() {
            self.local_origin_host = defaults.local_origin_host.clone();
        }
        if self.local_origin_port == 0 {
            self.local_origin_port = defaults.local_origin_port;
        }
        if self.default_port == 0 {
            self.default_port = defaults.default_port;
        }
    }
}
