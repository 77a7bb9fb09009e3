use crate::StashConfig;

/// Validation output for a loaded Stash configuration.
#[derive(Debug, Default)]
pub struct ConfigReport {
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl ConfigReport {
    /// Returns true when no errors were found.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns true when at least one error was found.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns the collected warning messages.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Returns the collected error messages.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Render warnings and errors into a readable, multi-line string.
    pub fn format(&self) -> String {
        let mut out = String::new();
        if !self.errors.is_empty() {
            out.push_str("Errors:\n");
            for err in &self.errors {
                out.push_str("  - ");
                out.push_str(err);
                out.push('\n');
            }
        }
        if !self.warnings.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("Warnings:\n");
            for warn in &self.warnings {
                out.push_str("  - ");
                out.push_str(warn);
                out.push('\n');
            }
        }
        out
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}

/// Validate a Stash configuration and return a report of issues.
pub fn validate(cfg: &StashConfig) -> ConfigReport {
    let mut report = ConfigReport::default();

    validate_proxy(cfg, &mut report);
    validate_http(cfg, &mut report);
    validate_cache(cfg, &mut report);

    report
}

fn validate_proxy(cfg: &StashConfig, report: &mut ConfigReport) {
    let proxy = &cfg.proxy;

    if proxy.self_address.contains('/') || proxy.self_address.contains(char::is_whitespace) {
        report.error(format!(
            "proxy.self_address '{}' must be a bare host[:port] authority",
            proxy.self_address
        ));
    }

    if !proxy.self_address.contains(':') {
        report.warn(format!(
            "proxy.self_address '{}' has no port; only Host headers without a port will match",
            proxy.self_address
        ));
    }

    if proxy
        .self_address
        .eq_ignore_ascii_case(&proxy.local_origin())
    {
        report.error(format!(
            "proxy.self_address '{}' equals the local origin; requests would loop back into the proxy",
            proxy.self_address
        ));
    }

    if proxy.local_origin_port == proxy.listen_port
        && is_loopback_name(&proxy.local_origin_host)
    {
        report.warn(format!(
            "local origin {} points at the proxy's own listen port",
            proxy.local_origin()
        ));
    }

    if proxy.backlog < 16 {
        report.warn(format!(
            "proxy.backlog {} is small; connection bursts may queue in the kernel",
            proxy.backlog
        ));
    }
}

fn validate_http(cfg: &StashConfig, report: &mut ConfigReport) {
    let http = &cfg.http;

    if http.max_request_headers_bytes < 1024 {
        report.warn(format!(
            "http.max_request_headers_bytes {} is below 1024; ordinary requests may be rejected",
            http.max_request_headers_bytes
        ));
    }

    if http.origin_read_timeout_secs < http.origin_connect_timeout_secs {
        report.warn(
            "http.origin_read_timeout_secs is shorter than origin_connect_timeout_secs",
        );
    }
}

fn validate_cache(cfg: &StashConfig, report: &mut ConfigReport) {
    if cfg.cache.revalidate_on_hit {
        report.warn("cache.revalidate_on_hit is enabled; every hit contacts the origin");
    }
}

fn is_loopback_name(host: &str) -> bool {
    host.eq_ignore_ascii_case("localhost") || host == "127.0.0.1" || host == "::1"
}
