use serde::Deserialize;

use crate::validation::{validate, ConfigReport};
use crate::{CacheConfig, GlobalConfig, HttpConfig, ProxyConfig};

// =======================================================
// STASH CONFIG: main config
// =======================================================
#[derive(Debug, Deserialize)]
pub struct StashConfig {
    #[serde(default)]
    pub global: GlobalConfig,

    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for StashConfig {
    fn default() -> Self {
        let mut cfg = Self {
            global: GlobalConfig::default(),
            proxy: ProxyConfig::default(),
            http: HttpConfig::default(),
            cache: CacheConfig::default(),
        };
        cfg.apply_defaults();
        cfg
    }
}

impl StashConfig {
    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }

    pub fn proxy(&self) -> &ProxyConfig {
        &self.proxy
    }

    pub fn http(&self) -> &HttpConfig {
        &self.http
    }

    pub fn cache(&self) -> &CacheConfig {
        &self.cache
    }

    /// Validate the configuration and return a report of warnings and errors.
    pub fn validate(&self) -> ConfigReport {
        validate(self)
    }

    pub fn from_file(file_name: &str) -> Result<Self, config::ConfigError> {
        Self::load(config::File::new(file_name, config::FileFormat::Ini).required(false))
    }

    /// Parse an INI document held in memory.
    pub fn from_ini_str(contents: &str) -> Result<Self, config::ConfigError> {
        Self::load(config::File::from_str(contents, config::FileFormat::Ini))
    }

    fn load<S>(source: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let built = config::Config::builder().add_source(source).build()?;

        let mut cfg: StashConfig = built.try_deserialize()?;

        cfg.apply_defaults();
        Ok(cfg)
    }

    pub fn from_file_or_default(file_name: &str) -> Self {
        match Self::from_file(file_name) {
            Ok(cfg) => {
                let report = cfg.validate();
                if report.has_errors() {
                    eprintln!("Invalid config in '{file_name}':");
                    eprintln!("{}", report.format());
                    eprintln!("Using default config (in-memory)...");
                    StashConfig::default()
                } else {
                    if !report.warnings().is_empty() {
                        eprintln!("Config warnings in '{file_name}':");
                        eprintln!("{}", report.format());
                    }
                    cfg
                }
            }
            Err(e) => {
                eprintln!("Error reading config '{file_name}': {e}");
                eprintln!("Using default config (in-memory)...");
                StashConfig::default()
            }
        }
    }

    fn apply_defaults(&mut self) {
        let def_global = GlobalConfig::default();
        self.global.apply_defaults_from(&def_global);

        let def_proxy = ProxyConfig::default();
        self.proxy.apply_defaults_from(&def_proxy);

        let def_http = HttpConfig::default();
        self.http.apply_defaults_from(&def_http);
    }

    pub fn print(&self) {
        println!("================ STASH CONFIG ================");
        self.print_global();
        self.print_proxy();
        self.print_http();
        self.print_cache();
        println!("==============================================");
    }

    fn print_global(&self) {
        println!("\n[global]");
        println!(
            "  worker_connections   = {}",
            self.global.worker_connections
        );
        println!("  log_level            = {}", self.global.log_level);
    }

    fn print_proxy(&self) {
        println!("\n[proxy]");
        println!("  listen_port          = {}", self.proxy.listen_port);
        println!("  backlog              = {}", self.proxy.backlog);
        println!("  self_address         = {}", self.proxy.self_address);
        println!("  local_origin         = {}", self.proxy.local_origin());
        println!("  default_port         = {}", self.proxy.default_port);
    }

    fn print_http(&self) {
        println!("\n[http]");
        println!(
            "  client_read_timeout_secs = {}",
            self.http.client_read_timeout_secs
        );
        println!(
            "  origin_connect_timeout_secs = {}",
            self.http.origin_connect_timeout_secs
        );
        println!(
            "  origin_read_timeout_secs = {}",
            self.http.origin_read_timeout_secs
        );
        println!(
            "  origin_write_timeout_secs = {}",
            self.http.origin_write_timeout_secs
        );
        println!(
            "  max_request_headers_bytes = {}",
            self.http.max_request_headers_bytes
        );
        println!(
            "  max_origin_response_bytes = {}",
            self.http.max_origin_response_bytes
        );
    }

    fn print_cache(&self) {
        println!("\n[cache]");
        println!("  coalesce_misses      = {}", self.cache.coalesce_misses);
        println!("  revalidate_on_hit    = {}", self.cache.revalidate_on_hit);
    }
}

#[cfg(test)]
mod tests {
    use super::StashConfig;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = StashConfig::default();
        assert_eq!(cfg.proxy.listen_port, 8080);
        assert_eq!(cfg.proxy.self_address, "localhost:8080");
        assert_eq!(cfg.proxy.local_origin(), "localhost:8000");
        assert_eq!(cfg.proxy.default_port, 80);
        assert!(cfg.cache.coalesce_misses);
        assert!(!cfg.cache.revalidate_on_hit);
    }

    #[test]
    fn from_ini_str_overrides_sections() {
        let ini = "[proxy]\nlisten_port = 9090\nlocal_origin_port = 9000\n\n[cache]\nrevalidate_on_hit = true\n";
        let cfg = StashConfig::from_ini_str(ini).expect("expected valid ini");
        assert_eq!(cfg.proxy.listen_port, 9090);
        assert_eq!(cfg.proxy.local_origin_port, 9000);
        assert_eq!(cfg.proxy.local_origin_host, "localhost");
        assert!(cfg.cache.revalidate_on_hit);
    }

    #[test]
    fn zero_values_fall_back_to_defaults() {
        let ini = "[http]\norigin_read_timeout_secs = 0\n";
        let cfg = StashConfig::from_ini_str(ini).expect("expected valid ini");
        assert_eq!(cfg.http.origin_read_timeout_secs, 30);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = StashConfig::from_file("/nonexistent/stash.conf").expect("optional file");
        assert_eq!(cfg.proxy.listen_port, 8080);
    }
}
