use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level gateway config, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Address to bind the HTTP server.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    /// Mount root path prefix. `/` when served at the web root.
    #[serde(default = "default_root")]
    pub root: String,
    /// Production mode hides internal error detail from 500 responses.
    #[serde(default)]
    pub production: bool,
    /// Lifetime of a logged-in session.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
    /// Deadline for a single terminal command dispatch.
    #[serde(default = "default_dispatch_timeout")]
    pub dispatch_timeout_secs: u64,
    /// Gateway log file served by `GET /activity-log`.
    pub log_file: Option<PathBuf>,
    /// Login credentials. When absent, a one-off password is generated at
    /// startup and printed to stderr.
    pub auth: Option<AuthConfig>,
    /// Overrides for the `/about` endpoint; defaults to package metadata.
    pub about: Option<AboutInfo>,
}

/// Credentials section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

/// Package identity reported by `GET /about`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AboutInfo {
    pub title: String,
    pub version: String,
    pub author: String,
    pub license: String,
}

impl AboutInfo {
    /// Build from the crate's own package metadata.
    pub fn from_package() -> Self {
        Self {
            title: env!("CARGO_PKG_DESCRIPTION").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            author: env!("CARGO_PKG_AUTHORS").to_string(),
            license: env!("CARGO_PKG_LICENSE").to_string(),
        }
    }
}

fn default_bind() -> SocketAddr {
    "127.0.0.1:8080".parse().expect("valid literal")
}

fn default_root() -> String {
    "/".to_string()
}

fn default_session_ttl() -> u64 {
    3600
}

fn default_dispatch_timeout() -> u64 {
    30
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            root: default_root(),
            production: false,
            session_ttl_secs: default_session_ttl(),
            dispatch_timeout_secs: default_dispatch_timeout(),
            log_file: None,
            auth: None,
            about: None,
        }
    }
}

impl GatewayConfig {
    /// Load config from a TOML file path. Returns None if the file doesn't
    /// exist.
    ///
    /// Callers should also run [`check_config_permissions`] once tracing is
    /// up, since the file may hold credentials.
    pub fn load(path: &std::path::Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?;
        Ok(Some(config))
    }
}

/// Errors that can occur when loading config.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse config {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
}

/// Check file permissions on a config file and warn if world-readable.
///
/// On Unix, checks `st_mode & 0o004`. If set, logs a warning because the
/// config file may contain login credentials.
#[cfg(unix)]
pub fn check_config_permissions(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;

    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(_) => return,
    };

    let mode = metadata.permissions().mode();
    if mode & 0o004 != 0 {
        tracing::warn!(
            "Config file {} is world-readable (mode {:o}). \
             It may contain credentials -- consider restricting permissions to 600.",
            path.display(),
            mode & 0o7777,
        );
    }
}

/// No-op on non-Unix platforms.
#[cfg(not(unix))]
pub fn check_config_permissions(_path: &std::path::Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
            root = "/sms/"

            [auth]
            username = "admin"
            password = "hunter2"
        "#;
        let config: GatewayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.root, "/sms/");
        assert_eq!(config.bind, default_bind());
        assert_eq!(config.session_ttl_secs, 3600);
        assert_eq!(config.dispatch_timeout_secs, 30);
        assert!(!config.production);
        let auth = config.auth.unwrap();
        assert_eq!(auth.username, "admin");
        assert_eq!(auth.password, "hunter2");
    }

    #[test]
    fn parse_empty_config_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.root, "/");
        assert!(config.auth.is_none());
        assert!(config.log_file.is_none());
    }

    #[test]
    fn load_missing_file_is_none() {
        let config = GatewayConfig::load(std::path::Path::new("/nonexistent/termgw.toml"));
        assert!(config.unwrap().is_none());
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bind = \"0.0.0.0:9000\"\nproduction = true").unwrap();
        let config = GatewayConfig::load(file.path()).unwrap().unwrap();
        assert_eq!(config.bind, "0.0.0.0:9000".parse().unwrap());
        assert!(config.production);
    }

    #[test]
    fn load_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bind = [not toml").unwrap();
        assert!(GatewayConfig::load(file.path()).is_err());
    }

    #[test]
    fn about_from_package_has_version() {
        let about = AboutInfo::from_package();
        assert_eq!(about.version, env!("CARGO_PKG_VERSION"));
        assert!(!about.title.is_empty());
    }
}
