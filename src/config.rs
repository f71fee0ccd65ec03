//! Tunnel configuration
//!
//! Resolved once at startup (see `main.rs` for the CLI flags and their `SQLTUNNEL_*`
//! environment fallbacks) and shared read-only by every request.

use std::fmt;
use std::str::FromStr;

/// Charset forced on every session so text survives regardless of the server default.
pub const DEFAULT_CHARSET: &str = "utf8";

/// Port used when the client leaves `port` empty.
pub const DEFAULT_DB_PORT: u16 = 3306;

/// Dotted `major.minor.patch` version of the hosting runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RuntimeVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl RuntimeVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Version of this build.
    pub fn current() -> Self {
        Self::new(
            env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
            env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
            env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0),
        )
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for RuntimeVersion {
    type Err = String;

    /// Accepts `1`, `1.2`, `1.2.3` and ignores any `-pre`/`+build` suffix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let core = s
            .trim()
            .split(|c: char| c == '-' || c == '+')
            .next()
            .unwrap_or_default();
        if core.is_empty() {
            return Err("empty version".to_string());
        }

        let mut parts = [0u32; 3];
        for (idx, part) in core.split('.').enumerate() {
            if idx >= parts.len() {
                return Err(format!("too many components in version '{}'", s));
            }
            parts[idx] = part
                .parse()
                .map_err(|_| format!("invalid version component '{}' in '{}'", part, s))?;
        }
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelConfig {
    /// Serve the HTML test page for GET requests and incomplete POSTs.
    pub allow_test_menu: bool,
    /// Charset applied to every session right after connecting.
    pub charset: String,
    /// Requests are refused with error 201 when the runtime is older than this.
    pub min_runtime_version: RuntimeVersion,
    /// Port used when the request leaves `port` empty.
    pub default_db_port: u16,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            allow_test_menu: true,
            charset: DEFAULT_CHARSET.to_string(),
            min_runtime_version: RuntimeVersion::new(0, 1, 0),
            default_db_port: DEFAULT_DB_PORT,
        }
    }
}

impl TunnelConfig {
    pub fn with_test_menu(mut self, allow: bool) -> Self {
        self.allow_test_menu = allow;
        self
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    pub fn with_min_runtime_version(mut self, version: RuntimeVersion) -> Self {
        self.min_runtime_version = version;
        self
    }

    pub fn with_default_db_port(mut self, port: u16) -> Self {
        self.default_db_port = port;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_versions() {
        assert_eq!("1.2.3".parse(), Ok(RuntimeVersion::new(1, 2, 3)));
        assert_eq!("7".parse(), Ok(RuntimeVersion::new(7, 0, 0)));
        assert_eq!("0.4".parse(), Ok(RuntimeVersion::new(0, 4, 0)));
        assert_eq!("2.0.1-beta.1".parse(), Ok(RuntimeVersion::new(2, 0, 1)));
        assert!("".parse::<RuntimeVersion>().is_err());
        assert!("1.x".parse::<RuntimeVersion>().is_err());
        assert!("1.2.3.4".parse::<RuntimeVersion>().is_err());
    }

    #[test]
    fn test_version_ordering() {
        assert!(RuntimeVersion::new(0, 9, 9) < RuntimeVersion::new(1, 0, 0));
        assert!(RuntimeVersion::new(1, 10, 0) > RuntimeVersion::new(1, 9, 5));
        assert_eq!(RuntimeVersion::new(3, 1, 4).to_string(), "3.1.4");
    }

    #[test]
    fn test_current_version_matches_package() {
        assert_eq!(
            RuntimeVersion::current().to_string(),
            env!("CARGO_PKG_VERSION")
        );
    }

    #[test]
    fn test_default_config() {
        let config = TunnelConfig::default();
        assert!(config.allow_test_menu);
        assert_eq!(config.charset, "utf8");
        assert_eq!(config.default_db_port, 3306);
        assert!(config.min_runtime_version <= RuntimeVersion::current());

        let config = config.with_test_menu(false).with_default_db_port(3307);
        assert!(!config.allow_test_menu);
        assert_eq!(config.default_db_port, 3307);
    }
}
