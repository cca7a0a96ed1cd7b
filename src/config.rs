//! Configuration management for cookierelay
//!
//! All runtime settings live in explicit structs built once by the CLI layer
//! and passed down; no component reads the process environment directly.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default backend URL inside a container network.
pub const DEFAULT_BACKEND_URL: &str = "http://host.docker.internal:3000";
/// Default gateway substituted when the backend hostname does not resolve.
pub const DEFAULT_GATEWAY: &str = "172.17.0.1";

/// Cookie store variants supported by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreVariant {
    Chromium,
    Gecko,
}

impl StoreVariant {
    /// File name of the cookie database inside a profile directory
    pub fn database_file_name(&self) -> &'static str {
        match self {
            StoreVariant::Chromium => "Cookies",
            StoreVariant::Gecko => "cookies.sqlite",
        }
    }
}

impl FromStr for StoreVariant {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chromium" | "chrome" => Ok(StoreVariant::Chromium),
            "gecko" | "firefox" => Ok(StoreVariant::Gecko),
            _ => Err(()),
        }
    }
}

/// Well-known cookie database locations for both store variants.
///
/// Integration tests point these at fixture directories instead of the real
/// profile tree.
#[derive(Debug, Clone)]
pub struct StorePaths {
    /// Fixed Chromium cookie database path
    pub chromium_db: PathBuf,
    /// Fixed Gecko profile directory
    pub gecko_fixed_profile: PathBuf,
    /// Root directory scanned for Gecko `*.default*` profiles
    pub gecko_profiles_root: PathBuf,
}

impl Default for StorePaths {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"));
        let config = dirs::config_dir().unwrap_or_else(|| home.join(".config"));
        let firefox_root = home.join(".mozilla/firefox");
        StorePaths {
            chromium_db: config.join("google-chrome/Default/Cookies"),
            gecko_fixed_profile: firefox_root.join("session.default"),
            gecko_profiles_root: firefox_root,
        }
    }
}

/// Where an injection payload comes from
#[derive(Debug, Clone)]
pub enum CookieSource {
    /// JSON file containing an array of cookie objects
    File(PathBuf),
    /// Base64-encoded JSON array passed inline
    InlineBase64(String),
}

/// Configuration for the extraction pipeline
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub target_domain: String,
    pub session_id: String,
    pub api_url: String,
    pub secret: String,
    pub encryption_key: String,
    pub variant: StoreVariant,
    pub profile: Option<PathBuf>,
    pub paths: StorePaths,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub gateway: String,
}

/// Configuration for the injection pipeline
#[derive(Debug, Clone)]
pub struct InjectConfig {
    pub source: CookieSource,
    pub variant: StoreVariant,
    pub profile: Option<PathBuf>,
    pub paths: StorePaths,
}

#[cfg(test)]
mod tests {
    use super::StoreVariant;

    #[test]
    fn variant_parses_common_names() {
        assert_eq!("chromium".parse(), Ok(StoreVariant::Chromium));
        assert_eq!("Chrome".parse(), Ok(StoreVariant::Chromium));
        assert_eq!("gecko".parse(), Ok(StoreVariant::Gecko));
        assert_eq!("Firefox".parse(), Ok(StoreVariant::Gecko));
        assert!("safari".parse::<StoreVariant>().is_err());
    }

    #[test]
    fn variant_database_file_names() {
        assert_eq!(StoreVariant::Chromium.database_file_name(), "Cookies");
        assert_eq!(StoreVariant::Gecko.database_file_name(), "cookies.sqlite");
    }
}
