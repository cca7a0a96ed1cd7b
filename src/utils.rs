//! Utility functions and helpers

use crate::error::{RelayError, Result};
use std::path::PathBuf;

/// File system utilities
pub struct FileUtils;

impl FileUtils {
    /// Expand tilde (~) in file paths
    pub fn expand_path(path: &str) -> Result<PathBuf> {
        if let Some(rest) = path.strip_prefix("~/") {
            match dirs::home_dir() {
                Some(home_dir) => Ok(home_dir.join(rest)),
                None => Err(RelayError::Config(
                    "Cannot determine home directory".to_string(),
                )),
            }
        } else {
            Ok(PathBuf::from(path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FileUtils;

    #[test]
    fn expand_path_keeps_absolute_paths() {
        let path = FileUtils::expand_path("/tmp/profile").expect("expand");
        assert_eq!(path.to_string_lossy(), "/tmp/profile");
    }

    #[test]
    fn expand_path_resolves_tilde() {
        if let Some(home) = dirs::home_dir() {
            let path = FileUtils::expand_path("~/profile").expect("expand");
            assert_eq!(path, home.join("profile"));
        }
    }
}
