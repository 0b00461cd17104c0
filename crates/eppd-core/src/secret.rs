//! Secret reference resolver.
//!
//! Credential values in `config.toml` can use special prefixes to reference
//! secrets stored outside the file:
//!
//! - `env::VAR_NAME`: reads `$VAR_NAME` from the environment
//! - `file::/path/to/secret`: reads the file and trims surrounding whitespace
//! - `pass::path/in/store`: runs `pass show path/in/store`, returns first line
//! - anything else: returned as-is (plain text)

use crate::error::{ConfigError, ConfigResult};

/// Resolves a value that may contain a secret reference prefix.
pub fn resolve(value: &str) -> ConfigResult<String> {
    if let Some(var) = value.strip_prefix("env::") {
        resolve_env(var)
    } else if let Some(path) = value.strip_prefix("file::") {
        resolve_file(path)
    } else if let Some(path) = value.strip_prefix("pass::") {
        resolve_pass(path)
    } else {
        Ok(value.to_string())
    }
}

fn resolve_env(var: &str) -> ConfigResult<String> {
    std::env::var(var)
        .map_err(|_| ConfigError::Secret(format!("environment variable `{}` is not set", var)))
}

fn resolve_file(path: &str) -> ConfigResult<String> {
    std::fs::read_to_string(path)
        .map(|content| content.trim().to_string())
        .map_err(|e| ConfigError::Secret(format!("failed to read secret file {}: {}", path, e)))
}

/// Runs `pass show <path>` and returns the first line of stdout.
fn resolve_pass(path: &str) -> ConfigResult<String> {
    let output = std::process::Command::new("pass")
        .arg("show")
        .arg(path)
        .output()
        .map_err(|e| ConfigError::Secret(format!("failed to run `pass show {}`: {}", path, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ConfigError::Secret(format!(
            "`pass show {}` failed (exit {}): {}",
            path,
            output.status,
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .next()
        .map(|s| s.to_string())
        .ok_or_else(|| ConfigError::Secret(format!("`pass show {}` produced no output", path)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passthrough() {
        assert_eq!(resolve("registrar-1").unwrap(), "registrar-1");
        assert_eq!(resolve("").unwrap(), "");
    }

    #[test]
    fn env_prefix_resolves() {
        unsafe {
            std::env::set_var("_EPPD_TEST_SECRET", "s3cret");
        }
        assert_eq!(resolve("env::_EPPD_TEST_SECRET").unwrap(), "s3cret");
        unsafe {
            std::env::remove_var("_EPPD_TEST_SECRET");
        }
    }

    #[test]
    fn env_prefix_missing_var_errors() {
        let err = resolve("env::_EPPD_NONEXISTENT_VAR_12345").unwrap_err();
        assert!(err.to_string().contains("not set"));
    }

    #[test]
    fn file_prefix_trims_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("password");
        std::fs::write(&path, "hunter2\n").unwrap();

        let reference = format!("file::{}", path.display());
        assert_eq!(resolve(&reference).unwrap(), "hunter2");
    }

    #[test]
    fn file_prefix_missing_file_errors() {
        assert!(resolve("file::/nonexistent/eppd/secret").is_err());
    }
}
