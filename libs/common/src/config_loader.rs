//! Configuration value resolution
//!
//! Values given explicitly (CLI flag or config file) win over the
//! environment, which wins over the built-in default.

use tracing::debug;

/// Get a string setting with priority: explicit > ENV > default
///
/// Empty strings count as unset at every level but the default.
///
/// # Arguments
/// * `explicit` - Value from the command line or config file
/// * `env_var` - Environment variable name to check
/// * `default` - Default value to use as fallback
pub fn get_string_config(explicit: Option<&str>, env_var: &str, default: &str) -> String {
    if let Some(val) = explicit.filter(|v| !v.is_empty()) {
        debug!("Using {} from configuration", env_var);
        return val.to_string();
    }

    if let Ok(env_val) = std::env::var(env_var) {
        if !env_val.is_empty() {
            debug!("Using {} from environment", env_var);
            return env_val;
        }
    }

    debug!("Using default value for {}", env_var);
    default.to_string()
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_explicit_wins_over_env() {
        std::env::set_var("EW1_TEST_EXPLICIT_HOST", "10.0.0.5");
        assert_eq!(
            get_string_config(Some("192.168.1.100"), "EW1_TEST_EXPLICIT_HOST", "none"),
            "192.168.1.100"
        );
        std::env::remove_var("EW1_TEST_EXPLICIT_HOST");
    }

    #[test]
    fn test_string_config_skips_empty() {
        std::env::remove_var("EW1_TEST_TOKEN");
        assert_eq!(get_string_config(Some(""), "EW1_TEST_TOKEN", "none"), "none");
        assert_eq!(get_string_config(Some("abc"), "EW1_TEST_TOKEN", "none"), "abc");

        std::env::set_var("EW1_TEST_TOKEN", "from-env");
        assert_eq!(get_string_config(None, "EW1_TEST_TOKEN", "none"), "from-env");
        std::env::remove_var("EW1_TEST_TOKEN");
    }
}
