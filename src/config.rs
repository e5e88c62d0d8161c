//! Configuration management with environment variable support.
//!
//! Every knob the driver reads has a default and an environment override.
//! The values are resolved once and cached for the life of the process.
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SNAPDRIVER_TESTS_DIR` | Root directory for snapshot artifacts | `./tests/snapshots` |
//! | `SNAPDRIVER_FIXTURES_DIR` | Directory holding upload fixtures | `./tests/fixtures` |
//! | `SNAPDRIVER_TIMEOUT_MS` | Response-cycle wait for input application (ms) | `3000` |
//! | `SNAPDRIVER_LOAD_TIMEOUT_MS` | Wait for the application to report ready (ms) | `10000` |
//! | `SNAPDRIVER_SCREENSHOT` | Default screenshot policy for `snapshot_init` | `true` |
//! | `SNAPDRIVER_SEED` | Random seed passed to launched applications | unset |
//! | `SNAPDRIVER_TEST_MODE` | Set by the driver in launched applications | unset |
//!
//! # Example
//!
//! ```bash
//! # Give a slow application more time to settle after each input
//! export SNAPDRIVER_TIMEOUT_MS=10000
//!
//! # Keep artifacts next to the scripts
//! export SNAPDRIVER_TESTS_DIR="./scripts/snapshots"
//! ```

use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

// ============================================================================
// Default Values
// ============================================================================

/// Default root directory for snapshot artifacts
pub const DEFAULT_TESTS_DIR: &str = "./tests/snapshots";

/// Default directory for upload fixtures
pub const DEFAULT_FIXTURES_DIR: &str = "./tests/fixtures";

/// Default response-cycle wait (milliseconds)
pub const DEFAULT_INPUT_TIMEOUT_MS: u64 = 3000;

/// Default application load wait (milliseconds)
pub const DEFAULT_LOAD_TIMEOUT_MS: u64 = 10_000;

/// Default screenshot policy
pub const DEFAULT_SCREENSHOT: bool = true;

// ============================================================================
// Environment Variable Names
// ============================================================================

pub const ENV_TESTS_DIR: &str = "SNAPDRIVER_TESTS_DIR";
pub const ENV_FIXTURES_DIR: &str = "SNAPDRIVER_FIXTURES_DIR";
pub const ENV_INPUT_TIMEOUT: &str = "SNAPDRIVER_TIMEOUT_MS";
pub const ENV_LOAD_TIMEOUT: &str = "SNAPDRIVER_LOAD_TIMEOUT_MS";
pub const ENV_SCREENSHOT: &str = "SNAPDRIVER_SCREENSHOT";
pub const ENV_SEED: &str = "SNAPDRIVER_SEED";

/// Flag exported to launched applications so they can swap live data for fixtures
pub const ENV_TEST_MODE: &str = "SNAPDRIVER_TEST_MODE";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration for the driver
#[derive(Debug, Clone)]
pub struct Config {
    pub paths: PathSettings,
    pub timing: TimingSettings,
    pub defaults: DefaultSettings,
}

/// Filesystem locations
#[derive(Debug, Clone)]
pub struct PathSettings {
    /// Root under which `<test>-current` / `<test>-expected` live
    pub tests_dir: PathBuf,
    /// Where bare upload file names are resolved
    pub fixtures_dir: PathBuf,
}

/// Wait bounds
#[derive(Debug, Clone)]
pub struct TimingSettings {
    /// Response-cycle wait for input application (milliseconds)
    pub input_timeout_ms: u64,
    /// Startup wait for the application (milliseconds)
    pub load_timeout_ms: u64,
}

/// Defaults for driver initialization
#[derive(Debug, Clone)]
pub struct DefaultSettings {
    pub screenshot: bool,
    pub seed: Option<u64>,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            paths: PathSettings::from_env(),
            timing: TimingSettings::from_env(),
            defaults: DefaultSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            paths: PathSettings::defaults(),
            timing: TimingSettings::defaults(),
            defaults: DefaultSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl PathSettings {
    pub fn from_env() -> Self {
        Self {
            tests_dir: env::var(ENV_TESTS_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_TESTS_DIR)),
            fixtures_dir: env::var(ENV_FIXTURES_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_FIXTURES_DIR)),
        }
    }

    pub fn defaults() -> Self {
        Self {
            tests_dir: PathBuf::from(DEFAULT_TESTS_DIR),
            fixtures_dir: PathBuf::from(DEFAULT_FIXTURES_DIR),
        }
    }
}

impl TimingSettings {
    pub fn from_env() -> Self {
        Self {
            input_timeout_ms: env::var(ENV_INPUT_TIMEOUT)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_INPUT_TIMEOUT_MS),
            load_timeout_ms: env::var(ENV_LOAD_TIMEOUT)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_LOAD_TIMEOUT_MS),
        }
    }

    pub fn defaults() -> Self {
        Self {
            input_timeout_ms: DEFAULT_INPUT_TIMEOUT_MS,
            load_timeout_ms: DEFAULT_LOAD_TIMEOUT_MS,
        }
    }

    pub fn input_timeout(&self) -> Duration {
        Duration::from_millis(self.input_timeout_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }
}

impl DefaultSettings {
    pub fn from_env() -> Self {
        Self {
            screenshot: env::var(ENV_SCREENSHOT)
                .ok()
                .and_then(|s| parse_flag(&s))
                .unwrap_or(DEFAULT_SCREENSHOT),
            seed: env::var(ENV_SEED).ok().and_then(|s| s.trim().parse().ok()),
        }
    }

    pub fn defaults() -> Self {
        Self {
            screenshot: DEFAULT_SCREENSHOT,
            seed: None,
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Parse a boolean-ish environment value ("1", "true", "yes", "on" and their negations)
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Whether this process was launched by the driver.
///
/// Applications branch on this to load static fixture data instead of live
/// sources. Read directly from the environment, not cached, since the
/// driver sets it on the child only.
pub fn is_test_mode() -> bool {
    env::var(ENV_TEST_MODE)
        .ok()
        .and_then(|s| parse_flag(&s))
        .unwrap_or(false)
}

/// Seed handed to this process by the driver, if any
pub fn launch_seed() -> Option<u64> {
    env::var(ENV_SEED).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag(""), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::defaults();
        assert_eq!(config.paths.tests_dir, PathBuf::from(DEFAULT_TESTS_DIR));
        assert_eq!(config.timing.input_timeout(), Duration::from_millis(3000));
        assert_eq!(config.timing.load_timeout(), Duration::from_secs(10));
        assert!(config.defaults.screenshot);
        assert_eq!(config.defaults.seed, None);
    }
}
