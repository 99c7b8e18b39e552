//! Configuration for the cooperative scheduler.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default timeout applied to application tasks (milliseconds).
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Default interval between garbage collection sweeps (milliseconds).
pub const DEFAULT_GC_INTERVAL_MS: u64 = 10_000;

/// Default number of application tasks the table can hold.
pub const DEFAULT_MAX_TASKS: usize = 64;

/// Default sleep after an idle pass of the host loop (milliseconds).
pub const DEFAULT_IDLE_SLEEP_MS: u64 = 1;

/// Default timeout applied to application tasks.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(DEFAULT_TIMEOUT_MS);

/// Default interval between garbage collection sweeps.
pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_millis(DEFAULT_GC_INTERVAL_MS);

/// Default sleep after an idle pass of the host loop.
pub const DEFAULT_IDLE_SLEEP: Duration = Duration::from_millis(DEFAULT_IDLE_SLEEP_MS);

/// Scheduler tuning knobs.
///
/// Durations are stored as integer milliseconds so the TOML form stays
/// readable; use the accessor methods to get [`Duration`] values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Timeout for tasks registered without an explicit one.
    ///
    /// `0` disables overrun detection for those tasks.
    pub default_timeout_ms: u64,
    /// Interval of the built-in garbage collection task.
    pub gc_interval_ms: u64,
    /// Maximum number of application tasks resident in the table.
    ///
    /// The main task and the garbage collector are reserved on top of this.
    pub max_tasks: usize,
    /// Sleep applied by [`run_until`](crate::CooperativeScheduler::run_until)
    /// after a pass in which no task was due.
    pub idle_sleep_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            gc_interval_ms: DEFAULT_GC_INTERVAL_MS,
            max_tasks: DEFAULT_MAX_TASKS,
            idle_sleep_ms: DEFAULT_IDLE_SLEEP_MS,
        }
    }
}

impl SchedulerConfig {
    /// Timeout for tasks registered without an explicit one.
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Interval between garbage collection sweeps.
    #[must_use]
    pub fn gc_interval(&self) -> Duration {
        Duration::from_millis(self.gc_interval_ms)
    }

    /// Sleep after an idle host-loop pass.
    #[must_use]
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    /// Builder-style override of the garbage collection interval.
    #[must_use]
    pub fn with_gc_interval(mut self, interval: Duration) -> Self {
        self.gc_interval_ms = duration_to_millis(interval);
        self
    }

    /// Builder-style override of the default task timeout.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_ms = duration_to_millis(timeout);
        self
    }

    /// Builder-style override of the application task capacity.
    #[must_use]
    pub fn with_max_tasks(mut self, max_tasks: usize) -> Self {
        self.max_tasks = max_tasks;
        self
    }

    /// Check the configuration for values the scheduler cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Config`](crate::SchedulerError::Config) when
    /// the task capacity or the garbage collection interval is zero. A
    /// capacity beyond the 16-bit id space is accepted; registration then
    /// fails with [`SchedulerError::IdsExhausted`](crate::SchedulerError::IdsExhausted)
    /// once every id is resident.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.max_tasks == 0 {
            return Err(crate::error::SchedulerError::Config(
                "max_tasks must be at least 1".to_owned(),
            ));
        }
        if self.gc_interval_ms == 0 {
            return Err(crate::error::SchedulerError::Config(
                "gc_interval_ms must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }

    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| crate::error::SchedulerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::SchedulerError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/coopsched/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("coopsched").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("coopsched")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/coopsched-config/config.toml")
        }
    }
}

/// Whole milliseconds of `duration`, saturating at `u64::MAX`.
pub(crate) fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SchedulerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_timeout(), DEFAULT_TIMEOUT);
        assert_eq!(config.gc_interval(), DEFAULT_GC_INTERVAL);
        assert_eq!(config.idle_sleep(), DEFAULT_IDLE_SLEEP);
        assert_eq!(config.max_tasks, DEFAULT_MAX_TASKS);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let config = SchedulerConfig::default().with_max_tasks(0);
        assert!(matches!(
            config.validate(),
            Err(crate::error::SchedulerError::Config(_))
        ));
    }

    #[test]
    fn capacity_beyond_id_space_is_accepted() {
        let config = SchedulerConfig::default().with_max_tasks(usize::MAX);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_gc_interval_is_rejected() {
        let config = SchedulerConfig::default().with_gc_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn builders_store_millis() {
        let config = SchedulerConfig::default()
            .with_gc_interval(Duration::from_millis(250))
            .with_default_timeout(Duration::from_secs(2));
        assert_eq!(config.gc_interval_ms, 250);
        assert_eq!(config.default_timeout_ms, 2000);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");

        let config = SchedulerConfig {
            default_timeout_ms: 250,
            gc_interval_ms: 500,
            max_tasks: 8,
            idle_sleep_ms: 0,
        };
        config.save_to_file(&path).expect("save");
        assert!(path.exists());

        let loaded = SchedulerConfig::from_file(&path).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_tasks = 4\n").expect("write");

        let loaded = SchedulerConfig::from_file(&path).expect("load");
        assert_eq!(loaded.max_tasks, 4);
        assert_eq!(loaded.gc_interval_ms, DEFAULT_GC_INTERVAL_MS);
        assert_eq!(loaded.default_timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result =
            SchedulerConfig::from_file(std::path::Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(crate::error::SchedulerError::Io(_))));
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_tasks = [not valid").expect("write");

        let result = SchedulerConfig::from_file(&path);
        assert!(matches!(
            result,
            Err(crate::error::SchedulerError::Config(_))
        ));
    }

    #[test]
    fn from_file_rejects_invalid_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "gc_interval_ms = 0\n").expect("write");

        assert!(SchedulerConfig::from_file(&path).is_err());
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        let path = SchedulerConfig::default_config_path();
        assert!(path.ends_with("coopsched/config.toml"));
    }
}
