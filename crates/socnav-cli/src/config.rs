//! Configuration – reads/writes `~/.socnav/config.toml`.

use serde::{Deserialize, Serialize};
use socnav_runtime::SocialLayerConfig;
use socnav_types::{DEFAULT_SOURCE_FRAME, ObjectClass, SocnavError};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Persisted settings for the `socnav` binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Frame the costmap is expressed in.
    #[serde(default = "default_global_frame")]
    pub global_frame: String,

    /// Frame the perception feed reports people in.
    #[serde(default = "default_source_frame")]
    pub source_frame: String,

    /// Object class tag that denotes a person.
    #[serde(default = "default_person_class")]
    pub person_class: u8,

    /// Map-update cycles per second.
    #[serde(default = "default_update_hz")]
    pub update_hz: f64,

    /// Simulated feed deliveries per second.
    #[serde(default = "default_feed_hz")]
    pub feed_hz: f64,

    /// Number of walking people in the simulated feed.
    #[serde(default = "default_simulated_people")]
    pub simulated_people: usize,

    /// Static pose of the source frame inside the global frame.
    #[serde(default)]
    pub map_offset_x: f64,
    #[serde(default)]
    pub map_offset_y: f64,
    #[serde(default)]
    pub map_yaw_rad: f64,
}

fn default_global_frame() -> String {
    "odom".to_string()
}
fn default_source_frame() -> String {
    DEFAULT_SOURCE_FRAME.to_string()
}
fn default_person_class() -> u8 {
    ObjectClass::PERSON.0
}
fn default_update_hz() -> f64 {
    5.0
}
fn default_feed_hz() -> f64 {
    2.0
}
fn default_simulated_people() -> usize {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            global_frame: default_global_frame(),
            source_frame: default_source_frame(),
            person_class: default_person_class(),
            update_hz: default_update_hz(),
            feed_hz: default_feed_hz(),
            simulated_people: default_simulated_people(),
            map_offset_x: 0.0,
            map_offset_y: 0.0,
            map_yaw_rad: 0.0,
        }
    }
}

impl Config {
    /// Settings for the layer built from this configuration.
    pub fn layer_config(&self) -> SocialLayerConfig {
        SocialLayerConfig {
            enabled: true,
            person_class: self.person_class,
            source_frame: Some(self.source_frame.clone()),
        }
    }

    /// Interval between map-update cycles.
    pub fn update_period(&self) -> Result<Duration, SocnavError> {
        period_for("update_hz", self.update_hz)
    }

    /// Interval between simulated feed deliveries.
    pub fn feed_period(&self) -> Result<Duration, SocnavError> {
        period_for("feed_hz", self.feed_hz)
    }

    /// Reject rates whose period is zero or not representable, and empty
    /// frame names.
    pub fn validate(&self) -> Result<(), SocnavError> {
        self.update_period()?;
        self.feed_period()?;
        if self.global_frame.is_empty() || self.source_frame.is_empty() {
            return Err(SocnavError::Config("frame names must not be empty".to_string()));
        }
        Ok(())
    }
}

fn period_for(name: &str, hz: f64) -> Result<Duration, SocnavError> {
    if !(hz.is_finite() && hz > 0.0) {
        return Err(SocnavError::Config(format!("{name} must be > 0, got {hz}")));
    }
    let period = Duration::try_from_secs_f64(1.0 / hz)
        .map_err(|e| SocnavError::Config(format!("{name} = {hz} gives no usable period: {e}")))?;
    if period.is_zero() {
        return Err(SocnavError::Config(format!(
            "{name} = {hz} is too fast: period rounds to zero"
        )));
    }
    Ok(period)
}

/// Return the path to `~/.socnav/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".socnav").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, SocnavError> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, SocnavError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        SocnavError::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let mut cfg: Config = toml::from_str(&raw)
        .map_err(|e| SocnavError::Config(format!("failed to parse config: {e}")))?;
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(Some(cfg))
}

/// Defaults with the `SOCNAV_*` overrides applied, for a first run without
/// a config file.
pub fn defaults_with_env() -> Result<Config, SocnavError> {
    let mut cfg = Config::default();
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

/// Apply `SOCNAV_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `SOCNAV_GLOBAL_FRAME` | `global_frame` |
/// | `SOCNAV_UPDATE_HZ` | `update_hz` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("SOCNAV_GLOBAL_FRAME") {
        cfg.global_frame = v;
    }
    if let Ok(v) = std::env::var("SOCNAV_UPDATE_HZ")
        && let Ok(hz) = v.parse::<f64>()
    {
        cfg.update_hz = hz;
    }
}

/// Save the config, creating the parent directory if necessary.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), SocnavError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| SocnavError::Config(format!("failed to create config directory: {e}")))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| SocnavError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw)
        .map_err(|e| SocnavError::Config(format!("failed to write {}: {e}", path.display())))
}

/// Write the defaults to `~/.socnav/config.toml`.
pub fn save(cfg: &Config) -> Result<(), SocnavError> {
    save_to(cfg, &config_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn path_is_under_dot_socnav() {
        let p = config_path_for_home("/home/robot");
        assert_eq!(p, PathBuf::from("/home/robot/.socnav/config.toml"));
    }

    #[test]
    fn missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let loaded = load_from(&dir.path().join("config.toml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config {
            simulated_people: 7,
            map_offset_x: 1.5,
            ..Config::default()
        };
        save_to(&cfg, &path).unwrap();

        let loaded = load_from(&path).unwrap().unwrap();
        assert_eq!(loaded.simulated_people, 7);
        assert!((loaded.map_offset_x - 1.5).abs() < 1e-12);
        assert_eq!(loaded.source_frame, "map");
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "feed_hz = 10.0\n").unwrap();

        let loaded = load_from(&path).unwrap().unwrap();
        assert!((loaded.feed_hz - 10.0).abs() < 1e-12);
        assert_eq!(loaded.person_class, 4);
    }

    #[test]
    fn zero_rate_is_rejected() {
        let cfg = Config {
            update_hz: 0.0,
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(SocnavError::Config(_))));
    }

    #[test]
    fn rate_too_fast_for_a_nonzero_period_is_rejected() {
        let cfg = Config {
            update_hz: 1e10,
            ..Config::default()
        };
        assert!(matches!(cfg.update_period(), Err(SocnavError::Config(_))));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rate_too_slow_for_a_duration_is_rejected() {
        let cfg = Config {
            feed_hz: 1e-20,
            ..Config::default()
        };
        assert!(matches!(cfg.feed_period(), Err(SocnavError::Config(_))));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn default_periods_match_rates() {
        let cfg = Config::default();
        assert_eq!(cfg.update_period().unwrap(), Duration::from_millis(200));
        assert_eq!(cfg.feed_period().unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn apply_env_overrides_changes_global_frame() {
        // SAFETY: only this test touches SOCNAV_GLOBAL_FRAME.
        unsafe { std::env::set_var("SOCNAV_GLOBAL_FRAME", "base_link") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.global_frame, "base_link");

        // A first run without a file sees the same override.
        let first_run = defaults_with_env().unwrap();
        assert_eq!(first_run.global_frame, "base_link");
        unsafe { std::env::remove_var("SOCNAV_GLOBAL_FRAME") };
    }

    #[test]
    fn apply_env_overrides_update_hz() {
        // SAFETY: only this test touches SOCNAV_UPDATE_HZ; the valid and
        // invalid cases run sequentially here.
        unsafe { std::env::set_var("SOCNAV_UPDATE_HZ", "12.5") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert!((cfg.update_hz - 12.5).abs() < 1e-12);

        unsafe { std::env::set_var("SOCNAV_UPDATE_HZ", "fast") };
        let mut cfg = Config::default();
        let original_hz = cfg.update_hz;
        apply_env_overrides(&mut cfg);
        assert!((cfg.update_hz - original_hz).abs() < 1e-12);

        // An override that parses but yields no usable period fails the
        // first run instead of panicking later.
        unsafe { std::env::set_var("SOCNAV_UPDATE_HZ", "1e10") };
        assert!(defaults_with_env().is_err());
        unsafe { std::env::remove_var("SOCNAV_UPDATE_HZ") };
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "update_hz = \"fast\"\n").unwrap();
        assert!(load_from(&path).is_err());
    }

    #[test]
    fn layer_config_pins_source_frame() {
        let layer = Config::default().layer_config();
        assert!(layer.enabled);
        assert_eq!(layer.person_class, 4);
        assert_eq!(layer.source_frame.as_deref(), Some("map"));
    }
}
