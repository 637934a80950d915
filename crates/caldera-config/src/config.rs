//! Configuration structs with sensible defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// LOD hysteresis settings.
    pub hysteresis: HysteresisConfig,
    /// Navmesh spatial query settings.
    pub query: QueryConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// LOD hysteresis configuration.
///
/// A threshold of 0.0 disables hysteresis for that element class: the clip
/// test falls back to hard near/far plane comparisons.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HysteresisConfig {
    /// Hysteresis band width in world units for world geometry.
    pub world_geometry_threshold: f32,
    /// Hysteresis band width in world units for entities.
    pub entity_threshold: f32,
}

/// Navmesh spatial query configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueryConfig {
    /// Default search radius for closest-point queries, in world units.
    pub default_query_radius: f32,
    /// Maximum distance between a query origin and the previous frame's hit
    /// for the coherent fast path to apply.
    pub coherency_tolerance: f32,
    /// Tolerance for deciding whether a point still lies on a face.
    pub on_face_tolerance: f32,
    /// Cell size of the uniform-grid mediator backend, in world units.
    pub grid_cell_size: f32,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for HysteresisConfig {
    fn default() -> Self {
        Self {
            world_geometry_threshold: 0.0,
            entity_threshold: 0.0,
        }
    }
}

impl HysteresisConfig {
    /// Thresholds as a flat array in element-class order: world geometry
    /// first, then entities. Matches the layout the hysteresis store's
    /// threshold table ingests.
    pub fn threshold_values(&self) -> [f32; 2] {
        [self.world_geometry_threshold, self.entity_threshold]
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_query_radius: 5.0,
            coherency_tolerance: 0.1,
            on_face_tolerance: 1e-3,
            grid_cell_size: 8.0,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

// --- Persistence ---

impl Config {
    /// Conventional file name for the settings file.
    pub const FILE_NAME: &'static str = "caldera.ron";

    /// Read settings from `path`. A missing file is not an error: the
    /// defaults are written there and returned, so a fresh install starts
    /// with an editable file on disk.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let settings = Self::default();
            settings.save(path)?;
            log::info!("wrote default settings to {}", path.display());
            return Ok(settings);
        }
        let settings = Self::read_from(path)?;
        log::info!("loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Write the settings to `path` as pretty-printed RON, creating parent
    /// directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let pretty = ron::ser::PrettyConfig::new().depth_limit(3);
        let rendered = ron::ser::to_string_pretty(self, pretty)?;
        std::fs::write(path, rendered).map_err(write_err)
    }

    /// Re-read `path` and return the new settings when they differ from
    /// `self`, for hot-reloading thresholds and tolerances at runtime.
    pub fn reload(&self, path: &Path) -> Result<Option<Self>, ConfigError> {
        let fresh = Self::read_from(path)?;
        if &fresh == self {
            return Ok(None);
        }
        log::info!("settings at {} changed, reloading", path.display());
        Ok(Some(fresh))
    }

    fn read_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        ron::from_str(&contents).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(!ron_str.is_empty());
        assert!(ron_str.contains("coherency_tolerance: 0.1"));
        assert!(ron_str.contains("grid_cell_size: 8.0"));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_section_uses_default() {
        // Config with only the hysteresis section present.
        let ron_str = "(hysteresis: (entity_threshold: 5.0))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.hysteresis.entity_threshold, 5.0);
        assert_eq!(config.query, QueryConfig::default());
        assert_eq!(config.debug, DebugConfig::default());
    }

    #[test]
    fn test_thresholds_default_to_disabled() {
        let config = Config::default();
        assert_eq!(config.hysteresis.world_geometry_threshold, 0.0);
        assert_eq!(config.hysteresis.entity_threshold, 0.0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(Config::FILE_NAME);
        let mut config = Config::default();
        config.hysteresis.world_geometry_threshold = 50.0;
        config.query.coherency_tolerance = 0.25;

        config.save(&path).unwrap();
        let loaded = Config::load_or_create(&path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_defaults_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        // Parent directories are created too.
        let path = dir.path().join("settings").join(Config::FILE_NAME);

        let loaded = Config::load_or_create(&path).unwrap();
        assert_eq!(loaded, Config::default());
        assert!(path.exists(), "defaults must be persisted");
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(Config::FILE_NAME);
        let config = Config::default();
        config.save(&path).unwrap();

        let mut modified = config.clone();
        modified.query.default_query_radius = 20.0;
        modified.save(&path).unwrap();

        let result = config.reload(&path).unwrap();
        assert!(result.is_some());
        assert_eq!(result.unwrap().query.default_query_radius, 20.0);
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(Config::FILE_NAME);
        let config = Config::default();
        config.save(&path).unwrap();

        let result = config.reload(&path).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(Config::FILE_NAME);
        std::fs::write(&path, "{{not valid}}").unwrap();

        let err = Config::load_or_create(&path).unwrap_err();
        match err {
            ConfigError::Malformed { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn test_reload_missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(Config::FILE_NAME);
        let err = Config::default().reload(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_threshold_values_are_class_ordered() {
        let config = HysteresisConfig {
            world_geometry_threshold: 3.0,
            entity_threshold: 7.0,
        };
        assert_eq!(config.threshold_values(), [3.0, 7.0]);
    }
}
