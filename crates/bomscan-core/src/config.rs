use crate::error::BomscanError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Geometry and threshold settings for one extraction run.
///
/// The defaults were tuned against one family of drawing exports. Documents
/// rendered at a different scale usually need `y_tolerance` and the two radii
/// adjusted together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Max vertical distance between tokens on the same printed line.
    pub y_tolerance: f32,
    /// Max horizontal tag-to-quantity distance for the proximity pass.
    pub proximity_radius: f32,
    /// Radius used on lines recognised as the three-column layout.
    pub three_column_radius: f32,
    /// Items below this confidence never reach consolidation.
    pub min_confidence: f32,
    /// Reference match ratio under which the guided fallback runs.
    pub match_ratio_threshold: f32,
    /// Upper bound on missing reference tags for the raw-text recovery.
    pub max_recovery_tags: usize,
    /// Parsed quantities above this are treated as transcription errors.
    pub max_quantity: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        ExtractionConfig {
            y_tolerance: 10.0,
            proximity_radius: 150.0,
            three_column_radius: 350.0,
            min_confidence: 0.5,
            match_ratio_threshold: 0.5,
            max_recovery_tags: 20,
            max_quantity: 1000,
        }
    }
}

/// Load a configuration from a JSON file.
pub fn load_config(path: &Path) -> Result<ExtractionConfig, BomscanError> {
    let content = std::fs::read_to_string(path).map_err(|e| BomscanError::ConfigLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let config: ExtractionConfig =
        serde_json::from_str(&content).map_err(|e| BomscanError::ConfigLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    validate_config(&config)?;
    Ok(config)
}

/// Parse a configuration from a JSON string (no file path context).
pub fn parse_config_str(json: &str) -> Result<ExtractionConfig, BomscanError> {
    let config: ExtractionConfig = serde_json::from_str(json)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &ExtractionConfig) -> Result<(), BomscanError> {
    if config.y_tolerance.is_nan() || config.y_tolerance <= 0.0 {
        return Err(BomscanError::ConfigInvalid(format!(
            "y_tolerance must be positive, got {}",
            config.y_tolerance
        )));
    }

    if config.proximity_radius.is_nan() || config.proximity_radius <= 0.0 {
        return Err(BomscanError::ConfigInvalid(format!(
            "proximity_radius must be positive, got {}",
            config.proximity_radius
        )));
    }

    if config.three_column_radius.is_nan() || config.three_column_radius <= 0.0 {
        return Err(BomscanError::ConfigInvalid(format!(
            "three_column_radius must be positive, got {}",
            config.three_column_radius
        )));
    }

    if config.three_column_radius < config.proximity_radius {
        return Err(BomscanError::ConfigInvalid(format!(
            "three_column_radius ({}) must not be smaller than proximity_radius ({})",
            config.three_column_radius, config.proximity_radius
        )));
    }

    if !(0.0..=1.0).contains(&config.min_confidence) {
        return Err(BomscanError::ConfigInvalid(format!(
            "min_confidence must be within [0, 1], got {}",
            config.min_confidence
        )));
    }

    if !(0.0..=1.0).contains(&config.match_ratio_threshold) {
        return Err(BomscanError::ConfigInvalid(format!(
            "match_ratio_threshold must be within [0, 1], got {}",
            config.match_ratio_threshold
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = parse_config_str(r#"{ "y_tolerance": 6.5 }"#).unwrap();
        assert_eq!(config.y_tolerance, 6.5);
        assert_eq!(config.proximity_radius, 150.0);
        assert_eq!(config.max_recovery_tags, 20);
    }

    #[test]
    fn test_empty_object_is_default() {
        let config = parse_config_str("{}").unwrap();
        assert_eq!(config, ExtractionConfig::default());
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        assert!(parse_config_str(r#"{ "y_tolerance": -1 }"#).is_err());
    }

    #[test]
    fn test_radius_ordering_rejected() {
        let json = r#"{ "proximity_radius": 400, "three_column_radius": 350 }"#;
        assert!(parse_config_str(json).is_err());
    }

    #[test]
    fn test_nan_geometry_rejected() {
        for config in [
            ExtractionConfig {
                three_column_radius: f32::NAN,
                ..ExtractionConfig::default()
            },
            ExtractionConfig {
                proximity_radius: f32::NAN,
                ..ExtractionConfig::default()
            },
            ExtractionConfig {
                y_tolerance: f32::NAN,
                ..ExtractionConfig::default()
            },
        ] {
            assert!(matches!(
                validate_config(&config),
                Err(BomscanError::ConfigInvalid(_))
            ));
        }
    }

    #[test]
    fn test_ratio_out_of_range_rejected() {
        assert!(parse_config_str(r#"{ "match_ratio_threshold": 1.5 }"#).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "three_column_radius": 500 }}"#).unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.three_column_radius, 500.0);
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/nonexistent/bomscan.json")).unwrap_err();
        assert!(matches!(err, BomscanError::ConfigLoad { .. }));
    }
}
