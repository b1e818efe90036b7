//! Session and run configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_MIN_ITEMS: usize = 8;
pub const DEFAULT_MAX_ITEMS: usize = 15;
pub const DEFAULT_MIN_SEM: f64 = 0.30;
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartRule {
    /// Uniform draw over the whole bank.
    #[default]
    Random,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionCriterion {
    #[default]
    MaxInformation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimationMethod {
    /// Posterior mean over a fixed quadrature grid.
    #[default]
    #[serde(rename = "EAP", alias = "eap")]
    Eap,
    /// Posterior mode via Newton iterations, falling back to EAP.
    #[serde(rename = "MAP", alias = "map")]
    Map,
}

/// Randomesque exposure control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureControl {
    pub enabled: bool,
    pub top_k: usize,
}

impl Default for ExposureControl {
    fn default() -> Self {
        Self {
            enabled: true,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl ExposureControl {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            top_k: 1,
        }
    }

    /// Number of top-ranked items the selector draws from.
    pub fn fan_out(&self) -> usize {
        if self.enabled {
            self.top_k.max(1)
        } else {
            1
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatConfig {
    pub start_rule: StartRule,
    pub selection_criterion: SelectionCriterion,
    pub estimation_method: EstimationMethod,
    pub min_items: usize,
    pub max_items: usize,
    pub min_sem: f64,
    pub exposure_control: ExposureControl,
}

impl Default for CatConfig {
    fn default() -> Self {
        Self {
            start_rule: StartRule::Random,
            selection_criterion: SelectionCriterion::MaxInformation,
            estimation_method: EstimationMethod::Eap,
            min_items: DEFAULT_MIN_ITEMS,
            max_items: DEFAULT_MAX_ITEMS,
            min_sem: DEFAULT_MIN_SEM,
            exposure_control: ExposureControl::default(),
        }
    }
}

impl CatConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_items < 1 {
            return Err(ConfigError::MinItems);
        }
        if self.min_items > self.max_items {
            return Err(ConfigError::ItemLimits {
                min_items: self.min_items,
                max_items: self.max_items,
            });
        }
        if !self.min_sem.is_finite() || self.min_sem <= 0.0 {
            return Err(ConfigError::MinSem {
                value: self.min_sem,
            });
        }
        if self.exposure_control.top_k < 1 {
            return Err(ConfigError::TopK);
        }
        Ok(())
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            what: "configuration",
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CatConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.exposure_control.fan_out(), 3);
    }

    #[test]
    fn rejects_inverted_item_limits() {
        let config = CatConfig {
            min_items: 10,
            max_items: 5,
            ..CatConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ItemLimits {
                min_items: 10,
                max_items: 5
            })
        );
    }

    #[test]
    fn rejects_bad_scalars() {
        let zero_min = CatConfig {
            min_items: 0,
            ..CatConfig::default()
        };
        assert_eq!(zero_min.validate(), Err(ConfigError::MinItems));

        let sem = CatConfig {
            min_sem: 0.0,
            ..CatConfig::default()
        };
        assert!(matches!(sem.validate(), Err(ConfigError::MinSem { .. })));

        let top_k = CatConfig {
            exposure_control: ExposureControl {
                enabled: true,
                top_k: 0,
            },
            ..CatConfig::default()
        };
        assert_eq!(top_k.validate(), Err(ConfigError::TopK));
    }

    const FULL: &str = r#"
        start_rule = "random"
        selection_criterion = "max_information"
        estimation_method = "MAP"
        min_items = 5
        max_items = 12
        min_sem = 0.25

        [exposure_control]
        enabled = false
        top_k = 1
    "#;

    #[test]
    fn parses_toml_with_every_field() {
        let config = CatConfig::from_toml_str(FULL).unwrap();
        assert_eq!(config.estimation_method, EstimationMethod::Map);
        assert_eq!(config.start_rule, StartRule::Random);
        assert_eq!(config.selection_criterion, SelectionCriterion::MaxInformation);
        assert_eq!(config.max_items, 12);
        assert!(!config.exposure_control.enabled);
        assert_eq!(config.exposure_control.fan_out(), 1);
    }

    #[test]
    fn missing_fields_are_parse_errors() {
        assert!(matches!(
            CatConfig::from_toml_str(""),
            Err(ConfigError::Parse { .. })
        ));

        let partial = FULL.replace("min_sem = 0.25", "");
        assert!(matches!(
            CatConfig::from_toml_str(&partial),
            Err(ConfigError::Parse { .. })
        ));

        let no_top_k = FULL.replace("top_k = 1", "");
        assert!(matches!(
            CatConfig::from_toml_str(&no_top_k),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn toml_validation_errors_surface() {
        let inverted = FULL.replace("min_items = 5", "min_items = 20");
        let err = CatConfig::from_toml_str(&inverted).unwrap_err();
        assert!(matches!(err, ConfigError::ItemLimits { .. }));

        let unknown = FULL.replace("\"MAP\"", "\"MLE\"");
        let err = CatConfig::from_toml_str(&unknown).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
