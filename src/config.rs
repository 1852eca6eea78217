use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::{DoseError, CalcResult};
use crate::form::FormLimits;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub form: FormConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    pub min_weight_kg: f64,
    pub max_weight_kg: f64,
    pub default_weight_kg: f64,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            min_weight_kg: 30.0,
            max_weight_kg: 250.0,
            default_weight_kg: 70.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub decimals: usize, // Decimal places for the two session doses
    pub show_note: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            decimals: 1,
            show_note: true,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> CalcResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> CalcResult<Self> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CalcResult<()> {
        let form = &self.form;

        if !form.min_weight_kg.is_finite() || !form.max_weight_kg.is_finite() {
            return Err(DoseError::Config(
                "Weight limits must be finite numbers".to_string()
            ));
        }

        if form.min_weight_kg <= 0.0 {
            return Err(DoseError::Config(
                "Minimum weight must be positive".to_string()
            ));
        }

        if form.min_weight_kg >= form.max_weight_kg {
            return Err(DoseError::Config(format!(
                "Minimum weight ({} kg) must be below maximum weight ({} kg)",
                form.min_weight_kg, form.max_weight_kg
            )));
        }

        if form.default_weight_kg < form.min_weight_kg || form.default_weight_kg > form.max_weight_kg {
            return Err(DoseError::Config(format!(
                "Default weight {} kg lies outside {}-{} kg",
                form.default_weight_kg, form.min_weight_kg, form.max_weight_kg
            )));
        }

        if self.display.decimals > 6 {
            return Err(DoseError::Config(
                "At most 6 decimal places can be displayed".to_string()
            ));
        }

        Ok(())
    }

    pub fn limits(&self) -> FormLimits {
        FormLimits {
            min_weight_kg: self.form.min_weight_kg,
            max_weight_kg: self.form.max_weight_kg,
        }
    }
}
