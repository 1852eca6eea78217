use serde::{Deserialize, Serialize};
use std::fmt;

/// Weight bracket boundary (kg). Weights at or above it use the upper bracket.
pub const WEIGHT_THRESHOLD_KG: f64 = 70.0;

/// Hemoglobin threshold (g/dL) separating the two categories.
pub const HB_THRESHOLD_G_DL: f64 = 10.0;

/// Per-session cap on a single administration (mg per kg body weight).
pub const MAX_SINGLE_DOSE_MG_PER_KG: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HemoglobinCategory {
    /// Hb < 10 g/dL
    Low,
    /// Hb >= 10 g/dL
    High,
}

impl HemoglobinCategory {
    pub fn from_hb_g_dl(hb: f64) -> Self {
        if hb < HB_THRESHOLD_G_DL {
            HemoglobinCategory::Low
        } else {
            HemoglobinCategory::High
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HemoglobinCategory::Low => "Hb < 10 g/dL",
            HemoglobinCategory::High => "Hb ≥ 10 g/dL",
        }
    }
}

impl fmt::Display for HemoglobinCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatientInput {
    pub weight_kg: f64,
    pub hemoglobin_category: HemoglobinCategory,
}

impl PatientInput {
    pub fn new(weight_kg: f64, hemoglobin_category: HemoglobinCategory) -> Self {
        Self { weight_kg, hemoglobin_category }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoseResult {
    pub total_mg: u32,
    pub first_dose_mg: f64,
    pub second_dose_mg: f64,
}

/// Total iron need (mg) looked up by category and weight bracket.
pub fn total_iron_mg(weight_kg: f64, category: HemoglobinCategory) -> u32 {
    let light = weight_kg < WEIGHT_THRESHOLD_KG;
    match (category, light) {
        (HemoglobinCategory::High, true) => 1000,
        (HemoglobinCategory::High, false) => 1500,
        (HemoglobinCategory::Low, true) => 1500,
        (HemoglobinCategory::Low, false) => 2000,
    }
}

/// Splits the total need into two sessions, the first capped at 20 mg/kg.
///
/// Input range checks belong to the caller; this never fails.
pub fn calculate_dose(input: &PatientInput) -> DoseResult {
    let total_mg = total_iron_mg(input.weight_kg, input.hemoglobin_category);
    let total = f64::from(total_mg);
    let first_dose_mg = (input.weight_kg * MAX_SINGLE_DOSE_MG_PER_KG).min(total);
    let second_dose_mg = total - first_dose_mg;

    DoseResult {
        total_mg,
        first_dose_mg,
        second_dose_mg,
    }
}
