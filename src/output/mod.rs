pub mod batch;

use crate::config::DisplayConfig;
use crate::dosing::{DoseResult, HemoglobinCategory, PatientInput, WEIGHT_THRESHOLD_KG};
use crate::error::CalcResult;
use serde::Serialize;
use std::path::Path;
use log::info;

pub use batch::*;

pub const ADVISORY_NOTE: &str =
    "Note: Validate dosing with local protocol / prescribing information.";

pub fn render_text(result: &DoseResult, display: &DisplayConfig) -> String {
    let mut text = format!(
        "Total Iron Need: {} mg\nFirst Dose: {:.*} mg\nSecond Dose: {:.*} mg\n",
        result.total_mg,
        display.decimals, result.first_dose_mg,
        display.decimals, result.second_dose_mg,
    );

    if display.show_note {
        text.push('\n');
        text.push_str(ADVISORY_NOTE);
        text.push('\n');
    }

    text
}

#[derive(Serialize)]
struct Evaluation<'a> {
    input: &'a PatientInput,
    result: &'a DoseResult,
}

pub fn render_json(input: &PatientInput, result: &DoseResult) -> CalcResult<String> {
    Ok(serde_json::to_string_pretty(&Evaluation { input, result })?)
}

#[derive(Debug, Default, PartialEq)]
pub struct BatchSummary {
    pub evaluated: usize,
    pub rejected: usize,
    pub low_under_threshold: usize,
    pub low_over_threshold: usize,
    pub high_under_threshold: usize,
    pub high_over_threshold: usize,
    pub total_iron_mg: u64,
}

impl BatchSummary {
    pub fn from_rows(rows: &[BatchRow]) -> Self {
        let mut summary = Self::default();

        for row in rows {
            let (input, result) = match (&row.input, &row.result) {
                (Some(input), Some(result)) => (input, result),
                _ => {
                    summary.rejected += 1;
                    continue;
                }
            };

            summary.evaluated += 1;
            summary.total_iron_mg += u64::from(result.total_mg);

            let light = input.weight_kg < WEIGHT_THRESHOLD_KG;
            match (input.hemoglobin_category, light) {
                (HemoglobinCategory::Low, true) => summary.low_under_threshold += 1,
                (HemoglobinCategory::Low, false) => summary.low_over_threshold += 1,
                (HemoglobinCategory::High, true) => summary.high_under_threshold += 1,
                (HemoglobinCategory::High, false) => summary.high_over_threshold += 1,
            }
        }

        summary
    }
}

/// Writes a markdown summary of a batch run next to its CSV output.
pub fn generate_report<P: AsRef<Path>>(rows: &[BatchRow], output_dir: P) -> CalcResult<()> {
    let report_path = output_dir.as_ref().join("dose_report.md");
    let summary = BatchSummary::from_rows(rows);

    let mut rejected_lines = String::new();
    for row in rows.iter().filter(|row| !row.is_ok()) {
        rejected_lines.push_str(&format!(
            "- `{}`: {}\n",
            row.patient_id,
            row.error.as_deref().unwrap_or("unknown error")
        ));
    }
    if rejected_lines.is_empty() {
        rejected_lines.push_str("- none\n");
    }

    let report_content = format!(
        r#"# Iron Dose Batch Report

Generated: {}

## Overview
- **Rows evaluated**: {}
- **Rows rejected**: {}
- **Total iron prescribed**: {} mg

## Total Iron Need by Group
| Hemoglobin category | < 70 kg | ≥ 70 kg |
|---|---|---|
| Hb ≥ 10 g/dL | {} (1000 mg) | {} (1500 mg) |
| Hb < 10 g/dL | {} (1500 mg) | {} (2000 mg) |

## Rejected Rows
{}
## Files Generated
- `doses.csv`: total need and two-session split per patient

## Notes
First dose is capped at 20 mg/kg body weight; the remainder is given as the second dose.
Validate dosing with local protocol / prescribing information.
"#,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        summary.evaluated,
        summary.rejected,
        summary.total_iron_mg,
        summary.high_under_threshold,
        summary.high_over_threshold,
        summary.low_under_threshold,
        summary.low_over_threshold,
        rejected_lines,
    );

    std::fs::write(&report_path, report_content)?;
    info!("Batch report written to {:?}", report_path);
    Ok(())
}
