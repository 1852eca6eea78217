use crate::dosing::{calculate_dose, DoseResult, PatientInput};
use crate::error::{DoseError, CalcResult};
use crate::form::DoseForm;
use serde::Serialize;
use std::path::Path;
use log::{info, warn};

/// One row of a batch input file. Fields stay raw so a bad cell rejects only its row.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchRecord {
    pub patient_id: String,
    pub weight: String,
    pub hb: String,
    /// Set when the row itself could not be read (ragged row, bad encoding).
    pub read_error: Option<String>,
}

impl BatchRecord {
    pub fn new(patient_id: &str, weight: &str, hb: &str) -> Self {
        Self {
            patient_id: patient_id.to_string(),
            weight: weight.to_string(),
            hb: hb.to_string(),
            read_error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchRow {
    pub patient_id: String,
    pub weight: String,
    pub input: Option<PatientInput>,
    pub result: Option<DoseResult>,
    pub error: Option<String>,
}

impl BatchRow {
    pub fn is_ok(&self) -> bool {
        self.result.is_some()
    }
}

/// Reads `PATIENT_ID,WEIGHT,HB` rows. Only a missing file or header fails the
/// whole read; a broken row comes back with `read_error` set.
pub fn read_batch<P: AsRef<Path>>(path: P) -> CalcResult<Vec<BatchRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers.iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| DoseError::Validation(format!("Batch input is missing the {} column", name)))
    };
    let id_col = column("PATIENT_ID")?;
    let weight_col = column("WEIGHT")?;
    let hb_col = column("HB")?;

    let mut records = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        // Header is line 1
        let line = row_idx + 2;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                records.push(BatchRecord {
                    patient_id: format!("line {}", line),
                    read_error: Some(e.to_string()),
                    ..BatchRecord::default()
                });
                continue;
            }
        };

        let field = |idx: usize| record.get(idx).unwrap_or("").to_string();
        let read_error = if record.len() != headers.len() {
            Some(format!(
                "Line {} has {} fields, expected {}",
                line, record.len(), headers.len()
            ))
        } else {
            None
        };

        let patient_id = match field(id_col) {
            id if id.is_empty() => format!("line {}", line),
            id => id,
        };

        records.push(BatchRecord {
            patient_id,
            weight: field(weight_col),
            hb: field(hb_col),
            read_error,
        });
    }

    Ok(records)
}

pub fn evaluate_batch(form: &DoseForm, records: &[BatchRecord]) -> Vec<BatchRow> {
    let rows: Vec<BatchRow> = records.iter()
        .map(|record| evaluate_record(form, record))
        .collect();

    let rejected = rows.iter().filter(|row| !row.is_ok()).count();
    info!("Evaluated {} batch rows ({} rejected)", rows.len(), rejected);
    rows
}

fn evaluate_record(form: &DoseForm, record: &BatchRecord) -> BatchRow {
    let outcome = match &record.read_error {
        Some(message) => Err(message.clone()),
        None => Ok(()),
    };
    let outcome = outcome.and_then(|_| record.weight.parse::<f64>()
        .map_err(|_| format!("Body weight '{}' is not a number", record.weight))
        .and_then(|weight| form.build_input(weight, &record.hb).map_err(|e| e.to_string())));

    match outcome {
        Ok(input) => BatchRow {
            patient_id: record.patient_id.clone(),
            weight: record.weight.clone(),
            input: Some(input),
            result: Some(calculate_dose(&input)),
            error: None,
        },
        Err(message) => {
            warn!("Rejected batch row {}: {}", record.patient_id, message);
            BatchRow {
                patient_id: record.patient_id.clone(),
                weight: record.weight.clone(),
                input: None,
                result: None,
                error: Some(message),
            }
        }
    }
}

pub fn save_batch<P: AsRef<Path>>(rows: &[BatchRow], path: P, decimals: usize) -> CalcResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(&[
        "PATIENT_ID", "WEIGHT", "HB_CATEGORY", "TOTAL_MG", "FIRST_DOSE_MG", "SECOND_DOSE_MG", "ERROR"
    ])?;

    for row in rows {
        let category = row.input
            .map(|input| input.hemoglobin_category.label().to_string())
            .unwrap_or_default();

        let (total, first, second) = match &row.result {
            Some(result) => (
                result.total_mg.to_string(),
                format!("{:.*}", decimals, result.first_dose_mg),
                format!("{:.*}", decimals, result.second_dose_mg),
            ),
            None => (String::new(), String::new(), String::new()),
        };

        writer.write_record(&[
            row.patient_id.clone(),
            row.weight.clone(),
            category,
            total,
            first,
            second,
            row.error.clone().unwrap_or_default(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dosing::HemoglobinCategory;
    use crate::form::FormLimits;
    use std::fs;

    fn record(id: &str, weight: &str, hb: &str) -> BatchRecord {
        BatchRecord::new(id, weight, hb)
    }

    #[test]
    fn test_read_batch_trims_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patients.csv");
        fs::write(&path, "PATIENT_ID, WEIGHT, HB\nA1, 60, low\nA2, 72.5 , Hb ≥ 10 g/dL\n").unwrap();

        let records = read_batch(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].patient_id, "A1");
        assert_eq!(records[1].weight, "72.5");
        assert_eq!(records[1].hb, "Hb ≥ 10 g/dL");
    }

    #[test]
    fn test_ragged_row_rejected_without_stopping_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patients.csv");
        fs::write(&path, "PATIENT_ID,WEIGHT,HB\nA,60,low\nC,70\nD,100,high\nE,80,low,extra\n").unwrap();

        let records = read_batch(&path).unwrap();
        assert_eq!(records.len(), 4);
        assert!(records[0].read_error.is_none());
        assert_eq!(records[1].patient_id, "C");
        assert!(records[1].read_error.as_deref().unwrap().contains("has 2 fields, expected 3"));
        assert!(records[3].read_error.is_some());

        let form = DoseForm::new(FormLimits::default());
        let rows = evaluate_batch(&form, &records);
        assert!(rows[0].is_ok());
        assert!(!rows[1].is_ok());
        assert!(rows[2].is_ok());
        assert!(!rows[3].is_ok());
        assert_eq!(rows[2].result.unwrap().total_mg, 1500);

        let out = dir.path().join("doses.csv");
        save_batch(&rows, &out, 1).unwrap();
        let content = fs::read_to_string(&out).unwrap();
        assert_eq!(content.lines().count(), 5);
        assert!(content.contains("D,100,Hb ≥ 10 g/dL,1500,1500.0,0.0,"));
    }

    #[test]
    fn test_missing_column_fails_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patients.csv");
        fs::write(&path, "PATIENT_ID,WEIGHT\nA,60\n").unwrap();

        assert!(matches!(read_batch(&path), Err(DoseError::Validation(_))));
    }

    #[test]
    fn test_invalid_rows_do_not_abort_batch() {
        let form = DoseForm::new(FormLimits::default());
        let records = vec![
            record("P1", "60", "low"),
            record("P2", "heavy", "low"),
            record("P3", "20", "high"),
            record("P4", "70", "purple"),
            record("P5", "100", "9.1"),
        ];

        let rows = evaluate_batch(&form, &records);
        assert_eq!(rows.len(), 5);
        assert!(rows[0].is_ok());
        assert!(!rows[1].is_ok());
        assert!(!rows[2].is_ok());
        assert!(!rows[3].is_ok());
        assert!(rows[4].is_ok());

        let last = rows[4].result.unwrap();
        assert_eq!(rows[4].input.unwrap().hemoglobin_category, HemoglobinCategory::Low);
        assert_eq!(last.total_mg, 2000);
        assert!(rows[1].error.as_deref().unwrap().contains("not a number"));
    }

    #[test]
    fn test_save_batch_writes_doses_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doses.csv");
        let form = DoseForm::new(FormLimits::default());
        let rows = evaluate_batch(&form, &[
            record("P1", "70", "high"),
            record("P2", "10", "high"),
        ]);

        save_batch(&rows, &path, 1).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "PATIENT_ID,WEIGHT,HB_CATEGORY,TOTAL_MG,FIRST_DOSE_MG,SECOND_DOSE_MG,ERROR");
        assert_eq!(lines[1], "P1,70,Hb ≥ 10 g/dL,1500,1400.0,100.0,");
        assert!(lines[2].starts_with("P2,10,,,,,"));
        assert!(lines[2].contains("outside the accepted range"));
    }
}
