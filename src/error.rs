use thiserror::Error;

#[derive(Error, Debug)]
pub enum DoseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Input validation error: {0}")]
    Validation(String),
}

pub type CalcResult<T> = Result<T, DoseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_error_message_not_doubled() {
        let data = "PATIENT_ID,WEIGHT,HB\nA,60,low\nC,70\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let failure = reader.records()
            .find_map(|record| record.err())
            .expect("ragged row should fail a strict reader");

        let message = DoseError::from(failure).to_string();
        assert!(message.starts_with("CSV error:"));
        assert!(!message.contains("CSV error: CSV error"));
    }
}
