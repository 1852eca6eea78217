use crate::config::Config;
use crate::dosing::{calculate_dose, DoseResult, HemoglobinCategory, PatientInput};
use crate::error::{DoseError, CalcResult};
use log::{debug, info};

/// Accepted body weight range (inclusive, kg).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormLimits {
    pub min_weight_kg: f64,
    pub max_weight_kg: f64,
}

impl Default for FormLimits {
    fn default() -> Self {
        Config::default().limits()
    }
}

impl FormLimits {
    pub fn validate_weight(&self, weight_kg: f64) -> CalcResult<f64> {
        if !weight_kg.is_finite() {
            return Err(DoseError::Validation(
                "Body weight must be a number".to_string()
            ));
        }

        if weight_kg < self.min_weight_kg || weight_kg > self.max_weight_kg {
            return Err(DoseError::Validation(format!(
                "Body weight {} kg is outside the accepted range {}-{} kg",
                weight_kg, self.min_weight_kg, self.max_weight_kg
            )));
        }

        Ok(weight_kg)
    }
}

/// Parses a hemoglobin entry: a form label, `low`/`high`, or a measured value in g/dL.
pub fn parse_hemoglobin(raw: &str) -> CalcResult<HemoglobinCategory> {
    let value = raw.trim();
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    match compact.as_str() {
        "low" | "hb<10g/dl" | "<10" => return Ok(HemoglobinCategory::Low),
        "high" | "hb≥10g/dl" | "hb>=10g/dl" | "≥10" | ">=10" => return Ok(HemoglobinCategory::High),
        _ => {}
    }

    let numeric = compact.strip_suffix("g/dl").unwrap_or(&compact);
    match numeric.parse::<f64>() {
        Ok(hb) if hb.is_finite() && hb > 0.0 => Ok(HemoglobinCategory::from_hb_g_dl(hb)),
        _ => Err(DoseError::Validation(format!(
            "Unrecognised hemoglobin value '{}': expected low, high, a form label or g/dL",
            value
        ))),
    }
}

/// Validates raw form entries and hands them to the dose calculator.
#[derive(Debug, Clone)]
pub struct DoseForm {
    limits: FormLimits,
}

impl DoseForm {
    pub fn new(limits: FormLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &FormLimits {
        &self.limits
    }

    pub fn build_input(&self, weight_kg: f64, hemoglobin: &str) -> CalcResult<PatientInput> {
        let weight_kg = self.limits.validate_weight(weight_kg)?;
        let category = parse_hemoglobin(hemoglobin)?;
        Ok(PatientInput::new(weight_kg, category))
    }

    pub fn submit(&self, weight_kg: f64, hemoglobin: &str) -> CalcResult<DoseResult> {
        let input = self.build_input(weight_kg, hemoglobin)?;
        let result = calculate_dose(&input);
        debug!(
            "Dose for {} kg, {}: total {} mg, first {:.1} mg, second {:.1} mg",
            input.weight_kg, input.hemoglobin_category,
            result.total_mg, result.first_dose_mg, result.second_dose_mg
        );
        Ok(result)
    }
}

/// Caller-held slot keeping the last computed result between recalculations.
#[derive(Debug, Clone)]
pub struct Session {
    form: DoseForm,
    last_result: Option<DoseResult>,
}

impl Session {
    pub fn new(form: DoseForm) -> Self {
        Self { form, last_result: None }
    }

    /// A rejected submission leaves the previous result untouched.
    pub fn recalculate(&mut self, weight_kg: f64, hemoglobin: &str) -> CalcResult<DoseResult> {
        let result = self.form.submit(weight_kg, hemoglobin)?;
        self.last_result = Some(result);
        Ok(result)
    }

    pub fn last_result(&self) -> Option<&DoseResult> {
        self.last_result.as_ref()
    }

    pub fn clear(&mut self) {
        if self.last_result.take().is_some() {
            info!("Cleared cached dose result");
        }
    }
}

/// One line of interactive input.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Calculate { weight_kg: f64, hemoglobin: String },
    Last,
    Clear,
    Quit,
}

impl SessionCommand {
    /// Parses `<weight> <hb>`, `last`, `clear` or `quit`. The Hb part may contain spaces.
    pub fn parse(line: &str) -> CalcResult<Self> {
        let line = line.trim();
        match line.to_lowercase().as_str() {
            "last" => return Ok(SessionCommand::Last),
            "clear" => return Ok(SessionCommand::Clear),
            "quit" | "exit" => return Ok(SessionCommand::Quit),
            _ => {}
        }

        let (weight, hemoglobin) = line.split_once(char::is_whitespace).ok_or_else(|| {
            DoseError::Validation("Expected '<weight kg> <hb>', 'last', 'clear' or 'quit'".to_string())
        })?;

        let weight_kg = weight.parse::<f64>().map_err(|_| {
            DoseError::Validation(format!("Body weight '{}' is not a number", weight))
        })?;

        Ok(SessionCommand::Calculate {
            weight_kg,
            hemoglobin: hemoglobin.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> DoseForm {
        DoseForm::new(FormLimits::default())
    }

    #[test]
    fn test_default_limits_follow_config_defaults() {
        let config = Config::default();
        let limits = FormLimits::default();
        assert_eq!(limits.min_weight_kg, config.form.min_weight_kg);
        assert_eq!(limits.max_weight_kg, config.form.max_weight_kg);
    }

    #[test]
    fn test_weight_range_is_inclusive() {
        let limits = FormLimits::default();
        assert!(limits.validate_weight(30.0).is_ok());
        assert!(limits.validate_weight(250.0).is_ok());
        assert!(limits.validate_weight(29.5).is_err());
        assert!(limits.validate_weight(250.5).is_err());
        assert!(limits.validate_weight(f64::NAN).is_err());
        assert!(limits.validate_weight(f64::INFINITY).is_err());
    }

    #[test]
    fn test_parse_form_labels() {
        assert_eq!(parse_hemoglobin("Hb < 10 g/dL").unwrap(), HemoglobinCategory::Low);
        assert_eq!(parse_hemoglobin("Hb ≥ 10 g/dL").unwrap(), HemoglobinCategory::High);
        assert_eq!(parse_hemoglobin("Hb >= 10 g/dL").unwrap(), HemoglobinCategory::High);
        assert_eq!(parse_hemoglobin(" LOW ").unwrap(), HemoglobinCategory::Low);
        assert_eq!(parse_hemoglobin("High").unwrap(), HemoglobinCategory::High);
    }

    #[test]
    fn test_parse_numeric_hemoglobin() {
        assert_eq!(parse_hemoglobin("9.4").unwrap(), HemoglobinCategory::Low);
        assert_eq!(parse_hemoglobin("10").unwrap(), HemoglobinCategory::High);
        assert_eq!(parse_hemoglobin("11.2 g/dL").unwrap(), HemoglobinCategory::High);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_hemoglobin("medium"), Err(DoseError::Validation(_))));
        assert!(parse_hemoglobin("").is_err());
        assert!(parse_hemoglobin("-3").is_err());
    }

    #[test]
    fn test_submit_rejects_out_of_range_weight() {
        let limits = FormLimits { min_weight_kg: 50.0, max_weight_kg: 250.0 };
        let form = DoseForm::new(limits);
        assert!(form.submit(45.0, "low").is_err());
        assert!(form.submit(50.0, "low").is_ok());
    }

    #[test]
    fn test_submit_computes_dose() {
        let result = form().submit(60.0, "Hb < 10 g/dL").unwrap();
        assert_eq!(result.total_mg, 1500);
        assert_eq!(result.first_dose_mg, 1200.0);
        assert_eq!(result.second_dose_mg, 300.0);
    }

    #[test]
    fn test_session_keeps_last_result_on_failure() {
        let mut session = Session::new(form());
        assert!(session.last_result().is_none());

        let first = session.recalculate(70.0, "high").unwrap();
        assert_eq!(session.last_result(), Some(&first));

        assert!(session.recalculate(500.0, "high").is_err());
        assert_eq!(session.last_result(), Some(&first));

        let second = session.recalculate(100.0, "low").unwrap();
        assert_eq!(second.total_mg, 2000);
        assert_eq!(session.last_result(), Some(&second));

        session.clear();
        assert!(session.last_result().is_none());
    }

    #[test]
    fn test_session_command_parse() {
        assert_eq!(SessionCommand::parse(" last ").unwrap(), SessionCommand::Last);
        assert_eq!(SessionCommand::parse("CLEAR").unwrap(), SessionCommand::Clear);
        assert_eq!(SessionCommand::parse("exit").unwrap(), SessionCommand::Quit);
        assert_eq!(
            SessionCommand::parse("72.5 Hb < 10 g/dL").unwrap(),
            SessionCommand::Calculate { weight_kg: 72.5, hemoglobin: "Hb < 10 g/dL".to_string() }
        );
        assert!(SessionCommand::parse("seventy low").is_err());
        assert!(SessionCommand::parse("70").is_err());
    }
}
