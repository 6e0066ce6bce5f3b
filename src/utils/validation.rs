use crate::errors::{AppError, Result};
use regex::Regex;

pub struct Validator;

impl Validator {
    pub fn validate_required(field: &str, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(AppError::ValidationError(format!("{} is required", field)));
        }
        Ok(())
    }

    pub fn validate_email(email: &str) -> Result<()> {
        let email_regex = Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .map_err(|e| AppError::InternalError(format!("Regex error: {}", e)))?;

        if !email_regex.is_match(email) {
            return Err(AppError::ValidationError("Invalid email format".to_string()));
        }

        if email.len() > 254 {
            return Err(AppError::ValidationError("Email too long".to_string()));
        }

        Ok(())
    }

    pub fn validate_phone(phone: &str) -> Result<()> {
        let phone = phone.trim();
        // E.164: +[country][number], or 8-15 bare digits
        let phone_regex = Regex::new(r"^(\+\d{8,15}|\d{8,15})$")
            .map_err(|e| AppError::InternalError(format!("Regex error: {}", e)))?;
        if !phone_regex.is_match(phone) {
            return Err(AppError::ValidationError(
                "Invalid phone number format. Use +countrycode and 8-15 digits.".to_string(),
            ));
        }
        Ok(())
    }

    /// National ID numbers are mandatory where the country route correlates
    /// callbacks by them.
    pub fn validate_id_number(nationality: &str, id_number: Option<&str>) -> Result<()> {
        let required = nationality.trim().eq_ignore_ascii_case("nigeria");
        let present = id_number.map_or(false, |n| !n.trim().is_empty());
        if required && !present {
            return Err(AppError::ValidationError("bvn is required for Nigeria".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email() {
        assert!(Validator::validate_email("ada@example.com").is_ok());
        assert!(Validator::validate_email("ada@").is_err());
    }

    #[test]
    fn test_phone() {
        assert!(Validator::validate_phone("+2348012345678").is_ok());
        assert!(Validator::validate_phone("08012345678").is_ok());
        assert!(Validator::validate_phone("12-34").is_err());
    }

    #[test]
    fn test_bvn_only_required_for_nigeria() {
        assert!(Validator::validate_id_number("Nigeria", None).is_err());
        assert!(Validator::validate_id_number("nigeria", Some("  ")).is_err());
        assert!(Validator::validate_id_number("nigeria", Some("22212345678")).is_ok());
        assert!(Validator::validate_id_number("indonesia", None).is_ok());
    }

    #[test]
    fn test_required() {
        assert!(matches!(
            Validator::validate_required("first_name", " "),
            Err(AppError::ValidationError(msg)) if msg == "first_name is required"
        ));
    }
}
