//! Pure form-validation helpers composed per entity screen.

use db::models::{account, contact, deal, task, team_member};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::crud::{FormValues, ValidationErrors};

pub const REQUIRED_MESSAGE: &str = "This field is required";
pub const EMAIL_REQUIRED_MESSAGE: &str = "Email is required";
pub const EMAIL_INVALID_MESSAGE: &str = "Invalid email address";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}$").expect("email pattern")
});

/// A value counts as missing when it is absent, null, an empty string,
/// zero or false.
fn is_falsy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(_) => false,
    }
}

/// One error per required field with a missing value.
pub fn validate_required(values: &FormValues, required: &[&str]) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    for field in required {
        if is_falsy(values.get(*field)) {
            errors.insert((*field).to_string(), REQUIRED_MESSAGE.to_string());
        }
    }
    errors
}

/// `None` means the address is acceptable.
pub fn validate_email(email: &str) -> Option<&'static str> {
    if email.is_empty() {
        return Some(EMAIL_REQUIRED_MESSAGE);
    }
    if !EMAIL_RE.is_match(email) {
        return Some(EMAIL_INVALID_MESSAGE);
    }
    None
}

fn check_email_field(values: &FormValues, field: &str, errors: &mut ValidationErrors) {
    if errors.contains_key(field) {
        return;
    }
    if let Some(Value::String(email)) = values.get(field) {
        if !email.is_empty() {
            if let Some(message) = validate_email(email) {
                errors.insert(field.to_string(), message.to_string());
            }
        }
    }
}

pub fn validate_team_member(values: &FormValues) -> ValidationErrors {
    let mut errors = validate_required(
        values,
        &[
            team_member::fields::NAME,
            team_member::fields::DEPARTMENT,
            team_member::fields::ROLE,
            team_member::fields::EMAIL,
        ],
    );
    check_email_field(values, team_member::fields::EMAIL, &mut errors);
    errors
}

pub fn validate_account(values: &FormValues) -> ValidationErrors {
    validate_required(values, &[account::fields::NAME, account::fields::INDUSTRY])
}

pub fn validate_deal(values: &FormValues) -> ValidationErrors {
    validate_required(
        values,
        &[
            deal::fields::NAME,
            deal::fields::ACCOUNT_ID,
            deal::fields::STAGE,
            deal::fields::AMOUNT,
        ],
    )
}

pub fn validate_task(values: &FormValues) -> ValidationErrors {
    validate_required(
        values,
        &[
            task::fields::TITLE,
            task::fields::DUE_DATE,
            task::fields::ASSIGNED_TO,
        ],
    )
}

pub fn validate_contact(values: &FormValues) -> ValidationErrors {
    let mut errors = validate_required(
        values,
        &[
            contact::fields::FIRST_NAME,
            contact::fields::LAST_NAME,
            contact::fields::EMAIL,
        ],
    );
    check_email_field(values, contact::fields::EMAIL, &mut errors);
    errors
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn values(value: serde_json::Value) -> FormValues {
        let Value::Object(map) = value else {
            unreachable!()
        };
        map
    }

    #[test]
    fn required_counts_falsy_values_as_missing() {
        let form = values(json!({
            "null_field": null,
            "empty": "",
            "zero": 0,
            "unchecked": false,
            "present": "x",
            "amount": 42,
        }));

        let errors = validate_required(
            &form,
            &["null_field", "empty", "zero", "unchecked", "missing", "present", "amount"],
        );

        assert_eq!(errors.len(), 5);
        assert_eq!(errors["missing"], REQUIRED_MESSAGE);
        assert!(!errors.contains_key("present"));
        assert!(!errors.contains_key("amount"));
    }

    #[test]
    fn email_validation_matches_standard_addresses() {
        assert_eq!(validate_email(""), Some(EMAIL_REQUIRED_MESSAGE));
        assert_eq!(validate_email("plainly-wrong"), Some(EMAIL_INVALID_MESSAGE));
        assert_eq!(validate_email("no-tld@host"), Some(EMAIL_INVALID_MESSAGE));
        assert_eq!(validate_email("grace@example.com"), None);
        assert_eq!(validate_email("GRACE+crm@Example.CO"), None);
    }

    #[test]
    fn team_member_requires_core_fields_and_valid_email() {
        let errors = validate_team_member(&values(json!({})));
        assert_eq!(errors.len(), 4);

        let errors = validate_team_member(&values(json!({
            "name": "Grace",
            "department": "Sales",
            "role": "AE",
            "email": "not-an-email",
        })));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors["email"], EMAIL_INVALID_MESSAGE);

        let errors = validate_team_member(&values(json!({
            "name": "Grace",
            "department": "Sales",
            "role": "AE",
            "email": "grace@example.com",
        })));
        assert!(errors.is_empty());
    }

    #[test]
    fn deal_requires_pipeline_fields() {
        let errors = validate_deal(&values(json!({
            "name": "Renewal",
            "account_id": "a-1",
            "stage": "Proposal",
            "amount": 0,
        })));
        // A zero amount still counts as missing.
        assert_eq!(errors.len(), 1);
        assert!(errors.contains_key("amount"));
    }

    #[test]
    fn contact_composes_required_and_email_rules() {
        let errors = validate_contact(&values(json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email": "ada@example.com",
        })));
        assert!(errors.is_empty());
    }
}
