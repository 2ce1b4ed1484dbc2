//! Field rules shared by the import rows. Each rule appends a message instead of
//! returning early so a caller sees every problem in a category at once.

use crate::period::Period;

pub fn required_text(location: &str, field: &str, value: &str, errors: &mut Vec<String>) {
    if value.trim().is_empty() {
        errors.push(format!("{location}: field '{field}' is required"));
    }
}

pub fn period(location: &str, field: &str, value: &str, errors: &mut Vec<String>) {
    if value.parse::<Period>().is_err() {
        errors.push(format!(
            "{location}: field '{field}' must match YYYY-MM (got '{value}')"
        ));
    }
}

pub fn email(location: &str, field: &str, value: &str, errors: &mut Vec<String>) {
    if value.trim().is_empty() {
        errors.push(format!("{location}: field '{field}' is required"));
    } else if !value.contains('@') {
        errors.push(format!(
            "{location}: field '{field}' must be an email address (got '{value}')"
        ));
    }
}

pub fn required_amount(location: &str, field: &str, value: Option<f64>, errors: &mut Vec<String>) {
    match value {
        None => errors.push(format!("{location}: field '{field}' is required")),
        Some(amount) => optional_amount(location, field, Some(amount), errors),
    }
}

pub fn optional_amount(location: &str, field: &str, value: Option<f64>, errors: &mut Vec<String>) {
    if let Some(amount) = value {
        if amount < 0.0 {
            errors.push(format!(
                "{location}: field '{field}' must not be negative (got {amount})"
            ));
        }
    }
}

pub fn non_negative_count(location: &str, field: &str, value: Option<i64>, errors: &mut Vec<String>) {
    if let Some(count) = value {
        if count < 0 {
            errors.push(format!(
                "{location}: field '{field}' must not be negative (got {count})"
            ));
        }
    }
}

pub fn nps(location: &str, field: &str, value: Option<i64>, errors: &mut Vec<String>) {
    if let Some(score) = value {
        if !(-100..=100).contains(&score) {
            errors.push(format!(
                "{location}: field '{field}' must be between -100 and 100 (got {score})"
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(rule: impl FnOnce(&mut Vec<String>)) -> Vec<String> {
        let mut errors = Vec::new();
        rule(&mut errors);
        errors
    }

    #[test]
    fn period_must_be_exact() {
        assert!(run(|e| period("row", "mes_ano", "2025-01", e)).is_empty());
        let errors = run(|e| period("row", "mes_ano", "2025-1", e));
        assert_eq!(errors, vec!["row: field 'mes_ano' must match YYYY-MM (got '2025-1')"]);
    }

    #[test]
    fn emails_need_an_at_sign() {
        assert!(run(|e| email("row", "email", "x@e.com", e)).is_empty());
        assert_eq!(run(|e| email("row", "email", "x.e.com", e)).len(), 1);
        assert_eq!(
            run(|e| email("row", "email", " ", e)),
            vec!["row: field 'email' is required"]
        );
    }

    #[test]
    fn amounts_and_counts_reject_negatives() {
        assert!(run(|e| required_amount("row", "v", Some(0.0), e)).is_empty());
        assert_eq!(run(|e| required_amount("row", "v", None, e)).len(), 1);
        assert_eq!(run(|e| optional_amount("row", "v", Some(-0.01), e)).len(), 1);
        assert!(run(|e| optional_amount("row", "v", None, e)).is_empty());
        assert_eq!(run(|e| non_negative_count("row", "v", Some(-1), e)).len(), 1);
    }

    #[test]
    fn nps_stays_in_range() {
        assert!(run(|e| nps("row", "nps", Some(-100), e)).is_empty());
        assert!(run(|e| nps("row", "nps", Some(100), e)).is_empty());
        assert_eq!(run(|e| nps("row", "nps", Some(101), e)).len(), 1);
    }
}
