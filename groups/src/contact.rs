//! Contact normalisation. Email and phone are unique after normalising.

use chama_types::CoreError;

/// Trim and lowercase. Requires exactly one `@` with text on both sides.
pub fn normalize_email(raw: &str) -> Result<String, CoreError> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.contains(char::is_whitespace) =>
        {
            Ok(email)
        }
        _ => Err(CoreError::Validation(format!("invalid email address: {raw}"))),
    }
}

/// Keep digits and a leading `+`; spaces, dashes and brackets are dropped.
pub fn normalize_phone(raw: &str) -> Result<String, CoreError> {
    let trimmed = raw.trim();
    let mut phone = String::with_capacity(trimmed.len());
    for (i, c) in trimmed.chars().enumerate() {
        match c {
            '+' if i == 0 => phone.push(c),
            '0'..='9' => phone.push(c),
            ' ' | '-' | '(' | ')' | '.' => {}
            _ => return Err(CoreError::Validation(format!("invalid phone number: {raw}"))),
        }
    }
    let digits = phone.trim_start_matches('+').len();
    if !(7..=15).contains(&digits) {
        return Err(CoreError::Validation(format!("invalid phone number: {raw}")));
    }
    Ok(phone)
}
