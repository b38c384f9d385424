//! Pure, side-effect-free request-input validators (SPEC_FULL §4.1). No I/O.

use crate::error::{ValidationError, ValidationKind};

type VResult = Result<(), ValidationError>;

fn has_control_chars(s: &str, allow_htab: bool) -> bool {
    s.bytes().any(|b| {
        if allow_htab && b == 0x09 {
            return false;
        }
        b <= 0x1F || b == 0x7F
    })
}

pub fn validate_header_name(name: &str) -> VResult {
    if name.is_empty() {
        return Err(ValidationError::new("header_name", ValidationKind::TooShort));
    }
    if name.len() > 256 {
        return Err(ValidationError::new("header_name", ValidationKind::TooLong));
    }
    if name.starts_with(':') {
        return Err(ValidationError::new("header_name", ValidationKind::PseudoHeader));
    }
    if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return Err(ValidationError::new("header_name", ValidationKind::IllegalCharacter));
    }
    Ok(())
}

pub fn validate_header_value(value: &str) -> VResult {
    if value.len() > 8192 {
        return Err(ValidationError::new("header_value", ValidationKind::TooLong));
    }
    if has_control_chars(value, true) {
        return Err(ValidationError::new("header_value", ValidationKind::ControlCharacter));
    }
    Ok(())
}

pub fn validate_query_key(key: &str) -> VResult {
    if key.is_empty() {
        return Err(ValidationError::new("query_key", ValidationKind::TooShort));
    }
    if key.len() > 256 {
        return Err(ValidationError::new("query_key", ValidationKind::TooLong));
    }
    if key.bytes().any(|b| matches!(b, b'&' | b'=' | b'#' | b'?')) {
        return Err(ValidationError::new("query_key", ValidationKind::ReservedDelimiter));
    }
    if has_control_chars(key, false) {
        return Err(ValidationError::new("query_key", ValidationKind::ControlCharacter));
    }
    Ok(())
}

pub fn validate_credential_username(username: &str) -> VResult {
    if username.is_empty() {
        return Err(ValidationError::new("username", ValidationKind::TooShort));
    }
    if username.len() > 255 {
        return Err(ValidationError::new("username", ValidationKind::TooLong));
    }
    if username.contains(':') {
        return Err(ValidationError::new("username", ValidationKind::ReservedDelimiter));
    }
    if has_control_chars(username, false) {
        return Err(ValidationError::new("username", ValidationKind::ControlCharacter));
    }
    Ok(())
}

pub fn validate_credential_password(password: &str) -> VResult {
    if password.is_empty() {
        return Err(ValidationError::new("password", ValidationKind::TooShort));
    }
    if password.len() > 255 {
        return Err(ValidationError::new("password", ValidationKind::TooLong));
    }
    if has_control_chars(password, false) {
        return Err(ValidationError::new("password", ValidationKind::ControlCharacter));
    }
    Ok(())
}

pub fn validate_bearer_token(token: &str) -> VResult {
    if token.is_empty() {
        return Err(ValidationError::new("bearer_token", ValidationKind::TooShort));
    }
    if token.len() > 2048 {
        return Err(ValidationError::new("bearer_token", ValidationKind::TooLong));
    }
    if token.contains(' ') {
        return Err(ValidationError::new("bearer_token", ValidationKind::IllegalCharacter));
    }
    if has_control_chars(token, false) {
        return Err(ValidationError::new("bearer_token", ValidationKind::ControlCharacter));
    }
    Ok(())
}

pub fn validate_cookie_name(name: &str) -> VResult {
    if name.is_empty() {
        return Err(ValidationError::new("cookie_name", ValidationKind::TooShort));
    }
    if name.len() > 256 {
        return Err(ValidationError::new("cookie_name", ValidationKind::TooLong));
    }
    if name.bytes().any(|b| matches!(b, b';' | b',')) {
        return Err(ValidationError::new("cookie_name", ValidationKind::ReservedDelimiter));
    }
    if has_control_chars(name, false) {
        return Err(ValidationError::new("cookie_name", ValidationKind::ControlCharacter));
    }
    Ok(())
}

pub fn validate_cookie_value(value: &str) -> VResult {
    if value.len() > 4096 {
        return Err(ValidationError::new("cookie_value", ValidationKind::TooLong));
    }
    if has_control_chars(value, false) {
        return Err(ValidationError::new("cookie_value", ValidationKind::ControlCharacter));
    }
    Ok(())
}

pub fn validate_cookie_domain(domain: &str) -> VResult {
    if domain.len() > 255 {
        return Err(ValidationError::new("cookie_domain", ValidationKind::TooLong));
    }
    if has_control_chars(domain, false) {
        return Err(ValidationError::new("cookie_domain", ValidationKind::ControlCharacter));
    }
    Ok(())
}

pub fn validate_cookie_path(path: &str) -> VResult {
    if path.len() > 1024 {
        return Err(ValidationError::new("cookie_path", ValidationKind::TooLong));
    }
    if has_control_chars(path, false) {
        return Err(ValidationError::new("cookie_path", ValidationKind::ControlCharacter));
    }
    Ok(())
}

pub fn validate_form_field(field: &str) -> VResult {
    validate_filename_like("form_field", field)
}

pub fn validate_filename(filename: &str) -> VResult {
    validate_filename_like("filename", filename)
}

fn validate_filename_like(label: &'static str, s: &str) -> VResult {
    if s.is_empty() {
        return Err(ValidationError::new(label, ValidationKind::TooShort));
    }
    if s.len() > 256 {
        return Err(ValidationError::new(label, ValidationKind::TooLong));
    }
    if s.bytes().any(|b| matches!(b, b'"' | b'\'' | b'<' | b'>' | b'&')) {
        return Err(ValidationError::new(label, ValidationKind::IllegalCharacter));
    }
    if has_control_chars(s, false) {
        return Err(ValidationError::new(label, ValidationKind::ControlCharacter));
    }
    Ok(())
}
