//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

use crate::models::{Credentials, ProfileUpdate, Registration};

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate password
///
/// The backend enforces its own policy; this only rejects what it never accepts.
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.len() < 6 {
        return Err("Password must be at least 6 characters long".to_string());
    }

    if password.len() > 72 {
        return Err("Password must be at most 72 characters long".to_string());
    }

    Ok(())
}

/// Validate full name
pub fn validate_full_name(full_name: &str) -> Result<(), String> {
    let trimmed = full_name.trim();
    if trimmed.is_empty() {
        return Err("Full name is required".to_string());
    }

    if trimmed.chars().count() > 100 {
        return Err("Full name must be at most 100 characters long".to_string());
    }

    Ok(())
}

/// Validate phone number
pub fn validate_phone(phone: &str) -> Result<(), String> {
    static PHONE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = PHONE_REGEX.get_or_init(|| {
        Regex::new(r"^\+?[0-9][0-9 ().-]{5,19}$").expect("Failed to compile phone regex")
    });

    if !regex.is_match(phone) {
        return Err("Invalid phone number".to_string());
    }

    Ok(())
}

pub fn validate_credentials(credentials: &Credentials) -> Result<(), String> {
    validate_email(&credentials.email)?;
    if credentials.password.is_empty() {
        return Err("Password is required".to_string());
    }
    Ok(())
}

pub fn validate_registration(registration: &Registration) -> Result<(), String> {
    validate_email(&registration.email)?;
    validate_password(&registration.password)?;
    validate_full_name(&registration.full_name)
}

pub fn validate_profile_update(update: &ProfileUpdate) -> Result<(), String> {
    if update.is_empty() {
        return Err("Nothing to update".to_string());
    }
    if let Some(full_name) = &update.full_name {
        validate_full_name(full_name)?;
    }
    if let Some(phone) = &update.phone {
        validate_phone(phone)?;
    }
    Ok(())
}
