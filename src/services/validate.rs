//! Field checks shared by sign-up and the admin forms
//!
//! Limits match the column sizes in `migrations/0001_init.sql`, so a value
//! accepted here fits both backends. Lengths are counted in characters.

use std::ops::RangeInclusive;

use crate::error::{AppError, AppResult};

pub const USERNAME_LEN: RangeInclusive<usize> = 3..=20;
pub const EMAIL_MAX_LEN: usize = 120;
pub const TITLE_MAX_LEN: usize = 200;
pub const DIRECTOR_MAX_LEN: usize = 100;
pub const POSTER_URL_MAX_LEN: usize = 500;
pub const GENRE_NAME_MAX_LEN: usize = 50;

/// Stored form of an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn username(username: &str) -> AppResult<()> {
    if !USERNAME_LEN.contains(&username.chars().count()) {
        return Err(AppError::InvalidInput(format!(
            "username must be {} to {} characters",
            USERNAME_LEN.start(),
            USERNAME_LEN.end()
        )));
    }
    Ok(())
}

pub fn email(email: &str) -> AppResult<()> {
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(AppError::InvalidInput("email address is invalid".to_string()));
    }
    max_len("email", email, EMAIL_MAX_LEN)
}

pub fn max_len(field: &str, value: &str, max: usize) -> AppResult<()> {
    if value.chars().count() > max {
        return Err(AppError::InvalidInput(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}
