// Password hashing and the account credential policy.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use std::sync::OnceLock;

use crate::error::{AppError, Result};

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_USERNAME_LENGTH: usize = 150;

const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password123",
    "12345678",
    "123456789",
    "1234567890",
    "qwerty123",
    "qwertyuiop",
    "iloveyou",
    "sunshine",
    "princess",
    "football",
    "baseball",
    "welcome1",
    "letmein1",
    "abc12345",
    "admin123",
    "trustno1",
];

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| AppError::Internal("Failed to hash password".to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Runs a full verification against a throwaway hash so failed lookups of
/// unknown usernames cost as much as a wrong password.
pub fn verify_unknown_user(password: &str) {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();
    let hash = DUMMY_HASH.get_or_init(|| hash_password("no such user, no such password").ok());
    if let Some(hash) = hash {
        let _ = verify_password(password, hash);
    }
}

pub fn username_problems(username: &str) -> Vec<String> {
    let mut problems = Vec::new();
    if username.is_empty() {
        problems.push("This field is required.".to_string());
    } else {
        if username.chars().count() > MAX_USERNAME_LENGTH {
            problems.push(format!(
                "Ensure this value has at most {MAX_USERNAME_LENGTH} characters."
            ));
        }
        if !username
            .chars()
            .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
        {
            problems.push(
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                    .to_string(),
            );
        }
    }
    problems
}

pub fn password_problems(username: &str, password: &str) -> Vec<String> {
    let mut problems = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push(format!(
            "This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."
        ));
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.".to_string());
    }
    let lowered = password.to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        problems.push("This password is too common.".to_string());
    }
    if is_similar(username, password) {
        problems.push("The password is too similar to the username.".to_string());
    }
    problems
}

fn is_similar(username: &str, password: &str) -> bool {
    let username = username.to_lowercase();
    let password = password.to_lowercase();
    if username.len() < 3 || password.is_empty() {
        return false;
    }
    password.contains(&username) || username.contains(&password)
}
