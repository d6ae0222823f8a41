//! Form payloads and their validation.
//!
//! Each form has a plain `validate_*` function returning the field-level errors
//! that the page shows next to the offending inputs. Checks that need the
//! database (uniqueness, account existence) are added by the handlers.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::pictures;

pub const PASSWORD_SPECIALS: &str = "!@#$%¨&*()";

pub const PASSWORD_RULES: &str = "Password field must have at least 6 characters including at least \
one digit, one lowercase letter, one capital letter, and one special character (!, @, #, $, %, ¨, &, *, (, ))";

pub const USERNAME_TAKEN: &str = "This username is taken. Please choose another one.";
pub const EMAIL_TAKEN: &str = "This email is taken. Please choose another one.";
pub const NO_SUCH_ACCOUNT: &str = "There is no account with that email. Please register first.";

pub const USERNAME_CHARSET: &str =
    "Username may only contain letters, numbers, dots, dashes and underscores.";

const REQUIRED: &str = "This field is required.";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, field: &str) -> bool {
        !self.get(field).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    /// Checkbox: present ("on") when ticked.
    pub remember: Option<String>,
}

impl LoginForm {
    pub fn remember(&self) -> bool {
        self.remember.is_some()
    }
}

#[derive(Debug, Default, Clone)]
pub struct AccountForm {
    pub username: String,
    pub email: String,
    /// Original file name and contents of an uploaded picture.
    pub picture: Option<(String, Vec<u8>)>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PostForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RequestResetForm {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ResetPasswordForm {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles");
    }
    EMAIL_RE.is_match(email)
}

/// At least 6 characters with an ASCII digit, an ASCII lowercase letter, an ASCII
/// uppercase letter and one of [`PASSWORD_SPECIALS`].
pub fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= 6
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(c))
}

/// Usernames end up in `/user/<name>` links, so they stay within URL-safe ASCII.
pub fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex =
            Regex::new(r"^[A-Za-z0-9_.-]+$").expect("username pattern compiles");
    }
    USERNAME_RE.is_match(username)
}

fn check_username(errors: &mut FieldErrors, username: &str) {
    let len = username.chars().count();
    if username.is_empty() {
        errors.add("username", REQUIRED);
    } else if !(2..=20).contains(&len) {
        errors.add("username", "Field must be between 2 and 20 characters long.");
    } else if !is_valid_username(username) {
        errors.add("username", USERNAME_CHARSET);
    }
}

fn check_email(errors: &mut FieldErrors, email: &str) {
    if email.is_empty() {
        errors.add("email", REQUIRED);
    } else if !is_valid_email(email) {
        errors.add("email", "Invalid email address.");
    }
}

fn check_new_password(errors: &mut FieldErrors, password: &str, confirm: &str) {
    if password.is_empty() {
        errors.add("password", REQUIRED);
    } else if !is_strong_password(password) {
        errors.add("password", PASSWORD_RULES);
    }
    if password != confirm {
        errors.add("confirm_password", "Field must be equal to password.");
    }
}

pub fn validate_registration(form: &RegistrationForm) -> FieldErrors {
    let mut errors = FieldErrors::new();
    check_username(&mut errors, &form.username);
    check_email(&mut errors, &form.email);
    check_new_password(&mut errors, &form.password, &form.confirm_password);
    errors
}

pub fn validate_login(form: &LoginForm) -> FieldErrors {
    let mut errors = FieldErrors::new();
    check_email(&mut errors, &form.email);
    if form.password.is_empty() {
        errors.add("password", REQUIRED);
    } else if form.password.chars().count() < 6 {
        errors.add("password", "Field must be at least 6 characters long.");
    }
    errors
}

pub fn validate_account(form: &AccountForm) -> FieldErrors {
    let mut errors = FieldErrors::new();
    check_username(&mut errors, &form.username);
    check_email(&mut errors, &form.email);
    if let Some((name, _)) = &form.picture {
        if pictures::allowed_extension(name).is_none() {
            errors.add(
                "picture",
                format!(
                    "We only accept images with the following file extensions: {}",
                    pictures::ALLOWED_EXTENSIONS.join(", ")
                ),
            );
        }
    }
    errors
}

pub fn validate_post(form: &PostForm) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if form.title.trim().is_empty() {
        errors.add("title", REQUIRED);
    } else if form.title.chars().count() > 100 {
        errors.add("title", "Field cannot be longer than 100 characters.");
    }
    if form.content.trim().is_empty() {
        errors.add("content", REQUIRED);
    }
    errors
}

pub fn validate_reset_request(form: &RequestResetForm) -> FieldErrors {
    let mut errors = FieldErrors::new();
    check_email(&mut errors, &form.email);
    errors
}

pub fn validate_reset_password(form: &ResetPasswordForm) -> FieldErrors {
    let mut errors = FieldErrors::new();
    check_new_password(&mut errors, &form.password, &form.confirm_password);
    errors
}
