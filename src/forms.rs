//! Sign-in / sign-up form: schema per mode, submit state, and the view the
//! client renders from it.
//!
//! Each mode has its own schema type, so a validated sign-up always carries a
//! full name and a validated sign-in never needs one.

use crate::backend::IdentityProvider;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

pub const GENERIC_AUTH_ERROR: &str = "failed to create account. please try again.";

const FULL_NAME_MIN: usize = 2;
const FULL_NAME_MAX: usize = 50;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_'+\-\.]*[A-Za-z0-9_+\-]@([A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$")
        .expect("valid email regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    SignIn,
    SignUp,
}

impl AuthMode {
    pub fn title(self) -> &'static str {
        match self {
            AuthMode::SignIn => "Sign-in",
            AuthMode::SignUp => "Sign-up",
        }
    }

    pub fn other(self) -> Self {
        match self {
            AuthMode::SignIn => AuthMode::SignUp,
            AuthMode::SignUp => AuthMode::SignIn,
        }
    }

    pub fn href(self) -> &'static str {
        match self {
            AuthMode::SignIn => "/sign-in",
            AuthMode::SignUp => "/sign-up",
        }
    }
}

/// Raw values as typed into the form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthFormValues {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FormField {
    Email,
    FullName,
}

/// Per-field messages, shown inline next to each input.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<FormField, String>);

impl FieldErrors {
    fn add(&mut self, field: FormField, msg: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| msg.into());
    }

    #[cfg(test)]
    pub fn get(&self, field: FormField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Full name is optional when signing in and is not carried past validation.
#[derive(Debug, Clone, PartialEq)]
pub struct SignInForm {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignUpForm {
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedForm {
    SignIn(SignInForm),
    SignUp(SignUpForm),
}

impl ValidatedForm {
    pub fn email(&self) -> &str {
        match self {
            ValidatedForm::SignIn(f) => &f.email,
            ValidatedForm::SignUp(f) => &f.email,
        }
    }
}

/// `regex` has no lookaround, so leading and doubled dots are checked by hand.
fn check_email(email: &str, errors: &mut FieldErrors) {
    if email.starts_with('.') || email.contains("..") || !EMAIL_RE.is_match(email) {
        errors.add(FormField::Email, "Invalid email");
    }
}

/// Validates against the schema for `mode`.
pub fn validate(mode: AuthMode, values: &AuthFormValues) -> Result<ValidatedForm, FieldErrors> {
    let mut errors = FieldErrors::default();
    check_email(&values.email, &mut errors);

    let form = match mode {
        AuthMode::SignIn => ValidatedForm::SignIn(SignInForm { email: values.email.clone() }),
        AuthMode::SignUp => {
            let full_name = values.full_name.clone().unwrap_or_default();
            match values.full_name.as_deref().map(|n| n.chars().count()) {
                None => errors.add(FormField::FullName, "Required"),
                Some(n) if n < FULL_NAME_MIN => errors.add(
                    FormField::FullName,
                    format!("String must contain at least {FULL_NAME_MIN} character(s)"),
                ),
                Some(n) if n > FULL_NAME_MAX => errors.add(
                    FormField::FullName,
                    format!("String must contain at most {FULL_NAME_MAX} character(s)"),
                ),
                Some(_) => {}
            }
            ValidatedForm::SignUp(SignUpForm { full_name, email: values.email.clone() })
        }
    };

    if errors.is_empty() { Ok(form) } else { Err(errors) }
}

/// Handed to the OTP step once an account id is known.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpPrompt {
    pub email: String,
    pub account_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeToggle {
    pub prompt: &'static str,
    pub label: &'static str,
    pub href: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthFormView {
    pub mode: AuthMode,
    pub title: &'static str,
    pub is_loading: bool,
    pub error_message: Option<String>,
    pub otp: Option<OtpPrompt>,
    pub toggle: ModeToggle,
}

/// Submit state for one form instance.
#[derive(Debug)]
pub struct AuthFormController {
    mode: AuthMode,
    is_loading: bool,
    error_message: Option<String>,
    account_id: Option<String>,
    email: String,
}

impl AuthFormController {
    pub fn new(mode: AuthMode) -> Self {
        Self { mode, is_loading: false, error_message: None, account_id: None, email: String::new() }
    }

    #[cfg(test)]
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    #[cfg(test)]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    #[cfg(test)]
    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    pub fn validate(&self, values: &AuthFormValues) -> Result<ValidatedForm, FieldErrors> {
        validate(self.mode, values)
    }

    /// Creates the account or starts sign-in. Failures are logged and replaced
    /// by [`GENERIC_AUTH_ERROR`]; nothing is retried.
    pub async fn submit(&mut self, form: ValidatedForm, identity: &dyn IdentityProvider) {
        self.is_loading = true;
        self.error_message = None;
        self.email = form.email().to_string();

        let result = match &form {
            ValidatedForm::SignUp(f) => identity.create_account(&f.full_name, &f.email).await,
            ValidatedForm::SignIn(f) => identity.sign_in_user(&f.email).await,
        };
        match result {
            Ok(account) => self.account_id = Some(account.account_id),
            Err(e) => {
                log::error!("{} failed for {}: {e}", self.mode.title(), self.email);
                self.error_message = Some(GENERIC_AUTH_ERROR.to_string());
            }
        }
        self.is_loading = false;
    }

    pub fn otp_prompt(&self) -> Option<OtpPrompt> {
        self.account_id.as_ref().map(|account_id| OtpPrompt {
            email: self.email.clone(),
            account_id: account_id.clone(),
        })
    }

    pub fn view(&self) -> AuthFormView {
        let other = self.mode.other();
        let prompt = match self.mode {
            AuthMode::SignIn => "Don't have an account ? ",
            AuthMode::SignUp => "Already have an account ",
        };
        AuthFormView {
            mode: self.mode,
            title: self.mode.title(),
            is_loading: self.is_loading,
            error_message: self.error_message.clone(),
            otp: self.otp_prompt(),
            toggle: ModeToggle { prompt, label: other.title(), href: other.href() },
        }
    }
}
