//! Login, registration and profile endpoints.
//!
//! Request types validate their input on construction, so anything that
//! reaches the wire already has a well-formed email and a long enough
//! password.

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use tienda_core::{Email, UserProfile};

use super::{ApiClient, ApiError};
use crate::error::{MIN_PASSWORD_LENGTH, ValidationError};

/// Check a password against the backend's minimum length.
///
/// # Errors
///
/// Returns `ValidationError::WeakPassword` for passwords that are too short.
pub fn validate_password(password: &SecretString) -> Result<(), ValidationError> {
    if password.expose_secret().chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::WeakPassword);
    }
    Ok(())
}

fn required(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required(field));
    }
    Ok(value.to_string())
}

fn optional(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(String::from)
}

/// A new customer account.
#[derive(Debug)]
pub struct Registration {
    pub name: String,
    pub email: Email,
    password: SecretString,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl Registration {
    /// Validate the sign-up form.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for a blank name, malformed email or short
    /// password.
    pub fn new(
        name: &str,
        email: &str,
        password: SecretString,
        phone: Option<&str>,
        address: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let name = required(name, "name")?;
        let email = Email::parse(email)?;
        validate_password(&password)?;

        Ok(Self {
            name,
            email,
            password,
            phone: optional(phone),
            address: optional(address),
        })
    }
}

/// Editable profile fields (`PUT /profile`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "telefono")]
    pub phone: Option<String>,
    #[serde(rename = "direccion")]
    pub address: Option<String>,
}

impl ProfileUpdate {
    /// # Errors
    ///
    /// Returns `ValidationError::Required` if the name is blank.
    pub fn new(
        name: &str,
        phone: Option<&str>,
        address: Option<&str>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            name: required(name, "name")?,
            phone: optional(phone),
            address: optional(address),
        })
    }
}

/// A password change request (`PUT /profile/password`).
#[derive(Debug)]
pub struct PasswordChange {
    current: SecretString,
    new: SecretString,
}

impl PasswordChange {
    /// Validate the change-password form.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if a field is blank, the new password is too
    /// short, or the confirmation does not match.
    pub fn new(
        current: SecretString,
        new: SecretString,
        confirmation: &SecretString,
    ) -> Result<Self, ValidationError> {
        if current.expose_secret().is_empty() {
            return Err(ValidationError::Required("current password"));
        }
        validate_password(&new)?;
        if new.expose_secret() != confirmation.expose_secret() {
            return Err(ValidationError::PasswordMismatch);
        }
        Ok(Self { current, new })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    user: UserProfile,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: String,
}

impl ApiClient {
    /// Exchange credentials for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` for wrong credentials, or another
    /// error if the request fails or no token comes back.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &Email, password: &SecretString) -> Result<SecretString, ApiError> {
        let url = self.endpoint("auth/login")?;
        let body = json!({
            "correo": email.as_str(),
            "contraseña": password.expose_secret(),
        });

        let response: TokenResponse = self
            .send_json(self.request(Method::POST, url, None).json(&body))
            .await?;

        response
            .token
            .filter(|t| !t.is_empty())
            .map(SecretString::from)
            .ok_or_else(|| ApiError::Parse("login response has no token".to_string()))
    }

    /// Resolve the token to its user (`GET /auth/me`).
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` if the token is no longer valid.
    #[instrument(skip_all)]
    pub async fn me(&self, token: &SecretString) -> Result<UserProfile, ApiError> {
        let url = self.endpoint("auth/me")?;
        let response: UserResponse = self
            .send_json(self.request(Method::GET, url, Some(token)))
            .await?;
        Ok(response.user)
    }

    /// Create an account. Returns the backend's confirmation message.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails (e.g. email already taken).
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: &Registration) -> Result<String, ApiError> {
        let url = self.endpoint("users/register")?;
        let body = json!({
            "nombre": registration.name,
            "correo": registration.email.as_str(),
            "contraseña": registration.password.expose_secret(),
            "telefono": registration.phone,
            "direccion": registration.address,
        });

        let response: MessageResponse = self
            .send_json(self.request(Method::POST, url, None).json(&body))
            .await?;
        Ok(response.message)
    }

    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip_all)]
    pub async fn profile(&self, token: &SecretString) -> Result<UserProfile, ApiError> {
        let url = self.endpoint("profile")?;
        let response: UserResponse = self
            .send_json(self.request(Method::GET, url, Some(token)))
            .await?;
        Ok(response.user)
    }

    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip_all)]
    pub async fn update_profile(
        &self,
        token: &SecretString,
        update: &ProfileUpdate,
    ) -> Result<(), ApiError> {
        let url = self.endpoint("profile")?;
        self.send_unit(self.request(Method::PUT, url, Some(token)).json(update))
            .await
    }

    /// Change the password. Returns the backend's confirmation message.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails (e.g. wrong current password).
    #[instrument(skip_all)]
    pub async fn change_password(
        &self,
        token: &SecretString,
        change: &PasswordChange,
    ) -> Result<String, ApiError> {
        let url = self.endpoint("profile/password")?;
        let body = json!({
            "contraseñaActual": change.current.expose_secret(),
            "nuevaContraseña": change.new.expose_secret(),
        });

        let response: MessageResponse = self
            .send_json(self.request(Method::PUT, url, Some(token)).json(&body))
            .await?;
        Ok(response.message)
    }
}
