//! Signed-in user profile.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::UserId;

/// Role name the backend assigns to administrators.
pub const ADMIN_ROLE: &str = "administrador";

/// The profile returned by `/auth/me` and `/profile`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "correo")]
    pub email: Email,
    #[serde(rename = "telefono", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "direccion", default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(rename = "rol", default)]
    pub role: String,
    #[serde(rename = "fechaRegistro", default, skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Whether the backend granted this user the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}
