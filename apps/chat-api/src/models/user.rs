use serde::{Deserialize, Serialize};

/// Role assigned to a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Member,
    Admin,
}

/// An authenticated user, as resolved by the session layer at upgrade time.
///
/// The fields are fixed for the lifetime of a connection; profile edits only
/// take effect on the next connect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Display name shown as `sender_username` in message previews.
    pub username: String,
    pub role: UserRole,
    pub is_active: bool,
}
