//! Profile domain types.

use chrono::{DateTime, Utc};

use bramble_core::{Email, Role, UserId};

/// A registered shopper profile.
///
/// The profile owns the server-assigned [`Role`]; a freshly registered
/// profile always carries [`Role::User`].
#[derive(Debug, Clone)]
pub struct Profile {
    /// Unique profile ID.
    pub id: UserId,
    /// Profile's email address.
    pub email: Email,
    /// Server-assigned authorization role.
    pub role: Role,
    /// When the profile was created.
    pub created_at: DateTime<Utc>,
    /// When the profile was last updated.
    pub updated_at: DateTime<Utc>,
}
