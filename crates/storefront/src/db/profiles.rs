//! Profile repository for database operations.
//!
//! Provides database access for shopper profiles, their password hashes,
//! and the server-assigned role consumed by the admin route guard.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bramble_core::{Email, Role, UserId};

use super::RepositoryError;
use crate::models::Profile;
use crate::services::authz::RoleStore;

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` profile queries.
#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: i32,
    email: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = RepositoryError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let role = Role::from_str(&row.role)
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid role in database: {e}")))?;

        Ok(Self {
            id: UserId::new(row.id),
            email,
            role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for profile database operations.
pub struct ProfileRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProfileRepository<'a> {
    /// Create a new profile repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a profile by its email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email or role
    /// is invalid.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<Profile>, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT id, email, role, created_at, updated_at
             FROM profiles WHERE email = $1",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(Profile::try_from).transpose()
    }

    /// Get a profile together with its password hash, for login verification.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(Profile, String)>, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct AuthRow {
            id: i32,
            email: String,
            role: String,
            password_hash: String,
            created_at: DateTime<Utc>,
            updated_at: DateTime<Utc>,
        }

        let row = sqlx::query_as::<_, AuthRow>(
            "SELECT id, email, role, password_hash, created_at, updated_at
             FROM profiles WHERE email = $1",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(r) => {
                let hash = r.password_hash;
                let profile = Profile::try_from(ProfileRow {
                    id: r.id,
                    email: r.email,
                    role: r.role,
                    created_at: r.created_at,
                    updated_at: r.updated_at,
                })?;
                Ok(Some((profile, hash)))
            }
            None => Ok(None),
        }
    }

    /// Create a new profile with email and password hash.
    ///
    /// The role column defaults to `user`; there is no way to register as
    /// anything else.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        email: &Email,
        password_hash: &str,
    ) -> Result<Profile, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "INSERT INTO profiles (email, password_hash)
             VALUES ($1, $2)
             RETURNING id, email, role, created_at, updated_at",
        )
        .bind(email.as_str())
        .bind(password_hash)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("email already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        row.try_into()
    }

    /// Look up the role assigned to a profile.
    ///
    /// At most one row matches; a missing profile yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored role does not
    /// parse; the admin guard treats that the same as a failed lookup.
    pub async fn get_role(&self, user_id: UserId) -> Result<Option<Role>, RepositoryError> {
        let role: Option<String> =
            sqlx::query_scalar("SELECT role FROM profiles WHERE id = $1")
                .bind(user_id.as_i32())
                .fetch_optional(self.pool)
                .await?;

        role.map(|r| {
            Role::from_str(&r).map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid role in database: {e}"))
            })
        })
        .transpose()
    }

    /// Count registered profiles.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_all(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

impl RoleStore for ProfileRepository<'_> {
    async fn fetch_role(&self, user_id: UserId) -> Result<Option<Role>, RepositoryError> {
        self.get_role(user_id).await
    }
}
