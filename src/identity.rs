//! Identity resolution seam.
//!
//! Session issuance and authorization policy live outside this crate; the
//! engine only needs a way to turn caller credentials into an actor id.

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use uuid::Uuid;

use crate::storage::database::DatabaseError;

/// Identity resolution errors.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("no resolvable actor identity")]
    Unresolved,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Maps caller credentials to the acting identity.
pub trait IdentityResolver {
    fn resolve(&self, credential: &str) -> Result<Uuid, IdentityError>;
}

/// Resolver backed by the `auth_tokens` table. The surrounding platform
/// writes tokens at session issuance; the engine only reads them.
pub struct TokenResolver<'a> {
    conn: &'a Connection,
}

impl<'a> TokenResolver<'a> {
    /// Create a new token resolver with the given connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Register a token for an actor (used by embedding code and tests).
    pub fn register(&self, token: &str, actor_id: &Uuid) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO auth_tokens (token, actor_id, created_at)
                 VALUES (?1, ?2, datetime('now'))",
                params![token, actor_id.to_string()],
            )
            .map_err(DatabaseError::from_sqlite)?;
        Ok(())
    }
}

impl IdentityResolver for TokenResolver<'_> {
    fn resolve(&self, credential: &str) -> Result<Uuid, IdentityError> {
        let actor: Option<String> = self
            .conn
            .query_row(
                "SELECT actor_id FROM auth_tokens WHERE token = ?1",
                params![credential],
                |row| row.get(0),
            )
            .optional()
            .map_err(DatabaseError::from_sqlite)?;

        let raw = actor.ok_or(IdentityError::Unresolved)?;
        Uuid::parse_str(&raw).map_err(|_| IdentityError::Unresolved)
    }
}
