use crate::identity::account::Account;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("account not found")]
    NotFound,
    #[error("email already registered")]
    EmailTaken,
    #[error("row already in the requested state")]
    Conflict,
    #[error("invalid role name: {0}")]
    InvalidRole(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Capability set the identity core requires from persistence. Single
/// calls are atomic; confirmation state and token always move together.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Account, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Account, StoreError>;
    async fn insert(&self, account: &Account) -> Result<(), StoreError>;
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError>;
    /// Compare-and-set on the confirmation flag. `Conflict` means the
    /// row was already in the requested state, so two concurrent
    /// confirmations cannot both report success.
    async fn update_confirmation(
        &self,
        id: Uuid,
        confirmed: bool,
        token: Option<&str>,
    ) -> Result<(), StoreError>;
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn valid_role_name(role: &str) -> bool {
    !role.is_empty()
        && role
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !role.starts_with(|c: char| c.is_ascii_digit())
}

/// Postgres-backed credential store, owning the `auth` schema.
#[derive(Clone, Debug)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `auth` schema, the users table, the PostgREST roles
    /// and the `current_user_id()` helper if they do not exist yet.
    ///
    /// Role names cannot be bound as parameters, so they are validated
    /// before being spliced into the statement.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid role names or any database failure.
    pub async fn ensure_schema(
        &self,
        role_anonymous: &str,
        role_user: &str,
    ) -> Result<(), StoreError> {
        for role in [role_anonymous, role_user] {
            if !valid_role_name(role) {
                return Err(StoreError::InvalidRole(role.to_string()));
            }
        }

        let sql = format!(
            r"
            CREATE SCHEMA IF NOT EXISTS auth;
            CREATE TABLE IF NOT EXISTS auth.users (
                id uuid PRIMARY KEY NOT NULL,
                email text UNIQUE NOT NULL,
                password text NOT NULL,
                confirmed boolean NOT NULL DEFAULT FALSE,
                confirm_token text DEFAULT NULL
            );
            DO
            $body$
            BEGIN
            IF NOT EXISTS (SELECT FROM pg_roles WHERE rolname = '{role_anonymous}') THEN
                CREATE ROLE {role_anonymous} NOLOGIN;
            END IF;
            END
            $body$;
            DO
            $body$
            BEGIN
            IF NOT EXISTS (SELECT FROM pg_roles WHERE rolname = '{role_user}') THEN
                CREATE ROLE {role_user} NOLOGIN;
            END IF;
            END
            $body$;
            GRANT USAGE ON SCHEMA auth TO {role_anonymous}, {role_user};

            CREATE OR REPLACE FUNCTION auth.current_user_id() RETURNS uuid
            LANGUAGE plpgsql
            AS $$
            BEGIN
                RETURN current_setting('request.jwt.claim.userid', true)::uuid;
            EXCEPTION
                WHEN undefined_object THEN RETURN NULL;
            END;
            $$;
            GRANT EXECUTE ON FUNCTION auth.current_user_id() TO {role_user};
            "
        );

        sqlx::raw_sql(&sql).execute(&self.pool).await?;

        Ok(())
    }
}

fn account_from_row(row: &sqlx::postgres::PgRow) -> Account {
    Account {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password"),
        confirmed: row.get("confirmed"),
        confirmation_token: row.get("confirm_token"),
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Account, StoreError> {
        let row = sqlx::query(
            "SELECT id, email, password, confirmed, confirm_token FROM auth.users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Database(other),
        })?;

        Ok(account_from_row(&row))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Account, StoreError> {
        let row = sqlx::query(
            "SELECT id, email, password, confirmed, confirm_token FROM auth.users WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Database(other),
        })?;

        Ok(account_from_row(&row))
    }

    async fn insert(&self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO auth.users (id, email, password, confirmed, confirm_token) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(account.id)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.confirmed)
        .bind(account.confirmation_token.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                StoreError::EmailTaken
            } else {
                StoreError::Database(err)
            }
        })?;

        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE auth.users SET password = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn update_confirmation(
        &self,
        id: Uuid,
        confirmed: bool,
        token: Option<&str>,
    ) -> Result<(), StoreError> {
        // the guard makes the flip atomic; a zero row count covers both
        // a missing row and a flag already in the requested state
        let result = sqlx::query(
            "UPDATE auth.users SET confirmed = $1, confirm_token = $2 \
             WHERE id = $3 AND confirmed IS DISTINCT FROM $1",
        )
        .bind(confirmed)
        .bind(token)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }

        Ok(())
    }
}

/// In-memory credential store for tests and local development.
#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Account, StoreError> {
        let accounts = self.accounts.read().await;
        accounts
            .values()
            .find(|account| account.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Account, StoreError> {
        let accounts = self.accounts.read().await;
        accounts.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn insert(&self, account: &Account) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        if accounts.values().any(|other| other.email == account.email) {
            return Err(StoreError::EmailTaken);
        }
        accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn update_confirmation(
        &self,
        id: Uuid,
        confirmed: bool,
        token: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        if account.confirmed == confirmed {
            return Err(StoreError::Conflict);
        }
        account.confirmed = confirmed;
        account.confirmation_token = token.map(str::to_string);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_name_validation() {
        assert!(valid_role_name("normal_user"));
        assert!(valid_role_name("anonymous"));
        assert!(!valid_role_name(""));
        assert!(!valid_role_name("1user"));
        assert!(!valid_role_name("user; DROP TABLE auth.users"));
        assert!(!valid_role_name("User"));
    }

    #[tokio::test]
    async fn memory_store_rejects_duplicate_email() {
        let store = MemoryStore::new();
        let account = Account::new("a@example.com", "hash".to_string());
        store.insert(&account).await.unwrap();

        let duplicate = Account::new("a@example.com", "hash".to_string());
        assert!(matches!(
            store.insert(&duplicate).await,
            Err(StoreError::EmailTaken)
        ));
    }

    #[tokio::test]
    async fn memory_store_clears_confirmation_token() {
        let store = MemoryStore::new();
        let account = Account::new("a@example.com", "hash".to_string());
        store.insert(&account).await.unwrap();

        store
            .update_confirmation(account.id, true, None)
            .await
            .unwrap();

        let fetched = store.find_by_id(account.id).await.unwrap();
        assert!(fetched.confirmed);
        assert!(fetched.confirmation_token.is_none());
    }

    #[tokio::test]
    async fn memory_store_confirmation_flips_at_most_once() {
        let store = MemoryStore::new();
        let account = Account::new("a@example.com", "hash".to_string());
        store.insert(&account).await.unwrap();

        store
            .update_confirmation(account.id, true, None)
            .await
            .unwrap();

        // the flag is already set, a second writer must not win
        assert!(matches!(
            store.update_confirmation(account.id, true, None).await,
            Err(StoreError::Conflict)
        ));

        let fetched = store.find_by_id(account.id).await.unwrap();
        assert!(fetched.confirmed);
    }

    #[tokio::test]
    async fn memory_store_missing_rows() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.find_by_email("nobody@example.com").await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.update_password(Uuid::new_v4(), "hash").await,
            Err(StoreError::NotFound)
        ));
    }
}
