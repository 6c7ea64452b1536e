use crate::shared::util::config;
use crate::shared::util::handler::{StoreError, UserStore};
use crate::shared::types::account::{NewUser, ProviderProfile, Role, User, UserFilter, UserId};

use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::{PgRow, PgPool};

/// Sort database failures into the store error kinds callers care about
pub(crate) fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let constraint = db_err.constraint().unwrap_or("unknown").to_string();
        if db_err.is_unique_violation() {
            return StoreError::Conflict(format!("{constraint} already exists"));
        }
        if db_err.is_check_violation() {
            return StoreError::Constraint { field: constraint, message: db_err.message().to_string() };
        }
        if db_err.is_foreign_key_violation() {
            return StoreError::Constraint { field: constraint, message: "referenced record does not exist".to_string() };
        }
    }
    StoreError::Database(err)
}

fn row_to_user(row: &PgRow) -> Result<User, StoreError> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        external_id: row.try_get("external_id")?,
        email: row.try_get("email")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        role: role.parse().map_err(|message| StoreError::Constraint { field: "role".to_string(), message })?,
        is_approved: row.try_get("is_approved")?
    })
}

#[derive(Clone)]
pub struct PostgresHandler {
    pool: PgPool
}

impl PostgresHandler {
    pub async fn new() -> Result<PostgresHandler, sqlx::Error> {
        Ok(PostgresHandler { pool: config::get_pool().await? })
    }

    pub fn with_pool(pool: PgPool) -> PostgresHandler {
        PostgresHandler { pool }
    }

    // Called on first launch for setup
    pub async fn init(&self) -> Result<(), sqlx::Error> {
        sqlx::query(r#"
        CREATE TABLE IF NOT EXISTS users (
            id SERIAL PRIMARY KEY,
            external_id text NOT NULL UNIQUE CHECK(length(external_id) > 0 and length(external_id) < 256),
            email text NOT NULL UNIQUE CHECK(length(email) > 0 and length(email) < 320),
            first_name text CHECK(length(first_name) < 256),
            last_name text CHECK(length(last_name) < 256),
            role text NOT NULL DEFAULT 'user' CHECK(role IN ('user', 'admin', 'superAdmin')),
            is_approved boolean NOT NULL DEFAULT false
        );"#).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for PostgresHandler {
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1;")
            .bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_user_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE external_id = $1;")
            .bind(external_id).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query("SELECT * FROM users WHERE
                ($1::text is null or role = $1) and
                ($2::boolean is null or is_approved = $2)
            ORDER BY id ASC;")
            .bind(filter.role.map(|r| r.as_str()))
            .bind(filter.approved)
            .fetch_all(&self.pool).await?;
        rows.iter().map(row_to_user).collect()
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let row = sqlx::query(r#"INSERT INTO users(external_id, email, first_name, last_name, role, is_approved)
            VALUES($1, $2, $3, $4, $5, $6) RETURNING *;"#)
            .bind(&user.external_id).bind(&user.email)
            .bind(&user.first_name).bind(&user.last_name)
            .bind(user.role.as_str()).bind(user.is_approved)
            .fetch_one(&self.pool).await.map_err(classify)?;
        row_to_user(&row)
    }

    async fn upsert_provider_user(&self, profile: &ProviderProfile) -> Result<User, StoreError> {
        let row = sqlx::query(r#"INSERT INTO users(external_id, email, first_name, last_name)
            VALUES($1, $2, $3, $4)
            ON CONFLICT (external_id) DO UPDATE SET
                email = EXCLUDED.email, first_name = EXCLUDED.first_name, last_name = EXCLUDED.last_name
            RETURNING *;"#)
            .bind(&profile.external_id).bind(&profile.email)
            .bind(&profile.first_name).bind(&profile.last_name)
            .fetch_one(&self.pool).await.map_err(classify)?;
        row_to_user(&row)
    }

    async fn set_role(&self, id: UserId, role: Role) -> Result<User, StoreError> {
        let row = sqlx::query("UPDATE users SET role = $2 WHERE id = $1 RETURNING *;")
            .bind(id).bind(role.as_str())
            .fetch_optional(&self.pool).await.map_err(classify)?;
        row.as_ref().map(row_to_user).transpose()?.ok_or(StoreError::NotFound)
    }

    async fn set_approved(&self, id: UserId, approved: bool) -> Result<User, StoreError> {
        let row = sqlx::query("UPDATE users SET is_approved = $2 WHERE id = $1 RETURNING *;")
            .bind(id).bind(approved)
            .fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_user).transpose()?.ok_or(StoreError::NotFound)
    }

    async fn delete_user(&self, id: UserId) -> Result<(), StoreError> {
        // Approved resources outlive their creator as unowned content, pending
        // ones go with them since unowned content counts as approved
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM resources WHERE owner_user_id = $1 AND is_approved = false;")
            .bind(id).execute(&mut *tx).await?;
        sqlx::query("UPDATE resources SET owner_user_id = NULL WHERE owner_user_id = $1;")
            .bind(id).execute(&mut *tx).await?;
        let result = sqlx::query("DELETE FROM users WHERE id = $1;")
            .bind(id).execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::NotFound);
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_user_by_external_id(&self, external_id: &str) -> Result<bool, StoreError> {
        let user = match self.get_user_by_external_id(external_id).await? {
            Some(user) => user,
            None => return Ok(false)
        };
        self.delete_user(user.id).await?;
        Ok(true)
    }
}
