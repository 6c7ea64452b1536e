use crate::resource::types::resource::{NewResource, Resource, ResourceFilter, ResourceId};
use crate::resource::util::handler::ResourceStore;
use crate::shared::handlers::postgres_handler::classify;
use crate::shared::util::clean_html::escape_text;
use crate::shared::util::config;
use crate::shared::util::handler::StoreError;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgRow};

fn row_to_resource(row: &PgRow) -> Result<Resource, sqlx::Error> {
    Ok(Resource {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        resource_type: row.try_get("resource_type")?,
        subject: row.try_get("subject")?,
        age_group: row.try_get("age_group")?,
        rating: row.try_get("rating")?,
        description: row.try_get("description")?,
        event_date: row.try_get::<NaiveDate, &str>("event_date")?,
        image_url: row.try_get("image_url")?,
        is_approved: row.try_get("is_approved")?,
        owner_user_id: row.try_get("owner_user_id")?,
        created: row.try_get::<chrono::DateTime<Utc>, &str>("created")?,
        edited: row.try_get::<chrono::DateTime<Utc>, &str>("edited")?
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

    // Called on first launch for setup, after the users table exists
    pub async fn init(&self) -> Result<(), sqlx::Error> {
        sqlx::query(r#"CREATE TABLE IF NOT EXISTS resources (
            id SERIAL PRIMARY KEY,
            title text NOT NULL CHECK(length(btrim(title)) > 0 and length(title) <= 200),
            resource_type text NOT NULL CHECK(length(btrim(resource_type)) > 0 and length(resource_type) <= 100),
            subject text NOT NULL CHECK(length(btrim(subject)) > 0 and length(subject) <= 100),
            age_group text NOT NULL CHECK(length(btrim(age_group)) > 0 and length(age_group) <= 100),
            rating smallint NOT NULL CHECK(rating >= 1 and rating <= 5),
            description text NOT NULL CHECK(length(btrim(description)) > 0),
            event_date date NOT NULL,
            image_url text CHECK(length(image_url) <= 2048),
            is_approved boolean NOT NULL DEFAULT false,
            owner_user_id integer REFERENCES users(id),
            created timestamptz NOT NULL,
            edited timestamptz NOT NULL
        );"#).execute(&self.pool).await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS resources_approved_idx ON resources(is_approved, event_date);")
            .execute(&self.pool).await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS resources_owner_idx ON resources(owner_user_id);")
            .execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for PostgresHandler {
    async fn get_resource(&self, id: ResourceId) -> Result<Option<Resource>, StoreError> {
        let row = sqlx::query("SELECT * FROM resources WHERE id = $1;")
            .bind(id).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(row_to_resource).transpose()?)
    }

    async fn find_resources(&self, filter: &ResourceFilter) -> Result<Vec<Resource>, StoreError> {
        let rows = sqlx::query(r#"SELECT * FROM resources WHERE
                ($1::boolean is null or is_approved = $1) and
                ($2::integer is null or owner_user_id = $2) and
                ($3::text is null or resource_type = $3) and
                ($4::text is null or subject = $4) and
                ($5::text is null or age_group = $5) and
                ($6::date is null or event_date >= $6) and
                ($7::date is null or event_date <= $7) and
                ($8::text is null or strpos(lower(title), lower($8)) > 0
                    or strpos(lower(description), lower($11::text)) > 0)
            ORDER BY event_date DESC, id DESC OFFSET $9 LIMIT $10;"#)
            .bind(filter.approved)
            .bind(filter.owner)
            .bind(&filter.resource_type)
            .bind(&filter.subject)
            .bind(&filter.age_group)
            .bind(filter.event_from)
            .bind(filter.event_to)
            .bind(&filter.query)
            .bind(filter.offset as i64)
            .bind(filter.limit.map(|l| l as i64))
            .bind(filter.query.as_deref().map(escape_text))
            .fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_resource).collect::<Result<Vec<_>, _>>()?)
    }

    async fn create_resource(&self, resource: &NewResource) -> Result<Resource, StoreError> {
        let now = Utc::now();
        let d = &resource.draft;
        let row = sqlx::query(r#"INSERT INTO resources(title, resource_type, subject, age_group, rating,
                description, event_date, image_url, is_approved, owner_user_id, created, edited)
            VALUES($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11) RETURNING *;"#)
            .bind(&d.title).bind(&d.resource_type).bind(&d.subject).bind(&d.age_group)
            .bind(d.rating).bind(&d.description).bind(d.event_date).bind(&d.image_url)
            .bind(resource.is_approved).bind(resource.owner_user_id).bind(now)
            .fetch_one(&self.pool).await.map_err(classify)?;
        Ok(row_to_resource(&row)?)
    }

    async fn update_resource(&self, r: &Resource) -> Result<Resource, StoreError> {
        let row = sqlx::query(r#"UPDATE resources SET title = $2, resource_type = $3, subject = $4,
                age_group = $5, rating = $6, description = $7, event_date = $8, image_url = $9,
                is_approved = $10, edited = $11
            WHERE id = $1 RETURNING *;"#)
            .bind(r.id).bind(&r.title).bind(&r.resource_type).bind(&r.subject).bind(&r.age_group)
            .bind(r.rating).bind(&r.description).bind(r.event_date).bind(&r.image_url)
            .bind(r.is_approved).bind(r.edited)
            .fetch_optional(&self.pool).await.map_err(classify)?;
        match row {
            Some(row) => Ok(row_to_resource(&row)?),
            None => Err(StoreError::NotFound)
        }
    }

    async fn set_resource_approval(&self, id: ResourceId, approved: bool) -> Result<Resource, StoreError> {
        let row = sqlx::query("UPDATE resources SET is_approved = $2 WHERE id = $1 RETURNING *;")
            .bind(id).bind(approved)
            .fetch_optional(&self.pool).await?;
        match row {
            Some(row) => Ok(row_to_resource(&row)?),
            None => Err(StoreError::NotFound)
        }
    }

    async fn delete_resource(&self, id: ResourceId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM resources WHERE id = $1;")
            .bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_pending_resource(&self, id: ResourceId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM resources WHERE id = $1 AND is_approved = false;")
            .bind(id).execute(&self.pool).await?;
        if result.rows_affected() > 0 {
            return Ok(true);
        }
        match self.get_resource(id).await? {
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound)
        }
    }
}
