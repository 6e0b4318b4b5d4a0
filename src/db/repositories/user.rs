use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tracing::warn;

use crate::entities::users;
use crate::models::account::{RecentSearch, UserProfile};

/// User row without the API key.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub verified: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            verified: model.verified,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            verified: user.verified,
            created_at: user.created_at,
        }
    }
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_api_key(&self, api_key: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::ApiKey.eq(api_key))
            .one(&self.conn)
            .await
            .context("Failed to query user by API key")?;

        Ok(user.map(User::from))
    }

    /// Creates a user and returns it together with its freshly generated API key.
    pub async fn create(&self, username: &str, verified: bool) -> Result<(User, String)> {
        let now = chrono::Utc::now().to_rfc3339();
        let api_key = uuid::Uuid::new_v4().simple().to_string();

        let model = users::ActiveModel {
            username: Set(username.trim().to_string()),
            api_key: Set(api_key.clone()),
            verified: Set(verified),
            recent_searches: Set("[]".to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to create user")?;

        Ok((User::from(model), api_key))
    }

    pub async fn set_verified(&self, id: i32, verified: bool) -> Result<bool> {
        let Some(user) = users::Entity::find_by_id(id).one(&self.conn).await? else {
            return Ok(false);
        };

        let mut active: users::ActiveModel = user.into();
        active.verified = Set(verified);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(&self.conn).await?;
        Ok(true)
    }

    /// Stored history, most recent first. A corrupt column reads as empty.
    pub async fn recent_searches(&self, id: i32) -> Result<Option<Vec<RecentSearch>>> {
        let Some(user) = users::Entity::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };

        let history = serde_json::from_str(&user.recent_searches).unwrap_or_else(|e| {
            warn!(user_id = id, error = %e, "Discarding unreadable search history");
            Vec::new()
        });
        Ok(Some(history))
    }

    pub async fn save_recent_searches(&self, id: i32, history: &[RecentSearch]) -> Result<bool> {
        let Some(user) = users::Entity::find_by_id(id).one(&self.conn).await? else {
            return Ok(false);
        };

        let mut active: users::ActiveModel = user.into();
        active.recent_searches = Set(serde_json::to_string(history)?);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active
            .update(&self.conn)
            .await
            .context("Failed to save search history")?;
        Ok(true)
    }
}
