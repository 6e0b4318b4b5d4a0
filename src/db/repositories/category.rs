use anyhow::{Context, Result};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entities::{categories, prelude::*};
use crate::models::category::{Category, CategoryInput, slugify};

/// Slug of the category seeded by the initial migration.
pub const DEFAULT_CATEGORY_SLUG: &str = "other";

impl From<categories::Model> for Category {
    fn from(model: categories::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            slug: model.slug,
            description: model.description,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

pub struct CategoryRepository {
    conn: DatabaseConnection,
}

impl CategoryRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(&self) -> Result<Vec<Category>> {
        let rows = Categories::find()
            .order_by_asc(categories::Column::Name)
            .all(&self.conn)
            .await
            .context("Failed to list categories")?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    pub async fn get(&self, id: i32) -> Result<Option<Category>> {
        let row = Categories::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query category by ID")?;
        Ok(row.map(Category::from))
    }

    /// Case-insensitive lookup by name or slug.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Category>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        let row = Categories::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(categories::Column::Name)))
                    .eq(name.to_lowercase())
                    .or(categories::Column::Slug.eq(slugify(name))),
            )
            .one(&self.conn)
            .await?;
        Ok(row.map(Category::from))
    }

    pub async fn get_default(&self) -> Result<Option<Category>> {
        let row = Categories::find()
            .filter(categories::Column::Slug.eq(DEFAULT_CATEGORY_SLUG))
            .one(&self.conn)
            .await?;
        Ok(row.map(Category::from))
    }

    pub async fn create(&self, input: &CategoryInput) -> Result<Category> {
        let now = chrono::Utc::now().to_rfc3339();
        let name = input.name.trim();

        let model = categories::ActiveModel {
            name: Set(name.to_string()),
            slug: Set(slugify(name)),
            description: Set(input.description.clone()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert category")?;

        Ok(model.into())
    }

    pub async fn update(&self, id: i32, input: &CategoryInput) -> Result<Option<Category>> {
        let Some(existing) = Categories::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };

        let name = input.name.trim();
        let mut active: categories::ActiveModel = existing.into();
        active.name = Set(name.to_string());
        active.slug = Set(slugify(name));
        active.description = Set(input.description.clone());
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update category")?;
        Ok(Some(model.into()))
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = Categories::delete_by_id(id).exec(&self.conn).await?;
        Ok(result.rows_affected > 0)
    }
}
