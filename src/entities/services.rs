use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "services")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    /// Lowercased title, matched by title-prefix dedup.
    pub title_folded: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    /// JSON array of lowercase keywords.
    #[sea_orm(column_type = "Text")]
    pub keywords: String,
    /// Lowercased title, description and keywords, matched by text search.
    #[sea_orm(column_type = "Text")]
    pub search_text: String,
    pub category_id: i32,
    pub price_tier: String,
    pub location: Option<String>,
    pub rating: f64,
    pub relevance: Option<f64>,
    pub premium_only: bool,
    /// External identity of records ingested from the remote search service.
    #[sea_orm(unique)]
    pub source_url: Option<String>,
    pub verified: bool,
    pub contact_info: Option<String>,
    pub image_url: Option<String>,
    pub featured: bool,
    pub view_count: i64,
    pub last_scraped: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Categories,
    #[sea_orm(has_many = "super::payments::Entity")]
    Payments,
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Categories.def()
    }
}

impl Related<super::payments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
