use crate::entities::{categories, prelude::*};
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        // Referenced tables first
        manager
            .create_table(
                schema
                    .create_table_from_entity(Categories)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Users)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Services)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Payments)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Catch-all for remote listings whose category cannot be resolved
        let now = chrono::Utc::now().to_rfc3339();
        let insert = Query::insert()
            .into_table(Categories)
            .columns([
                categories::Column::Name,
                categories::Column::Slug,
                categories::Column::Description,
                categories::Column::CreatedAt,
                categories::Column::UpdatedAt,
            ])
            .values_panic([
                "Other".into(),
                "other".into(),
                "Listings without a more specific category".into(),
                now.clone().into(),
                now.into(),
            ])
            .to_owned();

        manager.exec_stmt(insert).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Payments).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Services).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories).to_owned())
            .await?;

        Ok(())
    }
}
