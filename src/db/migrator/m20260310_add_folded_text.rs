use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{ActiveModelTrait, EntityTrait, Set};

use crate::db::repositories::service::{fold_search_text, fold_title};
use crate::entities::services;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut added = false;

        if !manager.has_column("services", "title_folded").await? {
            manager
                .alter_table(
                    Table::alter()
                        .table(Services::Table)
                        .add_column(
                            ColumnDef::new(Services::TitleFolded)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .to_owned(),
                )
                .await?;
            added = true;
        }

        if !manager.has_column("services", "search_text").await? {
            manager
                .alter_table(
                    Table::alter()
                        .table(Services::Table)
                        .add_column(
                            ColumnDef::new(Services::SearchText)
                                .text()
                                .not_null()
                                .default(""),
                        )
                        .to_owned(),
                )
                .await?;
            added = true;
        }

        if !added {
            return Ok(());
        }

        // Rows written before the columns existed
        let db = manager.get_connection();
        for model in services::Entity::find().all(db).await? {
            let keywords: Vec<String> = serde_json::from_str(&model.keywords).unwrap_or_default();
            let title_folded = fold_title(&model.title);
            let search_text = fold_search_text(&model.title, &model.description, &keywords);

            let mut active: services::ActiveModel = model.into();
            active.title_folded = Set(title_folded);
            active.search_text = Set(search_text);
            active.update(db).await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (name, column) in [
            ("title_folded", Services::TitleFolded),
            ("search_text", Services::SearchText),
        ] {
            if manager.has_column("services", name).await? {
                manager
                    .alter_table(
                        Table::alter()
                            .table(Services::Table)
                            .drop_column(column)
                            .to_owned(),
                    )
                    .await?;
            }
        }
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Services {
    Table,
    TitleFolded,
    SearchText,
}
