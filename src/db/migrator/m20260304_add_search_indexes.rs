use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_services_category_id")
                    .table(Services::Table)
                    .col(Services::CategoryId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_services_featured_rating")
                    .table(Services::Table)
                    .col(Services::Featured)
                    .col(Services::Rating)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payments_user_service")
                    .table(Payments::Table)
                    .col(Payments::UserId)
                    .col(Payments::ServiceId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_services_category_id")
                    .table(Services::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_services_featured_rating")
                    .table(Services::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_payments_user_service")
                    .table(Payments::Table)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Services {
    Table,
    CategoryId,
    Featured,
    Rating,
}

#[derive(DeriveIden)]
enum Payments {
    Table,
    UserId,
    ServiceId,
}
