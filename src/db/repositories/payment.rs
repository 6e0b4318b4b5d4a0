use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use crate::entities::{payments, prelude::*};
use crate::models::account::{PaymentStatus, Transaction};

impl From<payments::Model> for Transaction {
    fn from(model: payments::Model) -> Self {
        Self {
            id: model.id,
            service_id: model.service_id,
            amount_cents: model.amount_cents,
            status: PaymentStatus::parse(&model.status),
            created_at: model.created_at,
            completed_at: model.completed_at,
        }
    }
}

pub struct PaymentRepository {
    conn: DatabaseConnection,
}

impl PaymentRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Records a settled payment.
    pub async fn complete(
        &self,
        user_id: i32,
        service_id: i32,
        amount_cents: i64,
    ) -> Result<Transaction> {
        let now = chrono::Utc::now().to_rfc3339();
        let model = payments::ActiveModel {
            user_id: Set(user_id),
            service_id: Set(service_id),
            amount_cents: Set(amount_cents),
            status: Set(PaymentStatus::Completed.as_str().to_string()),
            created_at: Set(now.clone()),
            completed_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to record payment")?;

        Ok(model.into())
    }

    pub async fn list_for_user(&self, user_id: i32) -> Result<Vec<Transaction>> {
        let rows = Payments::find()
            .filter(payments::Column::UserId.eq(user_id))
            .order_by_desc(payments::Column::CreatedAt)
            .order_by_desc(payments::Column::Id)
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().map(Transaction::from).collect())
    }

    /// Which of `service_ids` the user has a completed payment for.
    pub async fn paid_service_ids(&self, user_id: i32, service_ids: &[i32]) -> Result<Vec<i32>> {
        if service_ids.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<i32> = Payments::find()
            .select_only()
            .column(payments::Column::ServiceId)
            .filter(payments::Column::UserId.eq(user_id))
            .filter(payments::Column::Status.eq(PaymentStatus::Completed.as_str()))
            .filter(payments::Column::ServiceId.is_in(service_ids.iter().copied()))
            .distinct()
            .into_tuple()
            .all(&self.conn)
            .await?;

        Ok(ids)
    }
}
