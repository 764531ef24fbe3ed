//! Audit trail recorder. Invoked after every workflow state transition;
//! recording is best-effort and never fails the calling operation.

use sqlx::{query, query_as, PgPool};
use uuid::Uuid;

use crate::middleware::error_handling::Result;
use crate::models::activity::{ActivityEntry, ActivityLog};

pub struct ActivityLogService {
    pool: PgPool,
}

impl ActivityLogService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, entry: ActivityEntry) {
        if let Err(e) = self.insert(&entry).await {
            tracing::warn!(
                "Failed to record activity '{}' for org {}: {}",
                entry.activity_type,
                entry.organization_id,
                e
            );
        }
    }

    async fn insert(&self, entry: &ActivityEntry) -> Result<()> {
        query(
            r#"
            INSERT INTO activity_logs
                (organization_id, activity_type, title, description, entity_type,
                 entity_id, actor_id, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.organization_id)
        .bind(&entry.activity_type)
        .bind(&entry.title)
        .bind(&entry.description)
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(entry.actor_id)
        .bind(&entry.metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_for_entity(
        &self,
        organization_id: Uuid,
        entity_type: &str,
        entity_id: Uuid,
    ) -> Result<Vec<ActivityLog>> {
        let entries = query_as::<_, ActivityLog>(
            r#"
            SELECT * FROM activity_logs
            WHERE organization_id = $1 AND entity_type = $2 AND entity_id = $3
            ORDER BY created_at DESC
            LIMIT 200
            "#,
        )
        .bind(organization_id)
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}
