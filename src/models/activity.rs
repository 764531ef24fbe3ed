use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActivityLog {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub activity_type: String,
    pub title: String,
    pub description: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Payload for one audit entry. Recording is best-effort: a failed insert
/// logs a warning and never fails the calling operation.
#[derive(Debug, Clone)]
pub struct ActivityEntry {
    pub organization_id: Uuid,
    pub activity_type: String,
    pub title: String,
    pub description: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
}

impl ActivityEntry {
    pub fn new(organization_id: Uuid, activity_type: &str, title: impl Into<String>) -> Self {
        Self {
            organization_id,
            activity_type: activity_type.to_string(),
            title: title.into(),
            description: None,
            entity_type: None,
            entity_id: None,
            actor_id: None,
            metadata: None,
        }
    }

    pub fn entity(mut self, entity_type: &str, entity_id: Uuid) -> Self {
        self.entity_type = Some(entity_type.to_string());
        self.entity_id = Some(entity_id);
        self
    }

    pub fn actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
