use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, DatabaseConnection, DbErr, Set};

use super::{AuditEntry, AuditSink};
use crate::{entity::audit_logs::ActiveModel as AuditActive, state::AppState};

pub struct DbAuditSink {
    orm: DatabaseConnection,
}

impl DbAuditSink {
    pub fn new(orm: DatabaseConnection) -> Self {
        Self { orm }
    }
}

#[async_trait]
impl AuditSink for DbAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), DbErr> {
        AuditActive {
            id: NotSet,
            actor_id: Set(entry.actor_id),
            action: Set(entry.action.to_string()),
            target_type: Set(entry.target_type.to_string()),
            target_id: Set(entry.target_id),
            outcome: Set(entry.outcome.to_string()),
            metadata: Set(entry.metadata),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.orm)
        .await?;
        Ok(())
    }
}

/// Hands the entry to the audit sink without waiting on it.
pub fn log_audit(state: &AppState, entry: AuditEntry) {
    let sink = state.audit.clone();
    tokio::spawn(async move {
        let action = entry.action;
        if let Err(err) = sink.record(entry).await {
            tracing::warn!(error = %err, action, "audit log failed");
        }
    });
}
