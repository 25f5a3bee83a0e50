use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, NotSet, Set};

use crate::entities::document_uploads;

pub use crate::entities::document_uploads::Model as DocumentRecord;

/// Input for one upload audit entry.
#[derive(Debug)]
pub struct NewDocument {
    pub original_filename: String,
    pub storage_key: String,
    pub url: String,
    pub uploaded_by: i32,
}

pub struct DocumentRepository {
    conn: DatabaseConnection,
}

impl DocumentRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&self, new_document: NewDocument) -> Result<DocumentRecord> {
        let active = document_uploads::ActiveModel {
            id: NotSet,
            original_filename: Set(new_document.original_filename),
            storage_key: Set(new_document.storage_key),
            url: Set(new_document.url),
            uploaded_at: Set(chrono::Utc::now().to_rfc3339()),
            uploaded_by: Set(new_document.uploaded_by),
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to record document upload")
    }

    pub async fn get(&self, id: i32) -> Result<Option<DocumentRecord>> {
        document_uploads::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query document upload by ID")
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = document_uploads::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete document upload")?;

        Ok(result.rows_affected > 0)
    }
}
