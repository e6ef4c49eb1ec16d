//! In-process metadata store.

use super::{CredentialStore, MetadataStore};
use crate::error::AppError;
use crate::models::{Credential, FileRecord, User};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// Metadata store backed by concurrent hash maps. Contents are lost on exit.
#[derive(Clone, Default)]
pub struct MemoryDb {
    users: Arc<DashMap<String, User>>,
    files: Arc<DashMap<String, FileRecord>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryDb {
    async fn load_credential(&self, user_id: &str) -> Result<Option<Credential>, AppError> {
        Ok(self.users.get(user_id).map(|u| u.credential.clone()))
    }

    async fn save_credential(
        &self,
        user_id: &str,
        credential: &Credential,
    ) -> Result<(), AppError> {
        let mut user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;
        user.credential = credential.clone();
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for MemoryDb {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.get(user_id).map(|u| u.clone()))
    }

    async fn find_user_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .iter()
            .find(|u| u.external_id == external_id)
            .map(|u| u.clone()))
    }

    async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn get_file(&self, file_id: &str) -> Result<Option<FileRecord>, AppError> {
        Ok(self.files.get(file_id).map(|f| f.clone()))
    }

    async fn list_files_for_owner(&self, owner_id: &str) -> Result<Vec<FileRecord>, AppError> {
        let mut records: Vec<FileRecord> = self
            .files
            .iter()
            .filter(|f| f.owner_id == owner_id)
            .map(|f| f.clone())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn insert_file(&self, record: &FileRecord) -> Result<(), AppError> {
        self.files.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), AppError> {
        self.files.remove(file_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(id: &str) -> User {
        User {
            id: id.to_string(),
            external_id: format!("google-{}", id),
            email: Some("test@example.com".to_string()),
            display_name: Some("Test User".to_string()),
            credential: Credential {
                access_token: "A1".to_string(),
                refresh_token: Some("R1".to_string()),
                expiry: None,
            },
            created_at: "2026-01-15T10:00:00Z".to_string(),
            last_login: "2026-01-15T10:00:00Z".to_string(),
        }
    }

    fn test_record(id: &str, owner: &str, created_at: &str) -> FileRecord {
        FileRecord {
            id: id.to_string(),
            owner_id: owner.to_string(),
            remote_id: format!("drive-{}", id),
            display_name: Some("a.txt".to_string()),
            original_name: Some("a.txt".to_string()),
            size_bytes: 3,
            mime_type: Some("text/plain".to_string()),
            view_link: None,
            download_link: None,
            created_at: created_at.to_string(),
        }
    }

    #[tokio::test]
    async fn test_credential_roundtrip_through_user() {
        let db = MemoryDb::new();
        db.upsert_user(&test_user("u1")).await.unwrap();

        let mut credential = db.load_credential("u1").await.unwrap().unwrap();
        credential.access_token = "A2".to_string();
        db.save_credential("u1", &credential).await.unwrap();

        let user = db.get_user("u1").await.unwrap().unwrap();
        assert_eq!(user.credential.access_token, "A2");
        assert_eq!(user.email.as_deref(), Some("test@example.com"));
    }

    #[tokio::test]
    async fn test_save_credential_for_unknown_user_fails() {
        let db = MemoryDb::new();
        let result = db.save_credential("nobody", &Credential::default()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_find_by_external_id() {
        let db = MemoryDb::new();
        db.upsert_user(&test_user("u1")).await.unwrap();

        let found = db.find_user_by_external_id("google-u1").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some("u1".to_string()));
        assert!(db
            .find_user_by_external_id("google-u2")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_list_files_newest_first_and_owner_scoped() {
        let db = MemoryDb::new();
        db.insert_file(&test_record("f1", "u1", "2026-01-01T00:00:00Z"))
            .await
            .unwrap();
        db.insert_file(&test_record("f2", "u1", "2026-02-01T00:00:00Z"))
            .await
            .unwrap();
        db.insert_file(&test_record("f3", "u2", "2026-03-01T00:00:00Z"))
            .await
            .unwrap();

        let ids: Vec<String> = db
            .list_files_for_owner("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec!["f2".to_string(), "f1".to_string()]);

        db.delete_file("f2").await.unwrap();
        assert!(db.get_file("f2").await.unwrap().is_none());
    }
}
