//! Database layer.
//!
//! The services only see the [`MetadataStore`] and [`CredentialStore`]
//! traits. [`FirestoreDb`] backs production; [`MemoryDb`] backs local runs
//! without a GCP project and the test suite.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{Credential, FileRecord, User};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const FILES: &str = "files";
}

/// Durable per-user credential storage.
///
/// Writes are full read-modify-write with no concurrency check; the last
/// writer wins.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load_credential(&self, user_id: &str) -> Result<Option<Credential>, AppError>;

    async fn save_credential(&self, user_id: &str, credential: &Credential)
        -> Result<(), AppError>;
}

/// Users and file records.
#[async_trait]
pub trait MetadataStore: CredentialStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError>;

    async fn find_user_by_external_id(&self, external_id: &str)
        -> Result<Option<User>, AppError>;

    async fn upsert_user(&self, user: &User) -> Result<(), AppError>;

    async fn get_file(&self, file_id: &str) -> Result<Option<FileRecord>, AppError>;

    /// Records owned by `owner_id`, newest first.
    async fn list_files_for_owner(&self, owner_id: &str) -> Result<Vec<FileRecord>, AppError>;

    async fn insert_file(&self, record: &FileRecord) -> Result<(), AppError>;

    async fn delete_file(&self, file_id: &str) -> Result<(), AppError>;
}
