//! The `Store` trait — spec.md §4.7: the contract every backend (embedded
//! SQL, networked SQL, document store) implements identically.

use async_trait::async_trait;
use deployd_core::{Document, EngineError};

use crate::filter::{FindOptions, Filter, UpdateSpec};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteResult {
    pub deleted: u64,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert(&self, document: Document) -> Result<Document, EngineError>;
    async fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<Document>, EngineError>;
    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, EngineError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Document>, EngineError> {
        self.find_one(&Filter::new().eq("id", deployd_core::Value::from(id))).await
    }
    async fn update(&self, filter: &Filter, update: &UpdateSpec) -> Result<UpdateResult, EngineError>;
    async fn update_one(&self, filter: &Filter, update: &UpdateSpec) -> Result<UpdateResult, EngineError>;
    async fn remove(&self, filter: &Filter) -> Result<DeleteResult, EngineError>;
    async fn count(&self, filter: &Filter) -> Result<u64, EngineError>;
    fn create_unique_identifier(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
