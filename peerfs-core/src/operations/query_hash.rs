use crate::{Catalog, ContentHash, Result};
use std::sync::Arc;

#[derive(Clone)]
pub struct QueryHashOperation {
    catalog: Arc<Catalog>,
}

#[derive(Debug, Clone)]
pub struct QueryHashOperationRequest {
    pub content_hash: ContentHash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryHashOperationOutcome {
    Exists,
    NotFound,
}

impl QueryHashOperation {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub async fn run(&self, request: QueryHashOperationRequest) -> Result<QueryHashOperationOutcome> {
        if self.catalog.exists_by_hash(&request.content_hash)? {
            Ok(QueryHashOperationOutcome::Exists)
        } else {
            Ok(QueryHashOperationOutcome::NotFound)
        }
    }
}
