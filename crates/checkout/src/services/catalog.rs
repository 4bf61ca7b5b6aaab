//! Authoritative product catalog.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::ProductId;
use domain::CatalogEntry;

use super::lock;
use crate::error::CollaboratorError;

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Entries for the requested products; unknown ids are simply absent.
    async fn lookup(
        &self,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, CatalogEntry>, CollaboratorError>;
}

#[derive(Debug, Default)]
struct CatalogState {
    entries: HashMap<ProductId, CatalogEntry>,
    offline: bool,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryProductCatalog {
    state: Arc<Mutex<CatalogState>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let catalog = Self::new();
        for entry in entries {
            catalog.insert(entry);
        }
        catalog
    }

    pub fn insert(&self, entry: CatalogEntry) {
        lock(&self.state).entries.insert(entry.product_id, entry);
    }

    pub fn set_available(&self, product_id: ProductId, available: bool) {
        if let Some(entry) = lock(&self.state).entries.get_mut(&product_id) {
            entry.available = available;
        }
    }

    /// Makes every lookup fail as if the catalog service were down.
    pub fn set_offline(&self, offline: bool) {
        lock(&self.state).offline = offline;
    }

    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn lookup(
        &self,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, CatalogEntry>, CollaboratorError> {
        let state = lock(&self.state);
        if state.offline {
            return Err(CollaboratorError::Unavailable {
                service: "catalog",
                reason: "service offline".into(),
            });
        }
        Ok(product_ids
            .iter()
            .filter_map(|id| state.entries.get(id).map(|e| (*id, e.clone())))
            .collect())
    }
}
