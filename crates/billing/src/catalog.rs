//! Catalog lookup.

use common::ItemId;
use serde::{Deserialize, Serialize};
use store::{Item, ItemRepository};

use crate::error::BillingError;

/// How a request line refers to a catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemRef {
    Sku(String),
    Id(ItemId),
}

impl std::fmt::Display for ItemRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemRef::Sku(sku) => write!(f, "SKU {sku}"),
            ItemRef::Id(id) => write!(f, "id {id}"),
        }
    }
}

impl From<&str> for ItemRef {
    fn from(sku: &str) -> Self {
        ItemRef::Sku(sku.to_string())
    }
}

impl From<ItemId> for ItemRef {
    fn from(id: ItemId) -> Self {
        ItemRef::Id(id)
    }
}

/// Resolves item references against an [`ItemRepository`].
///
/// Missing items become [`BillingError::ItemNotFound`]; repository failures
/// become [`BillingError::Persistence`].
pub struct Catalog<'a, R: ?Sized> {
    items: &'a R,
}

impl<'a, R: ItemRepository + ?Sized> Catalog<'a, R> {
    pub fn new(items: &'a R) -> Self {
        Self { items }
    }

    pub async fn by_sku(&self, sku: &str) -> Result<Item, BillingError> {
        self.items
            .item_by_sku(sku)
            .await
            .map_err(BillingError::persistence("failed to look up item"))?
            .ok_or_else(|| BillingError::ItemNotFound(ItemRef::Sku(sku.to_string())))
    }

    pub async fn by_id(&self, id: ItemId) -> Result<Item, BillingError> {
        self.items
            .item_by_id(id)
            .await
            .map_err(BillingError::persistence("failed to look up item"))?
            .ok_or(BillingError::ItemNotFound(ItemRef::Id(id)))
    }

    pub async fn resolve(&self, item: &ItemRef) -> Result<Item, BillingError> {
        match item {
            ItemRef::Sku(sku) => self.by_sku(sku).await,
            ItemRef::Id(id) => self.by_id(*id).await,
        }
    }
}
