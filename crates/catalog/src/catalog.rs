//! Catalog loading and lookup.

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, warn};

use entitlekit_core::{EntitlementError, EntitlementResult, ProductId};

use crate::product::{Product, ProductKind};

/// External catalog lookup (store backend, local configuration file, ...).
///
/// Given product identifiers, returns whichever of them the backend knows.
/// Identifiers it does not know are simply absent from the result.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn products(&self, ids: &[ProductId]) -> EntitlementResult<Vec<Product>>;
}

/// Immutable, per-kind view of the fetched products.
///
/// Products keep the order the source returned them in. Products of kind
/// [`ProductKind::Other`] are not tracked and are left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    consumables: Vec<Product>,
    non_consumables: Vec<Product>,
    auto_renewables: Vec<Product>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Group products by kind.
    pub fn from_products(products: impl IntoIterator<Item = Product>) -> Self {
        let mut catalog = Self::empty();
        for product in products {
            match product.kind {
                ProductKind::Consumable => catalog.consumables.push(product),
                ProductKind::NonConsumable => catalog.non_consumables.push(product),
                ProductKind::AutoRenewable => catalog.auto_renewables.push(product),
                ProductKind::Other => {
                    warn!(product_id = %product.id, "unknown product kind; not tracked");
                }
            }
        }
        catalog
    }

    /// Fetch the catalog once from `source`.
    ///
    /// A failed lookup is logged and yields an empty catalog; it is not retried.
    pub async fn fetch(source: &dyn CatalogSource, ids: &[ProductId]) -> Self {
        match source.products(ids).await {
            Ok(products) => {
                let catalog = Self::from_products(products);
                let missing: Vec<&ProductId> =
                    ids.iter().filter(|id| catalog.get(id).is_none()).collect();
                if !missing.is_empty() {
                    debug!(?missing, "catalog source did not return every requested product");
                }
                catalog
            }
            Err(err) => {
                warn!(error = %err, "catalog fetch failed; catalog left empty");
                Self::empty()
            }
        }
    }

    pub fn consumables(&self) -> &[Product] {
        &self.consumables
    }

    pub fn non_consumables(&self) -> &[Product] {
        &self.non_consumables
    }

    pub fn auto_renewables(&self) -> &[Product] {
        &self.auto_renewables
    }

    pub fn of_kind(&self, kind: ProductKind) -> &[Product] {
        match kind {
            ProductKind::Consumable => &self.consumables,
            ProductKind::NonConsumable => &self.non_consumables,
            ProductKind::AutoRenewable => &self.auto_renewables,
            ProductKind::Other => &[],
        }
    }

    /// Look a product up within a single kind.
    pub fn find(&self, kind: ProductKind, id: &ProductId) -> Option<&Product> {
        self.of_kind(kind).iter().find(|p| &p.id == id)
    }

    /// Look a product up across all kinds.
    pub fn get(&self, id: &ProductId) -> Option<&Product> {
        self.consumables
            .iter()
            .chain(&self.non_consumables)
            .chain(&self.auto_renewables)
            .find(|p| &p.id == id)
    }

    pub fn len(&self) -> usize {
        self.consumables.len() + self.non_consumables.len() + self.auto_renewables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory catalog source for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCatalogSource {
    products: Vec<Product>,
    failure: Mutex<Option<String>>,
}

impl InMemoryCatalogSource {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products,
            failure: Mutex::new(None),
        }
    }

    /// Make subsequent lookups fail with `reason`.
    pub fn fail_with(&self, reason: impl Into<String>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(reason.into());
        }
    }
}

#[async_trait]
impl CatalogSource for InMemoryCatalogSource {
    async fn products(&self, ids: &[ProductId]) -> EntitlementResult<Vec<Product>> {
        if let Some(reason) = self.failure.lock().ok().and_then(|f| f.clone()) {
            return Err(EntitlementError::catalog_fetch(reason));
        }
        Ok(self
            .products
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }
}
