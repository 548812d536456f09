//! Catalog persistence.
//!
//! Provides the `CatalogStore` trait and its in-memory reference
//! implementation. The trait keeps the engine storage-agnostic: a SQL or
//! KV backend plugs in without touching comparison or recommendation logic.

use chrono::Utc;
use comparekit_model::{
    Feature, FeatureId, FeatureValue, OfferId, Product, ProductId, StoreOffer, WorkspaceId,
};
use std::collections::BTreeMap;
use std::sync::RwLock;
use thiserror::Error;

/// Errors from storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Field set for creating or updating a product row.
#[derive(Debug, Clone, Default)]
pub struct ProductFields {
    pub name: String,
    pub category: Option<String>,
    pub list_price: Option<f64>,
    pub image_url: Option<String>,
}

/// Storage operations consumed by the catalog, comparison, and
/// recommendation layers.
///
/// Ordering contracts: `products_of`, `all_products`, and `features_of`
/// return rows name-ascending (case-insensitive); `latest_two` and
/// `history` return chain entries newest-first.
///
/// `append_value` must be atomic per (product, feature) pair: the
/// read-latest/compute-next-version/insert sequence runs under one lock or
/// transaction so concurrent appends never share a version number.
pub trait CatalogStore {
    // --- products ---

    fn create_product(
        &self,
        workspace: WorkspaceId,
        fields: ProductFields,
    ) -> Result<Product, StoreError>;

    /// Global lookup, used by cross-owner comparison.
    fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Workspace-scoped lookup: a product owned elsewhere is not visible.
    fn product_of(
        &self,
        workspace: WorkspaceId,
        id: ProductId,
    ) -> Result<Option<Product>, StoreError>;

    fn products_of(&self, workspace: WorkspaceId) -> Result<Vec<Product>, StoreError>;

    fn all_products(&self) -> Result<Vec<Product>, StoreError>;

    fn update_product(&self, product: &Product) -> Result<(), StoreError>;

    fn delete_product(&self, id: ProductId) -> Result<(), StoreError>;

    // --- features ---

    fn create_feature(
        &self,
        workspace: WorkspaceId,
        name: &str,
        importance: u32,
    ) -> Result<Feature, StoreError>;

    fn feature_of(
        &self,
        workspace: WorkspaceId,
        id: FeatureId,
    ) -> Result<Option<Feature>, StoreError>;

    fn features_of(&self, workspace: WorkspaceId) -> Result<Vec<Feature>, StoreError>;

    /// Case-insensitive name lookup within a workspace.
    fn feature_by_name(
        &self,
        workspace: WorkspaceId,
        name: &str,
    ) -> Result<Option<Feature>, StoreError>;

    fn update_feature(&self, feature: &Feature) -> Result<(), StoreError>;

    fn delete_feature(&self, id: FeatureId) -> Result<(), StoreError>;

    // --- version chains ---

    /// Append one entry to the (product, feature) chain.
    ///
    /// Computes `last version + 1` (1 for an empty chain), stamps the
    /// current time, and returns the new entry together with the
    /// immediately preceding value. Never mutates or removes prior entries.
    fn append_value(
        &self,
        product: ProductId,
        feature: FeatureId,
        value: &str,
    ) -> Result<(FeatureValue, Option<String>), StoreError>;

    /// Up to the two newest entries, newest first. The minimum read needed
    /// to render a cell with a trend.
    fn latest_two(
        &self,
        product: ProductId,
        feature: FeatureId,
    ) -> Result<Vec<FeatureValue>, StoreError>;

    fn history(
        &self,
        product: ProductId,
        feature: FeatureId,
    ) -> Result<Vec<FeatureValue>, StoreError>;

    fn delete_values_for_product(&self, product: ProductId) -> Result<(), StoreError>;

    fn delete_values_for_feature(&self, feature: FeatureId) -> Result<(), StoreError>;

    fn delete_values_for_pair(
        &self,
        product: ProductId,
        feature: FeatureId,
    ) -> Result<(), StoreError>;

    // --- store offers ---

    fn insert_offer(
        &self,
        product: ProductId,
        store_name: &str,
        price: f64,
        buy_link: &str,
    ) -> Result<StoreOffer, StoreError>;

    fn offer_of(
        &self,
        product: ProductId,
        offer: OfferId,
    ) -> Result<Option<StoreOffer>, StoreError>;

    /// Case-insensitive store-name lookup within a product.
    fn offer_by_store(
        &self,
        product: ProductId,
        store_name: &str,
    ) -> Result<Option<StoreOffer>, StoreError>;

    fn offers_of(&self, product: ProductId) -> Result<Vec<StoreOffer>, StoreError>;

    fn update_offer(&self, offer: &StoreOffer) -> Result<(), StoreError>;

    fn delete_offer(&self, offer: OfferId) -> Result<(), StoreError>;

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}

#[derive(Default)]
struct Tables {
    next_id: u64,
    products: BTreeMap<u64, Product>,
    features: BTreeMap<u64, Feature>,
    values: Vec<FeatureValue>,
    offers: BTreeMap<u64, StoreOffer>,
}

impl Tables {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory reference backend.
///
/// All tables sit behind one `RwLock`; `append_value` holds the write guard
/// across the whole read-latest/insert sequence, which is what upholds the
/// version-chain invariant under concurrent writers.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn by_name_asc<T>(mut rows: Vec<T>, name: impl Fn(&T) -> String) -> Vec<T> {
    rows.sort_by_key(|row| {
        let n = name(row);
        (n.to_lowercase(), n)
    });
    rows
}

impl CatalogStore for MemoryStore {
    fn create_product(
        &self,
        workspace: WorkspaceId,
        fields: ProductFields,
    ) -> Result<Product, StoreError> {
        let mut tables = self.write();
        let id = tables.allocate_id();
        let product = Product {
            id: ProductId(id),
            workspace,
            name: fields.name,
            category: fields.category,
            list_price: fields.list_price,
            image_url: fields.image_url,
        };
        tables.products.insert(id, product.clone());
        Ok(product)
    }

    fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.read().products.get(&id.0).cloned())
    }

    fn product_of(
        &self,
        workspace: WorkspaceId,
        id: ProductId,
    ) -> Result<Option<Product>, StoreError> {
        Ok(self
            .read()
            .products
            .get(&id.0)
            .filter(|product| product.workspace == workspace)
            .cloned())
    }

    fn products_of(&self, workspace: WorkspaceId) -> Result<Vec<Product>, StoreError> {
        let rows: Vec<Product> = self
            .read()
            .products
            .values()
            .filter(|product| product.workspace == workspace)
            .cloned()
            .collect();
        Ok(by_name_asc(rows, |product| product.name.clone()))
    }

    fn all_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows: Vec<Product> = self.read().products.values().cloned().collect();
        Ok(by_name_asc(rows, |product| product.name.clone()))
    }

    fn update_product(&self, product: &Product) -> Result<(), StoreError> {
        self.write().products.insert(product.id.0, product.clone());
        Ok(())
    }

    fn delete_product(&self, id: ProductId) -> Result<(), StoreError> {
        self.write().products.remove(&id.0);
        Ok(())
    }

    fn create_feature(
        &self,
        workspace: WorkspaceId,
        name: &str,
        importance: u32,
    ) -> Result<Feature, StoreError> {
        let mut tables = self.write();
        let id = tables.allocate_id();
        let feature = Feature {
            id: FeatureId(id),
            workspace,
            name: name.to_string(),
            importance,
        };
        tables.features.insert(id, feature.clone());
        Ok(feature)
    }

    fn feature_of(
        &self,
        workspace: WorkspaceId,
        id: FeatureId,
    ) -> Result<Option<Feature>, StoreError> {
        Ok(self
            .read()
            .features
            .get(&id.0)
            .filter(|feature| feature.workspace == workspace)
            .cloned())
    }

    fn features_of(&self, workspace: WorkspaceId) -> Result<Vec<Feature>, StoreError> {
        let rows: Vec<Feature> = self
            .read()
            .features
            .values()
            .filter(|feature| feature.workspace == workspace)
            .cloned()
            .collect();
        Ok(by_name_asc(rows, |feature| feature.name.clone()))
    }

    fn feature_by_name(
        &self,
        workspace: WorkspaceId,
        name: &str,
    ) -> Result<Option<Feature>, StoreError> {
        let wanted = name.trim().to_lowercase();
        Ok(self
            .read()
            .features
            .values()
            .find(|feature| {
                feature.workspace == workspace && feature.name.to_lowercase() == wanted
            })
            .cloned())
    }

    fn update_feature(&self, feature: &Feature) -> Result<(), StoreError> {
        self.write().features.insert(feature.id.0, feature.clone());
        Ok(())
    }

    fn delete_feature(&self, id: FeatureId) -> Result<(), StoreError> {
        self.write().features.remove(&id.0);
        Ok(())
    }

    fn append_value(
        &self,
        product: ProductId,
        feature: FeatureId,
        value: &str,
    ) -> Result<(FeatureValue, Option<String>), StoreError> {
        // Write guard held across read-latest and insert: no two appends to
        // the same pair can observe the same latest version.
        let mut tables = self.write();
        let latest = tables
            .values
            .iter()
            .filter(|entry| entry.product == product && entry.feature == feature)
            .max_by_key(|entry| entry.version);

        let next_version = latest.map(|entry| entry.version + 1).unwrap_or(1);
        let previous = latest.map(|entry| entry.value.clone());

        let entry = FeatureValue {
            product,
            feature,
            value: value.to_string(),
            version: next_version,
            updated_at: Utc::now(),
        };
        tables.values.push(entry.clone());

        tracing::debug!(
            product = product.0,
            feature = feature.0,
            version = next_version,
            "appended chain entry"
        );
        Ok((entry, previous))
    }

    fn latest_two(
        &self,
        product: ProductId,
        feature: FeatureId,
    ) -> Result<Vec<FeatureValue>, StoreError> {
        let mut entries = self.history(product, feature)?;
        entries.truncate(2);
        Ok(entries)
    }

    fn history(
        &self,
        product: ProductId,
        feature: FeatureId,
    ) -> Result<Vec<FeatureValue>, StoreError> {
        let mut entries: Vec<FeatureValue> = self
            .read()
            .values
            .iter()
            .filter(|entry| entry.product == product && entry.feature == feature)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(entries)
    }

    fn delete_values_for_product(&self, product: ProductId) -> Result<(), StoreError> {
        self.write().values.retain(|entry| entry.product != product);
        Ok(())
    }

    fn delete_values_for_feature(&self, feature: FeatureId) -> Result<(), StoreError> {
        self.write().values.retain(|entry| entry.feature != feature);
        Ok(())
    }

    fn delete_values_for_pair(
        &self,
        product: ProductId,
        feature: FeatureId,
    ) -> Result<(), StoreError> {
        self.write()
            .values
            .retain(|entry| !(entry.product == product && entry.feature == feature));
        Ok(())
    }

    fn insert_offer(
        &self,
        product: ProductId,
        store_name: &str,
        price: f64,
        buy_link: &str,
    ) -> Result<StoreOffer, StoreError> {
        let mut tables = self.write();
        let id = tables.allocate_id();
        let offer = StoreOffer {
            id: OfferId(id),
            product,
            store_name: store_name.to_string(),
            price,
            buy_link: buy_link.to_string(),
        };
        tables.offers.insert(id, offer.clone());
        Ok(offer)
    }

    fn offer_of(
        &self,
        product: ProductId,
        offer: OfferId,
    ) -> Result<Option<StoreOffer>, StoreError> {
        Ok(self
            .read()
            .offers
            .get(&offer.0)
            .filter(|row| row.product == product)
            .cloned())
    }

    fn offer_by_store(
        &self,
        product: ProductId,
        store_name: &str,
    ) -> Result<Option<StoreOffer>, StoreError> {
        let wanted = store_name.trim().to_lowercase();
        Ok(self
            .read()
            .offers
            .values()
            .find(|offer| offer.product == product && offer.store_name.to_lowercase() == wanted)
            .cloned())
    }

    fn offers_of(&self, product: ProductId) -> Result<Vec<StoreOffer>, StoreError> {
        let rows: Vec<StoreOffer> = self
            .read()
            .offers
            .values()
            .filter(|offer| offer.product == product)
            .cloned()
            .collect();
        Ok(by_name_asc(rows, |offer| offer.store_name.clone()))
    }

    fn update_offer(&self, offer: &StoreOffer) -> Result<(), StoreError> {
        self.write().offers.insert(offer.id.0, offer.clone());
        Ok(())
    }

    fn delete_offer(&self, offer: OfferId) -> Result<(), StoreError> {
        self.write().offers.remove(&offer.0);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (MemoryStore, Product, Feature) {
        let store = MemoryStore::new();
        let workspace = WorkspaceId(1);
        let product = store
            .create_product(
                workspace,
                ProductFields {
                    name: "Phone A".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();
        let feature = store.create_feature(workspace, "RAM", 1).unwrap();
        (store, product, feature)
    }

    #[test]
    fn test_append_versions_are_contiguous_from_one() {
        let (store, product, feature) = seeded();

        for value in ["8 GB", "12 GB", "16 GB"] {
            store.append_value(product.id, feature.id, value).unwrap();
        }

        let history = store.history(product.id, feature.id).unwrap();
        assert_eq!(history.len(), 3);
        let versions: Vec<u32> = history.iter().map(|entry| entry.version).collect();
        assert_eq!(versions, vec![3, 2, 1]);
        assert_eq!(history[0].value, "16 GB");
    }

    #[test]
    fn test_append_returns_previous_value() {
        let (store, product, feature) = seeded();

        let (first, previous) = store.append_value(product.id, feature.id, "8 GB").unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(previous, None);

        let (second, previous) = store.append_value(product.id, feature.id, "12 GB").unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(previous.as_deref(), Some("8 GB"));
    }

    #[test]
    fn test_append_never_mutates_prior_entries() {
        let (store, product, feature) = seeded();
        store.append_value(product.id, feature.id, "8 GB").unwrap();
        store.append_value(product.id, feature.id, "12 GB").unwrap();

        let history = store.history(product.id, feature.id).unwrap();
        let oldest = history.last().unwrap();
        assert_eq!(oldest.version, 1);
        assert_eq!(oldest.value, "8 GB");
    }

    #[test]
    fn test_latest_two_is_newest_first_and_capped() {
        let (store, product, feature) = seeded();
        for value in ["a", "b", "c"] {
            store.append_value(product.id, feature.id, value).unwrap();
        }

        let latest = store.latest_two(product.id, feature.id).unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].value, "c");
        assert_eq!(latest[1].value, "b");
    }

    #[test]
    fn test_chains_are_isolated_per_pair() {
        let (store, product, feature) = seeded();
        let other = store.create_feature(WorkspaceId(1), "Battery", 1).unwrap();

        store.append_value(product.id, feature.id, "8 GB").unwrap();
        store.append_value(product.id, other.id, "4000 mAh").unwrap();

        assert_eq!(store.history(product.id, feature.id).unwrap().len(), 1);
        assert_eq!(store.history(product.id, other.id).unwrap().len(), 1);
        assert_eq!(
            store.history(product.id, other.id).unwrap()[0].version,
            1
        );
    }

    #[test]
    fn test_delete_values_for_pair() {
        let (store, product, feature) = seeded();
        let other = store.create_feature(WorkspaceId(1), "Battery", 1).unwrap();
        store.append_value(product.id, feature.id, "8 GB").unwrap();
        store.append_value(product.id, other.id, "4000 mAh").unwrap();

        store.delete_values_for_pair(product.id, feature.id).unwrap();

        assert!(store.history(product.id, feature.id).unwrap().is_empty());
        assert_eq!(store.history(product.id, other.id).unwrap().len(), 1);
    }

    #[test]
    fn test_workspace_scoped_lookup_hides_foreign_rows() {
        let (store, product, _) = seeded();
        assert!(store.product_of(WorkspaceId(1), product.id).unwrap().is_some());
        assert!(store.product_of(WorkspaceId(2), product.id).unwrap().is_none());
    }

    #[test]
    fn test_products_sorted_by_name() {
        let store = MemoryStore::new();
        let workspace = WorkspaceId(1);
        for name in ["zephyr", "Alpha", "beta"] {
            store
                .create_product(
                    workspace,
                    ProductFields {
                        name: name.to_string(),
                        ..Default::default()
                    },
                )
                .unwrap();
        }

        let names: Vec<String> = store
            .products_of(workspace)
            .unwrap()
            .into_iter()
            .map(|product| product.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "beta", "zephyr"]);
    }

    #[test]
    fn test_feature_by_name_is_case_insensitive() {
        let (store, _, feature) = seeded();
        let found = store.feature_by_name(WorkspaceId(1), "  ram ").unwrap();
        assert_eq!(found.map(|f| f.id), Some(feature.id));
    }

    #[test]
    fn test_offer_by_store_is_case_insensitive() {
        let (store, product, _) = seeded();
        store
            .insert_offer(product.id, "Amazon", 699.0, "https://amazon.example/p")
            .unwrap();

        let found = store.offer_by_store(product.id, "amazon").unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().price, 699.0);
    }

    #[test]
    fn test_concurrent_appends_never_share_a_version() {
        use std::sync::Arc;

        let (store, product, feature) = seeded();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                let (product, feature) = (product.id, feature.id);
                std::thread::spawn(move || {
                    for j in 0..25 {
                        store
                            .append_value(product, feature, &format!("v{i}-{j}"))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut versions: Vec<u32> = store
            .history(product.id, feature.id)
            .unwrap()
            .iter()
            .map(|entry| entry.version)
            .collect();
        versions.sort_unstable();
        assert_eq!(versions, (1..=200).collect::<Vec<u32>>());
    }
}
