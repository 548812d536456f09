//! Workspace-scoped catalog operations.
//!
//! `Catalog` wraps a `CatalogStore` and implements the validated service
//! surface: feature-value appends and history reads, store offers with the
//! best-price scan, product and feature lifecycle, and idempotent
//! default-feature seeding. Identity resolution is consumed through the
//! `IdentityResolver` capability; no session logic lives here.

use chrono::{DateTime, Utc};
use comparekit_features::{
    decode_value, encode_value, is_link_feature, is_valid_link_value, parse_http_host,
    resolve_trend,
};
use comparekit_model::{
    BestPrice, CatalogError, Feature, FeatureId, FeatureReading, HistoryEntry, ItemRef, Product,
    ProductDetails, ProductId, StoreOffer, ValueCell, WorkspaceId,
};
use comparekit_store::{CatalogStore, ProductFields, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Features seeded into every new workspace.
const DEFAULT_FEATURES: [&str; 9] = [
    "Price",
    "Purchase Link",
    "Battery",
    "RAM",
    "Storage",
    "Camera",
    "Display",
    "Processor",
    "Operating System",
];

/// Resolve an opaque token to an owning workspace, or fail.
///
/// Implemented by the (excluded) session collaborator; resolution refreshes
/// the token's last-used timestamp as a side effect.
pub trait IdentityResolver {
    fn resolve_owner(&self, token: &str) -> Result<WorkspaceId, CatalogError>;
}

struct TokenEntry {
    workspace: WorkspaceId,
    last_used: DateTime<Utc>,
}

/// In-memory `IdentityResolver` used by the CLI and tests.
#[derive(Default)]
pub struct TokenTable {
    tokens: RwLock<HashMap<String, TokenEntry>>,
}

impl TokenTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: impl Into<String>, workspace: WorkspaceId) {
        self.write().insert(
            token.into(),
            TokenEntry {
                workspace,
                last_used: Utc::now(),
            },
        );
    }

    pub fn last_used(&self, token: &str) -> Option<DateTime<Utc>> {
        self.tokens
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(token)
            .map(|entry| entry.last_used)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, TokenEntry>> {
        self.tokens
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl IdentityResolver for TokenTable {
    fn resolve_owner(&self, token: &str) -> Result<WorkspaceId, CatalogError> {
        let mut tokens = self.write();
        let entry = tokens.get_mut(token).ok_or(CatalogError::Unauthorized)?;
        entry.last_used = Utc::now();
        Ok(entry.workspace)
    }
}

/// One inline feature seed on a product draft: name, display value, and an
/// optional price annotation carried through the value codec.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureSeed {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub price: String,
}

/// Create/update payload for a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub list_price: Option<f64>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Stored through the "Purchase Link" feature chain, not on the row.
    #[serde(default)]
    pub buy_link: Option<String>,
    #[serde(default)]
    pub features: Vec<FeatureSeed>,
}

/// Create/update payload for a store offer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfferDraft {
    pub store_name: String,
    pub price: Option<f64>,
    pub buy_link: String,
}

/// The validated, workspace-scoped catalog service.
pub struct Catalog<S: CatalogStore> {
    store: S,
}

impl<S: CatalogStore> Catalog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Direct access to the backing store, for the comparison and
    /// recommendation layers.
    pub fn store(&self) -> &S {
        &self.store
    }

    // --- feature values ---

    /// Append a value to a (product, feature) version chain.
    ///
    /// Rejects blank values; link-type features additionally require a
    /// well-formed URL value. Returns the rendered cell: the new value plus
    /// changed/trend against the immediately preceding entry.
    pub fn update_feature_value(
        &self,
        workspace: WorkspaceId,
        product: ProductId,
        feature: FeatureId,
        raw: &str,
    ) -> Result<ValueCell, CatalogError> {
        require_text(raw, "Feature value")?;
        let product = self.require_product(workspace, product)?;
        let feature = self.require_feature(workspace, feature)?;

        let value = raw.trim();
        if is_link_feature(&feature.name) && !is_valid_link_value(value) {
            return Err(CatalogError::validation(
                "Feature value must be a valid URL for link features",
            ));
        }

        let (entry, previous) = self
            .store
            .append_value(product.id, feature.id, value)
            .map_err(storage)?;

        Ok(ValueCell {
            product: product.id,
            changed: previous.as_deref().is_some_and(|p| p != entry.value),
            trend: resolve_trend(previous.as_deref(), &entry.value),
            value: entry.value,
        })
    }

    /// Full chain for a pair, newest first.
    ///
    /// Trend and changed are computed in iteration order, so each entry is
    /// read against its newer neighbor and the newest entry is always
    /// `Same`. This mirrors how the history view has always rendered.
    pub fn value_history(
        &self,
        workspace: WorkspaceId,
        product: ProductId,
        feature: FeatureId,
    ) -> Result<Vec<HistoryEntry>, CatalogError> {
        let product = self.require_product(workspace, product)?;
        let feature = self.require_feature(workspace, feature)?;

        let entries = self.store.history(product.id, feature.id).map_err(storage)?;

        let mut history = Vec::with_capacity(entries.len());
        let mut previous: Option<String> = None;
        for entry in entries {
            history.push(HistoryEntry {
                product: product.id,
                feature: feature.id,
                version: entry.version,
                changed: previous.as_deref().is_some_and(|p| p != entry.value),
                trend: resolve_trend(previous.as_deref(), &entry.value),
                updated_at: entry.updated_at,
                value: entry.value.clone(),
            });
            previous = Some(entry.value);
        }
        Ok(history)
    }

    pub fn delete_value_history(
        &self,
        workspace: WorkspaceId,
        product: ProductId,
        feature: FeatureId,
    ) -> Result<(), CatalogError> {
        let product = self.require_product(workspace, product)?;
        let feature = self.require_feature(workspace, feature)?;
        self.store
            .delete_values_for_pair(product.id, feature.id)
            .map_err(storage)
    }

    // --- store offers ---

    pub fn add_store_offer(
        &self,
        workspace: WorkspaceId,
        product: ProductId,
        draft: &OfferDraft,
    ) -> Result<StoreOffer, CatalogError> {
        let product = self.require_product(workspace, product)?;
        let (store_name, price, buy_link) = validate_offer(draft)?;

        if self
            .store
            .offer_by_store(product.id, store_name)
            .map_err(storage)?
            .is_some()
        {
            return Err(CatalogError::DuplicateStore(
                "Store already exists for this product".to_string(),
            ));
        }

        self.store
            .insert_offer(product.id, store_name, price, buy_link)
            .map_err(storage)
    }

    pub fn update_store_offer(
        &self,
        workspace: WorkspaceId,
        product: ProductId,
        offer: comparekit_model::OfferId,
        draft: &OfferDraft,
    ) -> Result<StoreOffer, CatalogError> {
        let product = self.require_product(workspace, product)?;
        let (store_name, price, buy_link) = validate_offer(draft)?;

        let mut existing = self
            .store
            .offer_of(product.id, offer)
            .map_err(storage)?
            .ok_or_else(|| CatalogError::not_found("Store offer"))?;

        if let Some(collision) = self
            .store
            .offer_by_store(product.id, store_name)
            .map_err(storage)?
        {
            if collision.id != existing.id {
                return Err(CatalogError::DuplicateStore(
                    "Store already exists for this product".to_string(),
                ));
            }
        }

        existing.store_name = store_name.to_string();
        existing.price = price;
        existing.buy_link = buy_link.to_string();
        self.store.update_offer(&existing).map_err(storage)?;
        Ok(existing)
    }

    pub fn delete_store_offer(
        &self,
        workspace: WorkspaceId,
        product: ProductId,
        offer: comparekit_model::OfferId,
    ) -> Result<(), CatalogError> {
        let product = self.require_product(workspace, product)?;
        let existing = self
            .store
            .offer_of(product.id, offer)
            .map_err(storage)?
            .ok_or_else(|| CatalogError::not_found("Store offer"))?;
        self.store.delete_offer(existing.id).map_err(storage)
    }

    pub fn store_offers(
        &self,
        workspace: WorkspaceId,
        product: ProductId,
    ) -> Result<Vec<StoreOffer>, CatalogError> {
        let product = self.require_product(workspace, product)?;
        self.store.offers_of(product.id).map_err(storage)
    }

    /// Minimum offer price for a product and its store. Ties keep the
    /// first-seen minimum (offers scan store-name ascending).
    pub fn best_price(&self, product: ProductId) -> Result<Option<BestPrice>, CatalogError> {
        let offers = self.store.offers_of(product).map_err(storage)?;
        let mut best: Option<BestPrice> = None;
        for offer in offers {
            let beats = best.as_ref().map_or(true, |b| offer.price < b.price);
            if beats {
                best = Some(BestPrice {
                    price: offer.price,
                    store_name: offer.store_name,
                });
            }
        }
        Ok(best)
    }

    // --- products ---

    pub fn add_product(
        &self,
        workspace: WorkspaceId,
        draft: &ProductDraft,
    ) -> Result<Product, CatalogError> {
        require_text(&draft.name, "Product name")?;
        let product = self
            .store
            .create_product(workspace, product_fields(draft))
            .map_err(storage)?;
        tracing::debug!(workspace = workspace.0, product = product.id.0, "product created");

        self.seed_product_features(workspace, product.id, draft)?;
        Ok(product)
    }

    pub fn update_product(
        &self,
        workspace: WorkspaceId,
        product: ProductId,
        draft: &ProductDraft,
    ) -> Result<Product, CatalogError> {
        require_text(&draft.name, "Product name")?;
        let mut existing = self.require_product(workspace, product)?;

        let fields = product_fields(draft);
        existing.name = fields.name;
        existing.category = fields.category;
        existing.list_price = fields.list_price;
        existing.image_url = fields.image_url;
        self.store.update_product(&existing).map_err(storage)?;

        self.seed_product_features(workspace, existing.id, draft)?;
        Ok(existing)
    }

    /// Delete a product and everything it exclusively owns: its value
    /// chains and its store offers.
    pub fn delete_product(
        &self,
        workspace: WorkspaceId,
        product: ProductId,
    ) -> Result<(), CatalogError> {
        let product = self.require_product(workspace, product)?;
        self.store.delete_values_for_product(product.id).map_err(storage)?;
        for offer in self.store.offers_of(product.id).map_err(storage)? {
            self.store.delete_offer(offer.id).map_err(storage)?;
        }
        self.store.delete_product(product.id).map_err(storage)
    }

    /// Workspace product listing, name ascending.
    pub fn products(&self, workspace: WorkspaceId) -> Result<Vec<ItemRef>, CatalogError> {
        Ok(self
            .store
            .products_of(workspace)
            .map_err(storage)?
            .into_iter()
            .map(|product| ItemRef::new(product.id.0, product.name))
            .collect())
    }

    /// Cross-workspace product listing, name ascending.
    pub fn public_products(&self) -> Result<Vec<Product>, CatalogError> {
        self.store.all_products().map_err(storage)
    }

    /// Detailed product view: decoded latest readings per feature, with the
    /// first link-type feature's value lifted out as `buy_link`.
    pub fn product_details(
        &self,
        workspace: WorkspaceId,
        product: ProductId,
    ) -> Result<ProductDetails, CatalogError> {
        let product = self.require_product(workspace, product)?;
        let features = self.store.features_of(workspace).map_err(storage)?;

        let mut buy_link = None;
        let mut readings = Vec::new();
        for feature in features {
            let latest = self
                .store
                .latest_two(product.id, feature.id)
                .map_err(storage)?;
            let Some(current) = latest.first() else {
                continue;
            };

            if is_link_feature(&feature.name) {
                buy_link = Some(current.value.clone());
                continue;
            }

            let (value, price) = decode_value(Some(&current.value));
            readings.push(FeatureReading {
                name: feature.name,
                value,
                price,
            });
        }

        Ok(ProductDetails {
            id: product.id,
            name: product.name,
            category: product.category,
            list_price: product.list_price,
            image_url: product.image_url,
            buy_link,
            features: readings,
        })
    }

    // --- features ---

    pub fn add_feature(
        &self,
        workspace: WorkspaceId,
        name: &str,
    ) -> Result<Feature, CatalogError> {
        require_text(name, "Feature name")?;
        self.store
            .create_feature(workspace, name.trim(), 1)
            .map_err(storage)
    }

    pub fn rename_feature(
        &self,
        workspace: WorkspaceId,
        feature: FeatureId,
        name: &str,
    ) -> Result<Feature, CatalogError> {
        require_text(name, "Feature name")?;
        let mut existing = self.require_feature(workspace, feature)?;
        existing.name = name.trim().to_string();
        self.store.update_feature(&existing).map_err(storage)?;
        Ok(existing)
    }

    pub fn features(&self, workspace: WorkspaceId) -> Result<Vec<ItemRef>, CatalogError> {
        Ok(self
            .store
            .features_of(workspace)
            .map_err(storage)?
            .into_iter()
            .map(|feature| ItemRef::new(feature.id.0, feature.name))
            .collect())
    }

    /// Delete a feature and its value chains across all products.
    pub fn delete_feature(
        &self,
        workspace: WorkspaceId,
        feature: FeatureId,
    ) -> Result<(), CatalogError> {
        let feature = self.require_feature(workspace, feature)?;
        self.store.delete_values_for_feature(feature.id).map_err(storage)?;
        self.store.delete_feature(feature.id).map_err(storage)
    }

    pub fn find_or_create_feature(
        &self,
        workspace: WorkspaceId,
        name: &str,
    ) -> Result<Feature, CatalogError> {
        if let Some(existing) = self
            .store
            .feature_by_name(workspace, name)
            .map_err(storage)?
        {
            return Ok(existing);
        }
        self.store
            .create_feature(workspace, name.trim(), 1)
            .map_err(storage)
    }

    /// Idempotent upsert of the default feature set, keyed by
    /// case-insensitive name. Returns the workspace's full feature list.
    pub fn ensure_default_features(
        &self,
        workspace: WorkspaceId,
    ) -> Result<Vec<ItemRef>, CatalogError> {
        let existing: Vec<String> = self
            .store
            .features_of(workspace)
            .map_err(storage)?
            .into_iter()
            .map(|feature| feature.name.trim().to_lowercase())
            .collect();

        for name in DEFAULT_FEATURES {
            if !existing.iter().any(|have| have == &name.to_lowercase()) {
                self.store.create_feature(workspace, name, 1).map_err(storage)?;
            }
        }
        self.features(workspace)
    }

    // --- internals ---

    fn seed_product_features(
        &self,
        workspace: WorkspaceId,
        product: ProductId,
        draft: &ProductDraft,
    ) -> Result<(), CatalogError> {
        if let Some(buy_link) = draft.buy_link.as_deref() {
            if !buy_link.trim().is_empty() {
                let feature = self.find_or_create_feature(workspace, "Purchase Link")?;
                self.update_feature_value(workspace, product, feature.id, buy_link.trim())?;
            }
        }

        for seed in &draft.features {
            let name = seed.name.trim();
            let value = seed.value.trim();
            if name.is_empty() || value.is_empty() {
                continue;
            }
            let feature = self.find_or_create_feature(workspace, name)?;
            let encoded = encode_value(value, seed.price.trim());
            self.update_feature_value(workspace, product, feature.id, &encoded)?;
        }
        Ok(())
    }

    fn require_product(
        &self,
        workspace: WorkspaceId,
        product: ProductId,
    ) -> Result<Product, CatalogError> {
        self.store
            .product_of(workspace, product)
            .map_err(storage)?
            .ok_or_else(|| CatalogError::not_found("Product"))
    }

    fn require_feature(
        &self,
        workspace: WorkspaceId,
        feature: FeatureId,
    ) -> Result<Feature, CatalogError> {
        self.store
            .feature_of(workspace, feature)
            .map_err(storage)?
            .ok_or_else(|| CatalogError::not_found("Feature"))
    }
}

fn product_fields(draft: &ProductDraft) -> ProductFields {
    ProductFields {
        name: draft.name.trim().to_string(),
        category: draft.category.as_deref().map(|c| c.trim().to_string()),
        list_price: draft.list_price,
        image_url: draft.image_url.as_deref().map(|u| u.trim().to_string()),
    }
}

fn validate_offer(draft: &OfferDraft) -> Result<(&str, f64, &str), CatalogError> {
    require_text(&draft.store_name, "Store name")?;
    let price = draft
        .price
        .ok_or_else(|| CatalogError::validation("Price is required"))?;
    require_text(&draft.buy_link, "Buy link")?;

    let buy_link = draft.buy_link.trim();
    if parse_http_host(buy_link).is_none() {
        return Err(CatalogError::validation("Buy link must be a valid URL"));
    }
    Ok((draft.store_name.trim(), price, buy_link))
}

fn require_text(value: &str, field: &str) -> Result<(), CatalogError> {
    if value.trim().is_empty() {
        return Err(CatalogError::validation(format!("{field} is required")));
    }
    Ok(())
}

fn storage(err: StoreError) -> CatalogError {
    tracing::error!(error = %err, "storage operation failed");
    CatalogError::Storage(err.to_string())
}
