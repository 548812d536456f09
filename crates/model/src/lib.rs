//! Core domain model for the comparekit catalog engine.
//!
//! This crate defines the fundamental types used throughout the system:
//! - `Product`, `Feature`: workspace-owned catalog entities
//! - `FeatureValue`: one immutable entry in a (product, feature) version chain
//! - `StoreOffer`: a priced purchase option at a named retailer
//! - `Trend`, `ValueCell`, `Comparison`: comparison-matrix output
//! - `CatalogError`: the error taxonomy shared by all operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of an owning account ("workspace").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(pub u64);

/// Identifier of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub u64);

/// Identifier of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(pub u64);

/// Identifier of a store offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfferId(pub u64);

/// A cataloged product, exclusively owned by one workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub workspace: WorkspaceId,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Advertised list price; store offers track real prices separately.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_price: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// A named attribute tracked per product over time, owned by one workspace.
///
/// Feature names are unique per workspace (case-insensitive) and are matched
/// case-insensitively when merging features across workspaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub workspace: WorkspaceId,
    pub name: String,

    /// Importance weight. Stored but not yet consulted by any scoring path.
    #[serde(default = "default_importance")]
    pub importance: u32,
}

fn default_importance() -> u32 {
    1
}

/// One immutable entry in a (product, feature) version chain.
///
/// Versions start at 1 and increment by 1 per append to the pair; an
/// "update" always appends a new entry and never mutates an existing one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureValue {
    pub product: ProductId,
    pub feature: FeatureId,
    pub value: String,
    pub version: u32,
    pub updated_at: DateTime<Utc>,
}

/// A priced purchase option for a product at a named store.
///
/// Store names are unique per product (case-insensitive). Unlike chain
/// entries, offers are mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreOffer {
    pub id: OfferId,
    pub product: ProductId,
    pub store_name: String,
    pub price: f64,
    pub buy_link: String,
}

/// Direction of the latest change in a chain value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Same,
    Up,
    Down,
}

impl Default for Trend {
    fn default() -> Self {
        Self::Same
    }
}

/// A lightweight (id, name) reference used for matrix axes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub id: u64,
    pub name: String,
}

impl ItemRef {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// One comparison-matrix cell: a product's current value for a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueCell {
    pub product: ProductId,
    pub value: String,
    pub changed: bool,
    pub trend: Trend,
}

impl ValueCell {
    /// The cell emitted when a (product, feature) pair has no recorded value.
    pub fn placeholder(product: ProductId) -> Self {
        Self {
            product,
            value: "-".to_string(),
            changed: false,
            trend: Trend::Same,
        }
    }
}

/// One matrix row: a feature and its cell per compared product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub feature: FeatureId,
    pub name: String,
    pub cells: Vec<ValueCell>,
}

/// A features x products comparison matrix.
///
/// Columns follow `products` order; rows follow `features` order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparison {
    pub products: Vec<ItemRef>,
    pub features: Vec<ItemRef>,
    pub rows: Vec<ComparisonRow>,
}

/// One entry of a value history read, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub product: ProductId,
    pub feature: FeatureId,
    pub version: u32,
    pub value: String,
    pub changed: bool,
    pub trend: Trend,
    pub updated_at: DateTime<Utc>,
}

/// The cheapest known offer for a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestPrice {
    pub price: f64,
    pub store_name: String,
}

/// Outcome of a two-product buy recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub winner: ProductId,
    pub reason: String,
}

/// A decoded feature reading: display value plus optional price annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureReading {
    pub name: String,
    pub value: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
}

/// Detailed product view: entity fields plus decoded latest readings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDetails {
    pub id: ProductId,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_price: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// Latest value of the first link-type feature, lifted out of `features`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_link: Option<String>,

    pub features: Vec<FeatureReading>,
}

/// Errors surfaced by catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Blank or missing required field, malformed URL. A client error.
    #[error("{0}")]
    Validation(String),

    /// Unknown entity, or one belonging to a different workspace.
    #[error("{0} not found")]
    NotFound(String),

    /// Store name collision on a product. A conflict, distinct from
    /// generic validation.
    #[error("{0}")]
    DuplicateStore(String),

    /// Bad, missing, or expired token from the identity collaborator.
    #[error("unauthorized")]
    Unauthorized,

    /// Unexpected backend failure, surfaced without internal detail.
    #[error("storage failure")]
    Storage(String),
}

impl CatalogError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound(entity.into())
    }
}
