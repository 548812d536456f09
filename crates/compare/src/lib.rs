//! Comparison-matrix assembly.
//!
//! Builds features x products grids of current-value cells from the version
//! chains. Two modes: an owner-scoped matrix over one workspace's whole
//! catalog, and a cross-owner two-product matrix that unions the owners'
//! feature sets by case-insensitive name.

use comparekit_features::resolve_trend;
use comparekit_model::{
    CatalogError, Comparison, ComparisonRow, Feature, FeatureValue, ItemRef, Product, ProductId,
    ValueCell, WorkspaceId,
};
use comparekit_store::{CatalogStore, StoreError};

/// Build the matrix for one workspace: all products (name ascending) against
/// all features (name ascending). Pairs with no recorded value render as
/// placeholder cells.
pub fn owner_comparison<S: CatalogStore>(
    store: &S,
    workspace: WorkspaceId,
) -> Result<Comparison, CatalogError> {
    let products = store.products_of(workspace).map_err(storage)?;
    let features = store.features_of(workspace).map_err(storage)?;

    let mut rows = Vec::with_capacity(features.len());
    for feature in &features {
        let mut cells = Vec::with_capacity(products.len());
        for product in &products {
            let latest = store.latest_two(product.id, feature.id).map_err(storage)?;
            cells.push(cell_from_latest(product.id, &latest));
        }
        rows.push(ComparisonRow {
            feature: feature.id,
            name: feature.name.clone(),
            cells,
        });
    }

    Ok(Comparison {
        products: products
            .into_iter()
            .map(|product| ItemRef::new(product.id.0, product.name))
            .collect(),
        features: features
            .into_iter()
            .map(|feature| ItemRef::new(feature.id.0, feature.name))
            .collect(),
        rows,
    })
}

/// Build a two-product matrix across (possibly) different owners.
///
/// The feature axis is the union of both owners' feature sets keyed by
/// trimmed case-insensitive name; the first-encountered spelling wins for
/// display, and rows sort case-insensitively. Each column only ever reads
/// the column product's own owner's features.
pub fn cross_owner_comparison<S: CatalogStore>(
    store: &S,
    a: ProductId,
    b: ProductId,
) -> Result<Comparison, CatalogError> {
    tracing::info!(a = a.0, b = b.0, "building cross-owner comparison");

    if a == b {
        return Err(CatalogError::validation(
            "Compared products must be different",
        ));
    }

    let product_a = require_product(store, a)?;
    let product_b = require_product(store, b)?;
    let products = [product_a, product_b];

    // One feature list per distinct workspace, in product order.
    let mut workspaces: Vec<(WorkspaceId, Vec<Feature>)> = Vec::new();
    for product in &products {
        if workspaces.iter().any(|(id, _)| *id == product.workspace) {
            continue;
        }
        let features = store.features_of(product.workspace).map_err(storage)?;
        workspaces.push((product.workspace, features));
    }

    // Union by normalized name; first-seen spelling keeps the display slot.
    let mut union: Vec<(String, ItemRef)> = Vec::new();
    for (_, features) in &workspaces {
        for feature in features {
            if feature.name.trim().is_empty() {
                continue;
            }
            let key = feature.name.trim().to_lowercase();
            if !union.iter().any(|(have, _)| have == &key) {
                union.push((key, ItemRef::new(feature.id.0, feature.name.clone())));
            }
        }
    }
    let mut feature_items: Vec<ItemRef> = union.into_iter().map(|(_, item)| item).collect();
    feature_items.sort_by_key(|item| item.name.to_lowercase());

    let mut rows = Vec::with_capacity(feature_items.len());
    for item in &feature_items {
        let mut cells = Vec::with_capacity(products.len());
        for product in &products {
            let owner_features = workspaces
                .iter()
                .find(|(id, _)| *id == product.workspace)
                .map(|(_, features)| features.as_slice())
                .unwrap_or(&[]);

            let matching = owner_features
                .iter()
                .find(|feature| feature.name.to_lowercase() == item.name.to_lowercase());

            let Some(feature) = matching else {
                cells.push(ValueCell::placeholder(product.id));
                continue;
            };

            let latest = store.latest_two(product.id, feature.id).map_err(storage)?;
            if latest.is_empty() {
                cells.push(ValueCell::placeholder(product.id));
                continue;
            }
            cells.push(cell_from_latest(product.id, &latest));
        }
        rows.push(ComparisonRow {
            feature: comparekit_model::FeatureId(item.id),
            name: item.name.clone(),
            cells,
        });
    }

    Ok(Comparison {
        products: products
            .into_iter()
            .map(|product| ItemRef::new(product.id.0, product.name))
            .collect(),
        features: feature_items,
        rows,
    })
}

/// Render a cell from a newest-first `latest_two` read. An empty read is the
/// placeholder; a blank current value also renders as `-`.
fn cell_from_latest(product: ProductId, latest: &[FeatureValue]) -> ValueCell {
    let Some(current) = latest.first() else {
        return ValueCell::placeholder(product);
    };
    let previous = latest.get(1).map(|entry| entry.value.as_str());

    ValueCell {
        product,
        value: if current.value.trim().is_empty() {
            "-".to_string()
        } else {
            current.value.clone()
        },
        changed: previous.is_some_and(|p| p != current.value),
        trend: resolve_trend(previous, &current.value),
    }
}

fn require_product<S: CatalogStore>(store: &S, id: ProductId) -> Result<Product, CatalogError> {
    store
        .product(id)
        .map_err(storage)?
        .ok_or_else(|| CatalogError::not_found("Product"))
}

fn storage(err: StoreError) -> CatalogError {
    tracing::error!(error = %err, "storage operation failed");
    CatalogError::Storage(err.to_string())
}
