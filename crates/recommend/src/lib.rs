//! Heuristic buy recommendation between two products.
//!
//! Scores the pair on three independent axes, one point each: best store
//! price (lower wins), a numeric "ram" feature (larger wins), and a numeric
//! "battery" feature (larger wins). The winner's reason fragments compose
//! the human-readable explanation.

use comparekit_catalog::Catalog;
use comparekit_features::extract_number;
use comparekit_model::{
    BestPrice, CatalogError, Product, ProductId, Recommendation, WorkspaceId,
};
use comparekit_store::{CatalogStore, StoreError};

/// Fallback reason when the winner collected no fragments (a tie broken in
/// the left product's favor).
const BALANCED_REASON: &str = "Balanced overall value across compared specs";

/// Recommend one of two workspace products.
///
/// Both ids must resolve within the workspace and differ. Ties, including
/// 0-0, default to the left product. The reason joins the winner's first
/// two fragments with " and ".
pub fn recommend<S: CatalogStore>(
    catalog: &Catalog<S>,
    workspace: WorkspaceId,
    left: ProductId,
    right: ProductId,
) -> Result<Recommendation, CatalogError> {
    if left == right {
        return Err(CatalogError::validation(
            "Compared products must be different",
        ));
    }

    let store = catalog.store();
    let left = require_product(store, workspace, left)?;
    let right = require_product(store, workspace, right)?;

    let mut score = Scoreboard::default();

    let left_price = catalog.best_price(left.id)?;
    let right_price = catalog.best_price(right.id)?;
    if let (Some(lp), Some(rp)) = (&left_price, &right_price) {
        if lp.price < rp.price {
            score.award_left(price_fragment(lp));
        } else if rp.price < lp.price {
            score.award_right(price_fragment(rp));
        }
    }

    score_numeric_feature(
        store,
        workspace,
        &mut score,
        left.id,
        right.id,
        "ram",
        "Better RAM configuration",
    )?;
    score_numeric_feature(
        store,
        workspace,
        &mut score,
        left.id,
        right.id,
        "battery",
        "Higher battery capacity",
    )?;

    let (winner, fragments) = score.winner(&left, &right);
    tracing::debug!(
        winner = winner.id.0,
        left_points = score.left_points,
        right_points = score.right_points,
        "recommendation computed"
    );

    let reason = if fragments.is_empty() {
        BALANCED_REASON.to_string()
    } else {
        fragments
            .iter()
            .take(2)
            .cloned()
            .collect::<Vec<_>>()
            .join(" and ")
    };

    Ok(Recommendation {
        winner: winner.id,
        reason,
    })
}

#[derive(Default)]
struct Scoreboard {
    left_points: u32,
    right_points: u32,
    left_reasons: Vec<String>,
    right_reasons: Vec<String>,
}

impl Scoreboard {
    fn award_left(&mut self, reason: String) {
        self.left_points += 1;
        self.left_reasons.push(reason);
    }

    fn award_right(&mut self, reason: String) {
        self.right_points += 1;
        self.right_reasons.push(reason);
    }

    fn winner<'a>(&self, left: &'a Product, right: &'a Product) -> (&'a Product, &[String]) {
        if self.right_points > self.left_points {
            (right, &self.right_reasons)
        } else {
            (left, &self.left_reasons)
        }
    }
}

fn price_fragment(best: &BestPrice) -> String {
    format!("Lower price on {}", best.store_name)
}

/// Award a point for a numeric feature whose name contains `keyword`.
/// Skipped entirely when either side lacks a parseable number.
fn score_numeric_feature<S: CatalogStore>(
    store: &S,
    workspace: WorkspaceId,
    score: &mut Scoreboard,
    left: ProductId,
    right: ProductId,
    keyword: &str,
    fragment: &str,
) -> Result<(), CatalogError> {
    let left_value = numeric_feature_value(store, workspace, left, keyword)?;
    let right_value = numeric_feature_value(store, workspace, right, keyword)?;
    let (Some(lv), Some(rv)) = (left_value, right_value) else {
        return Ok(());
    };

    if lv > rv {
        score.award_left(fragment.to_string());
    } else if rv > lv {
        score.award_right(fragment.to_string());
    }
    Ok(())
}

/// Latest parseable numeric value among the workspace features whose names
/// contain `keyword` (case-insensitive), scanned name-ascending;
/// first parseable value wins.
fn numeric_feature_value<S: CatalogStore>(
    store: &S,
    workspace: WorkspaceId,
    product: ProductId,
    keyword: &str,
) -> Result<Option<f64>, CatalogError> {
    let keyword = keyword.to_lowercase();
    for feature in store.features_of(workspace).map_err(storage)? {
        if !feature.name.to_lowercase().contains(&keyword) {
            continue;
        }
        let latest = store.latest_two(product, feature.id).map_err(storage)?;
        let Some(current) = latest.first() else {
            continue;
        };
        if let Some(number) = extract_number(&current.value) {
            return Ok(Some(number));
        }
    }
    Ok(None)
}

fn require_product<S: CatalogStore>(
    store: &S,
    workspace: WorkspaceId,
    id: ProductId,
) -> Result<Product, CatalogError> {
    store
        .product_of(workspace, id)
        .map_err(storage)?
        .ok_or_else(|| CatalogError::not_found("Product"))
}

fn storage(err: StoreError) -> CatalogError {
    tracing::error!(error = %err, "storage operation failed");
    CatalogError::Storage(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use comparekit_catalog::{Catalog, OfferDraft, ProductDraft};
    use comparekit_store::MemoryStore;
    use pretty_assertions::assert_eq;

    struct Fixture {
        catalog: Catalog<MemoryStore>,
        ws: WorkspaceId,
        left: ProductId,
        right: ProductId,
    }

    fn fixture() -> Fixture {
        let catalog = Catalog::new(MemoryStore::new());
        let ws = WorkspaceId(1);
        let left = catalog
            .add_product(
                ws,
                &ProductDraft {
                    name: "Phone A".to_string(),
                    ..Default::default()
                },
            )
            .unwrap()
            .id;
        let right = catalog
            .add_product(
                ws,
                &ProductDraft {
                    name: "Phone B".to_string(),
                    ..Default::default()
                },
            )
            .unwrap()
            .id;
        Fixture {
            catalog,
            ws,
            left,
            right,
        }
    }

    fn offer(store_name: &str, price: f64) -> OfferDraft {
        OfferDraft {
            store_name: store_name.to_string(),
            price: Some(price),
            buy_link: "https://shop.example/p".to_string(),
        }
    }

    fn set_value(fx: &Fixture, product: ProductId, feature: &str, value: &str) {
        let feature = fx.catalog.find_or_create_feature(fx.ws, feature).unwrap();
        fx.catalog
            .update_feature_value(fx.ws, product, feature.id, value)
            .unwrap();
    }

    #[test]
    fn test_same_product_rejected() {
        let fx = fixture();
        assert!(matches!(
            recommend(&fx.catalog, fx.ws, fx.left, fx.left),
            Err(CatalogError::Validation(_))
        ));
    }

    #[test]
    fn test_unknown_product_rejected() {
        let fx = fixture();
        assert!(matches!(
            recommend(&fx.catalog, fx.ws, fx.left, ProductId(999)),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn test_tie_defaults_to_left_with_balanced_reason() {
        let fx = fixture();
        let result = recommend(&fx.catalog, fx.ws, fx.left, fx.right).unwrap();
        assert_eq!(result.winner, fx.left);
        assert_eq!(result.reason, BALANCED_REASON);
    }

    #[test]
    fn test_sweep_keeps_first_two_fragments() {
        let fx = fixture();

        // Right is cheaper, has more RAM, and more battery: 3 of 3 points.
        fx.catalog.add_store_offer(fx.ws, fx.left, &offer("Amazon", 799.0)).unwrap();
        fx.catalog.add_store_offer(fx.ws, fx.right, &offer("BestBuy", 649.0)).unwrap();
        set_value(&fx, fx.left, "RAM", "8 GB");
        set_value(&fx, fx.right, "RAM", "12 GB");
        set_value(&fx, fx.left, "Battery", "4000 mAh");
        set_value(&fx, fx.right, "Battery", "5000 mAh");

        let result = recommend(&fx.catalog, fx.ws, fx.left, fx.right).unwrap();
        assert_eq!(result.winner, fx.right);
        assert_eq!(
            result.reason,
            "Lower price on BestBuy and Better RAM configuration"
        );
    }

    #[test]
    fn test_price_point_goes_to_cheaper_side() {
        let fx = fixture();
        fx.catalog.add_store_offer(fx.ws, fx.left, &offer("Amazon", 599.0)).unwrap();
        fx.catalog.add_store_offer(fx.ws, fx.right, &offer("BestBuy", 649.0)).unwrap();

        let result = recommend(&fx.catalog, fx.ws, fx.left, fx.right).unwrap();
        assert_eq!(result.winner, fx.left);
        assert_eq!(result.reason, "Lower price on Amazon");
    }

    #[test]
    fn test_price_comparison_skipped_when_one_side_has_no_offers() {
        let fx = fixture();
        fx.catalog.add_store_offer(fx.ws, fx.left, &offer("Amazon", 599.0)).unwrap();
        // Right has no offers; battery decides instead.
        set_value(&fx, fx.left, "Battery", "4000 mAh");
        set_value(&fx, fx.right, "Battery", "5000 mAh");

        let result = recommend(&fx.catalog, fx.ws, fx.left, fx.right).unwrap();
        assert_eq!(result.winner, fx.right);
        assert_eq!(result.reason, "Higher battery capacity");
    }

    #[test]
    fn test_feature_comparison_skipped_without_parseable_numbers() {
        let fx = fixture();
        set_value(&fx, fx.left, "RAM", "plenty");
        set_value(&fx, fx.right, "RAM", "16 GB");

        // Left's RAM value has no number, so the axis is skipped and the
        // 0-0 tie goes left.
        let result = recommend(&fx.catalog, fx.ws, fx.left, fx.right).unwrap();
        assert_eq!(result.winner, fx.left);
        assert_eq!(result.reason, BALANCED_REASON);
    }

    #[test]
    fn test_keyword_match_is_case_insensitive_substring() {
        let fx = fixture();
        set_value(&fx, fx.left, "Installed RAM", "8 GB");
        set_value(&fx, fx.right, "Installed RAM", "12 GB");

        let result = recommend(&fx.catalog, fx.ws, fx.left, fx.right).unwrap();
        assert_eq!(result.winner, fx.right);
        assert_eq!(result.reason, "Better RAM configuration");
    }

    #[test]
    fn test_two_to_one_split() {
        let fx = fixture();
        fx.catalog.add_store_offer(fx.ws, fx.left, &offer("Amazon", 599.0)).unwrap();
        fx.catalog.add_store_offer(fx.ws, fx.right, &offer("BestBuy", 649.0)).unwrap();
        set_value(&fx, fx.left, "RAM", "16 GB");
        set_value(&fx, fx.right, "RAM", "12 GB");
        set_value(&fx, fx.left, "Battery", "4000 mAh");
        set_value(&fx, fx.right, "Battery", "5000 mAh");

        let result = recommend(&fx.catalog, fx.ws, fx.left, fx.right).unwrap();
        assert_eq!(result.winner, fx.left);
        assert_eq!(
            result.reason,
            "Lower price on Amazon and Better RAM configuration"
        );
    }
}
