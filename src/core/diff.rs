//! Pure comparison of two variant lists. Callers decide what to do with
//! the result; an empty diff must never produce a notification.

use std::collections::HashMap;

use serde::Serialize;

use crate::core::storefront::types::Variant;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceChange {
    pub variant_id: i64,
    pub title: String,
    pub old_price: String,
    pub new_price: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockChange {
    pub variant_id: i64,
    pub title: String,
    pub available: bool,
}

/// Everything that changed between two observations of a product's
/// variant list. Categories partition the ids: a variant appears in at
/// most `new`/`removed`, and price/stock changes only cover survivors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VariantDiff {
    pub new_variants: Vec<Variant>,
    pub removed_variants: Vec<Variant>,
    pub price_changes: Vec<PriceChange>,
    pub stock_changes: Vec<StockChange>,
}

impl VariantDiff {
    pub fn is_empty(&self) -> bool {
        self.new_variants.is_empty()
            && self.removed_variants.is_empty()
            && self.price_changes.is_empty()
            && self.stock_changes.is_empty()
    }
}

/// Compare variant lists by id. Output order follows input order:
/// `current` order for additions and changes, `previous` order for
/// removals, so repeated runs over the same data are stable.
pub fn diff_variants(previous: &[Variant], current: &[Variant]) -> VariantDiff {
    let prev_by_id: HashMap<i64, &Variant> = previous.iter().map(|v| (v.id, v)).collect();
    let curr_ids: std::collections::HashSet<i64> = current.iter().map(|v| v.id).collect();

    let mut out = VariantDiff::default();

    for variant in current {
        match prev_by_id.get(&variant.id) {
            None => out.new_variants.push(variant.clone()),
            Some(prev) => {
                if prev.price != variant.price {
                    out.price_changes.push(PriceChange {
                        variant_id: variant.id,
                        title: variant.title.clone(),
                        old_price: prev.price.clone(),
                        new_price: variant.price.clone(),
                    });
                }
                if prev.available != variant.available {
                    out.stock_changes.push(StockChange {
                        variant_id: variant.id,
                        title: variant.title.clone(),
                        available: variant.available,
                    });
                }
            }
        }
    }

    for variant in previous {
        if !curr_ids.contains(&variant.id) {
            out.removed_variants.push(variant.clone());
        }
    }

    out
}
