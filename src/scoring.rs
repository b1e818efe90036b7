//! Legacy proportional raw-score scoring.
//!
//! Kept as an alternate, non-canonical score next to the IRT estimate. It is
//! never folded into θ̂.

use serde::{Deserialize, Serialize};

use crate::item_bank::ItemBank;
use crate::session::AdministeredItem;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegacyScore {
    /// Keyed sum of categories, reverse items reflected as `k + 1 - x`.
    pub raw: u32,
    pub min_raw: u32,
    pub max_raw: u32,
    /// `(raw - min_raw) / (max_raw - min_raw)` in `[0, 1]`.
    pub proportion: f64,
    pub percent: f64,
}

/// Score the answered items; `None` when nothing scorable was answered.
///
/// Unknown items and categories outside `1..=k` are not scorable and are skipped.
pub fn proportional_score(bank: &ItemBank, answered: &[AdministeredItem]) -> Option<LegacyScore> {
    let mut raw = 0u32;
    let mut min_raw = 0u32;
    let mut max_raw = 0u32;

    for response in answered {
        let Some(item) = bank.get(response.item_id) else {
            continue;
        };
        let k = item.category_count() as u32;
        if !(1..=k).contains(&response.category) {
            continue;
        }
        let keyed = if item.is_reverse() {
            k + 1 - response.category
        } else {
            response.category
        };
        raw += keyed;
        min_raw += 1;
        max_raw += k;
    }

    if max_raw == min_raw {
        return None;
    }

    let proportion = f64::from(raw - min_raw) / f64::from(max_raw - min_raw);
    Some(LegacyScore {
        raw,
        min_raw,
        max_raw,
        proportion,
        percent: 100.0 * proportion,
    })
}
