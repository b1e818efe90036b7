//! Next-item selection: random start rule and maximum information with
//! randomesque exposure control.

use rand::prelude::*;

use crate::config::{ExposureControl, StartRule};
use crate::item_bank::ItemBank;
use crate::model::item_information;

/// Selects bank positions. Holds no state of its own; randomness comes from
/// the caller's stream so each session stays reproducible.
#[derive(Debug, Clone, Copy)]
pub struct ItemSelector {
    start_rule: StartRule,
    exposure: ExposureControl,
}

impl ItemSelector {
    pub fn new(start_rule: StartRule, exposure: ExposureControl) -> Self {
        Self {
            start_rule,
            exposure,
        }
    }

    /// First item of a session.
    pub fn select_start<R: Rng + ?Sized>(&self, bank: &ItemBank, rng: &mut R) -> Option<usize> {
        match self.start_rule {
            StartRule::Random => {
                if bank.is_empty() {
                    None
                } else {
                    Some(rng.random_range(0..bank.len()))
                }
            }
        }
    }

    /// Rank not-yet-administered items by information at `theta`, highest first,
    /// ties broken by lowest item id. Positions past the end of `administered`
    /// count as not administered.
    pub fn rank(&self, bank: &ItemBank, theta: f64, administered: &[bool]) -> Vec<(usize, f64)> {
        let mut ranked: Vec<(usize, f64)> = bank
            .items()
            .iter()
            .enumerate()
            .filter(|(pos, _)| !administered.get(*pos).copied().unwrap_or(false))
            .map(|(pos, item)| (pos, item_information(item, theta)))
            .collect();

        ranked.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| bank.item(a.0).id().cmp(&bank.item(b.0).id()))
        });
        ranked
    }

    /// Next item by maximum information, drawing among the top `top_k` when
    /// exposure control is on.
    pub fn select_next<R: Rng + ?Sized>(
        &self,
        bank: &ItemBank,
        theta: f64,
        administered: &[bool],
        rng: &mut R,
    ) -> Option<usize> {
        let ranked = self.rank(bank, theta, administered);
        if ranked.is_empty() {
            return None;
        }

        let fan_out = self.exposure.fan_out().min(ranked.len());
        let pick = if fan_out > 1 {
            rng.random_range(0..fan_out)
        } else {
            0
        };
        Some(ranked[pick].0)
    }
}
