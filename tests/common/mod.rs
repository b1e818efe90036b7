#![allow(dead_code)]

use std::sync::Arc;

use catsim::{CatConfig, CatEngine, EstimationMethod, ExposureControl, ItemBank};

pub const BANK_JSON: &str = include_str!("../../data/item_bank.json");

/// Twenty five-category items, ten of them reverse-keyed.
pub fn bank() -> Arc<ItemBank> {
    Arc::new(ItemBank::from_json_str(BANK_JSON).expect("sample bank parses"))
}

pub fn scenario_config() -> CatConfig {
    CatConfig {
        estimation_method: EstimationMethod::Eap,
        min_items: 8,
        max_items: 15,
        min_sem: 0.30,
        exposure_control: ExposureControl {
            enabled: true,
            top_k: 3,
        },
        ..CatConfig::default()
    }
}

pub fn engine(config: CatConfig) -> Arc<CatEngine> {
    Arc::new(CatEngine::new(bank(), config).expect("valid engine"))
}
