//! Calibrated item bank.
//!
//! Items arrive as [`ItemRecord`]s in the usual difficulty parameterisation
//! and are converted once, at load time, into slope-intercept form:
//! `P*(x >= j) = sigmoid(slope * theta + intercept[j - 1])` with
//! `intercept[j] = -a * b[j]`. Reverse-keyed items get `slope = -a` while the
//! intercepts stay as calibrated, which mirrors the forward curves at `-theta`
//! and keeps the cumulative curves ordered.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub type ItemId = u32;

/// One calibrated item as supplied by the upstream calibration step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: ItemId,
    pub category_count: usize,
    pub discrimination: f64,
    pub thresholds: Vec<f64>,
    #[serde(default, alias = "reverse_flag")]
    pub reverse: bool,
    #[serde(default)]
    pub display_text: String,
}

/// An immutable, validated item ready for probability computations.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    id: ItemId,
    category_count: usize,
    discrimination: f64,
    thresholds: Vec<f64>,
    reverse: bool,
    display_text: String,
    slope: f64,
    intercepts: Vec<f64>,
}

impl Item {
    pub fn from_record(record: ItemRecord) -> Result<Self, ConfigError> {
        let ItemRecord {
            id,
            category_count,
            discrimination,
            thresholds,
            reverse,
            display_text,
        } = record;

        if category_count < 2 {
            return Err(ConfigError::CategoryCount {
                item_id: id,
                category_count,
            });
        }
        if thresholds.len() != category_count - 1 {
            return Err(ConfigError::ThresholdCount {
                item_id: id,
                expected: category_count - 1,
                actual: thresholds.len(),
            });
        }
        if !thresholds.iter().all(|b| b.is_finite())
            || thresholds.windows(2).any(|w| w[1] <= w[0])
        {
            return Err(ConfigError::ThresholdOrder { item_id: id });
        }
        if !discrimination.is_finite() || discrimination <= 0.0 {
            return Err(ConfigError::Discrimination {
                item_id: id,
                value: discrimination,
            });
        }

        let slope = if reverse {
            -discrimination
        } else {
            discrimination
        };
        let intercepts = thresholds.iter().map(|&b| -discrimination * b).collect();

        Ok(Self {
            id,
            category_count,
            discrimination,
            thresholds,
            reverse,
            display_text,
            slope,
            intercepts,
        })
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn category_count(&self) -> usize {
        self.category_count
    }

    /// Calibrated (unsigned) discrimination.
    pub fn discrimination(&self) -> f64 {
        self.discrimination
    }

    /// Effective discrimination used by the response model (`-a` for reverse items).
    pub fn effective_discrimination(&self) -> f64 {
        self.slope
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn intercepts(&self) -> &[f64] {
        &self.intercepts
    }

    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    pub fn display_text(&self) -> &str {
        &self.display_text
    }

    /// The same calibration keyed the other way round.
    pub fn to_record(&self) -> ItemRecord {
        ItemRecord {
            id: self.id,
            category_count: self.category_count,
            discrimination: self.discrimination,
            thresholds: self.thresholds.clone(),
            reverse: self.reverse,
            display_text: self.display_text.clone(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BankFile {
    Wrapped { items: Vec<ItemRecord> },
    Bare(Vec<ItemRecord>),
}

/// Ordered, immutable collection of uniquely identified items.
#[derive(Debug, Clone)]
pub struct ItemBank {
    items: Vec<Item>,
    index: HashMap<ItemId, usize>,
}

impl ItemBank {
    pub fn from_records(records: Vec<ItemRecord>) -> Result<Self, ConfigError> {
        if records.is_empty() {
            return Err(ConfigError::EmptyBank);
        }

        let mut items = Vec::with_capacity(records.len());
        let mut index = HashMap::with_capacity(records.len());
        for record in records {
            let item = Item::from_record(record)?;
            if index.insert(item.id(), items.len()).is_some() {
                return Err(ConfigError::DuplicateItem { item_id: item.id() });
            }
            items.push(item);
        }

        Ok(Self { items, index })
    }

    /// Parse a JSON array of item records, or an object with an `items` array.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let file: BankFile = serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            what: "item bank",
            reason: e.to_string(),
        })?;
        let records = match file {
            BankFile::Wrapped { items } => items,
            BankFile::Bare(items) => items,
        };
        Self::from_records(records)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let bank = Self::from_json_str(&json)?;
        tracing::debug!(path = %path.display(), items = bank.len(), "loaded item bank");
        Ok(bank)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Item at a bank position; positions come from this bank's own index.
    pub(crate) fn item(&self, position: usize) -> &Item {
        &self.items[position]
    }

    /// Item at a bank position, `None` past the end.
    pub fn item_at(&self, position: usize) -> Option<&Item> {
        self.items.get(position)
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.index.get(&id).map(|&pos| &self.items[pos])
    }

    /// Bank position of an item id.
    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn records(&self) -> Vec<ItemRecord> {
        self.items.iter().map(Item::to_record).collect()
    }
}
