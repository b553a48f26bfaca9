//! The WP × partner × category amount matrix.
//!
//! In memory every cell is addressed by a typed [`CellKey`]. At the serde
//! boundary the matrix is a flat JSON object keyed `"wpId:partnerId:category"`,
//! which is the shape hosts persist.

use super::{PartnerId, WorkPackageId};
use crate::category::CostCategory;
use crate::error::BudgetError;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Whole-EUR amount.
pub type Amount = i64;

/// Largest magnitude a single cell may hold. Far above any lump-sum tier, and
/// small enough that summing every cell of a matrix cannot overflow.
pub const MAX_CELL_AMOUNT: Amount = 1_000_000_000;

/// Bound `amount` to `±MAX_CELL_AMOUNT`.
pub fn clamp_amount(amount: Amount) -> Amount {
    amount.clamp(-MAX_CELL_AMOUNT, MAX_CELL_AMOUNT)
}

const KEY_SEPARATOR: char = ':';

/// Composite key of one cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub work_package: WorkPackageId,
    pub partner: PartnerId,
    pub category: CostCategory,
}

impl CellKey {
    pub fn new(work_package: &WorkPackageId, partner: &PartnerId, category: CostCategory) -> Self {
        Self {
            work_package: work_package.clone(),
            partner: partner.clone(),
            category,
        }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{KEY_SEPARATOR}{}{KEY_SEPARATOR}{}",
            self.work_package,
            self.partner,
            self.category.key()
        )
    }
}

impl FromStr for CellKey {
    type Err = BudgetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(KEY_SEPARATOR).collect();
        let [wp, partner, category] = parts.as_slice() else {
            return Err(BudgetError::InvalidCellKey(s.to_string()));
        };
        if wp.is_empty() || partner.is_empty() {
            return Err(BudgetError::InvalidCellKey(s.to_string()));
        }
        let category = category
            .parse::<CostCategory>()
            .map_err(|_| BudgetError::InvalidCellKey(s.to_string()))?;
        Ok(Self {
            work_package: WorkPackageId::new(*wp),
            partner: PartnerId::new(*partner),
            category,
        })
    }
}

/// Sparse matrix of cell amounts. Absent keys read as 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellMatrix(BTreeMap<CellKey, Amount>);

impl CellMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, wp: &WorkPackageId, partner: &PartnerId, category: CostCategory) -> Amount {
        self.0
            .get(&CellKey::new(wp, partner, category))
            .copied()
            .unwrap_or(0)
    }

    /// Store an amount, bounded by [`MAX_CELL_AMOUNT`]. Zero removes the key
    /// so the matrix stays sparse.
    pub fn set(
        &mut self,
        wp: &WorkPackageId,
        partner: &PartnerId,
        category: CostCategory,
        amount: Amount,
    ) {
        let key = CellKey::new(wp, partner, category);
        let amount = clamp_amount(amount);
        if amount == 0 {
            self.0.remove(&key);
        } else {
            self.0.insert(key, amount);
        }
    }

    /// Add `delta` to a cell (which may be absent).
    pub fn adjust(&mut self, key: &CellKey, delta: Amount) {
        let current = self.0.get(key).copied().unwrap_or(0);
        let next = clamp_amount(current.saturating_add(delta));
        if next == 0 {
            self.0.remove(key);
        } else {
            self.0.insert(key.clone(), next);
        }
    }

    /// Drop every cell of a partner. Returns how many cells were removed.
    pub fn remove_partner(&mut self, partner: &PartnerId) -> usize {
        let before = self.0.len();
        self.0.retain(|k, _| &k.partner != partner);
        before - self.0.len()
    }

    /// Drop every cell of a work package. Returns how many cells were removed.
    pub fn remove_work_package(&mut self, wp: &WorkPackageId) -> usize {
        let before = self.0.len();
        self.0.retain(|k, _| &k.work_package != wp);
        before - self.0.len()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CellKey, Amount)> {
        self.0.iter().map(|(k, v)| (k, *v))
    }

    /// Sum of every stored cell, including cells whose partner or work
    /// package no longer exists.
    pub fn raw_total(&self) -> Amount {
        self.0.values().sum()
    }
}

impl FromIterator<(CellKey, Amount)> for CellMatrix {
    fn from_iter<I: IntoIterator<Item = (CellKey, Amount)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k, clamp_amount(v)))
                .filter(|(_, v)| *v != 0)
                .collect(),
        )
    }
}

impl Serialize for CellMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k.to_string(), v)))
    }
}

impl<'de> Deserialize<'de> for CellMatrix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let flat = BTreeMap::<String, Amount>::deserialize(deserializer)?;
        let mut cells = BTreeMap::new();
        for (key, amount) in flat {
            let key = key.parse::<CellKey>().map_err(D::Error::custom)?;
            let amount = clamp_amount(amount);
            if amount != 0 {
                cells.insert(key, amount);
            }
        }
        Ok(Self(cells))
    }
}
