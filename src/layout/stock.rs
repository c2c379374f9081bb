use std::collections::{BTreeMap, HashMap};

use crate::error::{SankeyError, SankeyResult};
use crate::ir::Flow;

use super::StockKey;

/// Amount held by one `(category, label)` pair and where it is plotted.
#[derive(Debug, Clone, PartialEq)]
pub struct Stock {
    pub category: i32,
    pub label: String,
    /// First-seen position within the category.
    pub order: usize,
    pub source_value: f64,
    pub receptor_value: f64,
    /// Start of the bar on the value axis.
    pub min: f64,
    /// `min` plus the larger of the two totals.
    pub max: f64,
    /// Portion of the outbound side already claimed in the current pass.
    pub source_placeholder: f64,
    /// Portion of the inbound side already claimed in the current pass.
    pub receptor_placeholder: f64,
}

impl Stock {
    fn new(category: i32, label: &str, order: usize) -> Self {
        Self {
            category,
            label: label.to_string(),
            order,
            source_value: 0.0,
            receptor_value: 0.0,
            min: 0.0,
            max: 0.0,
            source_placeholder: 0.0,
            receptor_placeholder: 0.0,
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.category, self.label.clone())
    }

    /// Height of the bar: the larger of inflow and outflow.
    pub fn size(&self) -> f64 {
        self.source_value.max(self.receptor_value)
    }

    pub fn is_balanced(&self) -> bool {
        self.source_value == self.receptor_value
    }
}

/// Stocks of a diagram, stored in creation order and indexed by category
/// then label.
#[derive(Debug, Clone, Default)]
pub struct StockTable {
    stocks: Vec<Stock>,
    index: BTreeMap<i32, HashMap<String, usize>>,
}

impl StockTable {
    /// Aggregates `flows` into stocks.
    ///
    /// Every flow is validated before any stock is created, so an error never
    /// leaves a partially built table behind.
    pub fn build(flows: &[Flow]) -> SankeyResult<Self> {
        for (index, flow) in flows.iter().enumerate() {
            validate_flow(index, flow)?;
        }

        let mut table = Self::default();
        for flow in flows {
            let source = table.ensure(flow.source_category, &flow.source_label);
            table.stocks[source].source_value += flow.value;
            let receptor = table.ensure(flow.receptor_category, &flow.receptor_label);
            table.stocks[receptor].receptor_value += flow.value;
        }
        Ok(table)
    }

    fn ensure(&mut self, category: i32, label: &str) -> usize {
        let labels = self.index.entry(category).or_default();
        if let Some(&idx) = labels.get(label) {
            return idx;
        }
        let idx = self.stocks.len();
        self.stocks.push(Stock::new(category, label, labels.len()));
        labels.insert(label.to_string(), idx);
        idx
    }

    pub fn len(&self) -> usize {
        self.stocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stocks.is_empty()
    }

    pub fn get(&self, category: i32, label: &str) -> Option<&Stock> {
        self.position(category, label).map(|idx| &self.stocks[idx])
    }

    pub fn position(&self, category: i32, label: &str) -> Option<usize> {
        self.index.get(&category)?.get(label).copied()
    }

    /// Categories in ascending order.
    pub fn categories(&self) -> impl Iterator<Item = i32> + '_ {
        self.index.keys().copied()
    }

    /// Stocks in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Stock> {
        self.stocks.iter()
    }

    pub fn as_slice(&self) -> &[Stock] {
        &self.stocks
    }
}

impl std::ops::Index<usize> for StockTable {
    type Output = Stock;

    fn index(&self, idx: usize) -> &Stock {
        &self.stocks[idx]
    }
}

impl std::ops::IndexMut<usize> for StockTable {
    fn index_mut(&mut self, idx: usize) -> &mut Stock {
        &mut self.stocks[idx]
    }
}

fn validate_flow(index: usize, flow: &Flow) -> SankeyResult<()> {
    if flow.source_category >= flow.receptor_category {
        return Err(SankeyError::InvalidOrdering {
            index,
            source_category: flow.source_category,
            receptor_category: flow.receptor_category,
        });
    }
    // also rejects NaN
    if !(flow.value >= 0.0) {
        return Err(SankeyError::NegativeValue {
            index,
            value: flow.value,
        });
    }
    if !flow.value.is_finite() {
        return Err(SankeyError::NonFiniteValue {
            index,
            value: flow.value,
        });
    }
    Ok(())
}
