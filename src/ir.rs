use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Group assigned to flows declared without one.
pub const DEFAULT_GROUP: &str = "Default";

/// An amount of an entity flowing from one stock to another.
///
/// Stocks are addressed by `(category, label)`. The source category must be
/// strictly lower than the receptor category and the value must not be
/// negative; both are checked when the flow is handed to
/// [`Sankey::new`](crate::diagram::Sankey::new), which takes ownership of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    pub source_category: i32,
    pub source_label: String,
    pub receptor_category: i32,
    pub receptor_label: String,
    pub value: f64,
    #[serde(default)]
    pub group: String,
}

impl Flow {
    pub fn new(
        source_category: i32,
        source_label: impl Into<String>,
        receptor_category: i32,
        receptor_label: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            source_category,
            source_label: source_label.into(),
            receptor_category,
            receptor_label: receptor_label.into(),
            value,
            group: String::new(),
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Replaces a blank group with [`DEFAULT_GROUP`].
    pub fn normalize_group(&mut self) {
        if self.group.trim().is_empty() {
            self.group = DEFAULT_GROUP.to_string();
        }
    }
}

/// Everything a source file declares: the flows plus presentation hints for
/// the host.
#[derive(Debug, Clone, Default)]
pub struct FlowDiagram {
    pub title: Option<String>,
    pub category_labels: BTreeMap<i32, String>,
    pub flows: Vec<Flow>,
}

impl FlowDiagram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category_label(&self, category: i32) -> String {
        self.category_labels
            .get(&category)
            .cloned()
            .unwrap_or_else(|| category.to_string())
    }
}
