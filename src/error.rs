pub type SankeyResult<T> = Result<T, SankeyError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SankeyError {
    #[error(
        "flow {index}: source category ({source_category}) >= receptor category ({receptor_category})"
    )]
    InvalidOrdering {
        index: usize,
        source_category: i32,
        receptor_category: i32,
    },

    #[error("flow {index}: value ({value}) < 0")]
    NegativeValue { index: usize, value: f64 },

    #[error("flow {index}: value ({value}) is not finite")]
    NonFiniteValue { index: usize, value: f64 },

    #[error("no style for flow group {group:?}")]
    UnknownGroupStyle { group: String },
}

impl SankeyError {
    pub fn unknown_group(group: impl Into<String>) -> Self {
        Self::UnknownGroupStyle {
            group: group.into(),
        }
    }
}
