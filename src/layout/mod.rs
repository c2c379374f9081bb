mod spline;
mod stack;
mod stock;
mod text;
pub(crate) mod types;

pub use spline::{CurveConfig, Spline, sankey_curve};
pub use stack::{data_range, stack, stock_list};
pub use stock::{Stock, StockTable};
pub use text::{default_bar_width, font_height, text_width};
pub use types::*;
