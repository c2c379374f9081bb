use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub text_color: String,
    pub title_color: String,
    pub stock_color: String,
    pub line_color: String,
    pub line_width: f32,
    pub background: String,
}

impl Theme {
    /// Translucent black stocks and flows on white.
    pub fn classic() -> Self {
        Self {
            font_family: "\"Liberation Serif\", \"Times New Roman\", serif".to_string(),
            font_size: 10.0,
            text_color: "#000000".to_string(),
            title_color: "#000000".to_string(),
            stock_color: "rgba(0, 0, 0, 0.392)".to_string(),
            line_color: "rgba(0, 0, 0, 0.588)".to_string(),
            line_width: 1.0,
            background: "#FFFFFF".to_string(),
        }
    }

    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 12.0,
            text_color: "#1C2430".to_string(),
            title_color: "#1C2430".to_string(),
            stock_color: "rgba(122, 138, 166, 0.55)".to_string(),
            line_color: "rgba(28, 36, 48, 0.6)".to_string(),
            line_width: 0.8,
            background: "#FFFFFF".to_string(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::classic()
    }
}
