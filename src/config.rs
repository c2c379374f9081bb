use crate::diagram::Sankey;
use crate::layout::{self, CurveConfig};
use crate::legend::GroupPalette;
use crate::style::{Color, LineStyle, TextStyle, XAlign, YAlign};
use crate::theme::Theme;
use anyhow::{Context, anyhow};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupStyleConfig {
    pub color: String,
    pub line_color: Option<String>,
    pub line_width: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SankeyConfig {
    /// Padding between stocks of one category, in data units.
    pub stock_pad: f64,
    /// Stock bar width in pixels; derived from the label font when unset.
    pub bar_width: Option<f32>,
    /// Stock and default flow fill; the theme's stock color when unset.
    pub color: Option<String>,
    pub line_color: Option<String>,
    pub line_width: Option<f32>,
    pub line_dashes: Vec<f32>,
    pub curve_points: usize,
    pub direction_offset_frac: f32,
    /// Per-group flow styles. When present, every group must be listed.
    pub group_styles: BTreeMap<String, GroupStyleConfig>,
    /// Force the legend on or off; by default it is drawn when flows carry
    /// more than one group or group styles are configured.
    pub legend: Option<bool>,
}

impl Default for SankeyConfig {
    fn default() -> Self {
        let curve = CurveConfig::default();
        Self {
            stock_pad: 0.0,
            bar_width: None,
            color: None,
            line_color: None,
            line_width: None,
            line_dashes: Vec::new(),
            curve_points: curve.points,
            direction_offset_frac: curve.direction_offset_frac,
            group_styles: BTreeMap::new(),
            legend: None,
        }
    }
}

impl SankeyConfig {
    /// Applies styling to a freshly built diagram.
    pub fn apply(&self, sankey: &mut Sankey, theme: &Theme) -> anyhow::Result<()> {
        let color_source = self.color.as_deref().unwrap_or(&theme.stock_color);
        sankey.color = parse_color(color_source, "sankey.color")?;

        let line_color = self.line_color.as_deref().unwrap_or(&theme.line_color);
        sankey.line_style = LineStyle {
            color: parse_color(line_color, "sankey.lineColor")?,
            width: self.line_width.unwrap_or(theme.line_width),
            dashes: self.line_dashes.clone(),
        };

        sankey.text_style = TextStyle {
            color: parse_color(&theme.text_color, "themeVariables.textColor")?,
            font_family: theme.font_family.clone(),
            font_size: theme.font_size,
            rotation: std::f32::consts::FRAC_PI_2,
            x_align: XAlign::Center,
            y_align: YAlign::Center,
        };
        sankey.bar_width = match self.bar_width {
            Some(width) if width > 0.0 => width,
            _ => layout::default_bar_width(&sankey.text_style),
        };
        sankey.stock_pad = self.stock_pad.max(0.0);
        sankey.curve = CurveConfig {
            points: self.curve_points.max(2),
            direction_offset_frac: self.direction_offset_frac,
        };

        if let Some(palette) = self.palette(&sankey.line_style)? {
            sankey.set_flow_style(palette);
        }
        Ok(())
    }

    fn palette(&self, default_line: &LineStyle) -> anyhow::Result<Option<GroupPalette>> {
        if self.group_styles.is_empty() {
            return Ok(None);
        }
        let mut palette = GroupPalette::new();
        for (group, style) in &self.group_styles {
            let color = parse_color(&style.color, &format!("groupStyles.{group}.color"))?;
            let line = if style.line_color.is_some() || style.line_width.is_some() {
                let line_color = match &style.line_color {
                    Some(value) => {
                        parse_color(value, &format!("groupStyles.{group}.lineColor"))?
                    }
                    None => default_line.color,
                };
                Some(LineStyle {
                    color: line_color,
                    width: style.line_width.unwrap_or(default_line.width),
                    dashes: default_line.dashes.clone(),
                })
            } else {
                None
            };
            palette.insert(group.clone(), color, line);
        }
        Ok(Some(palette))
    }

    pub fn wants_legend(&self, group_count: usize) -> bool {
        self.legend
            .unwrap_or(group_count > 1 || !self.group_styles.is_empty())
    }
}

fn parse_color(value: &str, key: &str) -> anyhow::Result<Color> {
    Color::parse(value).ok_or_else(|| anyhow!("invalid color {value:?} for {key}"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub background: String,
    /// Margin around the plot area in pixels.
    pub padding: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 600.0,
            height: 360.0,
            background: "#FFFFFF".to_string(),
            padding: 24.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub sankey: SankeyConfig,
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        let theme = Theme::classic();
        let render = RenderConfig {
            background: theme.background.clone(),
            ..Default::default()
        };
        Self {
            theme,
            sankey: SankeyConfig::default(),
            render,
        }
    }
}

impl Config {
    /// Builds a diagram from `flows` styled by this configuration.
    pub fn build_diagram(&self, flows: Vec<crate::ir::Flow>) -> anyhow::Result<Sankey> {
        let mut sankey = Sankey::new(flows)?;
        self.sankey.apply(&mut sankey, &self.theme)?;
        Ok(sankey)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<NumberOrString>,
    text_color: Option<String>,
    title_color: Option<String>,
    #[serde(alias = "primaryColor")]
    stock_color: Option<String>,
    line_color: Option<String>,
    line_width: Option<NumberOrString>,
    background: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f32),
    String(String),
}

impl NumberOrString {
    fn as_f32(&self) -> Option<f32> {
        match self {
            NumberOrString::Number(val) => Some(*val),
            NumberOrString::String(val) => val.trim().trim_end_matches("px").parse::<f32>().ok(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    sankey: Option<Value>,
    render: Option<Value>,
}

fn theme_by_name(name: &str) -> Option<Theme> {
    match name {
        "modern" => Some(Theme::modern()),
        "classic" | "default" | "base" => Some(Theme::classic()),
        _ => None,
    }
}

fn apply_theme_variables(theme: &mut Theme, vars: ThemeVariables) {
    if let Some(v) = vars.font_family {
        theme.font_family = v;
    }
    if let Some(v) = vars.font_size.as_ref().and_then(NumberOrString::as_f32) {
        theme.font_size = v;
    }
    if let Some(v) = vars.text_color {
        theme.text_color = v;
    }
    if let Some(v) = vars.title_color {
        theme.title_color = v;
    }
    if let Some(v) = vars.stock_color {
        theme.stock_color = v;
    }
    if let Some(v) = vars.line_color {
        theme.line_color = v;
    }
    if let Some(v) = vars.line_width.as_ref().and_then(NumberOrString::as_f32) {
        theme.line_width = v;
    }
    if let Some(v) = vars.background {
        theme.background = v;
    }
}

fn apply_config_file(config: &mut Config, parsed: ConfigFile) -> anyhow::Result<()> {
    if let Some(theme) = parsed.theme.as_deref().and_then(theme_by_name) {
        config.render.background = theme.background.clone();
        config.theme = theme;
    }
    if let Some(vars) = parsed.theme_variables {
        let background = vars.background.clone();
        apply_theme_variables(&mut config.theme, vars);
        if let Some(bg) = background {
            config.render.background = bg;
        }
    }
    if let Some(overrides) = parsed.sankey {
        config.sankey = overlay(&config.sankey, overrides).context("invalid sankey section")?;
    }
    if let Some(overrides) = parsed.render {
        config.render = overlay(&config.render, overrides).context("invalid render section")?;
    }
    Ok(())
}

/// `section` with only the keys present in `overrides` replaced.
fn overlay<T: Serialize + DeserializeOwned>(section: &T, overrides: Value) -> anyhow::Result<T> {
    let mut merged = serde_json::to_value(section)?;
    merge_values(&mut merged, overrides);
    Ok(serde_json::from_value(merged)?)
}

fn merge_values(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(slot) => merge_values(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let parsed: ConfigFile = serde_json::from_str(&contents)
        .with_context(|| format!("parsing config {}", path.display()))?;
    apply_config_file(&mut config, parsed)
        .with_context(|| format!("applying config {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Overlays an `%%{init: ...}%%` directive on top of `config`. Only the keys
/// it names change. Unknown keys are ignored; a malformed directive leaves
/// `config` unchanged.
pub fn merge_init_config(config: Config, init: Value) -> Config {
    let mut merged = config.clone();
    let applied = serde_json::from_value::<ConfigFile>(init)
        .map_err(anyhow::Error::from)
        .and_then(|parsed| apply_config_file(&mut merged, parsed));
    match applied {
        Ok(()) => merged,
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "ignoring malformed init directive");
            config
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Flow;

    fn flows() -> Vec<Flow> {
        vec![
            Flow::new(0, "Large", 1, "Mohamed", 5.0).with_group("Apples"),
            Flow::new(0, "Small", 1, "Mohamed", 2.0).with_group("Dates"),
        ]
    }

    #[test]
    fn defaults_match_classic_look() {
        let config = Config::default();
        let sankey = config.build_diagram(flows()).unwrap();
        assert_eq!(sankey.color, Color::rgba(0, 0, 0, 100));
        assert_eq!(sankey.line_style.color, Color::rgba(0, 0, 0, 150));
        assert_eq!(sankey.curve, CurveConfig::default());
        assert!(sankey.bar_width > 0.0);
        assert!(sankey.flow_style("anything").is_ok());
    }

    #[test]
    fn group_styles_become_a_strict_palette() {
        let mut config = Config::default();
        config.sankey.group_styles.insert(
            "Apples".to_string(),
            GroupStyleConfig {
                color: "#5bc23664".to_string(),
                ..Default::default()
            },
        );
        let sankey = config.build_diagram(flows()).unwrap();
        assert_eq!(
            sankey.flow_style("Apples").unwrap().color,
            Color::rgba(91, 194, 54, 100)
        );
        assert!(sankey.flow_style("Dates").is_err());
        assert!(config.sankey.wants_legend(1));
    }

    #[test]
    fn bad_colors_are_reported_with_their_key() {
        let mut config = Config::default();
        config.sankey.color = Some("not-a-color".to_string());
        let err = config.build_diagram(flows()).err().unwrap();
        assert!(err.to_string().contains("sankey.color"));
    }

    #[test]
    fn construction_errors_pass_through() {
        let config = Config::default();
        let err = config
            .build_diagram(vec![Flow::new(1, "a", 0, "b", 1.0)])
            .err()
            .unwrap();
        assert!(err.downcast_ref::<crate::SankeyError>().is_some());
    }

    #[test]
    fn init_directive_overrides_theme_and_sankey() {
        let init = serde_json::json!({
            "theme": "modern",
            "themeVariables": { "fontSize": "14px", "primaryColor": "#ff000080" },
            "sankey": { "stockPad": 1.5, "barWidth": 20 }
        });
        let config = merge_init_config(Config::default(), init);
        assert_eq!(config.theme.font_size, 14.0);
        assert_eq!(config.theme.stock_color, "#ff000080");
        assert_eq!(config.sankey.stock_pad, 1.5);
        assert_eq!(config.sankey.bar_width, Some(20.0));
        assert_eq!(config.sankey.curve_points, 20);
    }

    #[test]
    fn malformed_init_is_ignored() {
        let mut base = Config::default();
        base.sankey.curve_points = 40;
        let init = serde_json::json!({ "sankey": { "stockPad": "wide", "curvePoints": 8 } });
        let config = merge_init_config(base, init);
        assert_eq!(config.sankey.stock_pad, 0.0);
        assert_eq!(config.sankey.curve_points, 40);
    }

    #[test]
    fn init_directive_layers_over_loaded_sections() {
        let mut base = Config::default();
        base.render.width = 900.0;
        base.sankey.curve_points = 40;
        base.sankey.bar_width = Some(14.0);
        base.sankey.group_styles.insert(
            "Apples".to_string(),
            GroupStyleConfig {
                color: "green".to_string(),
                ..Default::default()
            },
        );
        let init = serde_json::json!({
            "sankey": {
                "stockPad": 1,
                "groupStyles": {
                    "Apples": { "lineWidth": 2 },
                    "Dates": { "color": "#9e4a1e64" }
                }
            },
            "render": { "height": 400 }
        });
        let config = merge_init_config(base, init);

        assert_eq!(config.render.width, 900.0);
        assert_eq!(config.render.height, 400.0);
        assert_eq!(config.sankey.stock_pad, 1.0);
        assert_eq!(config.sankey.curve_points, 40);
        assert_eq!(config.sankey.bar_width, Some(14.0));
        let apples = &config.sankey.group_styles["Apples"];
        assert_eq!(apples.color, "green");
        assert_eq!(apples.line_width, Some(2.0));
        assert!(config.sankey.group_styles.contains_key("Dates"));

        let sankey = config.build_diagram(flows()).unwrap();
        assert!(sankey.flow_style("Dates").is_ok());
        assert!(sankey.flow_style("Lychees").is_err());
    }

    #[test]
    fn legend_defaults_to_multiple_groups() {
        let config = SankeyConfig::default();
        assert!(!config.wants_legend(1));
        assert!(config.wants_legend(3));
        let forced = SankeyConfig {
            legend: Some(false),
            ..SankeyConfig::default()
        };
        assert!(!forced.wants_legend(3));
    }

    #[test]
    fn load_reads_json_sections() {
        let path = std::env::temp_dir().join(format!("sankey-config-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r##"{
                "theme": "modern",
                "themeVariables": { "background": "#fafafa" },
                "sankey": { "lineDashes": [3, 1], "groupStyles": { "Apples": { "color": "green" } } },
                "render": { "width": 800 }
            }"##,
        )
        .unwrap();
        let config = load_config(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.theme.font_size, 12.0);
        assert_eq!(config.sankey.line_dashes, vec![3.0, 1.0]);
        assert!(config.sankey.group_styles.contains_key("Apples"));
        assert_eq!(config.render.width, 800.0);
        assert_eq!(config.render.height, 360.0);
        assert_eq!(config.render.background, "#fafafa");
    }

    #[test]
    fn load_without_path_is_default() {
        let config = load_config(None).unwrap();
        assert_eq!(config.render.width, 600.0);
        assert_eq!(config.theme.font_size, 10.0);
    }
}
