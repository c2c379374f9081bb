use crate::canvas::{Canvas, Transforms};
use crate::config::Config;
#[cfg(feature = "png")]
use crate::config::RenderConfig;
use crate::diagram::Sankey;
use crate::ir::FlowDiagram;
use crate::layout::{DataRange, Point, Rect, SankeyLayout, text_width};
use crate::style::{Color, LineStyle, TextStyle, XAlign, YAlign};
use anyhow::Result;
use std::fmt::Write as _;
use std::path::Path;

/// A [`Canvas`] that accumulates SVG elements.
#[derive(Debug, Clone)]
pub struct SvgCanvas {
    bounds: Rect,
    body: String,
}

impl SvgCanvas {
    /// `bounds` is the clip area the diagram is kept inside.
    pub fn new(bounds: Rect) -> Self {
        Self {
            bounds,
            body: String::new(),
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

impl Canvas for SvgCanvas {
    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn fill_polygon(&mut self, color: Color, points: &[Point]) {
        if points.len() < 3 {
            return;
        }
        let _ = write!(
            self.body,
            "<polygon points=\"{}\" fill=\"{}\"{}/>",
            points_attr(points),
            color.to_hex(),
            opacity_attr("fill-opacity", color)
        );
    }

    fn stroke_lines(&mut self, style: &LineStyle, lines: &[Vec<Point>]) {
        if style.width <= 0.0 {
            return;
        }
        for line in lines.iter().filter(|line| line.len() >= 2) {
            let _ = write!(
                self.body,
                "<polyline points=\"{}\" fill=\"none\" stroke=\"{}\"{} stroke-width=\"{}\"{}/>",
                points_attr(line),
                style.color.to_hex(),
                opacity_attr("stroke-opacity", style.color),
                style.width,
                dash_attr(&style.dashes)
            );
        }
    }

    fn fill_text(&mut self, style: &TextStyle, at: Point, text: &str) {
        if text.is_empty() {
            return;
        }
        let anchor = match style.x_align {
            XAlign::Left => "start",
            XAlign::Center => "middle",
            XAlign::Right => "end",
        };
        let baseline = match style.y_align {
            YAlign::Top => "hanging",
            YAlign::Center => "central",
            YAlign::Bottom => "alphabetic",
        };
        let rotate = if style.rotation != 0.0 {
            // counter-clockwise in data space is a negative SVG rotation
            format!(
                " transform=\"rotate({:.2} {:.2} {:.2})\"",
                -style.rotation.to_degrees(),
                at.x,
                at.y
            )
        } else {
            String::new()
        };
        let _ = write!(
            self.body,
            "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"{anchor}\" dominant-baseline=\"{baseline}\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\"{}{rotate}>{}</text>",
            at.x,
            at.y,
            escape_xml(&style.font_family),
            style.font_size,
            style.color.to_hex(),
            opacity_attr("fill-opacity", style.color),
            escape_xml(text)
        );
    }
}

fn points_attr(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{:.2},{:.2}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ")
}

fn opacity_attr(name: &str, color: Color) -> String {
    if color.a == 255 {
        String::new()
    } else {
        format!(" {name}=\"{:.3}\"", color.opacity())
    }
}

fn dash_attr(dashes: &[f32]) -> String {
    if dashes.is_empty() {
        return String::new();
    }
    let values = dashes
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    format!(" stroke-dasharray=\"{values}\"")
}

/// Linear mapping of a data range onto a plot area. Categories are padded by
/// half a column on each side; values grow upward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    category_min: f64,
    category_max: f64,
    value_min: f64,
    value_max: f64,
    area: Rect,
}

impl Frame {
    pub fn new(range: DataRange, area: Rect) -> Self {
        let range = if range.is_empty() {
            DataRange {
                category_min: 0.0,
                category_max: 0.0,
                value_min: 0.0,
                value_max: 1.0,
            }
        } else {
            range
        };
        let value_max = if range.value_max > range.value_min {
            range.value_max
        } else {
            range.value_min + 1.0
        };
        Self {
            category_min: range.category_min - 0.5,
            category_max: range.category_max + 0.5,
            value_min: range.value_min,
            value_max,
            area,
        }
    }
}

impl Transforms for Frame {
    fn category(&self, category: f64) -> f32 {
        let t = (category - self.category_min) / (self.category_max - self.category_min);
        self.area.min.x + (t as f32) * self.area.width()
    }

    fn value(&self, value: f64) -> f32 {
        let t = (value - self.value_min) / (self.value_max - self.value_min);
        self.area.max.y - (t as f32) * self.area.height()
    }
}

/// SVG document plus the geometry it was drawn from.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub svg: String,
    pub layout: SankeyLayout,
}

const LEGEND_SWATCH: (f32, f32) = (22.0, 10.0);
const LEGEND_GAP: f32 = 8.0;

/// Draws `sankey` into a complete SVG page: background, title, the diagram,
/// category labels under the columns and the group legend.
#[tracing::instrument(skip_all, fields(width = config.render.width, height = config.render.height))]
pub fn render_svg(sankey: &mut Sankey, diagram: &FlowDiagram, config: &Config) -> Result<Rendered> {
    let render = &config.render;
    let theme = &config.theme;
    let width = render.width.max(100.0);
    let height = render.height.max(100.0);
    let pad = render.padding.max(0.0);

    let label_style = TextStyle {
        rotation: 0.0,
        x_align: XAlign::Center,
        y_align: YAlign::Top,
        ..sankey.text_style.clone()
    };
    let title_style = TextStyle {
        color: Color::parse(&theme.title_color).unwrap_or(label_style.color),
        font_size: theme.font_size * 1.4,
        ..label_style.clone()
    };

    let mut top = pad;
    if diagram.title.is_some() {
        top += title_style.font_size * 1.6;
    }
    let bottom = height - pad - label_style.font_size * 2.0;

    let (groups, thumbnails) = sankey.groups_and_thumbnails()?;
    let legend = config.sankey.wants_legend(groups.len());
    let legend_width = if legend {
        let widest = groups
            .iter()
            .map(|g| text_width(g, label_style.font_size, &label_style.font_family))
            .fold(0.0_f32, f32::max);
        LEGEND_SWATCH.0 + LEGEND_GAP * 3.0 + widest
    } else {
        0.0
    };

    let area = Rect::new(pad, top, width - pad - legend_width, bottom);
    let frame = Frame::new(sankey.data_range(), area);
    let mut canvas = SvgCanvas::new(area);
    let layout = sankey.plot(&mut canvas, &frame)?;

    if let Some(title) = &diagram.title {
        canvas.fill_text(&title_style, Point::new(width / 2.0, pad), title);
    }
    for category in sankey.stocks().categories() {
        let x = frame.category(category as f64);
        let at = Point::new(x, area.max.y + label_style.font_size * 0.5);
        canvas.fill_text(&label_style, at, &diagram.category_label(category));
    }

    if legend {
        let entry_style = TextStyle {
            x_align: XAlign::Left,
            y_align: YAlign::Center,
            ..label_style.clone()
        };
        let x = area.max.x + LEGEND_GAP;
        let row = (label_style.font_size * 1.6).max(LEGEND_SWATCH.1 + 4.0);
        for (i, (group, thumb)) in groups.iter().zip(&thumbnails).enumerate() {
            let y = area.min.y + i as f32 * row;
            let swatch = Rect::new(x, y, x + LEGEND_SWATCH.0, y + LEGEND_SWATCH.1);
            thumb.draw(&mut canvas, swatch);
            let at = Point::new(swatch.max.x + LEGEND_GAP, swatch.center().y);
            canvas.fill_text(&entry_style, at, group);
        }
    }

    let background = Color::parse(&render.background).unwrap_or(Color::WHITE);
    let mut svg = String::new();
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">"
    );
    let _ = write!(
        svg,
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"{}/>",
        background.to_hex(),
        opacity_attr("fill-opacity", background)
    );
    svg.push_str(canvas.body());
    svg.push_str("</svg>");

    tracing::debug!(
        flows = layout.flows.len(),
        stocks = layout.stocks.len(),
        bytes = svg.len(),
        "rendered svg"
    );
    Ok(Rendered { svg, layout })
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.fontdb_mut().load_system_fonts();
    let fallback = usvg::Size::from_wh(600.0, 360.0)
        .ok_or_else(|| anyhow::anyhow!("invalid fallback size"))?;
    opt.default_size = usvg::Size::from_wh(render_cfg.width, render_cfg.height).unwrap_or(fallback);

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GroupStyleConfig;
    use crate::ir::Flow;

    fn fruit() -> FlowDiagram {
        let mut diagram = FlowDiagram::new();
        diagram.title = Some("Fruit <2024>".to_string());
        diagram.category_labels.insert(0, "Tree".to_string());
        diagram.flows = vec![
            Flow::new(0, "Large", 1, "Mohamed", 5.0).with_group("Apples"),
            Flow::new(0, "Small", 1, "Mohamed", 2.0).with_group("Dates"),
            Flow::new(0, "Large", 1, "Sofia", 3.0).with_group("Apples"),
        ];
        diagram
    }

    fn render(config: &Config) -> Result<Rendered> {
        let mut diagram = fruit();
        let flows = std::mem::take(&mut diagram.flows);
        let mut sankey = config.build_diagram(flows)?;
        render_svg(&mut sankey, &diagram, config)
    }

    #[test]
    fn frame_pads_categories_and_flips_values() {
        let range = DataRange {
            category_min: 0.0,
            category_max: 1.0,
            value_min: 0.0,
            value_max: 10.0,
        };
        let frame = Frame::new(range, Rect::new(0.0, 0.0, 200.0, 100.0));
        assert_eq!(frame.category(0.0), 50.0);
        assert_eq!(frame.category(1.0), 150.0);
        assert_eq!(frame.value(0.0), 100.0);
        assert_eq!(frame.value(10.0), 0.0);
        assert_eq!(frame.category(1.5), 200.0);
    }

    #[test]
    fn frame_survives_degenerate_ranges() {
        let frame = Frame::new(DataRange::EMPTY, Rect::new(0.0, 0.0, 100.0, 100.0));
        assert!(frame.category(0.0).is_finite());
        assert!(frame.value(0.0).is_finite());
    }

    #[test]
    fn canvas_emits_rgba_and_dashes() {
        let mut canvas = SvgCanvas::new(Rect::new(0.0, 0.0, 10.0, 10.0));
        canvas.fill_polygon(
            Color::rgba(255, 0, 0, 51),
            &[Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 1.0)],
        );
        let line = LineStyle {
            color: Color::BLACK,
            width: 2.0,
            dashes: vec![4.0, 2.0],
        };
        canvas.stroke_lines(&line, &[vec![Point::new(0.0, 0.0), Point::new(5.0, 5.0)]]);
        let body = canvas.body();
        assert!(body.contains("fill=\"#ff0000\" fill-opacity=\"0.200\""));
        assert!(body.contains("stroke-dasharray=\"4 2\""));
        assert!(body.contains("stroke-width=\"2\""));
    }

    #[test]
    fn rotated_text_is_escaped_and_turned() {
        let mut canvas = SvgCanvas::new(Rect::new(0.0, 0.0, 10.0, 10.0));
        let style = TextStyle {
            color: Color::BLACK,
            font_family: "sans-serif".to_string(),
            font_size: 10.0,
            rotation: std::f32::consts::FRAC_PI_2,
            x_align: XAlign::Center,
            y_align: YAlign::Center,
        };
        canvas.fill_text(&style, Point::new(5.0, 5.0), "A & B");
        assert!(canvas.body().contains("A &amp; B"));
        assert!(canvas.body().contains("rotate(-90.00 5.00 5.00)"));
    }

    #[test]
    fn render_svg_basic() {
        let rendered = render(&Config::default()).unwrap();
        let svg = rendered.svg;
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("Fruit &lt;2024&gt;"));
        assert!(svg.contains(">Tree</text>"));
        // unnamed category falls back to its index
        assert!(svg.contains(">1</text>"));
        assert!(svg.contains(">Mohamed</text>"));
        // two groups: legend present
        assert!(svg.contains(">Apples</text>"));
        assert_eq!(rendered.layout.flows.len(), 3);
        assert_eq!(rendered.layout.stocks.len(), 4);
    }

    #[test]
    fn render_keeps_stocks_inside_the_plot() {
        let config = Config::default();
        let rendered = render(&config).unwrap();
        let pad = config.render.padding;
        for stock in &rendered.layout.stocks {
            assert!(stock.rect.min.x >= pad);
            assert!(stock.rect.max.x <= config.render.width - pad);
            assert!(stock.rect.min.y >= pad);
        }
    }

    #[test]
    fn unknown_group_fails_the_render() {
        let mut config = Config::default();
        config.sankey.group_styles.insert(
            "Apples".to_string(),
            GroupStyleConfig {
                color: "#5bc236".to_string(),
                ..Default::default()
            },
        );
        let err = render(&config).unwrap_err();
        assert_eq!(
            err.downcast_ref::<crate::SankeyError>(),
            Some(&crate::SankeyError::unknown_group("Dates"))
        );
    }
}
