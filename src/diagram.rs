//! A Sankey diagram presents stock and flow data as rectangles representing
//! the amount of each stock and bands between the stocks representing the
//! amount of each flow.

use std::collections::BTreeSet;

use crate::canvas::{Canvas, Transforms};
use crate::error::SankeyResult;
use crate::ir::Flow;
use crate::layout::{
    self, CurveConfig, DataRange, FlowBand, GlyphBox, Point, Rect, SankeyLayout, Stock,
    StockRect, StockTable, sankey_curve,
};
use crate::legend::{DefaultStyle, GroupStyleResolver, Thumbnail};
use crate::style::{Color, FlowStyle, LineStyle, TextStyle, XAlign, YAlign};

pub const DEFAULT_FONT_FAMILY: &str = "sans-serif";
pub const DEFAULT_FONT_SIZE: f32 = 10.0;

/// Flows plus the stocks aggregated from them.
///
/// A diagram owns its flows. Handing the same flow to a second diagram is a
/// move error:
///
/// ```compile_fail
/// use sankey_rs_renderer::{Flow, Sankey};
///
/// let flows = vec![Flow::new(0, "Large", 1, "Mohamed", 5.0)];
/// let first = Sankey::new(flows).unwrap();
/// let second = Sankey::new(flows).unwrap();
/// ```
///
/// Render passes take `&mut self`: the per-stock placeholders that keep
/// flows from overlapping are rewritten by every pass.
pub struct Sankey {
    /// Padding between stocks in the same category, in data units.
    pub stock_pad: f64,
    /// Fill of the stocks and default fill of the flows.
    pub color: Color,
    /// Width of the stock bars on the canvas.
    pub bar_width: f32,
    /// Border of the stocks and default border of the flows.
    pub line_style: LineStyle,
    /// Stock label style.
    pub text_style: TextStyle,
    pub curve: CurveConfig,
    flows: Vec<Flow>,
    stocks: StockTable,
    flow_style: Box<dyn GroupStyleResolver>,
}

impl Sankey {
    /// Validates and aggregates `flows`. Blank groups become
    /// [`DEFAULT_GROUP`](crate::ir::DEFAULT_GROUP).
    #[tracing::instrument(skip_all, fields(flows = flows.len()))]
    pub fn new(mut flows: Vec<Flow>) -> SankeyResult<Self> {
        let stocks = StockTable::build(&flows)?;
        for flow in &mut flows {
            flow.normalize_group();
        }
        tracing::debug!(
            stocks = stocks.len(),
            categories = stocks.categories().count(),
            "aggregated flows"
        );

        let text_style = TextStyle {
            color: Color::BLACK,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_size: DEFAULT_FONT_SIZE,
            rotation: std::f32::consts::FRAC_PI_2,
            x_align: XAlign::Center,
            y_align: YAlign::Center,
        };
        let bar_width = layout::default_bar_width(&text_style);

        Ok(Self {
            stock_pad: 0.0,
            color: Color::rgba(0, 0, 0, 100),
            bar_width,
            line_style: LineStyle {
                color: Color::rgba(0, 0, 0, 150),
                ..LineStyle::default()
            },
            text_style,
            curve: CurveConfig::default(),
            flows,
            stocks,
            flow_style: Box::new(DefaultStyle),
        })
    }

    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    pub fn stocks(&self) -> &StockTable {
        &self.stocks
    }

    pub fn stock(&self, category: i32, label: &str) -> Option<&Stock> {
        self.stocks.get(category, label)
    }

    pub fn set_flow_style(&mut self, resolver: impl GroupStyleResolver + 'static) {
        self.flow_style = Box::new(resolver);
    }

    pub fn default_flow_style(&self) -> FlowStyle {
        FlowStyle {
            color: self.color,
            line: self.line_style.clone(),
        }
    }

    pub fn flow_style(&self, group: &str) -> SankeyResult<FlowStyle> {
        self.flow_style.resolve(group, &self.default_flow_style())
    }

    /// Stocks in stacking order: by category, then first-seen order.
    pub fn stock_list(&self) -> Vec<&Stock> {
        layout::stock_list(&self.stocks)
            .into_iter()
            .map(|idx| &self.stocks[idx])
            .collect()
    }

    /// Recomputes every stock's extent and clears the flow placeholders.
    /// Returns the stacking order.
    pub fn layout_stocks(&mut self) -> Vec<usize> {
        let order = layout::stock_list(&self.stocks);
        layout::stack(&mut self.stocks, &order, self.stock_pad);
        order
    }

    pub fn data_range(&mut self) -> DataRange {
        self.layout_stocks();
        layout::data_range(&self.stocks)
    }

    pub fn glyph_boxes(&mut self) -> Vec<GlyphBox> {
        let order = self.layout_stocks();
        order
            .into_iter()
            .map(|idx| {
                let stock = &self.stocks[idx];
                GlyphBox {
                    category: stock.category as f64,
                    value: (stock.min + stock.max) / 2.0,
                    half_width: self.bar_width / 2.0,
                }
            })
            .collect()
    }

    /// Computes the screen geometry of one pass without drawing it.
    ///
    /// Flows are stacked against each stock in declaration order; every flow
    /// claims `[min + placeholder, min + placeholder + value)` on both of its
    /// stocks.
    #[tracing::instrument(skip_all, fields(flows = self.flows.len(), stocks = self.stocks.len()))]
    pub fn layout_pass(&mut self, tr: &dyn Transforms) -> SankeyResult<SankeyLayout> {
        let order = self.layout_stocks();
        let half = self.bar_width / 2.0;
        let defaults = self.default_flow_style();

        let mut bands = Vec::with_capacity(self.flows.len());
        for (index, flow) in self.flows.iter().enumerate() {
            let style = self.flow_style.resolve(&flow.group, &defaults)?;
            let (Some(source), Some(receptor)) = (
                self.stocks
                    .position(flow.source_category, &flow.source_label),
                self.stocks
                    .position(flow.receptor_category, &flow.receptor_label),
            ) else {
                debug_assert!(false, "flow {index} has no aggregated stocks");
                continue;
            };

            let start = &mut self.stocks[source];
            let start_key = start.key();
            let start_low = start.min + start.source_placeholder;
            start.source_placeholder += flow.value;

            let end = &mut self.stocks[receptor];
            let end_key = end.key();
            let end_low = end.min + end.receptor_placeholder;
            end.receptor_placeholder += flow.value;

            let cat_start = tr.category(flow.source_category as f64) + half;
            let cat_end = tr.category(flow.receptor_category as f64) - half;
            let low = sankey_curve(
                Point::new(cat_start, tr.value(start_low)),
                Point::new(cat_end, tr.value(end_low)),
                self.bar_width,
                &self.curve,
            );
            let high = sankey_curve(
                Point::new(cat_end, tr.value(end_low + flow.value)),
                Point::new(cat_start, tr.value(start_low + flow.value)),
                self.bar_width,
                &self.curve,
            );

            bands.push(FlowBand {
                index,
                group: flow.group.clone(),
                source: start_key,
                receptor: end_key,
                value: flow.value,
                low,
                high,
                color: style.color,
                line: style.line,
            });
        }

        let stocks = order
            .iter()
            .map(|&idx| stock_rect(&self.stocks[idx], tr, half))
            .collect();

        Ok(SankeyLayout {
            bar_width: self.bar_width,
            flows: bands,
            stocks,
        })
    }

    /// Runs a pass and draws it: flows first, then the stocks on top.
    /// Stocks whose category falls outside the canvas are not drawn.
    pub fn plot(
        &mut self,
        canvas: &mut dyn Canvas,
        tr: &dyn Transforms,
    ) -> SankeyResult<SankeyLayout> {
        let layout = self.layout_pass(tr)?;

        for band in &layout.flows {
            let poly = canvas.clip_polygon_x(&band.polygon());
            canvas.fill_polygon(band.color, &poly);

            let outline = canvas.clip_lines_x(std::slice::from_ref(&band.low));
            canvas.stroke_lines(&band.line, &outline);
            let outline = canvas.clip_lines_x(std::slice::from_ref(&band.high));
            canvas.stroke_lines(&band.line, &outline);
        }

        let mut skipped = 0usize;
        for stock in &layout.stocks {
            if !canvas.contains_x(stock.category_x) {
                skipped += 1;
                continue;
            }
            let r = stock.rect;
            let fill = [
                Point::new(r.min.x, r.min.y),
                Point::new(r.min.x, r.max.y),
                Point::new(r.max.x, r.max.y),
                Point::new(r.max.x, r.min.y),
            ];
            canvas.fill_polygon(self.color, &fill);
            canvas.fill_text(&self.text_style, stock.label_at, &stock.key.label);
            canvas.stroke_lines(&self.line_style, std::slice::from_ref(&stock.bottom_edge));
            canvas.stroke_lines(&self.line_style, std::slice::from_ref(&stock.top_edge));
        }
        if skipped > 0 {
            tracing::debug!(skipped, "stocks outside the canvas were not drawn");
        }

        Ok(layout)
    }

    /// Flow groups in lexicographic order.
    pub fn groups(&self) -> Vec<String> {
        self.flows
            .iter()
            .map(|flow| flow.group.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Legend entries: sorted group names and one swatch per group.
    pub fn groups_and_thumbnails(&self) -> SankeyResult<(Vec<String>, Vec<Thumbnail>)> {
        let groups = self.groups();
        let thumbnails = groups
            .iter()
            .map(|group| self.flow_style(group).map(Thumbnail::new))
            .collect::<SankeyResult<Vec<_>>>()?;
        Ok((groups, thumbnails))
    }
}

fn stock_rect(stock: &Stock, tr: &dyn Transforms, half: f32) -> StockRect {
    let category_x = tr.category(stock.category as f64);
    let (x_min, x_max) = (category_x - half, category_x + half);
    let (y_min, y_max) = (tr.value(stock.min), tr.value(stock.max));

    let bottom_edge = vec![Point::new(x_min, y_min), Point::new(x_max, y_min)];
    let mut top_edge = vec![Point::new(x_min, y_max), Point::new(x_max, y_max)];
    // expose the unfilled part of the smaller side
    if stock.receptor_value < stock.source_value {
        let y = tr.value(stock.max - (stock.source_value - stock.receptor_value));
        top_edge.insert(0, Point::new(x_min, y));
    } else if stock.source_value < stock.receptor_value {
        let y = tr.value(stock.max - (stock.receptor_value - stock.source_value));
        top_edge.push(Point::new(x_max, y));
    }

    StockRect {
        key: stock.key(),
        order: stock.order,
        source_value: stock.source_value,
        receptor_value: stock.receptor_value,
        min: stock.min,
        max: stock.max,
        category_x,
        rect: Rect::new(x_min, y_min, x_max, y_max),
        label_at: Point::new(category_x, (y_min + y_max) / 2.0),
        bottom_edge,
        top_edge,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SankeyError;
    use crate::ir::DEFAULT_GROUP;
    use crate::legend::GroupPalette;

    /// Categories 100 units apart, values 10 units per data unit, y up.
    fn transforms() -> impl Transforms {
        (
            |c: f64| (c * 100.0) as f32 + 50.0,
            |v: f64| (v * 10.0) as f32,
        )
    }

    #[derive(Default)]
    struct Recorder {
        fills: Vec<(Color, usize)>,
        strokes: usize,
        texts: Vec<(String, Point)>,
        width: f32,
    }

    impl Canvas for Recorder {
        fn bounds(&self) -> Rect {
            Rect::new(0.0, 0.0, self.width, 1000.0)
        }

        fn fill_polygon(&mut self, color: Color, points: &[Point]) {
            self.fills.push((color, points.len()));
        }

        fn stroke_lines(&mut self, _style: &LineStyle, lines: &[Vec<Point>]) {
            self.strokes += lines.len();
        }

        fn fill_text(&mut self, _style: &TextStyle, at: Point, text: &str) {
            self.texts.push((text.to_string(), at));
        }
    }

    fn apples() -> Vec<Flow> {
        vec![
            Flow::new(0, "Large", 1, "Mohamed", 5.0),
            Flow::new(0, "Small", 1, "Mohamed", 2.0),
            Flow::new(0, "Large", 1, "Sofia", 3.0),
        ]
    }

    #[test]
    fn construction_aggregates_and_orders() {
        let sankey = Sankey::new(apples()).unwrap();
        let labels: Vec<(i32, &str, usize)> = sankey
            .stock_list()
            .iter()
            .map(|s| (s.category, s.label.as_str(), s.order))
            .collect();
        assert_eq!(
            labels,
            vec![
                (0, "Large", 0),
                (0, "Small", 1),
                (1, "Mohamed", 0),
                (1, "Sofia", 1)
            ]
        );
        assert_eq!(sankey.stock(0, "Large").unwrap().source_value, 8.0);
        assert_eq!(sankey.stock(1, "Mohamed").unwrap().receptor_value, 7.0);
    }

    #[test]
    fn invalid_flows_abort_construction() {
        let mut flows = apples();
        flows.push(Flow::new(1, "x", 0, "y", 1.0));
        assert!(matches!(
            Sankey::new(flows),
            Err(SankeyError::InvalidOrdering { index: 3, .. })
        ));
        let flows = vec![Flow::new(0, "x", 1, "y", -2.0)];
        assert!(matches!(
            Sankey::new(flows),
            Err(SankeyError::NegativeValue { index: 0, .. })
        ));
    }

    #[test]
    fn blank_groups_default_on_every_flow() {
        let flows = vec![
            Flow::new(0, "a", 1, "b", 1.0),
            Flow::new(0, "c", 1, "b", 1.0),
            Flow::new(0, "a", 1, "b", 1.0).with_group("Named"),
        ];
        let sankey = Sankey::new(flows).unwrap();
        assert_eq!(sankey.flows()[0].group, DEFAULT_GROUP);
        assert_eq!(sankey.flows()[1].group, DEFAULT_GROUP);
        assert_eq!(sankey.groups(), vec!["Default".to_string(), "Named".to_string()]);
    }

    #[test]
    fn flows_stack_in_declaration_order_without_overlap() {
        let mut sankey = Sankey::new(apples()).unwrap();
        let tr = transforms();
        let layout = sankey.layout_pass(&tr).unwrap();
        assert_eq!(layout.flows.len(), 3);

        // Large -> Mohamed takes Large's first 5, Large -> Sofia the next 3.
        let first = &layout.flows[0];
        let third = &layout.flows[2];
        assert_eq!(first.low[0].y, 0.0);
        assert_eq!(first.high.last().unwrap().y, 50.0);
        assert_eq!(third.low[0].y, 50.0);
        assert_eq!(third.high.last().unwrap().y, 80.0);

        // Small -> Mohamed lands on Mohamed right above Large's flow.
        let second = &layout.flows[1];
        assert_eq!(second.low.last().unwrap().y, 50.0);
        assert_eq!(second.high[0].y, 70.0);

        let mohamed = sankey.stock(1, "Mohamed").unwrap();
        assert_eq!(mohamed.receptor_placeholder, mohamed.receptor_value);
        assert_eq!(sankey.stock(0, "Large").unwrap().source_placeholder, 8.0);
    }

    #[test]
    fn flow_curves_run_between_bar_edges() {
        let mut sankey = Sankey::new(apples()).unwrap();
        sankey.bar_width = 20.0;
        let layout = sankey.layout_pass(&transforms()).unwrap();
        let band = &layout.flows[0];
        assert_eq!(band.low[0].x, 60.0);
        assert_eq!(band.low.last().unwrap().x, 140.0);
        assert_eq!(band.high[0].x, 140.0);
        assert_eq!(band.high.last().unwrap().x, 60.0);
        assert_eq!(band.low.len(), sankey.curve.points);
        assert_eq!(band.polygon().len(), 2 * sankey.curve.points);
    }

    #[test]
    fn repeated_passes_are_identical() {
        let mut sankey = Sankey::new(apples()).unwrap();
        let tr = transforms();
        let first = sankey.layout_pass(&tr).unwrap();
        let second = sankey.layout_pass(&tr).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unbalanced_stock_exposes_gap_on_receptor_side() {
        let flows = vec![
            Flow::new(0, "Tree", 1, "Sofia", 3.0),
            Flow::new(1, "Sofia", 2, "Eaten", 3.0),
            Flow::new(1, "Sofia", 2, "Waste", 0.5),
        ];
        let mut sankey = Sankey::new(flows).unwrap();
        sankey.bar_width = 10.0;
        let layout = sankey.layout_pass(&transforms()).unwrap();
        let sofia = layout
            .stocks
            .iter()
            .find(|s| s.key.label == "Sofia")
            .unwrap();
        assert_eq!(sofia.max, sofia.min + 3.5);
        // top edge starts 0.5 below the top on the left (inbound) side
        assert_eq!(
            sofia.top_edge,
            vec![
                Point::new(145.0, 30.0),
                Point::new(145.0, 35.0),
                Point::new(155.0, 35.0),
            ]
        );
        assert_eq!(
            sofia.bottom_edge,
            vec![Point::new(145.0, 0.0), Point::new(155.0, 0.0)]
        );
    }

    #[test]
    fn receptor_heavy_stock_extends_top_edge_on_the_right() {
        let flows = vec![
            Flow::new(0, "a", 1, "b", 4.0),
            Flow::new(1, "b", 2, "c", 1.0),
        ];
        let mut sankey = Sankey::new(flows).unwrap();
        sankey.bar_width = 10.0;
        let layout = sankey.layout_pass(&transforms()).unwrap();
        let b = &layout.stocks[1];
        assert_eq!(b.key.label, "b");
        assert_eq!(b.top_edge.len(), 3);
        assert_eq!(b.top_edge[2], Point::new(155.0, 10.0));
    }

    #[test]
    fn plot_draws_flows_then_visible_stocks() {
        let mut sankey = Sankey::new(apples()).unwrap();
        let mut canvas = Recorder {
            width: 1000.0,
            ..Recorder::default()
        };
        sankey.plot(&mut canvas, &transforms()).unwrap();
        // 3 flow bands + 4 stock rectangles
        assert_eq!(canvas.fills.len(), 7);
        assert!(canvas.fills[..3].iter().all(|(c, _)| *c == sankey.color));
        assert_eq!(canvas.strokes, 3 * 2 + 4 * 2);
        let labels: Vec<&str> = canvas.texts.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(labels, vec!["Large", "Small", "Mohamed", "Sofia"]);
    }

    #[test]
    fn stocks_outside_the_canvas_are_skipped() {
        let mut sankey = Sankey::new(apples()).unwrap();
        let mut canvas = Recorder {
            width: 100.0,
            ..Recorder::default()
        };
        sankey.plot(&mut canvas, &transforms()).unwrap();
        let labels: Vec<&str> = canvas.texts.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(labels, vec!["Large", "Small"]);
    }

    #[test]
    fn unknown_group_aborts_the_pass() {
        let flows = vec![
            Flow::new(0, "a", 1, "b", 1.0).with_group("Apples"),
            Flow::new(0, "a", 1, "b", 1.0).with_group("Dates"),
        ];
        let mut sankey = Sankey::new(flows).unwrap();
        sankey.set_flow_style(GroupPalette::new().with("Apples", Color::WHITE));
        let mut canvas = Recorder {
            width: 1000.0,
            ..Recorder::default()
        };
        let err = sankey.plot(&mut canvas, &transforms()).unwrap_err();
        assert_eq!(err, SankeyError::unknown_group("Dates"));
        assert!(canvas.fills.is_empty());
        assert!(sankey.groups_and_thumbnails().is_err());
    }

    #[test]
    fn thumbnails_follow_sorted_groups() {
        let flows = vec![
            Flow::new(0, "a", 1, "b", 1.0).with_group("Lychees"),
            Flow::new(0, "a", 1, "b", 1.0).with_group("Apples"),
            Flow::new(0, "a", 1, "c", 1.0).with_group("Lychees"),
        ];
        let mut sankey = Sankey::new(flows).unwrap();
        let palette = GroupPalette::new()
            .with("Apples", Color::rgba(91, 194, 54, 100))
            .with("Lychees", Color::rgba(242, 169, 178, 100));
        sankey.set_flow_style(palette);
        let (groups, thumbs) = sankey.groups_and_thumbnails().unwrap();
        assert_eq!(groups, vec!["Apples".to_string(), "Lychees".to_string()]);
        assert_eq!(thumbs[0].style.color, Color::rgba(91, 194, 54, 100));
        assert_eq!(thumbs[1].style.color, Color::rgba(242, 169, 178, 100));
        assert_eq!(thumbs[1].style.line, sankey.line_style);
    }

    #[test]
    fn data_range_and_glyph_boxes_follow_the_stacking() {
        let mut sankey = Sankey::new(apples()).unwrap();
        let range = sankey.data_range();
        assert_eq!(
            range,
            DataRange {
                category_min: 0.0,
                category_max: 1.0,
                value_min: 0.0,
                value_max: 10.0,
            }
        );
        let boxes = sankey.glyph_boxes();
        assert_eq!(boxes.len(), 4);
        assert_eq!(boxes[0].value, 4.0);
        assert_eq!(boxes[1].value, 9.0);
        assert_eq!(boxes[0].half_width, sankey.bar_width / 2.0);
    }
}
