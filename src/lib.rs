pub mod canvas;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod diagram;
pub mod error;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod legend;
pub mod parser;
pub mod render;
pub mod style;
pub mod text_metrics;
pub mod theme;

pub use canvas::{Canvas, Transforms};
#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, load_config};
pub use diagram::Sankey;
pub use error::{SankeyError, SankeyResult};
pub use ir::{Flow, FlowDiagram};
pub use layout::{CurveConfig, SankeyLayout, sankey_curve};
pub use legend::{DefaultStyle, GroupPalette, GroupStyleResolver, Thumbnail};
pub use render::{Frame, SvgCanvas};
pub use style::{Color, FlowStyle, LineStyle, TextStyle};
pub use theme::Theme;

/// A parsed source rendered to SVG, with everything needed to dump it.
#[derive(Debug, Clone)]
pub struct RenderedSource {
    pub svg: String,
    pub layout: SankeyLayout,
    /// Title and category labels; the flows are owned by the diagram.
    pub diagram: FlowDiagram,
    /// `config` with the source's init directive applied.
    pub config: Config,
}

/// Parses `input`, builds the diagram and renders it with `config` plus any
/// `%%{init}%%` overrides in the source.
pub fn render_source(input: &str, config: &Config) -> anyhow::Result<RenderedSource> {
    let parsed = parser::parse_sankey(input)?;
    let config = match parsed.init_config {
        Some(init) => config::merge_init_config(config.clone(), init),
        None => config.clone(),
    };
    let mut diagram = parsed.diagram;
    let flows = std::mem::take(&mut diagram.flows);
    let mut sankey = config.build_diagram(flows)?;
    let rendered = render::render_svg(&mut sankey, &diagram, &config)?;
    Ok(RenderedSource {
        svg: rendered.svg,
        layout: rendered.layout,
        diagram,
        config,
    })
}

pub fn render(input: &str, config: &Config) -> anyhow::Result<String> {
    Ok(render_source(input, config)?.svg)
}
