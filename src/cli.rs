use crate::config::load_config;
use crate::layout_dump::write_layout_dump;
use crate::render::write_output_svg;
use crate::{RenderedSource, render_source};
use anyhow::Result;
use clap::{ArgAction, Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sankey", version, about = "Sankey stock/flow diagram renderer")]
pub struct Args {
    /// Input file (.sankey, .md) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file (svg/png). Defaults to stdout for SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON file (theme, themeVariables, sankey, render)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Width
    #[arg(short = 'w', long = "width")]
    pub width: Option<f32>,

    /// Height
    #[arg(short = 'H', long = "height")]
    pub height: Option<f32>,

    /// Write the computed layout as JSON
    #[arg(long = "dumpLayout")]
    pub dump_layout: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // a subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut base_config = load_config(args.config.as_deref())?;
    if let Some(width) = args.width {
        base_config.render.width = width;
    }
    if let Some(height) = args.height {
        base_config.render.height = height;
    }

    let (input, is_markdown) = read_input(args.input.as_deref())?;
    let diagrams = if is_markdown {
        extract_sankey_blocks(&input)
    } else {
        vec![input]
    };

    if diagrams.is_empty() {
        return Err(anyhow::anyhow!("No sankey diagrams found in input"));
    }

    if diagrams.len() == 1 {
        let rendered = render_source(&diagrams[0], &base_config)?;
        match args.output_format {
            OutputFormat::Svg => {
                write_output_svg(&rendered.svg, args.output.as_deref())?;
            }
            OutputFormat::Png => {
                let output = ensure_output(&args.output, "png")?;
                write_png(&rendered, &output)?;
            }
        }
        if let Some(path) = &args.dump_layout {
            write_layout_dump(path, &rendered.layout, &rendered.diagram)?;
        }
        return Ok(());
    }

    // Multiple diagrams (Markdown input)
    let outputs = resolve_multi_outputs(args.output.as_deref(), args.output_format, diagrams.len())?;
    let dumps = args
        .dump_layout
        .as_deref()
        .map(|path| numbered_paths(path, "json", diagrams.len()));
    for (idx, diagram) in diagrams.iter().enumerate() {
        let rendered = render_source(diagram, &base_config)
            .map_err(|err| err.context(format!("diagram {}", idx + 1)))?;
        match args.output_format {
            OutputFormat::Svg => {
                write_output_svg(&rendered.svg, Some(&outputs[idx]))?;
            }
            OutputFormat::Png => {
                write_png(&rendered, &outputs[idx])?;
            }
        }
        if let Some(dumps) = &dumps {
            write_layout_dump(&dumps[idx], &rendered.layout, &rendered.diagram)?;
        }
    }
    tracing::debug!(count = diagrams.len(), "rendered markdown diagrams");

    Ok(())
}

#[cfg(feature = "png")]
fn write_png(rendered: &RenderedSource, output: &Path) -> Result<()> {
    crate::render::write_output_png(&rendered.svg, output, &rendered.config.render)
}

#[cfg(not(feature = "png"))]
fn write_png(_rendered: &RenderedSource, _output: &Path) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

fn read_input(path: Option<&Path>) -> Result<(String, bool)> {
    if let Some(path) = path {
        if path == Path::new("-") {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            return Ok((buf, false));
        }
        let content = std::fs::read_to_string(path)?;
        let is_md = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| matches!(ext, "md" | "markdown"))
            .unwrap_or(false);
        return Ok((content, is_md));
    }

    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok((buf, false))
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

fn extract_sankey_blocks(input: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut in_block = false;
    let mut current = Vec::new();
    let mut fence = String::new();

    for line in input.lines() {
        let trimmed = line.trim();
        if !in_block {
            if let Some(start_fence) = detect_sankey_fence(trimmed) {
                in_block = true;
                fence = start_fence;
                continue;
            }
        } else if is_fence_end(trimmed, &fence) {
            in_block = false;
            blocks.push(current.join("\n"));
            current.clear();
            continue;
        }

        if in_block {
            current.push(line.to_string());
        }
    }

    blocks
}

fn detect_sankey_fence(line: &str) -> Option<String> {
    for fence in ["```", "~~~"] {
        if let Some(rest) = line.strip_prefix(fence) {
            let info = rest.trim_start_matches(['`', '~']).trim();
            if info.starts_with("sankey") {
                return Some(fence.to_string());
            }
        }
    }
    None
}

fn is_fence_end(line: &str, fence: &str) -> bool {
    if !line.starts_with(fence) {
        return false;
    }
    line[fence.len()..].trim().is_empty()
}

fn resolve_multi_outputs(
    output: Option<&Path>,
    format: OutputFormat,
    count: usize,
) -> Result<Vec<PathBuf>> {
    let base = output.ok_or_else(|| anyhow::anyhow!("Output path required for markdown input"))?;
    Ok(numbered_paths(base, format.extension(), count))
}

/// `dir/diagram-N.ext` for a directory, otherwise `stem-N.ext` beside `base`.
fn numbered_paths(base: &Path, ext: &str, count: usize) -> Vec<PathBuf> {
    if base.is_dir() {
        return (0..count)
            .map(|idx| base.join(format!("diagram-{}.{}", idx + 1, ext)))
            .collect();
    }
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("diagram");
    let parent = base.parent().unwrap_or_else(|| Path::new("."));
    (0..count)
        .map(|idx| parent.join(format!("{}-{}.{}", stem, idx + 1, ext)))
        .collect()
}
