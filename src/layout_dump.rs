use crate::ir::FlowDiagram;
use crate::layout::SankeyLayout;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub title: Option<String>,
    pub bar_width: f32,
    pub stocks: Vec<StockDump>,
    pub flows: Vec<FlowDump>,
}

#[derive(Debug, Serialize)]
pub struct StockDump {
    pub category: i32,
    pub category_label: String,
    pub label: String,
    pub order: usize,
    pub source_value: f64,
    pub receptor_value: f64,
    pub min: f64,
    pub max: f64,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub top_edge: Vec<[f32; 2]>,
}

#[derive(Debug, Serialize)]
pub struct FlowDump {
    pub index: usize,
    pub group: String,
    pub from: String,
    pub to: String,
    pub value: f64,
    pub color: String,
    pub low: Vec<[f32; 2]>,
    pub high: Vec<[f32; 2]>,
}

fn stock_id(category: i32, label: &str) -> String {
    format!("{category}:{label}")
}

impl LayoutDump {
    pub fn from_layout(layout: &SankeyLayout, diagram: &FlowDiagram) -> Self {
        let stocks = layout
            .stocks
            .iter()
            .map(|stock| StockDump {
                category: stock.key.category,
                category_label: diagram.category_label(stock.key.category),
                label: stock.key.label.clone(),
                order: stock.order,
                source_value: stock.source_value,
                receptor_value: stock.receptor_value,
                min: stock.min,
                max: stock.max,
                x: stock.rect.min.x,
                y: stock.rect.min.y,
                width: stock.rect.width(),
                height: stock.rect.height(),
                top_edge: stock.top_edge.iter().map(|p| [p.x, p.y]).collect(),
            })
            .collect();

        let flows = layout
            .flows
            .iter()
            .map(|flow| FlowDump {
                index: flow.index,
                group: flow.group.clone(),
                from: stock_id(flow.source.category, &flow.source.label),
                to: stock_id(flow.receptor.category, &flow.receptor.label),
                value: flow.value,
                color: format!("{}{:02x}", flow.color.to_hex(), flow.color.a),
                low: flow.low.iter().map(|p| [p.x, p.y]).collect(),
                high: flow.high.iter().map(|p| [p.x, p.y]).collect(),
            })
            .collect();

        LayoutDump {
            title: diagram.title.clone(),
            bar_width: layout.bar_width,
            stocks,
            flows,
        }
    }
}

pub fn write_layout_dump(
    path: &Path,
    layout: &SankeyLayout,
    diagram: &FlowDiagram,
) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_layout(layout, diagram);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
