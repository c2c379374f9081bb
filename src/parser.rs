use crate::ir::{Flow, FlowDiagram};
use anyhow::{Result, anyhow, bail};
use once_cell::sync::Lazy;
use regex::Regex;

static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^sankey(-beta)?(\s+(?P<title>.*))?$").unwrap());
static CATEGORY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^category\s+(?P<index>-?\d+)\s+(?P<label>.+)$").unwrap());
static INIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^%%\{\s*init\s*:\s*(\{.*\})\s*\}%%").unwrap());

#[derive(Debug, Default)]
pub struct ParseOutput {
    pub diagram: FlowDiagram,
    pub init_config: Option<serde_json::Value>,
}

/// A source line with its 1-based line number.
struct Line {
    number: usize,
    text: String,
}

pub fn parse_sankey(input: &str) -> Result<ParseOutput> {
    let (lines, init_config) = preprocess_input(input);
    let mut diagram = FlowDiagram::new();
    let mut lines = lines.into_iter();

    let Some(header) = lines.next() else {
        bail!("empty input: expected a `sankey` header");
    };
    let Some(caps) = HEADER_RE.captures(&header.text) else {
        bail!(
            "line {}: expected a `sankey` header, found {:?}",
            header.number,
            header.text
        );
    };
    if let Some(title) = caps.name("title") {
        set_title(&mut diagram, title.as_str());
    }

    for line in lines {
        let text = line.text.as_str();
        let lower = text.to_ascii_lowercase();
        if lower == "title" || lower.starts_with("title ") {
            set_title(&mut diagram, text.get(5..).unwrap_or(""));
            continue;
        }
        if let Some(caps) = CATEGORY_RE.captures(text) {
            let index = caps["index"]
                .parse::<i32>()
                .map_err(|err| anyhow!("line {}: category index: {err}", line.number))?;
            let label = strip_quotes(&caps["label"]);
            diagram.category_labels.insert(index, label);
            continue;
        }
        let flow = parse_flow_line(text).map_err(|err| anyhow!("line {}: {err}", line.number))?;
        diagram.flows.push(flow);
    }

    tracing::debug!(
        flows = diagram.flows.len(),
        categories = diagram.category_labels.len(),
        "parsed sankey source"
    );
    Ok(ParseOutput {
        diagram,
        init_config,
    })
}

fn set_title(diagram: &mut FlowDiagram, raw: &str) {
    let title = strip_quotes(raw);
    if !title.is_empty() {
        diagram.title = Some(title);
    }
}

/// `srcCategory, srcLabel, recCategory, recLabel, value[, group]`
fn parse_flow_line(line: &str) -> Result<Flow> {
    let fields = split_fields(line);
    if fields.len() != 5 && fields.len() != 6 {
        bail!(
            "expected 5 or 6 comma-separated fields, found {}",
            fields.len()
        );
    }
    let source_category = parse_category(&fields[0])?;
    let receptor_category = parse_category(&fields[2])?;
    let value = fields[4]
        .parse::<f64>()
        .map_err(|_| anyhow!("invalid flow value {:?}", fields[4]))?;
    let source_label = strip_quotes(&fields[1]);
    let receptor_label = strip_quotes(&fields[3]);
    if source_label.is_empty() || receptor_label.is_empty() {
        bail!("stock labels must not be empty");
    }

    let mut flow = Flow::new(
        source_category,
        source_label,
        receptor_category,
        receptor_label,
        value,
    );
    if let Some(group) = fields.get(5) {
        flow.group = strip_quotes(group);
    }
    Ok(flow)
}

fn parse_category(field: &str) -> Result<i32> {
    field
        .parse::<i32>()
        .map_err(|_| anyhow!("invalid category {field:?}: expected an integer"))
}

fn preprocess_input(input: &str) -> (Vec<Line>, Option<serde_json::Value>) {
    let mut init_config: Option<serde_json::Value> = None;
    let mut lines = Vec::new();

    for (idx, raw_line) in input.lines().enumerate() {
        let trimmed_line = raw_line.trim();
        if trimmed_line.is_empty() {
            continue;
        }
        if let Some(caps) = INIT_RE.captures(trimmed_line) {
            if let Some(json_str) = caps.get(1).map(|m| m.as_str()) {
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(json_str) {
                    init_config = Some(value);
                } else if let Ok(value) = json5::from_str::<serde_json::Value>(json_str) {
                    init_config = Some(value);
                } else {
                    tracing::warn!(line = idx + 1, "unparseable init directive");
                }
            }
            continue;
        }
        if trimmed_line.starts_with("%%") {
            continue;
        }
        let without_comment = strip_trailing_comment(trimmed_line);
        if without_comment.is_empty() {
            continue;
        }
        lines.push(Line {
            number: idx + 1,
            text: without_comment,
        });
    }

    (lines, init_config)
}

/// Splits on commas outside quotes. Empty fields are kept so that the field
/// count reflects the source.
fn split_fields(input: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for ch in input.chars() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            current.push(ch);
            continue;
        }
        if ch == '"' || ch == '\'' {
            quote = Some(ch);
            current.push(ch);
            continue;
        }
        if ch == ',' {
            fields.push(current.trim().to_string());
            current.clear();
            continue;
        }
        current.push(ch);
    }
    fields.push(current.trim().to_string());
    fields
}

fn strip_trailing_comment(line: &str) -> String {
    let mut quote: Option<char> = None;
    let mut chars = line.chars().peekable();
    let mut out = String::new();
    while let Some(ch) = chars.next() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            out.push(ch);
            continue;
        }
        if ch == '"' || ch == '\'' {
            quote = Some(ch);
            out.push(ch);
            continue;
        }
        if ch == '%'
            && let Some('%') = chars.peek().copied()
        {
            break;
        }
        out.push(ch);
    }
    out.trim().to_string()
}

fn strip_quotes(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('\'') && trimmed.ends_with('\'')))
    {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}
