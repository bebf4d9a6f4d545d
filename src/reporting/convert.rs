// src/reporting/convert.rs
use std::path::Path;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use tokio::fs;
use tracing::{debug, info};

use crate::core::Target;
use crate::error::{DossierResult, DossierError};
use super::pdf::{Block, Color, PdfDocument, Span, Table};

/// Line that switches from header text to alert tables
pub const SUMMARY_MARKER: &str = "Summary of Alerts";
/// Line where the per-alert detail section begins; nothing from here on is kept
pub const DETAIL_MARKER: &str = "Alert Detail";
/// Header lines containing this are emphasized
pub const SITES_MARKER: &str = "Sites:";
const MAX_TABLES: usize = 2;

static SEVERITY_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(high|medium|low|informational)\b").expect("severity pattern is valid")
});

/// Raw report content in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawBlock {
    Line(String),
    Table(Vec<Vec<String>>),
}

/// What survives from the raw report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryItem {
    Text { text: String, emphasized: bool },
    Table(Vec<Vec<String>>),
}

/// Flatten an HTML report into text lines and tables, in reading order
pub fn extract_blocks(html: &str) -> Vec<RawBlock> {
    let document = Html::parse_document(html);
    let mut blocks = Vec::new();
    let mut line = String::new();

    walk(document.root_element(), &mut blocks, &mut line);
    flush_line(&mut line, &mut blocks);

    blocks
}

fn is_block_element(name: &str) -> bool {
    matches!(
        name,
        "html" | "body" | "div" | "p" | "section" | "article" | "header" | "footer"
            | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "li" | "ul" | "ol" | "br"
            | "pre" | "blockquote" | "title"
    )
}

fn walk(element: ElementRef, blocks: &mut Vec<RawBlock>, line: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => line.push_str(text),
            Node::Element(_) => {
                let Some(child_element) = ElementRef::wrap(child) else { continue };
                let name = child_element.value().name();

                match name {
                    "script" | "style" | "head" => {}
                    "table" => {
                        flush_line(line, blocks);
                        blocks.push(RawBlock::Table(table_rows(child_element)));
                    }
                    _ if is_block_element(name) => {
                        flush_line(line, blocks);
                        walk(child_element, blocks, line);
                        flush_line(line, blocks);
                    }
                    _ => walk(child_element, blocks, line),
                }
            }
            _ => {}
        }
    }
}

fn flush_line(line: &mut String, blocks: &mut Vec<RawBlock>) {
    let normalized = normalize(line);
    if !normalized.is_empty() {
        blocks.push(RawBlock::Line(normalized));
    }
    line.clear();
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn table_rows(table: ElementRef) -> Vec<Vec<String>> {
    let (Ok(row_selector), Ok(cell_selector)) = (Selector::parse("tr"), Selector::parse("th, td")) else {
        return Vec::new();
    };

    table
        .select(&row_selector)
        .map(|row| {
            row.select(&cell_selector)
                .map(|cell| normalize(&cell.text().collect::<String>()))
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect()
}

/// Keep the header lines, the summary heading and at most two alert tables.
///
/// Scanning stops at the detail marker, even before any table was taken.
pub fn summarize(blocks: &[RawBlock]) -> Vec<SummaryItem> {
    let mut items = Vec::new();
    let mut in_tables = false;
    let mut tables = 0;

    for block in blocks {
        match block {
            RawBlock::Line(line) => {
                if line.contains(DETAIL_MARKER) {
                    debug!("Detail marker reached after {} tables", tables);
                    return items;
                }
                if in_tables {
                    continue;
                }
                if line.contains(SUMMARY_MARKER) {
                    items.push(SummaryItem::Text {
                        text: "Summary of Alerts:".to_string(),
                        emphasized: true,
                    });
                    in_tables = true;
                    continue;
                }
                items.push(SummaryItem::Text {
                    text: line.clone(),
                    emphasized: line.contains(SITES_MARKER),
                });
            }
            RawBlock::Table(rows) => {
                if !in_tables {
                    continue;
                }
                if tables == 0 {
                    items.push(SummaryItem::Text {
                        text: "Alerts:".to_string(),
                        emphasized: true,
                    });
                }
                items.push(SummaryItem::Table(rows.clone()));
                tables += 1;
                if tables == MAX_TABLES {
                    return items;
                }
            }
        }
    }

    items
}

fn severity_color(word: &str) -> Color {
    match word.to_lowercase().as_str() {
        "high" => Color::Red,
        "medium" => Color::Orange,
        "low" => Color::Green,
        _ => Color::Blue,
    }
}

/// Split `text` into spans with severity words recolored
pub fn highlight_severity(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut last = 0;

    for found in SEVERITY_WORDS.find_iter(text) {
        if found.start() > last {
            spans.push(Span::plain(&text[last..found.start()]));
        }
        spans.push(Span::colored(found.as_str(), severity_color(found.as_str())));
        last = found.end();
    }
    if last < text.len() {
        spans.push(Span::plain(&text[last..]));
    }

    spans
}

/// Lay out the summarized report; an empty summary yields just the title
pub fn build_final_document(target: &Target, items: &[SummaryItem]) -> PdfDocument {
    let mut document = PdfDocument::new();
    document
        .push(Block::Title(format!("ZAP Report for {} ({})", target.address, target.name)))
        .push(Block::Spacer(12.0));

    for item in items {
        match item {
            SummaryItem::Text { text, emphasized: true } => {
                document.push(Block::Heading(highlight_severity(text)));
            }
            SummaryItem::Text { text, emphasized: false } => {
                document.push(Block::Paragraph(highlight_severity(text)));
            }
            SummaryItem::Table(rows) => {
                let rows = rows
                    .iter()
                    .map(|row| row.iter().map(|cell| highlight_severity(cell)).collect())
                    .collect();
                document.push(Block::Table(Table::new(rows).with_header()));
            }
        }
        document.push(Block::Spacer(12.0));
    }

    document
}

/// Convert the persisted raw HTML report into the trimmed final PDF
pub async fn convert_report(raw_path: &Path, final_path: &Path, target: &Target) -> DossierResult<()> {
    let html = fs::read_to_string(raw_path)
        .await
        .map_err(|e| DossierError::file(raw_path, format!("Failed to read raw report: {}", e)))?;

    let items = summarize(&extract_blocks(&html));
    debug!("Kept {} items from raw report {}", items.len(), raw_path.display());

    build_final_document(target, &items).save(final_path)?;
    info!("Final report saved: {}", final_path.display());

    Ok(())
}
