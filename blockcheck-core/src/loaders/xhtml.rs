//! XHTML loader
//!
//! Reads the body of a well-formed XHTML document with an event reader and
//! emits one block per top-level paragraph-like element or table:
//!
//! - `<p>`, `<h1>`..`<h6>` become Paragraph blocks
//! - `<table>` becomes a Table block, rows from `<tr>`, cells from `<td>`/`<th>`
//!
//! Inline markup inside a block is flattened to text, runs of whitespace are
//! collapsed and `<br/>` counts as a space. A table nested inside a cell is
//! folded into that cell's text. Text outside any block is ignored.
//!
//! Paragraphs also carry the formatting the markup declares: the element's
//! own `style` attribute, headings as bold, and for the font the first text
//! run with its enclosing `<b>`/`<strong>`/`<i>`/`<em>`/`<span style>` applied.
//! CSS values are kept verbatim.

use super::{has_extension, DocumentLoader};
use crate::types::{Block, BlockStyle, FontStyle};
use anyhow::{anyhow, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Paragraph,
    Table,
    Row,
    Cell,
    Break,
    Inline,
    Other,
}

fn classify_tag(name: &[u8]) -> Tag {
    match name.to_ascii_lowercase().as_slice() {
        b"p" | b"h1" | b"h2" | b"h3" | b"h4" | b"h5" | b"h6" => Tag::Paragraph,
        b"table" => Tag::Table,
        b"tr" => Tag::Row,
        b"td" | b"th" => Tag::Cell,
        b"br" => Tag::Break,
        b"b" | b"strong" | b"i" | b"em" | b"span" => Tag::Inline,
        _ => Tag::Other,
    }
}

/// Entities common in XHTML that XML itself does not predefine
fn resolve_html_entity(entity: &str) -> Option<&'static str> {
    match entity {
        "nbsp" => Some("\u{a0}"),
        "ensp" => Some("\u{2002}"),
        "emsp" => Some("\u{2003}"),
        "thinsp" => Some("\u{2009}"),
        "ndash" => Some("\u{2013}"),
        "mdash" => Some("\u{2014}"),
        "hellip" => Some("\u{2026}"),
        "lsquo" => Some("\u{2018}"),
        "rsquo" => Some("\u{2019}"),
        "ldquo" => Some("\u{201c}"),
        "rdquo" => Some("\u{201d}"),
        "middot" => Some("\u{b7}"),
        "copy" => Some("\u{a9}"),
        _ => None,
    }
}

/// Declarations of an inline `style` attribute that map onto [`BlockStyle`]
fn parse_inline_style(css: &str) -> BlockStyle {
    let mut style = BlockStyle::default();
    for declaration in css.split(';') {
        let Some((property, value)) = declaration.split_once(':') else {
            continue;
        };
        let value = value.trim().trim_end_matches("!important").trim();
        if value.is_empty() {
            continue;
        }
        let font = &mut style.font;
        let paragraph = &mut style.paragraph;
        match property.trim().to_ascii_lowercase().as_str() {
            "font-family" => {
                if let Some(family) = first_font_family(value) {
                    font.family = Some(family);
                }
            }
            "font-size" => font.size = Some(value.to_string()),
            "font-weight" => {
                if let Some(bold) = parse_font_weight(value) {
                    font.bold = Some(bold);
                }
            }
            "font-style" => match value.to_ascii_lowercase().as_str() {
                "italic" | "oblique" => font.italic = Some(true),
                "normal" => font.italic = Some(false),
                _ => {}
            },
            "text-align" => paragraph.alignment = Some(value.to_string()),
            "line-height" => paragraph.line_height = Some(value.to_string()),
            "text-indent" => paragraph.first_line_indent = Some(value.to_string()),
            "margin-top" => paragraph.space_before = Some(value.to_string()),
            "margin-bottom" => paragraph.space_after = Some(value.to_string()),
            _ => {}
        }
    }
    style
}

fn first_font_family(value: &str) -> Option<String> {
    value
        .split(',')
        .next()
        .map(|family| family.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|family| !family.is_empty())
}

fn parse_font_weight(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "bold" | "bolder" => Some(true),
        "normal" | "lighter" => Some(false),
        numeric => numeric.parse::<u16>().ok().map(|weight| weight >= 600),
    }
}

/// Formatting an element declares: tag defaults, then its `style` attribute
fn element_style(element: &BytesStart, tag: Tag) -> Result<BlockStyle> {
    let mut style = BlockStyle::default();
    if !matches!(tag, Tag::Paragraph | Tag::Inline) {
        return Ok(style);
    }

    match element.local_name().as_ref().to_ascii_lowercase().as_slice() {
        b"h1" | b"h2" | b"h3" | b"h4" | b"h5" | b"h6" | b"b" | b"strong" => {
            style.font.bold = Some(true)
        }
        b"i" | b"em" => style.font.italic = Some(true),
        _ => {}
    }

    for attr in element.attributes().flatten() {
        if attr.key.local_name().as_ref() == b"style" {
            let css = attr
                .unescape_value()
                .map_err(|err| anyhow!("invalid style attribute: {err}"))?;
            style.overlay(&parse_inline_style(&css));
        }
    }
    Ok(style)
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Default)]
struct TableBuilder {
    /// 1 for the outermost table, higher inside nested tables
    depth: usize,
    rows: Vec<Vec<String>>,
    row: Option<Vec<String>>,
    cell: Option<String>,
}

impl TableBuilder {
    fn finish_cell(&mut self) {
        if let Some(cell) = self.cell.take() {
            self.row
                .get_or_insert_with(Vec::new)
                .push(normalize_whitespace(&cell));
        }
    }

    fn finish_row(&mut self) {
        self.finish_cell();
        if let Some(row) = self.row.take() {
            self.rows.push(row);
        }
    }
}

struct ParagraphBuilder {
    text: String,
    style: BlockStyle,
    /// Font of the first non-blank text run, inline markup applied
    first_run: Option<FontStyle>,
}

/// Accumulates blocks while walking the event stream
#[derive(Default)]
struct BlockCollector {
    blocks: Vec<Block>,
    paragraph: Option<ParagraphBuilder>,
    table: Option<TableBuilder>,
    /// Fonts of the inline elements currently open, outermost first
    inline: Vec<FontStyle>,
}

impl BlockCollector {
    fn start(&mut self, tag: Tag, style: BlockStyle) {
        if tag == Tag::Inline {
            self.inline.push(style.font);
            return;
        }

        if let Some(table) = self.table.as_mut() {
            match tag {
                Tag::Table => table.depth += 1,
                Tag::Row if table.depth == 1 => {
                    table.finish_row();
                    table.row = Some(Vec::new());
                }
                Tag::Cell if table.depth == 1 => {
                    table.finish_cell();
                    table.cell = Some(String::new());
                }
                // nested table structure is folded into the enclosing cell
                Tag::Break | Tag::Row | Tag::Cell => {
                    if let Some(cell) = table.cell.as_mut() {
                        cell.push(' ');
                    }
                }
                Tag::Paragraph | Tag::Inline | Tag::Other => {}
            }
            return;
        }

        match tag {
            Tag::Paragraph if self.paragraph.is_none() => {
                self.paragraph = Some(ParagraphBuilder {
                    text: String::new(),
                    style,
                    first_run: None,
                })
            }
            Tag::Table => {
                self.finish_paragraph();
                self.table = Some(TableBuilder {
                    depth: 1,
                    ..TableBuilder::default()
                });
            }
            Tag::Break => self.push_text(" "),
            _ => {}
        }
    }

    fn end(&mut self, tag: Tag) {
        if tag == Tag::Inline {
            self.inline.pop();
            return;
        }

        if let Some(table) = self.table.as_mut() {
            match tag {
                Tag::Table if table.depth > 1 => table.depth -= 1,
                Tag::Table => self.finish_table(),
                Tag::Row if table.depth == 1 => table.finish_row(),
                Tag::Cell if table.depth == 1 => table.finish_cell(),
                _ => {}
            }
            return;
        }

        if tag == Tag::Paragraph {
            self.finish_paragraph();
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(table) = self.table.as_mut() {
            if let Some(cell) = table.cell.as_mut() {
                cell.push_str(text);
            }
        } else if let Some(paragraph) = self.paragraph.as_mut() {
            if paragraph.first_run.is_none() && !text.trim().is_empty() {
                let mut run = FontStyle::default();
                for font in &self.inline {
                    run.overlay(font);
                }
                paragraph.first_run = Some(run);
            }
            paragraph.text.push_str(text);
        }
    }

    fn finish_paragraph(&mut self) {
        if let Some(paragraph) = self.paragraph.take() {
            let mut style = paragraph.style;
            if let Some(run) = &paragraph.first_run {
                style.font.overlay(run);
            }
            // unmarked text is upright and regular weight
            style.font.bold = Some(style.font.bold.unwrap_or(false));
            style.font.italic = Some(style.font.italic.unwrap_or(false));

            let index = self.blocks.len();
            self.blocks
                .push(Block::paragraph(index, normalize_whitespace(&paragraph.text)).with_style(style));
        }
    }

    fn finish_table(&mut self) {
        if let Some(mut table) = self.table.take() {
            table.finish_row();
            let index = self.blocks.len();
            self.blocks.push(Block::table(index, table.rows));
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.finish_paragraph();
        self.finish_table();
        self.blocks
    }
}

pub struct XhtmlLoader;

impl DocumentLoader for XhtmlLoader {
    fn load(&self, content: &str) -> Result<Vec<Block>> {
        let mut reader = Reader::from_str(content);
        let mut collector = BlockCollector::default();

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let tag = classify_tag(e.local_name().as_ref());
                    collector.start(tag, element_style(&e, tag)?);
                }
                Ok(Event::Empty(e)) => {
                    let tag = classify_tag(e.local_name().as_ref());
                    match tag {
                        Tag::Break => collector.start(tag, BlockStyle::default()),
                        // <p/> is an empty paragraph, <td/> an empty cell
                        Tag::Paragraph | Tag::Cell | Tag::Row | Tag::Table => {
                            collector.start(tag, element_style(&e, tag)?);
                            collector.end(tag);
                        }
                        Tag::Inline | Tag::Other => {}
                    }
                }
                Ok(Event::End(e)) => collector.end(classify_tag(e.local_name().as_ref())),
                Ok(Event::Text(e)) => {
                    let text = e.unescape_with(resolve_html_entity).map_err(|err| {
                        anyhow!("XHTML text error at byte {}: {err}", reader.buffer_position())
                    })?;
                    collector.push_text(&text);
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    collector.push_text(&text);
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => {
                    return Err(anyhow!(
                        "XHTML parse error at byte {}: {err}",
                        reader.buffer_position()
                    ))
                }
            }
        }

        let blocks = collector.finish();
        debug!(
            "XHTML loader: {} blocks ({} tables)",
            blocks.len(),
            blocks.iter().filter(|b| b.rows().is_some()).count()
        );
        Ok(blocks)
    }

    fn name(&self) -> &str {
        "xhtml"
    }

    fn supports_file_type(&self, path: &Path) -> bool {
        has_extension(path, &["xhtml", "html", "htm", "xml"])
    }
}
