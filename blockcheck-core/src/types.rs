use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ===== BLOCK MODEL =====
// A document is a flat arena of blocks addressed by their stable index.
// Classes are attached to blocks in place and are never removed.

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Paragraph,
    Table,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Paragraph => "paragraph",
            BlockKind::Table => "table",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "paragraph" => Some(BlockKind::Paragraph),
            "table" => Some(BlockKind::Table),
            _ => None,
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific content of a block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BlockContent {
    Paragraph { text: String },
    Table { rows: Vec<Vec<String>> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Block {
    index: usize,
    #[serde(flatten)]
    content: BlockContent,
    #[serde(default)]
    classes: BTreeSet<String>,
    /// Observed formatting, when the loader could read it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    style: Option<BlockStyle>,
}

impl Block {
    pub fn paragraph(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            content: BlockContent::Paragraph { text: text.into() },
            classes: BTreeSet::new(),
            style: None,
        }
    }

    pub fn table(index: usize, rows: Vec<Vec<String>>) -> Self {
        Self {
            index,
            content: BlockContent::Table { rows },
            classes: BTreeSet::new(),
            style: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub fn kind(&self) -> BlockKind {
        match self.content {
            BlockContent::Paragraph { .. } => BlockKind::Paragraph,
            BlockContent::Table { .. } => BlockKind::Table,
        }
    }

    /// Paragraph text, `None` for tables
    pub fn paragraph_text(&self) -> Option<&str> {
        match &self.content {
            BlockContent::Paragraph { text } => Some(text),
            BlockContent::Table { .. } => None,
        }
    }

    /// Table rows, `None` for paragraphs
    pub fn rows(&self) -> Option<&[Vec<String>]> {
        match &self.content {
            BlockContent::Table { rows } => Some(rows),
            BlockContent::Paragraph { .. } => None,
        }
    }

    /// Flattened text. Table cells are joined by a single space in row order.
    pub fn text(&self) -> String {
        match &self.content {
            BlockContent::Paragraph { text } => text.clone(),
            BlockContent::Table { rows } => rows
                .iter()
                .flat_map(|row| row.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    pub fn with_style(mut self, style: BlockStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn style(&self) -> Option<&BlockStyle> {
        self.style.as_ref()
    }

    pub fn classes(&self) -> &BTreeSet<String> {
        &self.classes
    }

    pub fn has_class(&self, class_name: &str) -> bool {
        self.classes.contains(class_name)
    }

    /// Returns true if the class was not already present
    pub fn add_class(&mut self, class_name: &str) -> bool {
        if self.classes.contains(class_name) {
            return false;
        }
        self.classes.insert(class_name.to_string())
    }

    /// Short single-line preview for logs and report locations
    pub fn preview(&self, max_chars: usize) -> String {
        let text = self.text();
        let mut preview: String = text.chars().take(max_chars).collect();
        if text.chars().count() > max_chars {
            preview.push_str("...");
        }
        preview
    }
}

// ===== FORMATTING =====
// The same record describes what a loader observed on a block and what a
// config expects for a class. Values stay strings as written (`12pt`,
// `2em`, `center`); nothing is converted between units.

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FontStyle {
    #[serde(default, deserialize_with = "scalar_string", skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, deserialize_with = "scalar_string", skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ParagraphStyle {
    #[serde(default, deserialize_with = "scalar_string", skip_serializing_if = "Option::is_none")]
    pub alignment: Option<String>,
    #[serde(default, deserialize_with = "scalar_string", skip_serializing_if = "Option::is_none")]
    pub line_height: Option<String>,
    #[serde(default, deserialize_with = "scalar_string", skip_serializing_if = "Option::is_none")]
    pub first_line_indent: Option<String>,
    #[serde(default, deserialize_with = "scalar_string", skip_serializing_if = "Option::is_none")]
    pub space_before: Option<String>,
    #[serde(default, deserialize_with = "scalar_string", skip_serializing_if = "Option::is_none")]
    pub space_after: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BlockStyle {
    #[serde(default, skip_serializing_if = "FontStyle::is_empty")]
    pub font: FontStyle,
    #[serde(default, skip_serializing_if = "ParagraphStyle::is_empty")]
    pub paragraph: ParagraphStyle,
}

/// Style values as text; `size: 12` and `line_height: 1.5` read as "12" and "1.5"
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Integer(i64),
        Float(f64),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|scalar| match scalar {
        Scalar::Text(text) => text,
        Scalar::Integer(value) => value.to_string(),
        Scalar::Float(value) => value.to_string(),
    }))
}

fn overlay_value<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        slot.clone_from(value);
    }
}

impl FontStyle {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Replace every property `top` sets
    pub fn overlay(&mut self, top: &FontStyle) {
        overlay_value(&mut self.family, &top.family);
        overlay_value(&mut self.size, &top.size);
        overlay_value(&mut self.bold, &top.bold);
        overlay_value(&mut self.italic, &top.italic);
    }
}

impl ParagraphStyle {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn overlay(&mut self, top: &ParagraphStyle) {
        overlay_value(&mut self.alignment, &top.alignment);
        overlay_value(&mut self.line_height, &top.line_height);
        overlay_value(&mut self.first_line_indent, &top.first_line_indent);
        overlay_value(&mut self.space_before, &top.space_before);
        overlay_value(&mut self.space_after, &top.space_after);
    }
}

impl BlockStyle {
    pub fn is_empty(&self) -> bool {
        self.font.is_empty() && self.paragraph.is_empty()
    }

    pub fn overlay(&mut self, top: &BlockStyle) {
        self.font.overlay(&top.font);
        self.paragraph.overlay(&top.paragraph);
    }
}

// ===== LABELLED DOCUMENT =====

/// Block sequence after classification, the artifact handed to queries and checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelledDocument {
    blocks: Vec<Block>,
}

impl LabelledDocument {
    pub(crate) fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks carrying the class, in document order
    pub fn with_class<'a>(&'a self, class_name: &'a str) -> impl Iterator<Item = &'a Block> + 'a {
        self.blocks.iter().filter(move |b| b.has_class(class_name))
    }

    /// Number of blocks per class
    pub fn class_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for block in &self.blocks {
            for class_name in block.classes() {
                *counts.entry(class_name.clone()).or_insert(0) += 1;
            }
        }
        counts
    }
}

// ===== DIAGNOSTICS =====

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    #[default]
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("info"),
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    /// `None` for document-level findings (existence and count checks)
    pub block_index: Option<usize>,
    pub kind: String,
    pub hint: String,
}

impl Location {
    pub fn block(block: &Block) -> Self {
        Self {
            block_index: Some(block.index()),
            kind: block.kind().to_string(),
            hint: block.preview(50),
        }
    }

    pub fn document(hint: &str) -> Self {
        Self {
            block_index: None,
            kind: "document".to_string(),
            hint: hint.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evidence {
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Issue {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub location: Location,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,
}
