//! Formatting checks
//!
//! A config declares the expected formatting per class (`styles:`). Every
//! classified block that carries observed formatting is compared with the
//! declaration of each of its classes, one issue per deviating property.
//!
//! Values are compared as written, ignoring case, surrounding quotes and
//! whitespace: `12pt` and `16px` are different values even when they render
//! the same. A property the loader could not observe is skipped.

use crate::types::{Block, BlockStyle, Evidence, Issue, LabelledDocument, Location, Severity};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// `.title` and `title` both name the class `title`
pub fn class_key(selector: &str) -> &str {
    selector.trim().trim_start_matches('.')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StyleProperty {
    FontFamily,
    FontSize,
    Bold,
    Italic,
    Alignment,
    LineHeight,
    FirstLineIndent,
    SpaceBefore,
    SpaceAfter,
}

impl StyleProperty {
    const ALL: [StyleProperty; 9] = [
        StyleProperty::FontFamily,
        StyleProperty::FontSize,
        StyleProperty::Bold,
        StyleProperty::Italic,
        StyleProperty::Alignment,
        StyleProperty::LineHeight,
        StyleProperty::FirstLineIndent,
        StyleProperty::SpaceBefore,
        StyleProperty::SpaceAfter,
    ];

    fn name(self) -> &'static str {
        match self {
            StyleProperty::FontFamily => "font-family",
            StyleProperty::FontSize => "font-size",
            StyleProperty::Bold => "bold",
            StyleProperty::Italic => "italic",
            StyleProperty::Alignment => "alignment",
            StyleProperty::LineHeight => "line-height",
            StyleProperty::FirstLineIndent => "first-line-indent",
            StyleProperty::SpaceBefore => "space-before",
            StyleProperty::SpaceAfter => "space-after",
        }
    }

    /// Spacing deviations are warnings, everything else is an error
    fn severity(self) -> Severity {
        match self {
            StyleProperty::LineHeight | StyleProperty::SpaceBefore | StyleProperty::SpaceAfter => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }

    fn value(self, style: &BlockStyle) -> Option<String> {
        let font = &style.font;
        let paragraph = &style.paragraph;
        match self {
            StyleProperty::FontFamily => font.family.clone(),
            StyleProperty::FontSize => font.size.clone(),
            StyleProperty::Bold => font.bold.map(|bold| bold.to_string()),
            StyleProperty::Italic => font.italic.map(|italic| italic.to_string()),
            StyleProperty::Alignment => paragraph.alignment.clone(),
            StyleProperty::LineHeight => paragraph.line_height.clone(),
            StyleProperty::FirstLineIndent => paragraph.first_line_indent.clone(),
            StyleProperty::SpaceBefore => paragraph.space_before.clone(),
            StyleProperty::SpaceAfter => paragraph.space_after.clone(),
        }
    }

    fn normalize(self, value: &str) -> String {
        let value = value
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .to_lowercase();
        match self {
            StyleProperty::Alignment => canonical_alignment(&value).to_string(),
            _ => value,
        }
    }
}

/// Alignment names accepted in configs besides the CSS keywords
fn canonical_alignment(value: &str) -> &str {
    match value {
        "居中" | "centre" | "middle" => "center",
        "左对齐" => "left",
        "右对齐" => "right",
        "两端对齐" | "justified" => "justify",
        "分散对齐" => "distribute",
        other => other,
    }
}

/// Expected formatting per class, compiled from the `styles:` section
pub struct StyleChecker {
    styles: BTreeMap<String, BlockStyle>,
}

impl StyleChecker {
    pub fn new(styles: &BTreeMap<String, BlockStyle>) -> Self {
        let mut normalized: BTreeMap<String, BlockStyle> = BTreeMap::new();
        for (selector, style) in styles {
            normalized
                .entry(class_key(selector).to_string())
                .or_default()
                .overlay(style);
        }
        Self { styles: normalized }
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// Classes with declared formatting
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.styles.keys().map(String::as_str)
    }

    pub fn check(&self, doc: &LabelledDocument) -> Vec<Issue> {
        let mut issues = Vec::new();
        let mut compared = 0usize;

        for block in doc.blocks() {
            let Some(observed) = block.style() else {
                continue;
            };
            for class_name in block.classes() {
                if let Some(expected) = self.styles.get(class_name) {
                    compared += 1;
                    issues.extend(compare(block, class_name, expected, observed));
                }
            }
        }

        info!(
            "🎨 Style check: {} block/class pairs compared, {} deviations",
            compared,
            issues.len()
        );
        issues
    }
}

fn compare(block: &Block, class_name: &str, expected: &BlockStyle, observed: &BlockStyle) -> Vec<Issue> {
    StyleProperty::ALL
        .iter()
        .filter_map(|&property| {
            let want = property.value(expected)?;
            let Some(found) = property.value(observed) else {
                debug!(
                    "   block {} has no observed {} for .{}",
                    block.index(),
                    property.name(),
                    class_name
                );
                return None;
            };
            if property.normalize(&want) == property.normalize(&found) {
                return None;
            }
            Some(Issue {
                code: format!("style-{}-{}", class_name, property.name()),
                severity: property.severity(),
                message: format!(".{class_name} {} should be {want}, found {found}", property.name()),
                location: Location::block(block),
                evidence: Some(Evidence {
                    expected: want,
                    actual: found,
                }),
            })
        })
        .collect()
}
