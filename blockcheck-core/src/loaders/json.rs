// JSON block dump loader.
//
// Accepts the same shape the CLI writes with `--dump-blocks`: an array of
// `{"kind": "paragraph", "text": ..}` / `{"kind": "table", "rows": [[..]]}`.
// `index`, `classes` and `style` are optional on input; indices are always
// reassigned from position, incoming classes and formatting are kept.

use super::{has_extension, DocumentLoader};
use crate::types::{Block, BlockContent, BlockStyle};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RawBlock {
    #[serde(flatten)]
    content: BlockContent,
    #[serde(default)]
    classes: BTreeSet<String>,
    #[serde(default)]
    style: Option<BlockStyle>,
}

pub struct JsonLoader;

impl DocumentLoader for JsonLoader {
    fn load(&self, content: &str) -> Result<Vec<Block>> {
        let raw: Vec<RawBlock> =
            serde_json::from_str(content).context("invalid JSON block dump")?;

        let blocks: Vec<Block> = raw
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                let mut block = match raw.content {
                    BlockContent::Paragraph { text } => Block::paragraph(index, text),
                    BlockContent::Table { rows } => Block::table(index, rows),
                };
                for class_name in &raw.classes {
                    block.add_class(class_name);
                }
                match raw.style {
                    Some(style) => block.with_style(style),
                    None => block,
                }
            })
            .collect();

        debug!("JSON loader: {} blocks", blocks.len());
        Ok(blocks)
    }

    fn name(&self) -> &str {
        "json"
    }

    fn supports_file_type(&self, path: &Path) -> bool {
        has_extension(path, &["json"])
    }
}
