use crate::types::{Issue, LabelledDocument, Severity};
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::path::Path;
use uuid::Uuid;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Outcome of one check run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckReport {
    pub schema_version: String,
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Where the document came from, usually its path
    pub source: String,
    /// Fingerprint of the resolved configuration
    pub config_hash: String,
    pub block_count: usize,
    pub class_counts: BTreeMap<String, usize>,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Markdown,
}

impl ReportFormat {
    pub fn parse(format: &str) -> Result<Self> {
        match format.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            other => bail!("unknown report format '{other}' (expected json or markdown)"),
        }
    }
}

impl CheckReport {
    pub fn new(source: &str, config_hash: &str, document: &LabelledDocument, issues: Vec<Issue>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            source: source.to_string(),
            config_hash: config_hash.to_string(),
            block_count: document.len(),
            class_counts: document.class_counts(),
            issues,
        }
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    pub fn has_errors(&self) -> bool {
        self.count_by_severity(Severity::Error) > 0
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_markdown(&self) -> Result<String> {
        let mut out = String::new();
        self.write_markdown(&mut out)?;
        Ok(out)
    }

    fn write_markdown(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "# Document Check Report\n")?;
        writeln!(out, "- Source: {}", self.source)?;
        writeln!(out, "- Run: {} ({})", self.run_id, self.created_at.to_rfc3339())?;
        writeln!(out, "- Config: {}", short_hash(&self.config_hash))?;
        writeln!(
            out,
            "- Blocks: {}, issues: {} ({} errors, {} warnings, {} info)",
            self.block_count,
            self.issues.len(),
            self.count_by_severity(Severity::Error),
            self.count_by_severity(Severity::Warning),
            self.count_by_severity(Severity::Info)
        )?;

        if !self.class_counts.is_empty() {
            writeln!(out, "\n## Classes\n")?;
            writeln!(out, "| Class | Blocks |")?;
            writeln!(out, "|---|---|")?;
            for (class_name, count) in &self.class_counts {
                writeln!(out, "| {class_name} | {count} |")?;
            }
        }

        writeln!(out, "\n## Issues\n")?;
        if self.issues.is_empty() {
            return writeln!(out, "No issues found.");
        }

        for issue in &self.issues {
            let loc = &issue.location;
            writeln!(out, "### {} ({})\n", issue.code, issue.severity)?;
            match loc.block_index {
                Some(index) => writeln!(out, "- Location: block {index} ({})", loc.kind)?,
                None => writeln!(out, "- Location: {}", loc.kind)?,
            }
            writeln!(out, "- Hint: {}", loc.hint)?;
            writeln!(out, "- Message: {}", issue.message)?;
            if let Some(evidence) = &issue.evidence {
                writeln!(out, "- Evidence:")?;
                writeln!(out, "  - expected: {}", evidence.expected)?;
                writeln!(out, "  - actual: {}", evidence.actual)?;
            }
            out.push('\n');
        }
        Ok(())
    }

    pub fn render(&self, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Json => self.to_json_pretty(),
            ReportFormat::Markdown => self.to_markdown(),
        }
    }

    pub fn save_with_format(&self, path: &Path, format: ReportFormat) -> Result<()> {
        std::fs::write(path, self.render(format)?)?;
        Ok(())
    }
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Block, Evidence, Location};
    use tempfile::tempdir;

    fn report(issues: Vec<Issue>) -> CheckReport {
        let mut blocks = vec![Block::paragraph(0, "Title"), Block::paragraph(1, "Body")];
        blocks[0].add_class("title");
        CheckReport::new("thesis.xhtml", &"ab".repeat(32), &LabelledDocument::new(blocks), issues)
    }

    fn sample_issue() -> Issue {
        Issue {
            code: "abstract-prefix".into(),
            severity: Severity::Error,
            message: "Abstract must start with 'Abstract:'".into(),
            location: Location::document("existence check"),
            evidence: Some(Evidence {
                expected: "Exists: true".into(),
                actual: "Exists: false".into(),
            }),
        }
    }

    #[test]
    fn test_report_summary_fields() {
        let report = report(vec![sample_issue()]);
        assert_eq!(report.block_count, 2);
        assert_eq!(report.class_counts.get("title"), Some(&1));
        assert!(report.has_errors());
        assert_eq!(report.count_by_severity(Severity::Warning), 0);
    }

    #[test]
    fn test_json_round_trip() {
        let report = report(vec![sample_issue()]);
        let json = report.to_json_pretty().unwrap();
        let parsed: CheckReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["issues"][0]["location"]["block_index"], serde_json::Value::Null);
        assert_eq!(value["schema_version"], SCHEMA_VERSION);
    }

    #[test]
    fn test_markdown_lists_issues() {
        let markdown = report(vec![sample_issue()]).to_markdown().unwrap();
        assert!(markdown.starts_with("# Document Check Report"));
        assert!(markdown.contains("### abstract-prefix (error)"));
        assert!(markdown.contains("- Location: document"));
        assert!(markdown.contains("  - expected: Exists: true"));
        assert!(markdown.contains("| title | 1 |"));

        let heading = Block::paragraph(3, "2 Method");
        let deviation = Issue {
            code: "style-heading-font-size".into(),
            severity: Severity::Error,
            message: ".heading font-size should be 14pt, found 12pt".into(),
            location: Location::block(&heading),
            evidence: Some(Evidence {
                expected: "14pt".into(),
                actual: "12pt".into(),
            }),
        };
        let markdown = report(vec![deviation]).render(ReportFormat::Markdown).unwrap();
        assert!(markdown.contains("- Location: block 3 (paragraph)"));
        assert!(markdown.contains("- Hint: 2 Method"));
        assert!(markdown.contains("  - actual: 12pt"));

        let clean = report(Vec::new()).to_markdown().unwrap();
        assert!(clean.contains("No issues found."));
    }

    #[test]
    fn test_save_with_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.md");
        report(Vec::new())
            .save_with_format(&path, ReportFormat::parse("md").unwrap())
            .unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("## Issues"));
        assert!(ReportFormat::parse("html").is_err());
    }
}
