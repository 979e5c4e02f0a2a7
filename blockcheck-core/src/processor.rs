use crate::classifier::Classifier;
use crate::config::CheckConfig;
use crate::content_rules::RuleChecker;
use crate::error::ConfigError;
use crate::loaders::{loader_for_path, DocumentLoader};
use crate::report::CheckReport;
use crate::styles::StyleChecker;
use crate::types::{Block, LabelledDocument};
use anyhow::Result;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Simple profiler that collects timings for pipeline steps
pub struct StepProfiler {
    enabled: bool,
    timings: Vec<(String, Duration)>,
}

impl StepProfiler {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            timings: Vec::new(),
        }
    }

    pub fn time_step<F, R>(&mut self, step_name: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if !self.enabled {
            return f();
        }

        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();

        self.timings.push((step_name.to_string(), elapsed));
        info!("⏱️  {}: {:.3}ms", step_name, elapsed.as_secs_f64() * 1000.0);

        result
    }

    pub fn timings(&self) -> &[(String, Duration)] {
        &self.timings
    }

    pub fn log_summary(&self) {
        if !self.enabled || self.timings.is_empty() {
            return;
        }

        info!("📊 Performance Summary:");
        let total: Duration = self.timings.iter().map(|(_, d)| *d).sum();

        for (step, duration) in &self.timings {
            let percentage = if total.is_zero() {
                0.0
            } else {
                (duration.as_secs_f64() / total.as_secs_f64()) * 100.0
            };
            info!(
                "   {:.<35} {:.3}ms ({:.1}%)",
                step,
                duration.as_secs_f64() * 1000.0,
                percentage
            );
        }
        info!("   {:.<35} {:.3}ms", "Total", total.as_secs_f64() * 1000.0);
    }
}

/// Labelled document plus the report produced from it
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub document: LabelledDocument,
    pub report: CheckReport,
}

/// Validated pipeline: load → classify → content rules → formatting → report
pub struct DocumentChecker {
    classifier: Classifier,
    rule_checker: RuleChecker,
    style_checker: StyleChecker,
    config_hash: String,
}

impl DocumentChecker {
    /// Compile every rule in the config. Nothing is loaded or checked yet.
    pub fn new(config: &CheckConfig) -> Result<Self, ConfigError> {
        let class_rules = config.class_rules()?;
        let classifier = Classifier::new(&class_rules)?;
        let rule_checker = RuleChecker::new(&config.rules)?;
        let style_checker = StyleChecker::new(&config.styles);

        let declared = classifier.evaluation_order();
        for class_name in style_checker.classes() {
            if !declared.contains(&class_name) {
                warn!("⚠️  Styles declared for '{class_name}', which no classifier assigns");
            }
        }

        info!(
            "🧩 Config ready: {} classifiers, {} content rules, {} styled classes",
            class_rules.len(),
            rule_checker.len(),
            style_checker.len()
        );
        Ok(Self {
            classifier,
            rule_checker,
            style_checker,
            config_hash: config.fingerprint(),
        })
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Classification only, for queries
    pub fn label(&self, blocks: Vec<Block>) -> LabelledDocument {
        self.classifier.classify(blocks)
    }

    pub fn check_blocks(&self, source: &str, blocks: Vec<Block>) -> CheckOutcome {
        self.check_blocks_with_profiler(source, blocks, &mut StepProfiler::new(false))
    }

    pub fn check_blocks_with_profiler(
        &self,
        source: &str,
        blocks: Vec<Block>,
        profiler: &mut StepProfiler,
    ) -> CheckOutcome {
        let document = profiler.time_step("Classification", || self.classifier.classify(blocks));
        let mut issues = profiler.time_step("Content Rules", || self.rule_checker.check(&document));
        if !self.style_checker.is_empty() {
            issues.extend(profiler.time_step("Style Check", || self.style_checker.check(&document)));
        }
        let report = CheckReport::new(source, &self.config_hash, &document, issues);
        CheckOutcome { document, report }
    }

    /// Load a document with the loader matching its extension
    pub fn load_file(&self, path: &Path) -> Result<Vec<Block>> {
        let loader = loader_for_path(path)?;
        info!("📄 Loading {} with {} loader", path.display(), loader.name());
        loader.load_file(path)
    }

    pub fn check_file(&self, path: &Path, enable_profiling: bool) -> Result<CheckOutcome> {
        let mut profiler = StepProfiler::new(enable_profiling);
        let start_time = Instant::now();

        let blocks = profiler.time_step("Loading", || self.load_file(path))?;
        let outcome =
            self.check_blocks_with_profiler(&path.display().to_string(), blocks, &mut profiler);

        profiler.log_summary();
        info!(
            "✅ Checked {} blocks, {} issues in {:.3}s",
            outcome.report.block_count,
            outcome.report.issues.len(),
            start_time.elapsed().as_secs_f64()
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
classifiers:
  - class: title
    match: {position: {type: absolute, index: 0}}
  - class: after-title
    match: {position: {type: next, class: title}}
rules:
  - id: title-present
    selector: .title
    check: {exists: true}
  - id: single-follower
    selector: .after-title
    check: {count: 2}
"#;

    #[test]
    fn test_check_blocks_pipeline() {
        let config = CheckConfig::from_yaml_str(CONFIG).unwrap();
        let checker = DocumentChecker::new(&config).unwrap();
        let blocks = vec![Block::paragraph(0, "Title"), Block::paragraph(1, "Sub")];

        let outcome = checker.check_blocks("inline", blocks);
        assert_eq!(outcome.report.source, "inline");
        assert_eq!(outcome.report.config_hash, config.fingerprint());
        assert_eq!(outcome.report.issues.len(), 1);
        assert_eq!(outcome.report.issues[0].code, "single-follower");
        assert!(outcome.document.blocks()[1].has_class("after-title"));
    }

    #[test]
    fn test_formatting_deviations_follow_content_issues() {
        let config = CheckConfig::from_yaml_str(&format!(
            "{CONFIG}styles:\n  .title: {{font: {{bold: true}}}}\n"
        ))
        .unwrap();
        let checker = DocumentChecker::new(&config).unwrap();

        let mut plain = crate::types::BlockStyle::default();
        plain.font.bold = Some(false);
        let blocks = vec![
            Block::paragraph(0, "Title").with_style(plain),
            Block::paragraph(1, "Sub"),
        ];

        let outcome = checker.check_blocks("inline", blocks);
        let codes: Vec<&str> = outcome.report.issues.iter().map(|i| i.code.as_str()).collect();
        assert_eq!(codes, vec!["single-follower", "style-title-bold"]);
        let without_styles = CheckConfig::from_yaml_str(CONFIG).unwrap();
        assert_ne!(outcome.report.config_hash, without_styles.fingerprint());
    }

    #[test]
    fn test_config_errors_surface_before_processing() {
        let config = CheckConfig::from_yaml_str(
            "classifiers: [{class: a, match: {position: {type: next, class: b}}}]",
        )
        .unwrap();
        assert!(matches!(
            DocumentChecker::new(&config),
            Err(ConfigError::UnknownClass { .. })
        ));
    }

    #[test]
    fn test_profiler_records_only_when_enabled() {
        let mut disabled = StepProfiler::new(false);
        assert_eq!(disabled.time_step("noop", || 2 + 2), 4);
        assert!(disabled.timings().is_empty());

        let mut enabled = StepProfiler::new(true);
        enabled.time_step("noop", || ());
        assert_eq!(enabled.timings().len(), 1);
        assert_eq!(enabled.timings()[0].0, "noop");
    }
}
