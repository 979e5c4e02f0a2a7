//! End-to-end tests over the thesis fixture.
//!
//! `tests/fixtures/thesis.xhtml` is a fourteen-block document (front matter,
//! two numbered sections, one captioned table, a short reference list).
//! `thesis.yaml` imports the shared structure rules and adds caption and
//! reference rules, so the whole config path (imports, range expressions,
//! kind restrictions, nested children) is exercised.

use blockcheck_core::{
    classify, Block, CheckConfig, ClassRule, Classifier, ConfigError, DocumentChecker,
    DocumentLoader, Evidence, JsonLoader, LabelledDocument, MatchSpec, ReportFormat, Selector,
    SelectorErrorKind, Severity, XhtmlLoader,
};
use std::path::PathBuf;

// ============================================================================
// Fixture helpers
// ============================================================================

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn thesis_checker() -> DocumentChecker {
    let config = CheckConfig::load_from_file(&fixture("thesis.yaml")).unwrap();
    DocumentChecker::new(&config).unwrap()
}

fn thesis_blocks() -> Vec<Block> {
    XhtmlLoader.load_file(&fixture("thesis.xhtml")).unwrap()
}

fn indices(doc: &LabelledDocument, selector: &str) -> Vec<usize> {
    doc.select(selector)
        .unwrap()
        .into_iter()
        .map(Block::index)
        .collect()
}

// ============================================================================
// Classification over the fixture
// ============================================================================

mod classification {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn fixture_loads_expected_blocks() {
        let blocks = thesis_blocks();
        assert_eq!(blocks.len(), 14);
        assert_eq!(blocks[3].text(), "Abstract: This thesis studies rule-based labelling of document blocks.");
        assert_eq!(blocks[8].rows().unwrap()[1], vec!["a.csv".to_string(), "12 MB".to_string()]);

        let title = blocks[0].style().unwrap();
        assert_eq!(title.font.bold, Some(true));
        assert_eq!(title.paragraph.alignment.as_deref(), Some("center"));
        assert_eq!(blocks[3].style().unwrap().font.italic, Some(false));
        assert_eq!(blocks[8].style(), None);
    }

    #[test]
    fn imported_and_local_styles_are_merged() {
        let config = CheckConfig::load_from_file(&fixture("thesis.yaml")).unwrap();
        let title = &config.styles["title"];
        assert_eq!(title.font.size.as_deref(), Some("16pt"));
        assert_eq!(title.paragraph.alignment.as_deref(), Some("center"));
        assert!(config.styles.contains_key("heading"));
    }

    #[test]
    fn front_matter_region_and_children() {
        let doc = thesis_checker().label(thesis_blocks());
        assert_eq!(indices(&doc, ".title"), vec![0]);
        assert_eq!(indices(&doc, ".front-matter"), vec![1, 2]);
        assert_eq!(indices(&doc, ".author"), vec![1]);
        assert_eq!(indices(&doc, ".affiliation"), vec![2]);
        assert_eq!(indices(&doc, ".keywords"), vec![4]);
    }

    #[test]
    fn body_classes() {
        let doc = thesis_checker().label(thesis_blocks());
        assert_eq!(indices(&doc, ".heading"), vec![5, 9]);
        assert_eq!(indices(&doc, ".caption"), vec![7]);
        assert_eq!(indices(&doc, ".captioned-table"), vec![8]);
        assert_eq!(indices(&doc, ".reference-item"), vec![12, 13]);
    }

    #[test]
    fn classification_is_deterministic() {
        let checker = thesis_checker();
        let first = checker.label(thesis_blocks());
        let second = checker.label(thesis_blocks());
        assert_eq!(first, second);

        let reloaded = thesis_checker().label(thesis_blocks());
        assert_eq!(first, reloaded);
    }

    #[test]
    fn classification_is_idempotent() {
        let checker = thesis_checker();
        let mut blocks = thesis_blocks();
        checker.classifier().classify_in_place(&mut blocks);
        let once = blocks.clone();
        checker.classifier().classify_in_place(&mut blocks);
        assert_eq!(blocks, once);
    }

    #[test]
    fn cyclic_config_is_rejected_before_classification() {
        let config = CheckConfig::load_from_file(&fixture("cyclic.yaml")).unwrap();
        match DocumentChecker::new(&config) {
            Err(ConfigError::CyclicDependency { cycle }) => {
                assert!(cycle.len() >= 3);
                assert_eq!(cycle.first(), cycle.last());
            }
            Err(other) => panic!("expected a cycle, got {other}"),
            Ok(_) => panic!("expected a cycle"),
        }
    }
}

// ============================================================================
// Positional predicates through the public API
// ============================================================================

mod predicates {
    use super::*;
    use pretty_assertions::assert_eq;

    fn paragraphs(len: usize) -> Vec<Block> {
        (0..len).map(|i| Block::paragraph(i, format!("p{i}"))).collect()
    }

    #[test]
    fn between_is_an_open_interval() {
        let rules = vec![
            ClassRule::new("start", MatchSpec::AbsoluteIndex { index: 0 }),
            ClassRule::new("end", MatchSpec::AbsoluteIndex { index: 3 }),
            ClassRule::new(
                "inside",
                MatchSpec::Between {
                    start_class: "start".into(),
                    end_class: "end".into(),
                },
            ),
        ];
        let doc = classify(paragraphs(5), &rules).unwrap();
        assert_eq!(indices(&doc, ".inside"), vec![1, 2]);
    }

    #[test]
    fn next_and_prev_with_offsets() {
        let rules = vec![
            ClassRule::new("anchor", MatchSpec::AbsoluteIndex { index: 3 }),
            ClassRule::new("next0", MatchSpec::Next { ref_class: "anchor".into(), offset: 0 }),
            ClassRule::new("next1", MatchSpec::Next { ref_class: "anchor".into(), offset: 1 }),
            ClassRule::new("prev2", MatchSpec::Prev { ref_class: "anchor".into(), offset: 2 }),
            ClassRule::new("next9", MatchSpec::Next { ref_class: "anchor".into(), offset: 9 }),
        ];
        let doc = classify(paragraphs(6), &rules).unwrap();
        assert_eq!(indices(&doc, ".next0"), vec![4]);
        assert_eq!(indices(&doc, ".next1"), vec![5]);
        assert_eq!(indices(&doc, ".prev2"), vec![0]);
        assert!(indices(&doc, ".next9").is_empty());
    }

    #[test]
    fn nested_relative_index_is_scoped_to_parent() {
        let rules = vec![
            ClassRule::new("a", MatchSpec::AbsoluteIndex { index: 1 }),
            ClassRule::new("b", MatchSpec::AbsoluteIndex { index: 6 }),
            ClassRule::new(
                "region",
                MatchSpec::Between {
                    start_class: "a".into(),
                    end_class: "b".into(),
                },
            )
            .with_children(vec![
                ClassRule::new("first", MatchSpec::RelativeIndex { index: 0 }),
                ClassRule::new("last", MatchSpec::RelativeIndex { index: -1 }),
            ]),
        ];
        let doc = classify(paragraphs(8), &rules).unwrap();
        assert_eq!(indices(&doc, ".region"), vec![2, 3, 4, 5]);
        assert_eq!(indices(&doc, ".first"), vec![2]);
        assert_eq!(indices(&doc, ".last"), vec![5]);
    }

    #[test]
    fn evaluation_order_follows_dependencies() {
        let rules = vec![
            ClassRule::new("c", MatchSpec::Next { ref_class: "b".into(), offset: 0 }),
            ClassRule::new("b", MatchSpec::Next { ref_class: "a".into(), offset: 0 }),
            ClassRule::new("a", MatchSpec::AbsoluteIndex { index: 0 }),
        ];
        let classifier = Classifier::new(&rules).unwrap();
        assert_eq!(classifier.evaluation_order(), vec!["a", "b", "c"]);
    }
}

// ============================================================================
// Queries
// ============================================================================

mod queries {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn selectors_over_fixture() {
        let doc = thesis_checker().label(thesis_blocks());
        assert_eq!(indices(&doc, ".heading:last"), vec![9]);
        assert_eq!(indices(&doc, ".heading:nth(0)"), vec![5]);
        assert_eq!(indices(&doc, ".caption + [kind=\"table\"]"), vec![8]);
        assert_eq!(indices(&doc, ".references-heading + .reference-item"), vec![12]);
        assert_eq!(indices(&doc, "[type=table]"), vec![8]);
        assert_eq!(doc.count(".reference-item").unwrap(), 2);
        assert!(!doc.exists(".appendix").unwrap());
    }

    #[test]
    fn unterminated_nth_is_a_syntax_error() {
        let err = Selector::parse(".item:nth(").unwrap_err();
        assert_eq!(err.kind, SelectorErrorKind::UnexpectedEnd);
        assert_eq!(err.fragment, ":nth(");
    }
}

// ============================================================================
// Full check run
// ============================================================================

mod check_run {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn thesis_report() {
        let outcome = thesis_checker().check_file(&fixture("thesis.xhtml"), true).unwrap();
        let report = &outcome.report;

        assert_eq!(report.block_count, 14);
        assert_eq!(report.class_counts.get("heading"), Some(&2));
        assert_eq!(report.class_counts.get("front-matter"), Some(&2));

        let codes: Vec<&str> = report.issues.iter().map(|i| i.code.as_str()).collect();
        assert_eq!(codes, vec!["min-references", "style-heading-font-size"]);
        assert_eq!(report.issues[0].severity, Severity::Warning);
        assert_eq!(report.issues[0].message, "At least three references are required");

        let deviation = &report.issues[1];
        assert_eq!(deviation.severity, Severity::Error);
        assert_eq!(deviation.location.block_index, Some(9));
        assert_eq!(
            deviation.evidence,
            Some(Evidence {
                expected: "14pt".into(),
                actual: "12pt".into()
            })
        );
        assert!(report.has_errors());

        let markdown = report.render(ReportFormat::Markdown).unwrap();
        assert!(markdown.contains("### min-references (warning)"));
        assert!(markdown.contains("### style-heading-font-size (error)"));
    }

    #[test]
    fn labelled_blocks_survive_json_dump() {
        let doc = thesis_checker().label(thesis_blocks());
        let json = serde_json::to_string(doc.blocks()).unwrap();
        let reloaded = JsonLoader.load(&json).unwrap();
        assert_eq!(reloaded, doc.blocks());
    }
}
