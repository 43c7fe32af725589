use super::*;
use crate::engine::report::{OrphanDeclaration, ReferenceFailure};

fn driver_with(styles: DefaultStyles, options: DriverOptions) -> ResolutionDriver {
    let graph = CatalogGraph::from_specs(&default_catalog_specs(&styles)).unwrap();
    ResolutionDriver::new(graph, options).unwrap()
}

fn driver() -> ResolutionDriver {
    driver_with(DefaultStyles::default(), DriverOptions::default())
}

fn document(paragraphs: &[&[&str]]) -> Vec<Paragraph> {
    paragraphs
        .iter()
        .map(|&runs| Paragraph::from_texts(runs))
        .collect()
}

fn texts(paragraphs: &[Paragraph]) -> Vec<String> {
    paragraphs.iter().map(Paragraph::text).collect()
}

#[test]
fn numbers_sections_figures_and_rewrites_references() {
    let mut paragraphs = document(&[
        &["^sec1{intro}^Introduction"],
        &["^sec2{scope}^Scope"],
        &["^sec1{design}^Design"],
        &["^sec2{arch}^Architecture ^fig{overview}^"],
        &["See `sec2{arch} and `fig{overview}, also `sec1{intro}."],
    ]);
    let mut driver = driver();

    let built = driver.run_build_pass(&mut paragraphs).unwrap();
    assert_eq!(built.applied, 5);
    assert_eq!(driver.stage(), Stage::Replace);

    let replaced = driver.run_replace_pass(&mut paragraphs).unwrap();
    assert_eq!(replaced.applied, 3);
    assert_eq!(replaced.failed, 0);

    let report = driver.run_report_pass().unwrap();
    assert_eq!(driver.stage(), Stage::Finished);

    assert_eq!(
        texts(&paragraphs),
        vec![
            "Introduction",
            "Scope",
            "Design",
            "Architecture ",
            "See 2.1 and 1, also 1.",
        ]
    );

    let subsections = report
        .catalogs
        .iter()
        .find(|catalog| catalog.name == "Subsection")
        .unwrap();
    let displays: Vec<Option<&str>> = subsections
        .entries
        .iter()
        .map(|entry| entry.display.as_deref())
        .collect();
    assert_eq!(displays, vec![Some("1.1"), Some("2.1")]);

    assert_eq!(
        report.orphans,
        vec![
            OrphanDeclaration {
                catalog: "Section".to_string(),
                identifier: "design".to_string(),
            },
            OrphanDeclaration {
                catalog: "Subsection".to_string(),
                identifier: "scope".to_string(),
            },
        ]
    );
    assert!(report.reference_failures.is_empty());
    assert!(report.marker_issues.is_empty());
}

#[test]
fn second_replace_pass_changes_nothing() {
    let mut paragraphs = document(&[&["^fig{a}^Figure"], &["as shown in `fig{a}"]]);
    let mut driver = driver();

    driver.run_build_pass(&mut paragraphs).unwrap();
    driver.run_replace_pass(&mut paragraphs).unwrap();
    let after_first = paragraphs.clone();

    let again = driver.run_replace_pass(&mut paragraphs).unwrap();
    assert_eq!(again.applied, 0);
    assert_eq!(paragraphs, after_first);
    assert_eq!(texts(&paragraphs)[1], "as shown in 1");
}

#[test]
fn unresolved_reference_keeps_marker_text() {
    let mut paragraphs = document(&[&["^fig{x}^"], &["see `fig{y}"]]);
    let mut driver = driver();

    let report = driver.run(&mut paragraphs).unwrap();

    assert_eq!(texts(&paragraphs), vec!["", "see `fig{y}"]);
    assert_eq!(
        report.reference_failures,
        vec![ReferenceFailure {
            paragraph: 1,
            catalog: "Figure".to_string(),
            identifier: "y".to_string(),
            reason: "no declaration matches `y` in catalog `Figure`".to_string(),
        }]
    );
    assert_eq!(report.orphans.len(), 1);
    assert_eq!(report.orphans[0].identifier, "x");
}

#[test]
fn unreferenced_citation_is_reported() {
    let mut paragraphs = document(&[&["^cite{x}^Knuth, 1984"]]);
    let mut driver = driver();

    let report = driver.run(&mut paragraphs).unwrap();

    assert_eq!(
        report.orphans,
        vec![OrphanDeclaration {
            catalog: "Citation".to_string(),
            identifier: "x".to_string(),
        }]
    );
    assert_eq!(texts(&paragraphs), vec!["Knuth, 1984"]);
}

#[test]
fn passes_must_run_in_order() {
    let mut paragraphs = document(&[&["^fig{a}^"]]);
    let mut driver = driver();

    assert_eq!(
        driver.run_replace_pass(&mut paragraphs),
        Err(EngineError::StageOrder {
            requested: Stage::Replace,
            current: Stage::Build,
        })
    );

    driver.run_build_pass(&mut paragraphs).unwrap();
    assert_eq!(
        driver.run_build_pass(&mut paragraphs),
        Err(EngineError::StageOrder {
            requested: Stage::Build,
            current: Stage::Replace,
        })
    );
    assert!(matches!(
        driver.run_report_pass(),
        Err(EngineError::StageOrder {
            requested: Stage::Report,
            current: Stage::Replace,
        })
    ));

    driver.run_replace_pass(&mut paragraphs).unwrap();
    driver.run_report_pass().unwrap();
    assert!(driver.run_replace_pass(&mut paragraphs).is_err());
}

#[test]
fn markers_split_across_runs_keep_run_count() {
    let mut paragraphs = document(&[
        &["Chapter ^sec", "1{Int", "ro}", "^ text"],
        &["ref `se", "c1{intro}", " done"],
    ]);
    let mut driver = driver();

    driver.run(&mut paragraphs).unwrap();

    assert_eq!(
        paragraphs[0].run_texts(),
        vec!["Chapter ", "", "", " text"]
    );
    assert_eq!(paragraphs[1].run_texts(), vec!["ref 1", "", " done"]);
}

#[test]
fn styles_follow_each_level() {
    let styles = DefaultStyles {
        section: NumberStyle::Roman,
        subsection: NumberStyle::Lower,
        ..DefaultStyles::default()
    };
    let mut paragraphs = document(&[
        &["^sec1{a}^"],
        &["^sec1{b}^"],
        &["^sec2{c}^"],
        &["^sec2{d}^"],
        &["`sec2{d} `sec1{b}"],
    ]);
    let mut driver = driver_with(styles, DriverOptions::default());

    driver.run(&mut paragraphs).unwrap();

    assert_eq!(texts(&paragraphs)[4], "II.b II");
}

#[test]
fn match_mode_decides_between_similar_identifiers() {
    let source = document(&[
        &["^fig{intro}^"],
        &["^fig{intro_extended}^"],
        &["`fig{intro_extended}"],
    ]);

    let mut exact = source.clone();
    driver().run(&mut exact).unwrap();
    assert_eq!(texts(&exact)[2], "2");

    let mut legacy = source;
    let options = DriverOptions {
        match_mode: MatchMode::Contains,
        ..DriverOptions::default()
    };
    let report = driver_with(DefaultStyles::default(), options)
        .run(&mut legacy)
        .unwrap();
    assert_eq!(texts(&legacy)[2], "1");
    assert_eq!(report.orphans.len(), 1);
    assert_eq!(report.orphans[0].identifier, "intro_extended");
}

#[test]
fn custom_prefix_is_matched_case_insensitively() {
    let mut paragraphs = document(&[&["^tbl{results}^"], &["see REF:tbl{Results}"]]);
    let options = DriverOptions {
        reference_prefix: "ref:".to_string(),
        ..DriverOptions::default()
    };
    let mut driver = driver_with(DefaultStyles::default(), options);

    driver.run(&mut paragraphs).unwrap();

    assert_eq!(texts(&paragraphs)[1], "see 1");
}

#[test]
fn rejects_prefixes_that_cannot_open_a_marker() {
    let graph = || CatalogGraph::from_specs(&default_catalog_specs(&DefaultStyles::default()));
    for prefix in ["", "{", "^", "@ ", "§"] {
        let options = DriverOptions {
            reference_prefix: prefix.to_string(),
            ..DriverOptions::default()
        };
        assert!(
            matches!(
                ResolutionDriver::new(graph().unwrap(), options),
                Err(EngineError::InvalidPrefix { .. })
            ),
            "prefix {prefix:?} accepted"
        );
    }
}

#[test]
fn stray_and_malformed_markers_are_reported_once() {
    let mut paragraphs = document(&[
        &["^sec9{x}^ costs 2^3"],
        &["^fig{}^"],
        &["see `fig{a", " and more"],
    ]);
    let mut driver = driver();

    let report = driver.run(&mut paragraphs).unwrap();

    let issues: Vec<(usize, &str)> = report
        .marker_issues
        .iter()
        .map(|issue| (issue.paragraph, issue.marker.as_str()))
        .collect();
    assert_eq!(
        issues,
        vec![(0, "^sec9{x}^"), (1, "^fig{}^"), (2, "`fig{a and more")]
    );
    assert!(report.marker_issues[1].reason.contains("empty identifier"));
    assert_eq!(
        texts(&paragraphs),
        vec!["^sec9{x}^ costs 2^3", "^fig{}^", "see `fig{a and more"]
    );
}

#[test]
fn caret_in_prose_does_not_hide_a_declaration() {
    let mut paragraphs = document(&[&["x^2 ^sec1{a}^"], &["`sec1{a}"]]);
    let mut driver = driver();

    driver.run(&mut paragraphs).unwrap();

    assert_eq!(texts(&paragraphs), vec!["x^2 ", "1"]);
}

#[test]
fn code_backtick_does_not_hide_a_reference() {
    let mut paragraphs = document(&[&["^fig{a}^"], &["Run `make` then see `fig{a}."]]);
    let mut driver = driver();

    let report = driver.run(&mut paragraphs).unwrap();

    assert_eq!(texts(&paragraphs)[1], "Run `make` then see 1.");
    assert!(report.orphans.is_empty());
    assert!(report.marker_issues.is_empty());
}

#[test]
fn superscript_brace_does_not_hide_a_declaration() {
    let mut paragraphs = document(&[&["Let x^{2} be ^sec1{a}^ small"], &["`sec1{a}"]]);
    let mut driver = driver();

    let report = driver.run(&mut paragraphs).unwrap();

    assert_eq!(texts(&paragraphs), vec!["Let x^{2} be  small", "1"]);
    assert!(report.orphans.is_empty());
    assert!(report.reference_failures.is_empty());
}

#[test]
fn ordinal_past_the_roman_range_fails_only_its_references() {
    let mut paragraphs: Vec<Paragraph> = (1..=21)
        .map(|number| Paragraph::from_texts(&[format!("^fig{{f{number}}}^")]))
        .collect();
    paragraphs.push(Paragraph::from_texts(&["`fig{f21} and `fig{f1}"]));
    let styles = DefaultStyles {
        figure: NumberStyle::Roman,
        ..DefaultStyles::default()
    };
    let mut driver = driver_with(styles, DriverOptions::default());

    let report = driver.run(&mut paragraphs).unwrap();

    assert_eq!(texts(&paragraphs)[21], "`fig{f21} and I");
    let figures = report
        .catalogs
        .iter()
        .find(|catalog| catalog.name == "Figure")
        .unwrap();
    assert_eq!(figures.entries.len(), 21);
    assert_eq!(figures.entries[20].display, None);
    assert_eq!(
        report.reference_failures,
        vec![ReferenceFailure {
            paragraph: 21,
            catalog: "Figure".to_string(),
            identifier: "f21".to_string(),
            reason: EngineError::FormatRange {
                ordinal: 21,
                style: NumberStyle::Roman,
            }
            .to_string(),
        }]
    );
}
