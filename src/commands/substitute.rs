use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use latexref::engine::{Paragraph, Run};

use crate::cli::SubstituteArgs;
use crate::commands::docx::{DocumentBody, DocxPackage};
use crate::model::{DocumentFingerprint, SubstituteRunManifest, SubstitutionCount};
use crate::util::{now_utc_string, same_file, sha256_file, sibling_with_suffix, write_json_pretty};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionRule {
    pub source: String,
    pub replacement: String,
}

pub fn run(args: SubstituteArgs) -> Result<()> {
    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| sibling_with_suffix(&args.input, "substituted"));
    if same_file(&args.input, &output_path) {
        bail!(
            "output path {} would overwrite the input document",
            output_path.display()
        );
    }

    let rules = load_rules(&args.map)?;
    let input_sha256 = sha256_file(&args.input)?;
    let mut package = DocxPackage::open(&args.input)?;
    let mut body = DocumentBody::parse(package.document_xml()?)?;
    let mut paragraphs = body.paragraphs();

    let mut counts = vec![0_usize; rules.len()];
    for (paragraph_index, paragraph) in paragraphs.iter_mut().enumerate() {
        for (rule, count) in rules.iter().zip(counts.iter_mut()) {
            let replaced = replace_in_paragraph(paragraph, rule);
            if replaced > 0 {
                debug!(
                    paragraph = paragraph_index,
                    source = %rule.source,
                    occurrences = replaced,
                    "substituted text"
                );
            }
            *count += replaced;
        }
    }

    for (rule, count) in rules.iter().zip(&counts) {
        if *count == 0 {
            warn!(source = %rule.source, "substitution source not found in document");
        }
    }

    let changed_runs = body.apply(&paragraphs)?;
    package.replace_document_xml(body.into_xml())?;
    package.save(&output_path)?;

    let total_replacements: usize = counts.iter().sum();
    info!(
        path = %output_path.display(),
        rules = rules.len(),
        replacements = total_replacements,
        changed_runs,
        "wrote substituted document"
    );

    if let Some(report_path) = &args.report_path {
        let manifest = SubstituteRunManifest {
            manifest_version: 1,
            generated_at: now_utc_string(),
            input: DocumentFingerprint {
                path: args.input.display().to_string(),
                sha256: input_sha256,
            },
            output_path: output_path.display().to_string(),
            map_path: args.map.display().to_string(),
            total_replacements,
            changed_runs,
            rules: rules
                .into_iter()
                .zip(counts)
                .map(|(rule, occurrences)| SubstitutionCount {
                    source: rule.source,
                    replacement: rule.replacement,
                    occurrences,
                })
                .collect(),
        };
        write_json_pretty(report_path, &manifest)?;
        info!(path = %report_path.display(), "wrote run manifest");
    }

    Ok(())
}

pub fn load_rules(path: &Path) -> Result<Vec<SubstitutionRule>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_rules(&content).with_context(|| format!("failed to parse {}", path.display()))
}

/// Rows are `source,replacement`; blank rows are skipped.
pub fn parse_rules(content: &str) -> Result<Vec<SubstitutionRule>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(content.as_bytes());

    let mut rules = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("invalid csv row {}", index + 1))?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }

        let (Some(source), Some(replacement)) = (record.get(0), record.get(1)) else {
            bail!("row {} needs a source and a replacement column", index + 1);
        };
        if source.is_empty() {
            bail!("row {} has an empty source", index + 1);
        }

        rules.push(SubstitutionRule {
            source: source.to_string(),
            replacement: replacement.to_string(),
        });
    }

    Ok(rules)
}

/// Replaces every case-insensitive occurrence of the rule's source in the paragraph text the
/// runs form together. The replacement lands in the run where a match starts; the rest of the
/// match is cut from the runs it covers. Returns the number of replacements.
fn replace_in_runs(runs: &mut [Run], rule: &SubstitutionRule) -> usize {
    let needle: Vec<char> = rule.source.chars().collect();
    if needle.is_empty() {
        return 0;
    }

    let mut replaced = 0;
    let mut from = 0;
    loop {
        let positions = char_positions(runs);
        let Some(start) = find_from(&positions, &needle, from) else {
            break;
        };
        let end = start + needle.len();

        for &(run, offset, ch) in positions[start..end].iter().rev() {
            runs[run]
                .text
                .replace_range(offset..offset + ch.len_utf8(), "");
        }
        let (run, offset, _) = positions[start];
        runs[run].text.insert_str(offset, &rule.replacement);

        from = start + rule.replacement.chars().count();
        replaced += 1;
    }

    replaced
}

pub fn replace_in_paragraph(paragraph: &mut Paragraph, rule: &SubstitutionRule) -> usize {
    replace_in_runs(&mut paragraph.runs, rule)
}

// (run index, byte offset in that run, char) for every char of the concatenated text.
fn char_positions(runs: &[Run]) -> Vec<(usize, usize, char)> {
    runs.iter()
        .enumerate()
        .flat_map(|(run, text)| {
            text.text
                .char_indices()
                .map(move |(offset, ch)| (run, offset, ch))
        })
        .collect()
}

fn find_from(positions: &[(usize, usize, char)], needle: &[char], from: usize) -> Option<usize> {
    if positions.len() < needle.len() {
        return None;
    }
    (from..=positions.len() - needle.len()).find(|&start| {
        positions[start..start + needle.len()]
            .iter()
            .zip(needle)
            .all(|(&(_, _, ch), &wanted)| chars_match(ch, wanted))
    })
}

fn chars_match(left: char, right: char) -> bool {
    left == right || left.to_lowercase().eq(right.to_lowercase())
}
