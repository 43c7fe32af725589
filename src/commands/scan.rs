use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::info;

use latexref::engine::{CatalogSummary, ResolutionDriver};

use crate::cli::ScanArgs;
use crate::commands::catalogs::{build_graph, driver_options};
use crate::commands::docx::{DocumentBody, DocxPackage};

pub fn run(args: ScanArgs) -> Result<()> {
    let summaries = scan(&args)?;

    let output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        write_json_summary(output, &summaries)
    } else {
        write_text_summary(output, &summaries)
    }
}

/// BUILD pass over the input only; the document is read, never written.
fn scan(args: &ScanArgs) -> Result<Vec<CatalogSummary>> {
    let package = DocxPackage::open(&args.input)?;
    let body = DocumentBody::parse(package.document_xml()?)?;
    let mut paragraphs = body.paragraphs();

    let graph = build_graph(&args.catalogs)?;
    let mut driver = ResolutionDriver::new(graph, driver_options(&args.catalogs))
        .context("invalid marker settings")?;
    let stats = driver.run_build_pass(&mut paragraphs)?;

    info!(
        path = %args.input.display(),
        paragraphs = stats.paragraphs,
        declarations = stats.applied,
        malformed = stats.failed,
        "scan complete"
    );

    Ok(driver.catalog_summaries())
}

fn write_json_summary(mut output: impl Write, summaries: &[CatalogSummary]) -> Result<()> {
    serde_json::to_writer_pretty(&mut output, summaries)
        .context("failed to serialize scan json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_text_summary(mut output: impl Write, summaries: &[CatalogSummary]) -> Result<()> {
    for summary in summaries {
        writeln!(
            output,
            "{} (label={} tag={} style={}): {} entries",
            summary.name,
            summary.label,
            summary.tag,
            summary.style,
            summary.entries.len()
        )?;
        for entry in &summary.entries {
            writeln!(
                output,
                "\t{}\t{}",
                entry.display.as_deref().unwrap_or("(out of range)"),
                entry.identifier
            )?;
        }
    }

    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use clap::Parser;

    use super::*;
    use crate::cli::{Cli, Commands};
    use crate::commands::docx::docx_bytes;

    const BODY: &str = concat!(
        r#"<w:document><w:body>"#,
        r#"<w:p><w:r><w:t>^sec1{intro}^Introduction</w:t></w:r></w:p>"#,
        r#"<w:p><w:r><w:t>^sec2{sco</w:t></w:r><w:r><w:t>pe}^Scope</w:t></w:r></w:p>"#,
        r#"<w:p><w:r><w:t>See `sec2{scope}.</w:t></w:r></w:p>"#,
        r#"</w:body></w:document>"#
    );

    fn scan_args(input: &str, extra: &[&str]) -> ScanArgs {
        let mut argv = vec!["latexref", "scan", input];
        argv.extend_from_slice(extra);
        let Commands::Scan(args) = Cli::try_parse_from(argv).unwrap().command else {
            panic!("expected scan command");
        };
        args
    }

    #[test]
    fn lists_declarations_without_touching_the_input() {
        let dir = std::env::temp_dir().join(format!("latexref-scan-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let input = dir.join("paper.docx");
        let original = docx_bytes(BODY);
        fs::write(&input, &original).unwrap();

        let input_arg = input.display().to_string();
        let summaries = scan(&scan_args(&input_arg, &["--section-style", "roman"])).unwrap();

        let mut text = Vec::new();
        write_text_summary(&mut text, &summaries).unwrap();
        let text = String::from_utf8(text).unwrap();
        assert!(text.contains("Section (label=sec1 tag=sec1 style=roman): 1 entries"));
        assert!(text.contains("\tI\tintro"));
        assert!(text.contains("\tI.1\tscope"));

        assert_eq!(fs::read(&input).unwrap(), original);
        let mut names: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        names.sort();
        assert_eq!(names, vec![std::ffi::OsString::from("paper.docx")]);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn json_summary_lists_every_catalog() {
        let dir = std::env::temp_dir().join(format!("latexref-scan-json-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let input = dir.join("paper.docx");
        fs::write(&input, docx_bytes(BODY)).unwrap();

        let input_arg = input.display().to_string();
        let summaries = scan(&scan_args(&input_arg, &["--json"])).unwrap();

        let mut json = Vec::new();
        write_json_summary(&mut json, &summaries).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        let catalogs = value.as_array().unwrap();
        assert_eq!(catalogs.len(), 7);
        assert_eq!(catalogs[1]["name"], "Subsection");
        assert_eq!(catalogs[1]["entries"][0]["display"], "1.1");
        assert_eq!(catalogs[1]["entries"][0]["referenced"], false);

        fs::remove_dir_all(&dir).unwrap();
    }
}
