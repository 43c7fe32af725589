use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use tracing::info;

use latexref::engine::ResolutionDriver;

use crate::cli::ResolveArgs;
use crate::commands::catalogs::{build_graph, driver_options};
use crate::commands::docx::{DocumentBody, DocxPackage};
use crate::model::{DocumentFingerprint, ResolveRunManifest, ResolveSettings};
use crate::util::{
    ensure_directory, now_utc_string, same_file, sha256_file, sibling_with_suffix,
    write_json_pretty,
};

pub fn run(args: ResolveArgs) -> Result<()> {
    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| sibling_with_suffix(&args.input, "resolved"));
    if same_file(&args.input, &output_path) {
        bail!(
            "output path {} would overwrite the input document",
            output_path.display()
        );
    }

    let input_sha256 = sha256_file(&args.input)?;
    let mut package = DocxPackage::open(&args.input)?;
    let mut body = DocumentBody::parse(package.document_xml()?)?;
    let mut paragraphs = body.paragraphs();
    info!(
        path = %args.input.display(),
        paragraphs = body.paragraph_count(),
        "loaded document"
    );

    let graph = build_graph(&args.catalogs)?;
    let options = driver_options(&args.catalogs);
    let mut driver =
        ResolutionDriver::new(graph, options.clone()).context("invalid marker settings")?;

    let build = driver.run_build_pass(&mut paragraphs)?;
    let replace = driver.run_replace_pass(&mut paragraphs)?;
    let report = driver.run_report_pass()?;

    let changed_runs = body.apply(&paragraphs)?;
    package.replace_document_xml(body.into_xml())?;
    package.save(&output_path)?;
    info!(
        path = %output_path.display(),
        declarations = build.applied,
        references = replace.applied,
        unresolved = report.reference_failures.len(),
        orphans = report.orphans.len(),
        changed_runs,
        "wrote resolved document"
    );

    let pdf_path = match &args.pdf_dir {
        Some(pdf_dir) => Some(export_pdf(&args.pdf_converter, &output_path, pdf_dir)?),
        None => None,
    };

    if let Some(report_path) = &args.report_path {
        let manifest = ResolveRunManifest {
            manifest_version: 1,
            generated_at: now_utc_string(),
            input: DocumentFingerprint {
                path: args.input.display().to_string(),
                sha256: input_sha256,
            },
            output_path: output_path.display().to_string(),
            pdf_path: pdf_path.map(|path| path.display().to_string()),
            settings: ResolveSettings {
                max_absorb: options.max_absorb,
                reference_prefix: options.reference_prefix,
                match_mode: options.match_mode,
            },
            build,
            replace,
            changed_runs,
            report,
        };
        write_json_pretty(report_path, &manifest)?;
        info!(path = %report_path.display(), "wrote run manifest");
    }

    Ok(())
}

/// Converts `document` with an office suite in headless mode and returns the PDF path.
fn export_pdf(converter: &str, document: &Path, pdf_dir: &Path) -> Result<PathBuf> {
    ensure_directory(pdf_dir)?;

    let output = Command::new(converter)
        .arg("--headless")
        .arg("--convert-to")
        .arg("pdf")
        .arg("--outdir")
        .arg(pdf_dir)
        .arg(document)
        .output()
        .with_context(|| format!("failed to execute {converter} for {}", document.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "{converter} returned non-zero exit status for {}: {}",
            document.display(),
            stderr.trim()
        );
    }

    let pdf_path = pdf_path_for(document, pdf_dir);
    if !pdf_path.exists() {
        bail!(
            "{converter} reported success but {} was not created",
            pdf_path.display()
        );
    }

    info!(path = %pdf_path.display(), "exported pdf");
    Ok(pdf_path)
}

fn pdf_path_for(document: &Path, pdf_dir: &Path) -> PathBuf {
    let stem = document
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    pdf_dir.join(format!("{stem}.pdf"))
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
        r#"<w:p><w:r><w:t>^fig{arch}^Architecture</w:t></w:r></w:p>"#,
        r#"<w:p><w:r><w:t>As `fig{</w:t></w:r><w:r><w:t>arch} shows, see `tbl{missing}.</w:t></w:r></w:p>"#,
        r#"</w:body></w:document>"#
    );

    #[test]
    fn resolves_a_document_and_writes_the_manifest() {
        let dir = std::env::temp_dir().join(format!("latexref-resolve-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let input = dir.join("paper.docx");
        let report = dir.join("report.json");
        fs::write(&input, docx_bytes(BODY)).unwrap();

        let input_arg = input.display().to_string();
        let report_arg = report.display().to_string();
        let cli = Cli::try_parse_from([
            "latexref",
            "resolve",
            input_arg.as_str(),
            "--report-path",
            report_arg.as_str(),
        ])
        .unwrap();
        let Commands::Resolve(args) = cli.command else {
            panic!("expected resolve command");
        };
        run(args).unwrap();

        let output = DocxPackage::open(&dir.join("paper.resolved.docx")).unwrap();
        let body = DocumentBody::parse(output.document_xml().unwrap()).unwrap();
        let texts: Vec<String> = body.paragraphs().iter().map(|p| p.text()).collect();
        assert_eq!(
            texts,
            vec![
                "Introduction",
                "Architecture",
                "As 1 shows, see `tbl{missing}.",
            ]
        );

        let manifest: serde_json::Value =
            serde_json::from_slice(&fs::read(&report).unwrap()).unwrap();
        assert_eq!(manifest["replace"]["applied"], 1);
        assert_eq!(manifest["reference_failures"][0]["identifier"], "missing");
        assert_eq!(manifest["orphans"][0]["identifier"], "intro");
        assert_eq!(manifest["input"]["sha256"].as_str().unwrap().len(), 64);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn pdf_is_named_after_the_resolved_document() {
        assert_eq!(
            pdf_path_for(Path::new("out/thesis.resolved.docx"), Path::new("pdf")),
            PathBuf::from("pdf/thesis.resolved.pdf")
        );
    }
}
