use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use quick_xml::escape::{partial_escape, unescape};
use regex::Regex;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use latexref::engine::{Paragraph, Run};

use crate::util::ensure_directory;

pub const DOCUMENT_PART: &str = "word/document.xml";

/// Every entry of a `.docx` archive in archive order.
#[derive(Debug, Clone, Default)]
pub struct DocxPackage {
    entries: Vec<(String, Vec<u8>)>,
}

impl DocxPackage {
    pub fn open(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("failed to open docx: {}", path.display()))?;
        Self::read_from(file).with_context(|| format!("failed to read docx: {}", path.display()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read_from(Cursor::new(bytes))
    }

    fn read_from<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader).context("not a zip archive")?;
        let mut entries = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .with_context(|| format!("failed to read archive entry {index}"))?;
            let name = entry.name().to_string();
            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .with_context(|| format!("failed to decompress {name}"))?;
            entries.push((name, data));
        }

        Ok(Self { entries })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        for (name, data) in &self.entries {
            let options = if name.starts_with("word/media/") {
                stored
            } else {
                deflated
            };
            writer
                .start_file(name.as_str(), options)
                .with_context(|| format!("failed to start archive entry {name}"))?;
            writer
                .write_all(data)
                .with_context(|| format!("failed to write archive entry {name}"))?;
        }

        let cursor = writer.finish().context("failed to finish docx archive")?;
        Ok(cursor.into_inner())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            ensure_directory(parent)?;
        }
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)
            .with_context(|| format!("failed to write docx: {}", path.display()))
    }

    pub fn document_xml(&self) -> Result<String> {
        let Some((_, data)) = self.entries.iter().find(|(name, _)| name == DOCUMENT_PART) else {
            bail!("archive has no {DOCUMENT_PART}; is this a Word document?");
        };
        String::from_utf8(data.clone()).with_context(|| format!("{DOCUMENT_PART} is not UTF-8"))
    }

    pub fn replace_document_xml(&mut self, xml: String) -> Result<()> {
        let Some((_, data)) = self
            .entries
            .iter_mut()
            .find(|(name, _)| name == DOCUMENT_PART)
        else {
            bail!("archive has no {DOCUMENT_PART}");
        };
        *data = xml.into_bytes();
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct TextSlot {
    element_start: usize,
    element_end: usize,
    paragraph: usize,
    text: String,
}

/// The text elements (`<w:t>`) of a document body, grouped into paragraphs. A slot belongs to
/// the paragraph closed by the next `</w:p>`.
#[derive(Debug, Clone)]
pub struct DocumentBody {
    xml: String,
    slots: Vec<TextSlot>,
    paragraph_count: usize,
}

impl DocumentBody {
    pub fn parse(xml: String) -> Result<Self> {
        let text_pattern =
            Regex::new(r"<w:t(?: [^>]*)?>([^<]*)</w:t>").context("failed to compile w:t regex")?;
        let close_pattern = Regex::new(r"</w:p>").context("failed to compile w:p regex")?;

        let closes: Vec<usize> = close_pattern.find_iter(&xml).map(|m| m.start()).collect();

        let mut slots = Vec::new();
        let mut paragraph_count = 0;
        let mut previous_closes = None;

        for captures in text_pattern.captures_iter(&xml) {
            let (Some(element), Some(content)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let closes_before = closes.partition_point(|&close| close < element.start());
            if previous_closes != Some(closes_before) {
                previous_closes = Some(closes_before);
                paragraph_count += 1;
            }
            let text = unescape(content.as_str()).with_context(|| {
                format!("invalid entity in text element at byte {}", element.start())
            })?;
            slots.push(TextSlot {
                element_start: element.start(),
                element_end: element.end(),
                paragraph: paragraph_count - 1,
                text: text.into_owned(),
            });
        }

        Ok(Self {
            xml,
            slots,
            paragraph_count,
        })
    }

    pub fn paragraph_count(&self) -> usize {
        self.paragraph_count
    }

    pub fn paragraphs(&self) -> Vec<Paragraph> {
        let mut paragraphs = vec![Paragraph::default(); self.paragraph_count];
        for slot in &self.slots {
            paragraphs[slot.paragraph].runs.push(Run::new(slot.text.clone()));
        }
        paragraphs
    }

    /// Writes run text back into the slots it came from and returns how many slots changed.
    pub fn apply(&mut self, paragraphs: &[Paragraph]) -> Result<usize> {
        if paragraphs.len() != self.paragraph_count {
            bail!(
                "expected {} paragraphs, got {}",
                self.paragraph_count,
                paragraphs.len()
            );
        }

        let runs: Vec<&Run> = paragraphs
            .iter()
            .flat_map(|paragraph| paragraph.runs.iter())
            .collect();
        if runs.len() != self.slots.len() {
            bail!(
                "expected {} runs, got {}; runs may not be added or removed",
                self.slots.len(),
                runs.len()
            );
        }

        let mut rendered = String::with_capacity(self.xml.len());
        let mut cursor = 0;
        let mut changed = 0;

        for (slot, run) in self.slots.iter().zip(runs) {
            if slot.text == run.text {
                continue;
            }
            rendered.push_str(&self.xml[cursor..slot.element_start]);
            rendered.push_str(r#"<w:t xml:space="preserve">"#);
            rendered.push_str(&partial_escape(&run.text));
            rendered.push_str("</w:t>");
            cursor = slot.element_end;
            changed += 1;
        }

        if changed == 0 {
            return Ok(0);
        }
        rendered.push_str(&self.xml[cursor..]);

        *self = Self::parse(rendered)?;
        Ok(changed)
    }

    pub fn into_xml(self) -> String {
        self.xml
    }
}

/// Archive holding only the main document part.
#[cfg(test)]
pub(crate) fn docx_bytes(xml: &str) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(DOCUMENT_PART, SimpleFileOptions::default())
        .unwrap();
    writer.write_all(xml.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = concat!(
        r#"<w:document><w:body>"#,
        r#"<w:p><w:r><w:t>Chapter ^sec</w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>1{intro}^</w:t></w:r></w:p>"#,
        r#"<w:p><w:r><w:tab/></w:r></w:p>"#,
        r#"<w:p><w:r><w:t xml:space="preserve">see `sec1{intro} &amp; more</w:t></w:r></w:p>"#,
        r#"</w:body></w:document>"#
    );

    fn package_with(xml: &str) -> DocxPackage {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        writer.start_file("[Content_Types].xml", options).unwrap();
        writer.write_all(b"<Types/>").unwrap();
        writer.start_file(DOCUMENT_PART, options).unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        writer.start_file("word/media/image1.png", options).unwrap();
        writer.write_all(&[0x89, b'P', b'N', b'G']).unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        DocxPackage::from_bytes(&bytes).unwrap()
    }

    fn body_with_text(text: &str) -> String {
        format!("<w:document><w:body><w:p><w:r><w:t>{text}</w:t></w:r></w:p></w:body></w:document>")
    }

    #[test]
    fn groups_text_elements_by_paragraph() {
        let body = DocumentBody::parse(BODY.to_string()).unwrap();
        let paragraphs = body.paragraphs();

        assert_eq!(body.paragraph_count(), 2);
        assert_eq!(paragraphs[0].run_texts(), vec!["Chapter ^sec", "1{intro}^"]);
        assert_eq!(paragraphs[1].run_texts(), vec!["see `sec1{intro} & more"]);
    }

    #[test]
    fn rewrites_only_changed_elements() {
        let mut body = DocumentBody::parse(BODY.to_string()).unwrap();
        let mut paragraphs = body.paragraphs();
        paragraphs[1].runs[0].text = "see 1 & <more>".to_string();

        assert_eq!(body.apply(&paragraphs).unwrap(), 1);
        let xml = body.clone().into_xml();
        assert!(xml.contains(r#"<w:t xml:space="preserve">see 1 &amp; &lt;more&gt;</w:t>"#));
        assert!(xml.contains("<w:t>Chapter ^sec</w:t>"));
        assert!(xml.contains("<w:rPr><w:b/></w:rPr>"));
        assert_eq!(body.paragraphs()[1].run_texts(), vec!["see 1 & <more>"]);
    }

    #[test]
    fn rejects_changed_run_counts() {
        let mut body = DocumentBody::parse(BODY.to_string()).unwrap();
        let mut paragraphs = body.paragraphs();
        paragraphs[0].runs.pop();

        assert!(body.apply(&paragraphs).is_err());
    }

    #[test]
    fn package_round_trip_keeps_entry_order() {
        let mut package = package_with(BODY);
        let xml = package.document_xml().unwrap();
        package
            .replace_document_xml(xml.replace("Chapter", "Part"))
            .unwrap();

        let reopened = DocxPackage::from_bytes(&package.to_bytes().unwrap()).unwrap();
        assert_eq!(
            reopened
                .entries
                .iter()
                .map(|(name, _)| name.as_str())
                .collect::<Vec<_>>(),
            vec!["[Content_Types].xml", DOCUMENT_PART, "word/media/image1.png"]
        );
        assert!(reopened.document_xml().unwrap().contains("<w:t>Part ^sec</w:t>"));
    }

    #[test]
    fn decodes_numeric_entities() {
        let body = DocumentBody::parse(body_with_text("a&#233;b&#x41; &lt;c&gt;")).unwrap();

        assert_eq!(body.paragraphs()[0].text(), "aébA <c>");
    }

    #[test]
    fn rejects_unescaped_ampersands() {
        assert!(DocumentBody::parse(body_with_text("R&D")).is_err());
        assert!(DocumentBody::parse(body_with_text("x &bogus; y")).is_err());
    }
}
