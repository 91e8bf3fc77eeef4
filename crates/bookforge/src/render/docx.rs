//! Minimal OOXML (DOCX) rendering with `quick-xml` and `zip`.
//!
//! The package carries only the parts Word requires: content types,
//! the package relationships and `word/document.xml`. Formatting is
//! applied as direct run properties, so no styles part is needed.

use std::io::{Cursor, Write};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::RenderError;

use super::BookContent;

const WORD_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
</Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#;

/// Run formatting, sizes in half-points per OOXML convention.
#[derive(Clone, Copy)]
struct RunStyle {
    bold: bool,
    size: Option<&'static str>,
    centered: bool,
}

const TITLE_STYLE: RunStyle = RunStyle { bold: true, size: Some("56"), centered: true };
const SUBTITLE_STYLE: RunStyle = RunStyle { bold: false, size: Some("32"), centered: true };
const AUTHOR_STYLE: RunStyle = RunStyle { bold: false, size: Some("28"), centered: true };
const HEADING_STYLE: RunStyle = RunStyle { bold: true, size: Some("32"), centered: false };
const SUBHEADING_STYLE: RunStyle = RunStyle { bold: true, size: Some("26"), centered: false };
const BODY_STYLE: RunStyle = RunStyle { bold: false, size: None, centered: false };

/// Renders a book as a DOCX package and returns the archive bytes.
pub(crate) fn render_docx(content: &BookContent) -> Result<Vec<u8>, RenderError> {
    let document_xml = build_document_xml(content)?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(CONTENT_TYPES.as_bytes())?;
    zip.start_file("_rels/.rels", options)?;
    zip.write_all(PACKAGE_RELS.as_bytes())?;
    zip.start_file("word/document.xml", options)?;
    zip.write_all(&document_xml)?;

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

fn build_document_xml(content: &BookContent) -> Result<Vec<u8>, RenderError> {
    let mut buffer = Vec::new();
    let mut writer = Writer::new(&mut buffer);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    let mut document = BytesStart::new("w:document");
    document.push_attribute(("xmlns:w", WORD_NS));
    writer.write_event(Event::Start(document))?;
    writer.write_event(Event::Start(BytesStart::new("w:body")))?;

    write_paragraph(&mut writer, &content.title, TITLE_STYLE)?;
    if let Some(subtitle) = &content.subtitle {
        write_paragraph(&mut writer, subtitle, SUBTITLE_STYLE)?;
    }
    write_paragraph(&mut writer, &content.author, AUTHOR_STYLE)?;

    for chapter in &content.chapters {
        write_page_break(&mut writer)?;
        write_paragraph(&mut writer, &chapter.title, HEADING_STYLE)?;

        let mut paragraph = String::new();
        for line in chapter.content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                flush_body(&mut writer, &mut paragraph)?;
            } else if trimmed.starts_with('#') {
                flush_body(&mut writer, &mut paragraph)?;
                write_paragraph(
                    &mut writer,
                    trimmed.trim_start_matches('#').trim(),
                    SUBHEADING_STYLE,
                )?;
            } else {
                if !paragraph.is_empty() {
                    paragraph.push(' ');
                }
                paragraph.push_str(trimmed);
            }
        }
        flush_body(&mut writer, &mut paragraph)?;
    }

    writer.write_event(Event::End(BytesEnd::new("w:body")))?;
    writer.write_event(Event::End(BytesEnd::new("w:document")))?;
    drop(writer);
    Ok(buffer)
}

fn flush_body(writer: &mut Writer<&mut Vec<u8>>, paragraph: &mut String) -> std::io::Result<()> {
    if paragraph.is_empty() {
        return Ok(());
    }
    write_paragraph(writer, paragraph, BODY_STYLE)?;
    paragraph.clear();
    Ok(())
}

fn write_paragraph(
    writer: &mut Writer<&mut Vec<u8>>,
    text: &str,
    style: RunStyle,
) -> std::io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new("w:p")))?;
    if style.centered {
        writer.write_event(Event::Start(BytesStart::new("w:pPr")))?;
        let mut jc = BytesStart::new("w:jc");
        jc.push_attribute(("w:val", "center"));
        writer.write_event(Event::Empty(jc))?;
        writer.write_event(Event::End(BytesEnd::new("w:pPr")))?;
    }
    writer.write_event(Event::Start(BytesStart::new("w:r")))?;
    if style.bold || style.size.is_some() {
        writer.write_event(Event::Start(BytesStart::new("w:rPr")))?;
        if style.bold {
            writer.write_event(Event::Empty(BytesStart::new("w:b")))?;
        }
        if let Some(size) = style.size {
            let mut sz = BytesStart::new("w:sz");
            sz.push_attribute(("w:val", size));
            writer.write_event(Event::Empty(sz))?;
        }
        writer.write_event(Event::End(BytesEnd::new("w:rPr")))?;
    }
    let mut t = BytesStart::new("w:t");
    t.push_attribute(("xml:space", "preserve"));
    writer.write_event(Event::Start(t))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new("w:t")))?;
    writer.write_event(Event::End(BytesEnd::new("w:r")))?;
    writer.write_event(Event::End(BytesEnd::new("w:p")))?;
    Ok(())
}

fn write_page_break(writer: &mut Writer<&mut Vec<u8>>) -> std::io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new("w:p")))?;
    writer.write_event(Event::Start(BytesStart::new("w:r")))?;
    let mut br = BytesStart::new("w:br");
    br.push_attribute(("w:type", "page"));
    writer.write_event(Event::Empty(br))?;
    writer.write_event(Event::End(BytesEnd::new("w:r")))?;
    writer.write_event(Event::End(BytesEnd::new("w:p")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::sample_content;
    use std::io::Read;

    fn read_part(archive_bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(archive_bytes)).unwrap();
        let mut part = archive.by_name(name).unwrap();
        let mut text = String::new();
        part.read_to_string(&mut text).unwrap();
        text
    }

    #[test]
    fn test_package_parts_present() {
        let bytes = render_docx(&sample_content()).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        for name in ["[Content_Types].xml", "_rels/.rels", "word/document.xml"] {
            assert!(archive.by_name(name).is_ok(), "missing part {name}");
        }
    }

    #[test]
    fn test_document_carries_book_text() {
        let bytes = render_docx(&sample_content()).unwrap();
        let document = read_part(&bytes, "word/document.xml");

        assert!(document.contains("Async Rust in Practice"));
        assert!(document.contains("Getting Started"));
        assert!(document.contains("cooperatively"));
        assert!(document.contains(r#"<w:br w:type="page"/>"#));
        assert!(document.contains(r#"<w:sz w:val="56"/>"#));
    }

    #[test]
    fn test_markdown_heading_becomes_bold_run() {
        let mut content = sample_content();
        content.chapters[1].content = "## Runtime Setup\n\nPick an executor.".to_string();

        let bytes = render_docx(&content).unwrap();
        let document = read_part(&bytes, "word/document.xml");

        assert!(document.contains("Runtime Setup"));
        assert!(!document.contains("## Runtime Setup"));
        assert!(document.contains("<w:b/>"));
    }

    #[test]
    fn test_text_is_escaped() {
        let mut content = sample_content();
        content.chapters[1].content = "Channels & <locks> are compared.".to_string();

        let bytes = render_docx(&content).unwrap();
        let document = read_part(&bytes, "word/document.xml");

        assert!(document.contains("Channels &amp; &lt;locks&gt; are compared."));
    }
}
