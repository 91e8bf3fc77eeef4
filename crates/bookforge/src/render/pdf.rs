//! In-memory PDF rendering with `lopdf`.
//!
//! Builds the document's object graph page by page and serializes it
//! once at the end. Text uses the built-in Helvetica fonts with
//! WinAnsi encoding; line metrics are approximated from the average
//! glyph width, which is plenty for book prose.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::error::RenderError;

use super::{BookContent, RenderImage};

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 72.0;

const TITLE_SIZE: f32 = 28.0;
const SUBTITLE_SIZE: f32 = 16.0;
const HEADING_SIZE: f32 = 18.0;
const SUBHEADING_SIZE: f32 = 13.0;
const BODY_SIZE: f32 = 11.0;
const BODY_LEADING: f32 = 15.0;

const JPEG_QUALITY: u8 = 80;

// Helvetica glyphs average roughly half an em.
const GLYPH_WIDTH_FACTOR: f32 = 0.5;

/// Renders a book as a PDF and returns the serialized bytes.
pub(crate) fn render_pdf(content: &BookContent) -> Result<Vec<u8>, RenderError> {
    let mut builder = PdfBuilder::new();
    let images = builder.embed_images(&content.images)?;
    builder.install_resources(&images);
    builder.title_page(content)?;
    for chapter in &content.chapters {
        builder.chapter(&chapter.title, &chapter.content)?;
    }
    for image in &images {
        builder.image_page(image)?;
    }
    builder.finish()
}

struct EmbeddedImage {
    name: String,
    id: ObjectId,
    width: u32,
    height: u32,
}

struct PdfBuilder {
    document: Document,
    pages_id: ObjectId,
    resources_id: ObjectId,
    page_ids: Vec<ObjectId>,
    operations: Vec<Operation>,
    cursor_y: f32,
}

impl PdfBuilder {
    fn new() -> Self {
        let mut document = Document::with_version("1.7");
        let pages_id = document.new_object_id();
        let resources_id = document.new_object_id();
        Self {
            document,
            pages_id,
            resources_id,
            page_ids: Vec::new(),
            operations: Vec::new(),
            cursor_y: PAGE_HEIGHT - MARGIN,
        }
    }

    /// Re-encodes each image as JPEG and registers it as an XObject.
    fn embed_images(&mut self, images: &[RenderImage]) -> Result<Vec<EmbeddedImage>, RenderError> {
        let mut embedded = Vec::with_capacity(images.len());
        for (i, img) in images.iter().enumerate() {
            let decoded =
                image::load_from_memory(&img.bytes).map_err(|e| RenderError::Image {
                    name: img.filename.clone(),
                    source: e,
                })?;
            let rgb = decoded.to_rgb8();
            let (width, height) = rgb.dimensions();

            let mut jpeg = Vec::new();
            let mut encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
            encoder
                .encode(rgb.as_raw(), width, height, image::ExtendedColorType::Rgb8)
                .map_err(|e| RenderError::Image {
                    name: img.filename.clone(),
                    source: e,
                })?;

            // The JPEG data is already compressed, so the stream must
            // not be deflated again on save.
            let stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                jpeg,
            )
            .with_compression(false);

            let id = self.document.add_object(stream);
            embedded.push(EmbeddedImage {
                name: format!("Im{}", i + 1),
                id,
                width,
                height,
            });
        }
        Ok(embedded)
    }

    /// Installs the shared resources dictionary all pages point at.
    fn install_resources(&mut self, images: &[EmbeddedImage]) {
        let regular_id = self.document.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let bold_id = self.document.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });

        let mut resources = dictionary! {
            "Font" => dictionary! {
                "F1" => regular_id,
                "F2" => bold_id,
            },
        };
        if !images.is_empty() {
            let mut xobjects = Dictionary::new();
            for image in images {
                xobjects.set(image.name.as_bytes(), image.id);
            }
            resources.set("XObject", xobjects);
        }
        self.document
            .objects
            .insert(self.resources_id, Object::Dictionary(resources));
    }

    fn title_page(&mut self, content: &BookContent) -> Result<(), RenderError> {
        self.cursor_y = PAGE_HEIGHT * 0.62;
        for line in wrap_text(&content.title, max_chars(TITLE_SIZE)) {
            self.draw_centered(&line, "F2", TITLE_SIZE);
            self.advance(TITLE_SIZE * 1.3);
        }
        if let Some(subtitle) = &content.subtitle {
            self.advance(SUBTITLE_SIZE);
            for line in wrap_text(subtitle, max_chars(SUBTITLE_SIZE)) {
                self.draw_centered(&line, "F1", SUBTITLE_SIZE);
                self.advance(SUBTITLE_SIZE * 1.3);
            }
        }
        self.cursor_y = PAGE_HEIGHT * 0.3;
        self.draw_centered(&content.author, "F1", SUBTITLE_SIZE);
        self.flush_page()
    }

    /// Renders one chapter, starting on a fresh page.
    fn chapter(&mut self, title: &str, content: &str) -> Result<(), RenderError> {
        self.break_page()?;
        for line in wrap_text(title, max_chars(HEADING_SIZE)) {
            self.draw_line(&line, "F2", HEADING_SIZE, MARGIN);
            self.advance(HEADING_SIZE * 1.3);
        }
        self.advance(BODY_LEADING);

        let mut paragraph = String::new();
        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                self.flush_paragraph(&mut paragraph)?;
            } else if trimmed.starts_with('#') {
                self.flush_paragraph(&mut paragraph)?;
                self.subheading(trimmed.trim_start_matches('#').trim())?;
            } else {
                if !paragraph.is_empty() {
                    paragraph.push(' ');
                }
                paragraph.push_str(trimmed);
            }
        }
        self.flush_paragraph(&mut paragraph)
    }

    fn flush_paragraph(&mut self, paragraph: &mut String) -> Result<(), RenderError> {
        if paragraph.is_empty() {
            return Ok(());
        }
        for line in wrap_text(paragraph, max_chars(BODY_SIZE)) {
            if self.cursor_y < MARGIN {
                self.break_page()?;
            }
            self.draw_line(&line, "F1", BODY_SIZE, MARGIN);
            self.advance(BODY_LEADING);
        }
        self.advance(BODY_LEADING * 0.5);
        paragraph.clear();
        Ok(())
    }

    fn subheading(&mut self, text: &str) -> Result<(), RenderError> {
        if self.cursor_y < MARGIN + SUBHEADING_SIZE + BODY_LEADING * 2.0 {
            self.break_page()?;
        }
        self.advance(BODY_LEADING * 0.5);
        self.draw_line(text, "F2", SUBHEADING_SIZE, MARGIN);
        self.advance(SUBHEADING_SIZE * 1.4);
        Ok(())
    }

    /// Draws one image scaled to fit the content box on its own page.
    fn image_page(&mut self, image: &EmbeddedImage) -> Result<(), RenderError> {
        self.break_page()?;

        let box_width = PAGE_WIDTH - 2.0 * MARGIN;
        let box_height = PAGE_HEIGHT - 2.0 * MARGIN;
        let scale = (box_width / image.width as f32).min(box_height / image.height as f32);
        let scaled_width = image.width as f32 * scale;
        let scaled_height = image.height as f32 * scale;
        let x = (PAGE_WIDTH - scaled_width) / 2.0;
        let y = (PAGE_HEIGHT - scaled_height) / 2.0;

        self.operations.push(Operation::new("q", vec![]));
        self.operations.push(Operation::new(
            "cm",
            vec![
                scaled_width.into(),
                0.into(),
                0.into(),
                scaled_height.into(),
                x.into(),
                y.into(),
            ],
        ));
        self.operations
            .push(Operation::new("Do", vec![image.name.as_str().into()]));
        self.operations.push(Operation::new("Q", vec![]));

        self.flush_page()
    }

    fn draw_line(&mut self, text: &str, font: &str, size: f32, x: f32) {
        self.operations.push(Operation::new("BT", vec![]));
        self.operations
            .push(Operation::new("Tf", vec![font.into(), size.into()]));
        self.operations
            .push(Operation::new("Td", vec![x.into(), self.cursor_y.into()]));
        self.operations.push(Operation::new(
            "Tj",
            vec![Object::string_literal(win_ansi(text))],
        ));
        self.operations.push(Operation::new("ET", vec![]));
    }

    fn draw_centered(&mut self, text: &str, font: &str, size: f32) {
        let width = text.chars().count() as f32 * size * GLYPH_WIDTH_FACTOR;
        let x = ((PAGE_WIDTH - width) / 2.0).max(MARGIN);
        self.draw_line(text, font, size, x);
    }

    fn advance(&mut self, leading: f32) {
        self.cursor_y -= leading;
    }

    /// Closes the current page if anything was drawn on it.
    fn break_page(&mut self) -> Result<(), RenderError> {
        if !self.operations.is_empty() {
            self.flush_page()?;
        }
        Ok(())
    }

    fn flush_page(&mut self) -> Result<(), RenderError> {
        let operations = std::mem::take(&mut self.operations);
        let content = Content { operations };
        let stream = Stream::new(dictionary! {}, content.encode()?);
        let content_id = self.document.add_object(stream);

        let page_dict = dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            "Contents" => content_id,
            "Resources" => self.resources_id,
        };
        let page_id = self.document.add_object(page_dict);
        self.page_ids.push(page_id);
        self.cursor_y = PAGE_HEIGHT - MARGIN;
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<u8>, RenderError> {
        self.break_page()?;

        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => self.page_ids.iter().map(|id| Object::from(*id)).collect::<Vec<Object>>(),
            "Count" => self.page_ids.len() as i32,
        };
        self.document
            .objects
            .insert(self.pages_id, Object::Dictionary(pages_dict));

        let catalog_id = self
            .document
            .add_object(dictionary! { "Type" => "Catalog", "Pages" => self.pages_id });
        self.document.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        self.document.save_to(&mut buffer)?;
        Ok(buffer)
    }
}

fn max_chars(size: f32) -> usize {
    ((PAGE_WIDTH - 2.0 * MARGIN) / (size * GLYPH_WIDTH_FACTOR)) as usize
}

/// Greedy word wrap by approximate character budget.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if line.is_empty() {
            line.push_str(word);
        } else if line.chars().count() + 1 + word.chars().count() <= max_chars {
            line.push(' ');
            line.push_str(word);
        } else {
            lines.push(std::mem::take(&mut line));
            line.push_str(word);
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Maps text to WinAnsi-safe bytes, downgrading typographic characters.
fn win_ansi(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{2018}' | '\u{2019}' => bytes.push(b'\''),
            '\u{201C}' | '\u{201D}' => bytes.push(b'"'),
            '\u{2013}' | '\u{2014}' => bytes.push(b'-'),
            '\u{2026}' => bytes.extend_from_slice(b"..."),
            _ if (c as u32) < 256 => bytes.push(c as u8),
            _ => bytes.push(b'?'),
        }
    }
    bytes
}
