// src/reporting/pdf.rs
//! Minimal PDF layout on top of lopdf: flowing text blocks and grid tables
//! on letter pages with the standard Helvetica fonts, a cover page
//! renderer, and page-preserving document merge.

use std::mem;
use std::path::Path;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::debug;

use crate::error::{DossierResult, DossierError};

pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 54.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const CELL_PADDING: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Black,
    White,
    Gray,
    Red,
    Orange,
    Green,
    Blue,
}

impl Color {
    fn rgb(self) -> (f32, f32, f32) {
        match self {
            Color::Black => (0.0, 0.0, 0.0),
            Color::White => (0.96, 0.96, 0.96),
            Color::Gray => (0.5, 0.5, 0.5),
            Color::Red => (0.85, 0.1, 0.1),
            Color::Orange => (1.0, 0.55, 0.0),
            Color::Green => (0.0, 0.55, 0.2),
            Color::Blue => (0.1, 0.3, 0.85),
        }
    }
}

/// A run of text in one color
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub color: Color,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::colored(text, Color::Black)
    }

    pub fn colored(text: impl Into<String>, color: Color) -> Self {
        Self {
            text: text.into(),
            color,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

/// Grid table; the first row is shaded when `header` is set
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub rows: Vec<Vec<Vec<Span>>>,
    pub header: bool,
    pub column_widths: Option<Vec<f32>>,
}

impl Table {
    pub fn new(rows: Vec<Vec<Vec<Span>>>) -> Self {
        Self {
            rows,
            header: false,
            column_widths: None,
        }
    }

    pub fn with_header(mut self) -> Self {
        self.header = true;
        self
    }

    pub fn with_column_widths(mut self, widths: Vec<f32>) -> Self {
        self.column_widths = Some(widths);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Title(String),
    Heading(Vec<Span>),
    Paragraph(Vec<Span>),
    Table(Table),
    Spacer(f32),
    PageBreak,
}

/// Ordered list of blocks rendered top to bottom
#[derive(Debug, Clone, Default)]
pub struct PdfDocument {
    blocks: Vec<Block>,
}

impl PdfDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, block: Block) -> &mut Self {
        self.blocks.push(block);
        self
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn render(&self) -> DossierResult<Document> {
        let mut layout = Layout::new();
        for block in &self.blocks {
            layout.block(block);
        }
        assemble_pages(layout.finish(), Vec::new())
    }

    pub fn save(&self, path: &Path) -> DossierResult<()> {
        let mut document = self.render()?;
        save_document(&mut document, path)
    }
}

type Word = Vec<(String, Color)>;

/// Turns blocks into per-page operation lists
struct Layout {
    pages: Vec<Vec<Operation>>,
    current: Vec<Operation>,
    y: f32,
}

impl Layout {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            current: Vec::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn new_page(&mut self) {
        self.pages.push(mem::take(&mut self.current));
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn ensure_space(&mut self, height: f32) {
        if self.y - height < MARGIN && !self.current.is_empty() {
            self.new_page();
        }
    }

    fn finish(mut self) -> Vec<Vec<Operation>> {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.pages.push(self.current);
        }
        self.pages
    }

    fn block(&mut self, block: &Block) {
        match block {
            Block::Title(text) => {
                let size = 18.0;
                let words = words(&[Span::plain(text.as_str())]);
                for line in wrap(&words, size, Font::Bold, CONTENT_WIDTH) {
                    self.ensure_space(size * 1.3);
                    self.y -= size * 1.3;
                    let x = MARGIN + ((CONTENT_WIDTH - line_width(&line, size, Font::Bold)) / 2.0).max(0.0);
                    self.current.extend(text_line(x, self.y, &line, size, Font::Bold, false));
                }
                self.y -= 12.0;
            }
            Block::Heading(spans) => self.flow(spans, 13.0, Font::Bold, 6.0),
            Block::Paragraph(spans) => self.flow(spans, 10.0, Font::Regular, 4.0),
            Block::Table(table) => self.table(table),
            Block::Spacer(height) => self.y -= height,
            Block::PageBreak => {
                if !self.current.is_empty() {
                    self.new_page();
                }
            }
        }
    }

    fn flow(&mut self, spans: &[Span], size: f32, font: Font, space_after: f32) {
        let leading = size * 1.3;
        for line in wrap(&words(spans), size, font, CONTENT_WIDTH) {
            self.ensure_space(leading);
            self.y -= leading;
            self.current.extend(text_line(MARGIN, self.y, &line, size, font, false));
        }
        self.y -= space_after;
    }

    fn table(&mut self, table: &Table) {
        let columns = table.rows.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return;
        }

        let widths = match &table.column_widths {
            Some(widths) if widths.len() >= columns => widths.clone(),
            _ => vec![CONTENT_WIDTH / columns as f32; columns],
        };
        let size = 9.0;
        let leading = 11.0;

        for (index, row) in table.rows.iter().enumerate() {
            let is_header = table.header && index == 0;
            let font = if is_header { Font::Bold } else { Font::Regular };

            let cells: Vec<Vec<Word>> = (0..columns)
                .map(|c| {
                    let spans = row.get(c).map(Vec::as_slice).unwrap_or(&[]);
                    wrap(&words(spans), size, font, widths[c] - 2.0 * CELL_PADDING)
                })
                .collect();
            let line_count = cells.iter().map(Vec::len).max().unwrap_or(0).max(1);
            let height = line_count as f32 * leading + 2.0 * CELL_PADDING;

            self.ensure_space(height);
            let top = self.y;
            let bottom = top - height;
            let total_width: f32 = widths.iter().take(columns).sum();

            if is_header {
                let (r, g, b) = Color::Gray.rgb();
                self.current.push(op("rg", vec![real(r), real(g), real(b)]));
                self.current.push(op("re", vec![real(MARGIN), real(bottom), real(total_width), real(height)]));
                self.current.push(op("f", vec![]));
            }

            self.current.push(op("RG", vec![real(0.0), real(0.0), real(0.0)]));
            self.current.push(op("w", vec![real(0.5)]));

            let mut x = MARGIN;
            for (c, lines) in cells.iter().enumerate() {
                self.current.push(op("re", vec![real(x), real(bottom), real(widths[c]), real(height)]));
                self.current.push(op("S", vec![]));

                let mut baseline = top - CELL_PADDING - size;
                for line in lines {
                    self.current.extend(text_line(x + CELL_PADDING, baseline, line, size, font, is_header));
                    baseline -= leading;
                }
                x += widths[c];
            }

            self.y = bottom;
        }

        self.y -= 6.0;
    }
}

fn op(operator: &str, operands: Vec<Object>) -> Operation {
    Operation::new(operator, operands)
}

fn real(value: f32) -> Object {
    Object::Real(value)
}

/// Encode for WinAnsi Helvetica; characters outside Latin-1 become `?`
fn pdf_string(text: &str) -> Object {
    let bytes = text
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => b'\'',
            '\u{201c}' | '\u{201d}' => b'"',
            '\u{2013}' | '\u{2014}' => b'-',
            '\u{a0}' => b' ',
            c if (c as u32) < 256 => c as u32 as u8,
            _ => b'?',
        })
        .collect();
    Object::String(bytes, StringFormat::Literal)
}

fn char_width(c: char, font: Font) -> f32 {
    let base = match c {
        'i' | 'l' | 'j' | 't' | 'f' | 'I' | '.' | ',' | ':' | ';' | '!' | '|' | '\'' | ' ' => 0.28,
        'm' | 'w' | 'M' | 'W' => 0.83,
        c if c.is_ascii_uppercase() => 0.67,
        _ => 0.53,
    };
    match font {
        Font::Regular => base,
        Font::Bold => base * 1.07,
    }
}

/// Approximate rendered width of `text`
pub fn text_width(text: &str, size: f32) -> f32 {
    measure(text, size, Font::Bold)
}

fn measure(text: &str, size: f32, font: Font) -> f32 {
    text.chars().map(|c| char_width(c, font)).sum::<f32>() * size
}

fn word_width(word: &Word, size: f32, font: Font) -> f32 {
    word.iter().map(|(fragment, _)| measure(fragment, size, font)).sum()
}

fn line_width(line: &[(String, Color)], size: f32, font: Font) -> f32 {
    measure(&line.iter().map(|(t, _)| t.as_str()).collect::<String>(), size, font)
}

/// Split spans into whitespace-separated words, keeping per-fragment colors
fn words(spans: &[Span]) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current: Word = Vec::new();

    for span in spans {
        let mut fragment = String::new();
        for c in span.text.chars() {
            if c.is_whitespace() {
                if !fragment.is_empty() {
                    current.push((mem::take(&mut fragment), span.color));
                }
                if !current.is_empty() {
                    words.push(mem::take(&mut current));
                }
            } else {
                fragment.push(c);
            }
        }
        if !fragment.is_empty() {
            current.push((fragment, span.color));
        }
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
}

/// Greedy line fill; each returned line is a flat list of colored fragments
/// with single spaces between words
fn wrap(words: &[Word], size: f32, font: Font, max_width: f32) -> Vec<Word> {
    let space = measure(" ", size, font);
    let mut lines = Vec::new();
    let mut line: Word = Vec::new();
    let mut width = 0.0;

    for word in words {
        let w = word_width(word, size, font);
        if !line.is_empty() && width + space + w > max_width {
            lines.push(mem::take(&mut line));
            width = 0.0;
        }
        if !line.is_empty() {
            line.push((" ".to_string(), word[0].1));
            width += space;
        }
        line.extend(word.iter().cloned());
        width += w;
    }
    if !line.is_empty() {
        lines.push(line);
    }

    lines
}

fn text_line(x: f32, y: f32, line: &[(String, Color)], size: f32, font: Font, on_shade: bool) -> Vec<Operation> {
    let mut operations = vec![
        op("BT", vec![]),
        op("Tf", vec![font.resource().into(), real(size)]),
        op("Td", vec![real(x), real(y)]),
    ];

    for (fragment, color) in line {
        let color = match (on_shade, color) {
            (true, Color::Black) => Color::White,
            (_, color) => *color,
        };
        let (r, g, b) = color.rgb();
        operations.push(op("rg", vec![real(r), real(g), real(b)]));
        operations.push(op("Tj", vec![pdf_string(fragment)]));
    }

    operations.push(op("ET", vec![]));
    operations
}

/// Build a document whose pages share one resource dictionary
fn assemble_pages(pages: Vec<Vec<Operation>>, xobjects: Vec<(&str, Stream)>) -> DossierResult<Document> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
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
    if !xobjects.is_empty() {
        let mut xobject_dict = Dictionary::new();
        for (name, stream) in xobjects {
            let id = doc.add_object(stream);
            xobject_dict.set(name, id);
        }
        resources.set("XObject", xobject_dict);
    }
    let resources_id = doc.add_object(resources);

    let mut kids: Vec<Object> = Vec::new();
    for operations in pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(pages_id, Object::Dictionary(dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![real(0.0), real(0.0), real(PAGE_WIDTH), real(PAGE_HEIGHT)],
    }));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    Ok(doc)
}

/// Width, height and component count from a baseline or progressive JPEG
fn jpeg_info(data: &[u8]) -> Option<(u16, u16, u8)> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return None;
    }

    let mut i = 2;
    while i + 9 < data.len() {
        if data[i] != 0xFF {
            return None;
        }
        let marker = data[i + 1];
        if marker == 0xFF {
            i += 1;
            continue;
        }
        let length = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        if matches!(marker, 0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF) {
            let height = u16::from_be_bytes([data[i + 5], data[i + 6]]);
            let width = u16::from_be_bytes([data[i + 7], data[i + 8]]);
            return Some((width, height, data[i + 9]));
        }
        i += 2 + length;
    }

    None
}

fn jpeg_xobject(data: &[u8]) -> DossierResult<Stream> {
    let (width, height, components) = jpeg_info(data)
        .ok_or_else(|| DossierError::PdfError("Cover image is not a JPEG file".to_string()))?;

    let color_space = match components {
        1 => "DeviceGray",
        4 => "DeviceCMYK",
        _ => "DeviceRGB",
    };

    let mut stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        data.to_vec(),
    );
    // Already DCT encoded
    stream.allows_compression = false;

    Ok(stream)
}

/// Single page with an optional full-bleed JPEG and a centered bold title
pub fn cover_page(title: &str, background_jpeg: Option<&[u8]>) -> DossierResult<Document> {
    let mut operations = Vec::new();
    let mut xobjects = Vec::new();

    if let Some(jpeg) = background_jpeg {
        xobjects.push(("Im1", jpeg_xobject(jpeg)?));
        operations.extend([
            op("q", vec![]),
            op("cm", vec![real(PAGE_WIDTH), real(0.0), real(0.0), real(PAGE_HEIGHT), real(0.0), real(0.0)]),
            op("Do", vec!["Im1".into()]),
            op("Q", vec![]),
        ]);
    }

    let size = 20.0;
    let x = ((PAGE_WIDTH - text_width(title, size)) / 2.0).max(0.0);
    let y = PAGE_HEIGHT - 255.0;
    operations.extend(text_line(x, y, &[(title.to_string(), Color::Black)], size, Font::Bold, false));

    assemble_pages(vec![operations], xobjects)
}

/// Look up an inheritable page attribute through the `Parent` chain
fn inherited_attribute(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

    for _ in 0..32 {
        let id = parent?;
        let node = doc.get_dictionary(id).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    None
}

/// Copy inherited attributes onto each page so pages survive re-parenting
fn flatten_inherited(doc: &mut Document) {
    const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];
    let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();

    for page_id in page_ids {
        let missing: Vec<(&[u8], Object)> = match doc.get_dictionary(page_id) {
            Ok(page) => INHERITABLE
                .iter()
                .filter(|key| page.get(key).is_err())
                .filter_map(|key| inherited_attribute(doc, page, key).map(|value| (*key, value)))
                .collect(),
            Err(_) => continue,
        };

        if let Ok(page) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
            for (key, value) in missing {
                page.set(key, value);
            }
        }
    }
}

fn type_name(object: &Object) -> Option<&str> {
    object
        .as_dict()
        .ok()
        .and_then(|dict| dict.get(b"Type").ok())
        .and_then(|name| name.as_name_str().ok())
}

/// Concatenate the pages of `documents` in order into a new document
pub fn merge_documents(documents: Vec<Document>) -> DossierResult<Document> {
    let mut merged = Document::with_version("1.5");
    let mut max_id = 1;
    let mut pages: Vec<(ObjectId, Dictionary)> = Vec::new();

    for mut doc in documents {
        flatten_inherited(&mut doc);
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        for page_id in doc.get_pages().into_values() {
            pages.push((page_id, doc.get_dictionary(page_id)?.clone()));
        }

        for (id, object) in doc.objects {
            match type_name(&object) {
                Some("Catalog" | "Pages" | "Page" | "Outlines" | "Outline" | "ObjStm" | "XRef") => {}
                _ => {
                    merged.objects.insert(id, object);
                }
            }
        }
    }

    let pages_id = (max_id, 0);
    let catalog_id = (max_id + 1, 0);

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for (page_id, mut page) in pages {
        page.set("Parent", pages_id);
        merged.objects.insert(page_id, Object::Dictionary(page));
        kids.push(page_id.into());
    }

    debug!("Merged document has {} pages", kids.len());

    let count = kids.len() as i64;
    merged.objects.insert(pages_id, Object::Dictionary(dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
    }));
    merged.objects.insert(catalog_id, Object::Dictionary(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    }));
    merged.trailer.set("Root", catalog_id);
    merged.max_id = max_id + 1;
    merged.compress();

    Ok(merged)
}

pub fn load_document(path: &Path) -> DossierResult<Document> {
    Document::load(path)
        .map_err(|e| DossierError::file(path, format!("Failed to load PDF: {}", e)))
}

/// Write `document` to `path`, replacing any existing file
pub fn save_document(document: &mut Document, path: &Path) -> DossierResult<()> {
    document
        .save(path)
        .map(|_| ())
        .map_err(|e| DossierError::file(path, format!("Failed to write PDF: {}", e)))
}

pub fn page_count(path: &Path) -> DossierResult<usize> {
    Ok(load_document(path)?.get_pages().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reload(mut document: Document) -> Document {
        let mut buffer = Vec::new();
        document.save_to(&mut buffer).unwrap();
        Document::load_mem(&buffer).unwrap()
    }

    fn sample_jpeg_header() -> Vec<u8> {
        vec![
            0xFF, 0xD8, // SOI
            0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00, // APP0 with two payload bytes
            0xFF, 0xC0, 0x00, 0x0B, 0x08, 0x00, 0x10, 0x00, 0x20, 0x03, 0x01, 0x11, 0x00,
            0xFF, 0xD9,
        ]
    }

    #[test]
    fn test_page_break_starts_new_page() {
        let mut doc = PdfDocument::new();
        doc.push(Block::Title("Report".to_string()))
            .push(Block::Paragraph(vec![Span::plain("first page")]))
            .push(Block::PageBreak)
            .push(Block::Paragraph(vec![Span::plain("second page")]));

        let rendered = reload(doc.render().unwrap());
        assert_eq!(rendered.get_pages().len(), 2);
    }

    #[test]
    fn test_empty_document_still_has_one_page() {
        let rendered = reload(PdfDocument::new().render().unwrap());
        assert_eq!(rendered.get_pages().len(), 1);
    }

    #[test]
    fn test_long_table_flows_onto_following_pages() {
        let rows = (0..120)
            .map(|i| vec![vec![Span::plain(format!("row {}", i))], vec![Span::colored("High", Color::Red)]])
            .collect();
        let mut doc = PdfDocument::new();
        doc.push(Block::Table(Table::new(rows).with_header()));

        let rendered = reload(doc.render().unwrap());
        assert!(rendered.get_pages().len() > 1);
    }

    #[test]
    fn test_wrap_keeps_adjacent_fragments_in_one_word() {
        let spans = vec![Span::plain("risk ("), Span::colored("High", Color::Red), Span::plain(") found")];
        let words = words(&spans);

        assert_eq!(words.len(), 3);
        assert_eq!(words[1], vec![
            ("(".to_string(), Color::Black),
            ("High".to_string(), Color::Red),
            (")".to_string(), Color::Black),
        ]);

        let lines = wrap(&words, 10.0, Font::Regular, 30.0);
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_jpeg_info_reads_frame_header() {
        assert_eq!(jpeg_info(&sample_jpeg_header()), Some((32, 16, 3)));
        assert_eq!(jpeg_info(b"not a jpeg"), None);
    }

    #[test]
    fn test_cover_page_with_and_without_background() {
        let plain = reload(cover_page("Security Evaluation of: example.com", None).unwrap());
        assert_eq!(plain.get_pages().len(), 1);

        let with_image = reload(cover_page("Security Evaluation of: example.com", Some(&sample_jpeg_header())).unwrap());
        assert_eq!(with_image.get_pages().len(), 1);

        assert!(cover_page("x", Some(b"GIF89a")).is_err());
    }

    #[test]
    fn test_merge_preserves_page_order_and_count() {
        let mut two_pages = PdfDocument::new();
        two_pages.push(Block::Paragraph(vec![Span::plain("a")]))
            .push(Block::PageBreak)
            .push(Block::Paragraph(vec![Span::plain("b")]));

        let documents = vec![
            cover_page("cover", None).unwrap(),
            two_pages.render().unwrap(),
            cover_page("tail", None).unwrap(),
        ];

        let merged = reload(merge_documents(documents).unwrap());
        let pages = merged.get_pages();
        assert_eq!(pages.len(), 4);

        // Every page still resolves its fonts after re-parenting
        for page_id in pages.values() {
            let page = merged.get_dictionary(*page_id).unwrap();
            assert!(page.get(b"Resources").is_ok());
            assert!(page.get(b"MediaBox").is_ok());
        }
    }
}
