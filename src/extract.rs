//! Source formats and paragraph chunking.
//!
//! Each format yields raw text; [`split_paragraphs`] then cuts it on runs of
//! two or more line breaks.

use crate::error::{Result, StoreError};
use regex::Regex;
use scraper::{ElementRef, Html, Node};
use std::fs;
use std::io::Read;
use std::panic;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Pdf,
    Word,
    Html,
}

impl DocumentFormat {
    /// Picks the format from the file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "txt" => Ok(Self::PlainText),
            "pdf" => Ok(Self::Pdf),
            "doc" | "docx" => Ok(Self::Word),
            "html" | "htm" => Ok(Self::Html),
            _ => Err(StoreError::UnsupportedFormat(if ext.is_empty() {
                path.display().to_string()
            } else {
                format!(".{ext}")
            })),
        }
    }
}

/// Reads `path` and returns its text split into raw (unsanitized) paragraphs.
pub fn extract_paragraphs(path: &Path) -> Result<Vec<String>> {
    let format = DocumentFormat::from_path(path)?;
    let text = extract_text(path, format)?;
    let paragraphs: Vec<String> = split_paragraphs(&text).into_iter().map(str::to_string).collect();
    debug!(path = %path.display(), ?format, paragraphs = paragraphs.len(), "extracted");
    Ok(paragraphs)
}

pub fn extract_text(path: &Path, format: DocumentFormat) -> Result<String> {
    match format {
        DocumentFormat::PlainText => read_plain_text(path),
        DocumentFormat::Pdf => read_pdf(path),
        DocumentFormat::Word => read_word(path),
        DocumentFormat::Html => read_plain_text(path).map(|html| html_visible_text(&html)),
    }
}

/// Splits on two or more consecutive line breaks (`\n` or `\r\n`).
pub fn split_paragraphs(text: &str) -> Vec<&str> {
    static BREAKS: OnceLock<Regex> = OnceLock::new();
    let breaks = BREAKS.get_or_init(|| Regex::new(r"(?:\r?\n){2,}").expect("static regex"));
    breaks.split(text).collect()
}

fn extraction_error(path: &Path, reason: impl ToString) -> StoreError {
    StoreError::Extraction {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn read_plain_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

fn read_pdf(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    // pdf-extract panics on some malformed fonts and streams.
    panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&bytes))
        .map_err(|_| extraction_error(path, "PDF parser panicked"))?
        .map_err(|e| extraction_error(path, e))
}

fn read_word(path: &Path) -> Result<String> {
    let file = fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| extraction_error(path, e))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| extraction_error(path, e))?
        .read_to_string(&mut xml)?;
    Ok(docx_xml_to_text(&xml))
}

/// Plain text of a WordprocessingML body: one paragraph per `<w:p>`,
/// paragraphs separated by a blank line.
pub fn docx_xml_to_text(xml: &str) -> String {
    static PARAGRAPH: OnceLock<Regex> = OnceLock::new();
    static RUN: OnceLock<Regex> = OnceLock::new();
    let paragraph = PARAGRAPH
        .get_or_init(|| Regex::new(r"(?s)<w:p[ >].*?</w:p>").expect("static regex"));
    let run = RUN.get_or_init(|| {
        Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:tab/>|<w:br/>").expect("static regex")
    });

    paragraph
        .find_iter(xml)
        .map(|p| {
            run.captures_iter(p.as_str())
                .map(|c| match c.get(1) {
                    Some(text) => decode_xml_entities(text.as_str()),
                    None if c[0].starts_with("<w:tab") => "\t".to_string(),
                    None => "\n".to_string(),
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn decode_xml_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "section", "article", "header", "footer", "li", "ul", "ol", "table", "tr",
    "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre", "br", "title", "main", "nav",
];

/// Text a browser would render for `html`. Each block element ends with a
/// blank line so it becomes its own paragraph; scripts and styles are dropped.
pub fn html_visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();
    collect_text(document.root_element(), &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if SKIPPED_ELEMENTS.contains(&name) {
        return;
    }
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, out);
                }
            }
            _ => {}
        }
    }
    if BLOCK_ELEMENTS.contains(&name) {
        out.push_str("\n\n");
    }
}
