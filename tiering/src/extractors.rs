//! Payload-to-text extractors, chosen by lower-case file extension.
//!
//! | Extractor | Formats |
//! |---|---|
//! | [`PlainTextExtractor`] | txt, md, csv, json, log |
//! | [`HtmlExtractor`] | html, htm, aspx (site pages) |
//! | [`DocxExtractor`] | docx |
//! | [`PdfExtractor`] | pdf |

use errors::ExtractionError;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::Arc;
use tg_core::ContentExtractor;

/// UTF-8 text formats. A leading byte-order mark is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl ContentExtractor for PlainTextExtractor {
    fn formats(&self) -> &[&'static str] {
        &["txt", "md", "csv", "json", "log"]
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        utf8(bytes)
    }
}

fn utf8(bytes: &[u8]) -> Result<String, ExtractionError> {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    String::from_utf8(bytes.to_vec()).map_err(|e| ExtractionError::Encoding {
        reason: e.to_string()
    })
}

/// HTML fragments, including the web-part markup of SharePoint site pages.
/// Block-level elements become line breaks; blank lines are dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlExtractor;

impl ContentExtractor for HtmlExtractor {
    fn formats(&self) -> &[&'static str] {
        &["html", "htm", "aspx"]
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        Ok(html_to_text(&utf8(bytes)?))
    }
}

/// Strips markup, drops `script`/`style` bodies and comments, and decodes
/// character references.
pub fn html_to_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(open) = rest.find('<') {
        text.push_str(&rest[..open]);
        let markup = &rest[open..];

        if let Some(comment) = markup.strip_prefix("<!--") {
            rest = comment.find("-->").map_or("", |end| &comment[end + 3..]);
            continue;
        }
        let Some(close) = markup.find('>') else {
            rest = "";
            break;
        };
        let tag = &markup[1..close];
        rest = &markup[close + 1..];

        let closing = tag.starts_with('/');
        let name = tag_name(tag);
        if !closing && (name == "script" || name == "style") {
            rest = skip_past_closing(rest, &name);
            continue;
        }
        if name == "br" || (closing && BLOCK_ELEMENTS.contains(&name.as_str())) {
            text.push('\n');
        }
    }
    text.push_str(rest);

    decode_entities(&text)
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

const BLOCK_ELEMENTS: [&str; 12] = [
    "p", "div", "li", "tr", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre"
];

fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn skip_past_closing<'a>(rest: &'a str, name: &str) -> &'a str {
    let closing = format!("</{name}");
    let Some(start) = rest.to_ascii_lowercase().find(&closing) else {
        return "";
    };
    let after = &rest[start..];
    after.find('>').map_or("", |end| &after[end + 1..])
}

fn decode_entities(text: &str) -> String {
    let mut decoded = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        decoded.push_str(&rest[..amp]);
        let candidate = &rest[amp + 1..];
        let reference = candidate
            .find(';')
            .filter(|&end| end > 0 && end <= 10)
            .and_then(|end| decode_entity(&candidate[..end]).map(|c| (c, end)));

        match reference {
            Some((c, end)) => {
                decoded.push(c);
                rest = &candidate[end + 1..];
            }
            None => {
                decoded.push('&');
                rest = candidate;
            }
        }
    }
    decoded.push_str(rest);
    decoded
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    if let Some(dec) = name.strip_prefix('#') {
        return dec.parse::<u32>().ok().and_then(char::from_u32);
    }
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => None
    }
}

/// Word documents: the text runs of `word/document.xml`, one line per
/// paragraph.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxExtractor;

impl ContentExtractor for DocxExtractor {
    fn formats(&self) -> &[&'static str] {
        &["docx"]
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let container = |reason: String| ExtractionError::Container {
            format: "docx".to_string(),
            reason
        };

        let mut archive =
            zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| container(e.to_string()))?;
        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .map_err(|e| container(e.to_string()))?
            .read_to_string(&mut xml)
            .map_err(|e| container(e.to_string()))?;

        docx_body_text(&xml)
    }
}

fn docx_body_text(xml: &str) -> Result<String, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_run_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_run_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_run_text = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => text.push('\t'),
                b"br" | b"cr" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_run_text => {
                let run = e.unescape().map_err(|e| ExtractionError::Markup {
                    reason: e.to_string()
                })?;
                text.push_str(&run);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractionError::Markup {
                    reason: format!("at byte {}: {}", reader.buffer_position(), e)
                });
            }
            _ => {}
        }
    }

    Ok(text.trim_end().to_string())
}

/// PDF text layer. Scanned pages without a text layer yield nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl ContentExtractor for PdfExtractor {
    fn formats(&self) -> &[&'static str] {
        &["pdf"]
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        // pdf-extract panics on some malformed inputs.
        let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
            .map_err(|_| ExtractionError::Pdf {
                reason: "parser aborted on malformed input".to_string()
            })?;

        extracted
            .map(|text| text.trim().to_string())
            .map_err(|e| ExtractionError::Pdf {
                reason: e.to_string()
            })
    }
}

/// Content extractors keyed by lower-case format.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<String, Arc<dyn ContentExtractor>>
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in extractor.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PlainTextExtractor));
        registry.register(Arc::new(HtmlExtractor));
        registry.register(Arc::new(DocxExtractor));
        registry.register(Arc::new(PdfExtractor));
        registry
    }

    /// Later registrations replace earlier ones for the same format.
    pub fn register(&mut self, extractor: Arc<dyn ContentExtractor>) {
        for format in extractor.formats() {
            self.extractors
                .insert(format.to_ascii_lowercase(), extractor.clone());
        }
    }

    pub fn get(&self, format: &str) -> Option<&Arc<dyn ContentExtractor>> {
        self.extractors.get(&format.to_ascii_lowercase())
    }

    pub fn supports(&self, format: &str) -> bool {
        self.get(format).is_some()
    }

    pub fn formats(&self) -> Vec<&str> {
        let mut formats: Vec<&str> = self.extractors.keys().map(String::as_str).collect();
        formats.sort_unstable();
        formats
    }
}
