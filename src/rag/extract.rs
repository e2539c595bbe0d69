use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::core::errors::LoadError;

/// Upper bound on the decompressed document.xml we will read out of a
/// DOCX archive.
const MAX_XML_BYTES: u64 = 50 * 1024 * 1024;

/// Extract plain text from an uploaded file body. The caller has already
/// matched `extension` against the supported set.
pub fn extract_text(extension: &str, bytes: &[u8]) -> Result<String, LoadError> {
    match extension {
        "pdf" => extract_pdf(bytes),
        "docx" | "doc" => extract_docx(bytes),
        "txt" => Ok(String::from_utf8_lossy(bytes).into_owned()),
        other => Err(LoadError::UnsupportedType(other.to_string())),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, LoadError> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| LoadError::ExtractionFailed(format!("pdf: {}", e)))
}

/// DOCX is a zip archive; the text lives in `word/document.xml` as
/// `<w:t>` runs grouped into `<w:p>` paragraphs.
fn extract_docx(bytes: &[u8]) -> Result<String, LoadError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| LoadError::ExtractionFailed(format!("docx: {}", e)))?;

    let mut xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|e| LoadError::ExtractionFailed(format!("docx: {}", e)))?;
        entry
            .take(MAX_XML_BYTES)
            .read_to_end(&mut xml)
            .map_err(|e| LoadError::ExtractionFailed(format!("docx: {}", e)))?;
    }

    document_xml_to_text(&xml)
}

fn document_xml_to_text(xml: &[u8]) -> Result<String, LoadError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut out = String::new();
    let mut in_text_run = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => {
                in_text_run = true;
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => out.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"br" => out.push('\n'),
                b"tab" => out.push(' '),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text_run => {
                let piece = t
                    .unescape()
                    .map_err(|e| LoadError::ExtractionFailed(format!("docx xml: {}", e)))?;
                out.push_str(&piece);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(LoadError::ExtractionFailed(format!("docx xml: {}", e)));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

/// Trim line edges and collapse blank-line runs, keeping paragraph breaks
/// as a single blank line.
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_blank = false;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push_str(if pending_blank { "\n\n" } else { "\n" });
        }
        out.push_str(line);
        pending_blank = false;
    }

    out
}
