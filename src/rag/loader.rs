use std::time::Duration;

use anyhow::Context;
use reqwest::Client;

use super::extract;
use crate::core::config::settings::LoaderSettings;
use crate::core::errors::{ConfigError, LoadError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Url,
    Document,
}

/// One successfully loaded input, normalized to plain text. `id` is the
/// URL or filename the chunks will be attributed to.
#[derive(Debug, Clone)]
pub struct Source {
    pub id: String,
    pub text: String,
    pub kind: SourceKind,
}

/// Fetches URLs and extracts uploaded files. Holds no corpus state; every
/// load is independent.
pub struct SourceLoader {
    client: Client,
    ocr_base_url: Option<String>,
}

impl SourceLoader {
    pub fn new(settings: &LoaderSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.web_timeout_secs))
            .user_agent(concat!("research-assistant/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build loader HTTP client")?;

        Ok(Self {
            client,
            ocr_base_url: settings.ocr_base_url.clone(),
        })
    }

    pub async fn load_url(&self, url: &str) -> Result<Source, LoadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LoadError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LoadError::Unreachable(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| LoadError::Unreachable(e.to_string()))?;

        let text = extract::normalize_whitespace(&strip_html_tags(&body));
        if text.is_empty() {
            return Err(LoadError::EmptyContent);
        }

        Ok(Source {
            id: url.to_string(),
            text,
            kind: SourceKind::Url,
        })
    }

    pub async fn load_document(&self, filename: &str, bytes: &[u8]) -> Result<Source, LoadError> {
        let ext = extension_of(filename);
        let raw = match ext.as_str() {
            "pdf" | "docx" | "doc" | "txt" => extract::extract_text(&ext, bytes)?,
            "png" | "jpg" | "jpeg" => match &self.ocr_base_url {
                Some(base) => self.ocr_image(base, bytes).await?,
                None => {
                    return Err(LoadError::UnsupportedType(format!(
                        "{} (no OCR endpoint configured)",
                        ext
                    )))
                }
            },
            "" => return Err(LoadError::UnsupportedType("no file extension".to_string())),
            other => return Err(LoadError::UnsupportedType(other.to_string())),
        };

        let text = extract::normalize_whitespace(&raw);
        if text.is_empty() {
            return Err(LoadError::EmptyContent);
        }

        Ok(Source {
            id: filename.to_string(),
            text,
            kind: SourceKind::Document,
        })
    }

    /// Hand image bytes to the OCR sidecar and take back its `text` field.
    async fn ocr_image(&self, base: &str, bytes: &[u8]) -> Result<String, LoadError> {
        let url = format!("{}/ocr", base.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| LoadError::ExtractionFailed(format!("ocr: {}", e)))?;

        if !response.status().is_success() {
            return Err(LoadError::ExtractionFailed(format!(
                "ocr service returned HTTP {}",
                response.status()
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LoadError::ExtractionFailed(format!("ocr: {}", e)))?;

        Ok(payload["text"].as_str().unwrap_or_default().to_string())
    }
}

/// Reject anything that is not an absolute http(s) URL, before any network
/// activity happens.
pub fn validate_url(url: &str) -> Result<(), ConfigError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme {:?}", parsed.scheme()),
        });
    }

    Ok(())
}

fn extension_of(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Drop HTML tags and the bodies of script/style elements. Closing block
/// tags become line breaks so headings and paragraphs stay separated.
fn strip_html_tags(html: &str) -> String {
    // Tags are ASCII; a per-char lowercase shadow keeps the two vecs the
    // same length, which str::to_lowercase does not guarantee.
    let chars: Vec<char> = html.chars().collect();
    let lower: Vec<char> = chars.iter().map(|c| c.to_ascii_lowercase()).collect();

    let mut out = String::with_capacity(html.len() / 2);
    let mut in_tag = false;
    let mut break_after_tag = false;
    let mut skip_until: Option<&'static str> = None;

    let mut i = 0;
    while i < chars.len() {
        if let Some(end_tag) = skip_until {
            if matches_at(&lower, i, end_tag) {
                i += end_tag.len();
                skip_until = None;
            } else {
                i += 1;
            }
            continue;
        }

        let c = chars[i];
        if c == '<' {
            if matches_at(&lower, i, "<script") {
                skip_until = Some("</script>");
            } else if matches_at(&lower, i, "<style") {
                skip_until = Some("</style>");
            } else {
                in_tag = true;
                break_after_tag = is_block_tag(&lower, i + 1);
            }
            i += 1;
            continue;
        }
        if c == '>' {
            if in_tag && break_after_tag {
                out.push('\n');
            }
            in_tag = false;
            break_after_tag = false;
            i += 1;
            continue;
        }
        if !in_tag {
            out.push(c);
        }
        i += 1;
    }

    out
}

fn matches_at(lower: &[char], i: usize, needle: &str) -> bool {
    let n = needle.len();
    i + n <= lower.len() && lower[i..i + n].iter().collect::<String>() == needle
}

fn is_block_tag(lower: &[char], mut i: usize) -> bool {
    if lower.get(i) == Some(&'/') {
        i += 1;
    }
    let mut name = String::new();
    while let Some(c) = lower.get(i) {
        if c.is_ascii_alphanumeric() {
            name.push(*c);
            i += 1;
        } else {
            break;
        }
    }
    matches!(
        name.as_str(),
        "p" | "div"
            | "br"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "li"
            | "ul"
            | "ol"
            | "tr"
            | "table"
            | "section"
            | "article"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader() -> SourceLoader {
        SourceLoader::new(&LoaderSettings::default()).unwrap()
    }

    #[test]
    fn absolute_http_urls_pass_validation() {
        assert!(validate_url("http://example.com/page").is_ok());
        assert!(validate_url("https://example.com/a?b=c").is_ok());
    }

    #[test]
    fn relative_and_non_http_urls_fail_validation() {
        assert!(validate_url("example.com/page").is_err());
        assert!(validate_url("ftp://example.com/file").is_err());
        assert!(validate_url("not a url at all").is_err());
    }

    #[test]
    fn html_tags_are_stripped() {
        let html = "<html><body><h1>Title</h1><p>Hello <b>world</b>.</p></body></html>";
        let text = extract::normalize_whitespace(&strip_html_tags(html));
        assert_eq!(text, "Title\n\nHello world.");
    }

    #[test]
    fn script_and_style_bodies_are_dropped() {
        let html = concat!(
            "<head><style>body { color: red; }</style>",
            "<script>var x = '<p>not text</p>';</script></head>",
            "<body><p>kept</p></body>"
        );
        let text = extract::normalize_whitespace(&strip_html_tags(html));
        assert_eq!(text, "kept");
    }

    #[test]
    fn inline_tags_do_not_split_words() {
        let html = "<p>un<b>broken</b> word</p>";
        let text = extract::normalize_whitespace(&strip_html_tags(html));
        assert_eq!(text, "unbroken word");
    }

    #[tokio::test]
    async fn txt_upload_loads_without_network() {
        let source = loader()
            .load_document("notes.txt", b"line one\nline two")
            .await
            .unwrap();
        assert_eq!(source.id, "notes.txt");
        assert_eq!(source.kind, SourceKind::Document);
        assert_eq!(source.text, "line one\nline two");
    }

    #[tokio::test]
    async fn unsupported_extension_is_skipped() {
        let err = loader().load_document("data.xyz", b"bytes").await;
        assert!(matches!(err, Err(LoadError::UnsupportedType(_))));
    }

    #[tokio::test]
    async fn missing_extension_is_unsupported() {
        let err = loader().load_document("README", b"bytes").await;
        assert!(matches!(err, Err(LoadError::UnsupportedType(_))));
    }

    #[tokio::test]
    async fn image_without_ocr_endpoint_is_unsupported() {
        let err = loader().load_document("scan.png", b"\x89PNG").await;
        assert!(matches!(err, Err(LoadError::UnsupportedType(_))));
    }

    #[tokio::test]
    async fn whitespace_only_upload_is_empty_content() {
        let err = loader().load_document("blank.txt", b"   \n\t\n  ").await;
        assert!(matches!(err, Err(LoadError::EmptyContent)));
    }

    #[tokio::test]
    async fn case_insensitive_extension_dispatch() {
        let source = loader()
            .load_document("REPORT.TXT", b"upper case name")
            .await
            .unwrap();
        assert_eq!(source.text, "upper case name");
    }
}
