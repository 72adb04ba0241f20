//! HTML → Markdown conversion and on-disk document layout.

use chrono::{DateTime, SecondsFormat, Utc};
use htmd::HtmlToMarkdown;
use regex::Regex;

use crate::error::{KbError, Result};

/// A fetched page converted to Markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converted {
    /// Page title; empty when the page has neither `<title>` nor a heading.
    pub title: String,
    pub markdown: String,
}

/// Convert an HTML page to Markdown and pick its title.
///
/// The title comes from `<title>`, falling back to the first Markdown
/// heading. Script and style content is dropped.
pub fn convert_html(html: &str) -> Result<Converted> {
    let converter = HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "noscript", "head"])
        .build();
    let markdown = converter
        .convert(html)
        .map_err(|e| KbError::InvalidInput(format!("failed to convert HTML: {}", e)))?;
    let markdown = markdown.trim().to_string();

    let title = extract_title(html)
        .or_else(|| first_heading(&markdown))
        .unwrap_or_default();

    Ok(Converted { title, markdown })
}

fn extract_title(html: &str) -> Option<String> {
    let re = Regex::new(r"(?is)<title[^>]*>(.*?)</title>").ok()?;
    let raw = re.captures(html)?.get(1)?.as_str();
    let title = collapse_whitespace(&decode_entities(raw));
    (!title.is_empty()).then_some(title)
}

/// First ATX (`# Title`) or setext (`Title\n=====`) heading.
fn first_heading(markdown: &str) -> Option<String> {
    let lines: Vec<&str> = markdown.lines().map(str::trim).collect();
    for (i, line) in lines.iter().enumerate() {
        if line.starts_with('#') {
            let text = line.trim_start_matches('#').trim();
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
        let underlined = lines.get(i + 1).map_or(false, |next| {
            !next.is_empty() && (next.chars().all(|c| c == '=') || next.chars().all(|c| c == '-'))
        });
        if underlined && !line.is_empty() {
            return Some(line.to_string());
        }
    }
    None
}

/// Decode character references in a captured `<title>` body.
fn decode_entities(raw: &str) -> String {
    htmd::convert(raw).unwrap_or_else(|_| raw.to_string())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Derive a filesystem-safe `.md` file name from a URL.
///
/// The scheme is stripped, every run of characters outside
/// `[A-Za-z0-9.-]` becomes a single `_`, and the stem is capped at
/// `max_len` characters. Leading dots are removed so the file is never
/// hidden from the indexer.
pub fn url_to_filename(url: &str, max_len: usize) -> String {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);

    let mut stem = String::with_capacity(without_scheme.len());
    let mut last_was_underscore = false;
    for c in without_scheme.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
            stem.push(c);
            last_was_underscore = false;
        } else if !last_was_underscore {
            stem.push('_');
            last_was_underscore = true;
        }
    }

    let trim = |c: char| c == '_' || c == '.';
    let capped: String = stem.trim_matches(trim).chars().take(max_len).collect();
    let capped = capped.trim_end_matches(trim);

    if capped.is_empty() {
        "document.md".to_string()
    } else {
        format!("{}.md", capped)
    }
}

/// Front-matter block (`url`, `title`, `fetched_at`) followed by the body.
pub fn render_document(url: &str, title: &str, fetched_at: DateTime<Utc>, body: &str) -> String {
    format!(
        "---\nurl: {}\ntitle: {}\nfetched_at: {}\n---\n\n{}\n",
        quoted(url),
        quoted(title),
        fetched_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        body.trim()
    )
}

/// A double-quoted scalar that is valid in YAML front matter.
fn quoted(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s.replace('"', "'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_convert_extracts_title_and_body() {
        let html = "<html><head><title>  Rust &amp; Friends </title><style>p{}</style></head>\
                    <body><h1>Welcome</h1><p>Hello <b>world</b></p><script>alert(1)</script></body></html>";
        let converted = convert_html(html).unwrap();
        assert_eq!(converted.title, "Rust & Friends");
        assert!(converted.markdown.contains("Welcome"));
        assert!(converted.markdown.contains("**world**"));
        assert!(!converted.markdown.contains("alert"));
    }

    #[test]
    fn test_title_decodes_numeric_references() {
        let html = "<html><head><title>Rust &#8211; Guide &#x27;24</title></head><body></body></html>";
        assert_eq!(convert_html(html).unwrap().title, "Rust \u{2013} Guide '24");
    }

    #[test]
    fn test_title_falls_back_to_heading() {
        let converted = convert_html("<h1>Only Heading</h1><p>text</p>").unwrap();
        assert_eq!(converted.title, "Only Heading");
    }

    #[test]
    fn test_filename_strips_scheme_and_collapses() {
        assert_eq!(
            url_to_filename("https://example.com/docs/a b?x=1&y=2", 100),
            "example.com_docs_a_b_x_1_y_2.md"
        );
        assert_eq!(url_to_filename("http://x/doc", 100), "x_doc.md");
    }

    #[test]
    fn test_filename_is_capped() {
        let url = format!("https://example.com/{}", "a".repeat(500));
        let name = url_to_filename(&url, 100);
        assert_eq!(name.len(), 100 + ".md".len());
    }

    #[test]
    fn test_filename_never_hidden_or_empty() {
        assert_eq!(url_to_filename("https://.hidden/", 100), "hidden.md");
        assert_eq!(url_to_filename("https://???", 100), "document.md");
    }

    #[test]
    fn test_render_document_front_matter() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let doc = render_document("https://x/doc", "A \"quoted\" title", at, "\nBody text\n");
        assert_eq!(
            doc,
            "---\nurl: \"https://x/doc\"\ntitle: \"A \\\"quoted\\\" title\"\nfetched_at: 2024-05-01T12:00:00Z\n---\n\nBody text\n"
        );
    }
}
