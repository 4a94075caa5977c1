//! Plain-text extraction for supported vault file types.
//!
//! Markdown gets a minimal YAML frontmatter pass (title, date, scalar keys,
//! inline lists); CSV rows are rendered as `header=value` pairs so the
//! extraction model sees labeled fields instead of bare commas.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Normalized content pulled out of a vault file before it becomes a document.
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    pub title: String,
    pub date: Option<String>,
    pub text: String,
    /// JSON object of free-form metadata (frontmatter keys, CSV headers).
    pub metadata: Value,
}

pub fn extract_content(
    relative_path: &str,
    absolute_path: &Path,
    file_type: &str,
) -> Result<ExtractedContent> {
    let content = std::fs::read_to_string(absolute_path)
        .with_context(|| format!("Failed to read file: {}", absolute_path.display()))?;
    let stem = file_stem(relative_path);

    let extracted = match file_type {
        "markdown" => {
            let (frontmatter, body) = parse_frontmatter(&content);
            let title = frontmatter
                .get("title")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or(stem);
            let date = frontmatter
                .get("date")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            ExtractedContent {
                title,
                date,
                text: body,
                metadata: Value::Object(frontmatter.into_iter().collect()),
            }
        }
        "csv" => {
            let (text, headers) = render_csv(&content);
            ExtractedContent {
                title: stem,
                date: None,
                text,
                metadata: json!({ "headers": headers }),
            }
        }
        _ => ExtractedContent {
            title: stem,
            date: None,
            text: content,
            metadata: json!({}),
        },
    };

    Ok(extracted)
}

fn file_stem(relative_path: &str) -> String {
    Path::new(relative_path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| relative_path.to_string())
}

/// Parse a leading `---` YAML frontmatter block. Handles scalar `key: value`
/// lines (quotes stripped) and inline lists `key: [a, b]`. Anything fancier
/// is ignored rather than failed.
fn parse_frontmatter(content: &str) -> (BTreeMap<String, Value>, String) {
    let mut frontmatter = BTreeMap::new();

    let rest = match content.strip_prefix("---\n").or_else(|| content.strip_prefix("---\r\n")) {
        Some(rest) => rest,
        None => return (frontmatter, content.to_string()),
    };

    let Some(end) = rest.find("\n---") else {
        return (frontmatter, content.to_string());
    };

    let block = &rest[..end];
    let mut body = &rest[end + 4..];
    body = body.trim_start_matches(['-']).trim_start();

    for line in block.lines() {
        let Some((key, raw_value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() || !key.chars().all(|c| c.is_alphanumeric() || c == '_') {
            continue;
        }
        let raw_value = raw_value.trim();

        let value = if raw_value.starts_with('[') && raw_value.ends_with(']') {
            let items: Vec<Value> = raw_value[1..raw_value.len() - 1]
                .split(',')
                .map(|s| Value::String(strip_quotes(s.trim()).to_string()))
                .filter(|v| v.as_str().map(|s| !s.is_empty()).unwrap_or(false))
                .collect();
            Value::Array(items)
        } else {
            Value::String(strip_quotes(raw_value).to_string())
        };

        frontmatter.insert(key.to_string(), value);
    }

    (frontmatter, body.to_string())
}

fn strip_quotes(s: &str) -> &str {
    s.trim_matches(|c| c == '"' || c == '\'')
}

/// Render CSV rows as `header=value` pairs, one line per row.
fn render_csv(content: &str) -> (String, Vec<String>) {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let Some(header_line) = lines.next() else {
        return (String::new(), Vec::new());
    };

    let separator = if header_line.contains('\t') { '\t' } else { ',' };
    let headers: Vec<String> = header_line
        .split(separator)
        .map(|h| h.trim().to_string())
        .collect();

    let mut out = String::new();
    for row in lines {
        let values: Vec<&str> = row.split(separator).map(|v| v.trim()).collect();
        let pairs: Vec<String> = headers
            .iter()
            .zip(values.iter().chain(std::iter::repeat(&"")))
            .map(|(h, v)| format!("{}={}", h, v))
            .collect();
        out.push_str(&pairs.join(", "));
        out.push('\n');
    }

    (out.trim_end().to_string(), headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frontmatter_title_and_date() {
        let content = "---\ntitle: My Note\ndate: 2024-01-15\ntags: [home, budget]\n---\n\nBody text here.";
        let (fm, body) = parse_frontmatter(content);
        assert_eq!(fm.get("title").unwrap().as_str(), Some("My Note"));
        assert_eq!(fm.get("date").unwrap().as_str(), Some("2024-01-15"));
        let tags = fm.get("tags").unwrap().as_array().unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(body, "Body text here.");
    }

    #[test]
    fn test_frontmatter_quoted_values() {
        let content = "---\ntitle: \"Quoted Title\"\n---\nBody.";
        let (fm, _) = parse_frontmatter(content);
        assert_eq!(fm.get("title").unwrap().as_str(), Some("Quoted Title"));
    }

    #[test]
    fn test_no_frontmatter_passthrough() {
        let content = "Just a plain note.\nSecond line.";
        let (fm, body) = parse_frontmatter(content);
        assert!(fm.is_empty());
        assert_eq!(body, content);
    }

    #[test]
    fn test_unterminated_frontmatter() {
        let content = "---\ntitle: Broken\nno closing fence";
        let (fm, body) = parse_frontmatter(content);
        assert!(fm.is_empty());
        assert_eq!(body, content);
    }

    #[test]
    fn test_render_csv() {
        let (text, headers) = render_csv("name,amount\nrent,1200\nwater,80");
        assert_eq!(headers, vec!["name", "amount"]);
        assert_eq!(text, "name=rent, amount=1200\nname=water, amount=80");
    }

    #[test]
    fn test_render_csv_short_row() {
        let (text, _) = render_csv("a,b,c\n1,2");
        assert_eq!(text, "a=1, b=2, c=");
    }

    #[test]
    fn test_extract_markdown_falls_back_to_stem() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("groceries.md");
        std::fs::write(&path, "milk and eggs").unwrap();
        let extracted = extract_content("groceries.md", &path, "markdown").unwrap();
        assert_eq!(extracted.title, "groceries");
        assert_eq!(extracted.text, "milk and eggs");
        assert!(extracted.date.is_none());
    }
}
