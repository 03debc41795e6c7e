// Uploaded-file → text extraction for the upload submit flows

use crate::types::{AppError, AppResult};

const TEXT_EXTENSIONS: &[&str] = &[
    ".py", ".js", ".ts", ".jsx", ".tsx", ".java", ".go", ".rs", ".php", ".rb", ".c", ".cpp",
    ".h", ".cs", ".swift", ".kt", ".html", ".css", ".sql", ".sh", ".yml", ".yaml", ".json",
    ".xml", ".toml", ".md", ".txt", ".cfg", ".ini", ".env",
];

/// Markers checked in the head of extension-less files.
const CODE_INDICATORS: &[&str] = &[
    "def ", "function(", "import ", "class ", "<?php", "#include", "package ", "fn ", "use ",
];

/// Turn an uploaded file into analyzable text. Rejects binaries and
/// unrecognized formats; caps the result at `limit` characters.
pub fn extract_text(filename: &str, bytes: &[u8], limit: usize) -> AppResult<String> {
    let text = std::str::from_utf8(bytes).map_err(|_| {
        AppError::Validation(format!(
            "'{filename}' looks like a binary file. Upload plain text or code."
        ))
    })?;

    if text.trim().is_empty() {
        return Err(AppError::Validation(format!(
            "'{filename}' appears to be empty or unreadable."
        )));
    }

    let lowered = filename.to_lowercase();
    let known_extension = TEXT_EXTENSIONS.iter().any(|ext| lowered.ends_with(ext));

    if !known_extension {
        let head = crate::analysis::prompts::truncate(text, 1000);
        let looks_like_code = CODE_INDICATORS.iter().any(|m| head.contains(m));
        if !looks_like_code {
            return Err(AppError::Validation(format!(
                "'{filename}' is not a recognized code or text format."
            )));
        }
    }

    Ok(crate::analysis::prompts::truncate(text, limit).to_string())
}

/// Elements dropped wholesale before tag stripping; their text is chrome,
/// not content.
const STRIPPED_ELEMENTS: &[&str] = &["script", "style", "nav", "footer", "header"];

/// Turn a fetched webpage into analyzable text for the URL submit flow:
/// drop script/style/navigation blocks, strip the remaining tags, keep
/// non-empty lines, cap at `limit` characters.
pub fn webpage_text(html: &str, limit: usize) -> AppResult<String> {
    let mut cleaned = html.to_string();
    for tag in STRIPPED_ELEMENTS {
        cleaned = strip_element(&cleaned, tag);
    }

    let text = strip_tags(&cleaned);
    if text.trim().is_empty() {
        return Err(AppError::Validation(
            "No readable content found at that URL. Try pasting the source directly.".to_string(),
        ));
    }

    Ok(crate::analysis::prompts::truncate(&text, limit).to_string())
}

/// Remove `<tag ...>...</tag>` blocks, case-insensitively. An unclosed
/// opening tag drops the rest of the document.
fn strip_element(html: &str, tag: &str) -> String {
    // ascii lowering keeps byte offsets valid in the original
    let lower = html.to_ascii_lowercase();
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    let mut out = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(offset) = lower[pos..].find(&open) {
        let start = pos + offset;
        out.push_str(&html[pos..start]);
        match lower[start..].find(&close) {
            Some(end) => pos = start + end + close.len(),
            None => return out,
        }
    }
    out.push_str(&html[pos..]);
    out
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                out.push('\n');
            }
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }

    let out = out
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    out.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extension_is_accepted() {
        let text = extract_text("main.py", b"print('hello')", 12000).unwrap();
        assert_eq!(text, "print('hello')");
    }

    #[test]
    fn test_binary_is_rejected() {
        let err = extract_text("photo.py", &[0xff, 0xfe, 0x00, 0x80], 12000).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let err = extract_text("empty.txt", b"  \n ", 12000).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_unknown_extension_sniffs_code_indicators() {
        let ok = extract_text("Makefile2", b"def build():\n    pass", 12000);
        assert!(ok.is_ok());

        let err = extract_text("notes", b"just some prose about lunch", 12000).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_result_is_capped() {
        let big = "a".repeat(20000);
        let text = extract_text("big.txt", big.as_bytes(), 12000).unwrap();
        assert_eq!(text.len(), 12000);
    }

    #[test]
    fn test_webpage_text_drops_chrome_and_tags() {
        let html = r#"<html><head><SCRIPT>var x = 1;</SCRIPT><style>p{}</style></head>
<body><nav><a href="/">Home</a></nav>
<h1>API Reference</h1><p>Call &lt;endpoint&gt; with a token &amp; retry.</p>
<footer>copyright</footer></body></html>"#;
        let text = webpage_text(html, 12000).unwrap();

        assert!(text.contains("API Reference"));
        assert!(text.contains("Call <endpoint> with a token & retry."));
        assert!(!text.contains("var x"));
        assert!(!text.contains("Home"));
        assert!(!text.contains("copyright"));
    }

    #[test]
    fn test_webpage_without_text_is_rejected() {
        let err = webpage_text("<html><script>spa()</script></html>", 12000).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
