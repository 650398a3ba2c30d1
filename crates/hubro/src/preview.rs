//! Standalone HTML page for rendered previews.

use std::fmt::Write as _;

use hubro_session::Preview;

/// Escape HTML special characters.
fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

/// Wrap a preview in a complete HTML document.
///
/// The header mirrors the page layout: title, then author and date, then
/// tags. Hidden parts are omitted. The body is inserted as rendered.
pub(crate) fn render_page(preview: &Preview) -> String {
    let mut header = String::new();

    if let Some(title) = &preview.title {
        let _ = writeln!(header, "<h1 class=\"title\">{}</h1>", escape_html(title));
    }

    let mut byline = Vec::new();
    if let Some(author) = &preview.author {
        byline.push(format!("<span class=\"author\">{}</span>", escape_html(author)));
    }
    if let Some(label) = &preview.date_label {
        let tooltip = preview
            .date_title
            .as_deref()
            .map(|title| format!(" title=\"{}\"", escape_html(title)))
            .unwrap_or_default();
        byline.push(format!(
            "<time{tooltip}>{}</time>",
            escape_html(label)
        ));
    }
    if preview.draft {
        byline.push("<span class=\"draft\">draft</span>".to_owned());
    }
    if !byline.is_empty() {
        let _ = writeln!(header, "<p class=\"byline\">{}</p>", byline.join(" · "));
    }

    if !preview.tags.is_empty() {
        let tags: Vec<String> = preview
            .tags
            .iter()
            .map(|tag| format!("<li>{}</li>", escape_html(tag)))
            .collect();
        let _ = writeln!(header, "<ul class=\"tags\">{}</ul>", tags.concat());
    }

    let title = preview.title.as_deref().unwrap_or("Preview");
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n<header>\n{header}</header>\n<article>\n{}\n</article>\n</body>\n</html>\n",
        escape_html(title),
        preview.html
    )
}
