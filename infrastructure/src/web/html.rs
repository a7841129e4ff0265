//! HTML to plain text

use scraper::{ElementRef, Html, Node, Selector};

/// Subtrees that never contain readable text
const SKIP_TAGS: [&str; 4] = ["script", "style", "noscript", "svg"];

/// Readable text of an HTML document, taken from `<body>` when present.
///
/// Text nodes are joined with single spaces; callers normalize further.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let body = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next());
    let root = body.unwrap_or_else(|| document.root_element());

    let mut parts = Vec::new();
    collect_text(root, &mut parts);
    parts.join(" ")
}

/// Contents of the first `<title>`, if any
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;
    let title: String = document.select(&selector).next()?.text().collect();
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

fn collect_text<'a>(element: ElementRef<'a>, parts: &mut Vec<&'a str>) {
    if SKIP_TAGS.contains(&element.value().name()) {
        return;
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let t = text.trim();
                if !t.is_empty() {
                    parts.push(t);
                }
            }
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, parts);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_text_is_extracted() {
        let html = "<html><head><title>France</title></head>\
                    <body><h1>France</h1><p>Paris is the capital.</p></body></html>";
        assert_eq!(html_to_text(html), "France Paris is the capital.");
    }

    #[test]
    fn test_script_style_noscript_svg_are_skipped() {
        let html = r#"
        <html><body>
            <script>var x = 1;</script>
            <style>.foo { color: red; }</style>
            <p>Visible text</p>
            <noscript>No JS</noscript>
            <svg><text>chart label</text></svg>
        </body></html>
        "#;
        let text = html_to_text(html);
        assert_eq!(text, "Visible text");
    }

    #[test]
    fn test_fragment_without_body() {
        assert!(html_to_text("plain <b>bold</b> words").contains("bold"));
        assert!(html_to_text("").trim().is_empty());
    }

    #[test]
    fn test_extract_title() {
        assert_eq!(
            extract_title("<html><head><title>  Paris - Wikipedia </title></head></html>"),
            Some("Paris - Wikipedia".to_string())
        );
        assert_eq!(extract_title("<p>no title</p>"), None);
    }
}
