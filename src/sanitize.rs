//! Allowlist HTML sanitizer for upstream job descriptions.

use scraper::{ElementRef, Html, Node};

/// Tags kept in the output. Everything else is unwrapped to its children.
const ALLOWED_TAGS: &[&str] = &[
    "p", "br", "strong", "b", "em", "i", "u", "ul", "ol", "li", "a", "h1", "h2", "h3", "h4",
    "h5", "h6", "blockquote", "code", "pre", "span", "div",
];

/// Attributes kept on `<a>`. No other element keeps attributes.
const LINK_ATTRIBUTES: &[&str] = &["href", "target", "rel"];

/// Tags removed together with their content.
const DROPPED_TAGS: &[&str] = &["script", "style"];

const VOID_TAGS: &[&str] = &["br"];

const SAFE_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Sanitize an HTML fragment down to a fixed set of formatting tags.
///
/// Text and attribute values are re-escaped, so the result is well formed
/// regardless of the input.
pub fn sanitize_html(input: &str) -> String {
    let fragment = Html::parse_fragment(input);
    let mut out = String::with_capacity(input.len());
    write_children(fragment.root_element(), &mut out);
    out
}

fn write_children(parent: ElementRef<'_>, out: &mut String) {
    for child in parent.children() {
        if let Some(element) = ElementRef::wrap(child) {
            write_element(element, out);
        } else if let Node::Text(text) = child.value() {
            escape_text(text, out);
        }
        // Comments and processing instructions are dropped.
    }
}

fn write_element(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();

    if DROPPED_TAGS.contains(&name) {
        return;
    }

    if !ALLOWED_TAGS.contains(&name) {
        write_children(element, out);
        return;
    }

    out.push('<');
    out.push_str(name);
    if name == "a" {
        for attr in LINK_ATTRIBUTES {
            let Some(value) = element.value().attr(attr) else {
                continue;
            };
            if *attr == "href" && !is_safe_href(value) {
                continue;
            }
            out.push(' ');
            out.push_str(attr);
            out.push_str("=\"");
            escape_attribute(value, out);
            out.push('"');
        }
    }
    out.push('>');

    if VOID_TAGS.contains(&name) {
        return;
    }

    write_children(element, out);

    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// Accept http, https and mailto links plus scheme-less (relative) ones.
fn is_safe_href(href: &str) -> bool {
    let href = href.trim();
    let scheme_end = href.find(':');
    let path_start = href.find(['/', '?', '#']);

    match (scheme_end, path_start) {
        (None, _) => true,
        (Some(colon), Some(path)) if path < colon => true,
        (Some(colon), _) => {
            let scheme = href[..colon].to_ascii_lowercase();
            SAFE_SCHEMES.contains(&scheme.as_str())
        }
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}
