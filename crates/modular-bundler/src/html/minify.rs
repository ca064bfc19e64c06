//! Whitespace and comment minification for generated documents.
//!
//! Content of `script`, `style`, `pre` and `textarea` elements is never
//! reflowed; inline scripts and styles only lose their indentation.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static PRESERVED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|pre|textarea)\b[^>]*>.*?</(?:script|style|pre|textarea)\s*>")
        .expect("valid preserved-element regex")
});

static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex"));

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[A-Za-z][^<>]*>").expect("valid tag regex"));

static BOOLEAN_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\b(async|defer|nomodule|hidden|disabled|checked|selected|readonly|required|multiple|autofocus|novalidate)\s*=\s*(?:"([^"]*)"|'([^']*)')"#,
    )
    .expect("valid boolean attribute regex")
});

static TAG_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+(/?>)$").expect("valid tag whitespace regex"));

static BETWEEN_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").expect("valid inter-tag regex"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

static INDENTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]+").expect("valid indentation regex"));

/// Minify an HTML document.
pub fn minify_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut last = 0;

    for caps in PRESERVED.captures_iter(html) {
        let (Some(whole), Some(kind)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let segment = minify_segment(&html[last..whole.start()]);
        out.push_str(segment.trim_end());

        let element = whole.as_str();
        match kind.as_str().to_ascii_lowercase().as_str() {
            "script" | "style" => out.push_str(&compact_element(element)),
            _ => out.push_str(element),
        }
        last = whole.end();
    }

    let tail = minify_segment(&html[last..]);
    if last > 0 {
        out.push_str(tail.trim_start());
    } else {
        out.push_str(&tail);
    }
    out.trim().to_string()
}

fn minify_segment(segment: &str) -> String {
    let without_comments = COMMENT.replace_all(segment, |caps: &Captures<'_>| {
        let comment = &caps[0];
        // Conditional comments carry markup.
        if comment.starts_with("<!--[if") {
            comment.to_string()
        } else {
            String::new()
        }
    });

    // Opening tags are compacted on their own so attribute values never
    // reach the text rules below.
    let mut out = String::with_capacity(without_comments.len());
    let mut last = 0;
    for tag in TAG.find_iter(&without_comments) {
        out.push_str(&compact_text(
            &without_comments[last..tag.start()],
            last > 0,
            true,
        ));
        out.push_str(&compact_tag(tag.as_str()));
        last = tag.end();
    }
    out.push_str(&compact_text(&without_comments[last..], last > 0, false));
    out
}

/// Collapse text between opening tags. `after_tag` and `before_tag` say
/// whether an opening tag borders the text on that side.
fn compact_text(text: &str, after_tag: bool, before_tag: bool) -> String {
    let mut text = BETWEEN_TAGS.replace_all(text, "><").into_owned();

    let start = text.trim_start();
    if after_tag && (start.starts_with('<') || (before_tag && start.is_empty())) {
        text = start.to_string();
    }
    let end = text.trim_end();
    if before_tag && end.ends_with('>') {
        text = end.to_string();
    }
    WHITESPACE.replace_all(&text, " ").into_owned()
}

fn compact_tag(tag: &str) -> String {
    let tag = collapse_outside_quotes(tag);
    let tag = TAG_WHITESPACE.replace(&tag, "$1");
    BOOLEAN_ATTRIBUTE
        .replace_all(&tag, |caps: &Captures<'_>| {
            let name = &caps[1];
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            if value.is_empty() || value.eq_ignore_ascii_case(name) {
                name.to_string()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Collapse whitespace runs between attributes; quoted values are kept as is.
fn collapse_outside_quotes(tag: &str) -> String {
    let mut out = String::with_capacity(tag.len());
    let mut quote = None;
    let mut in_whitespace = false;

    for c in tag.chars() {
        match quote {
            Some(open) => {
                out.push(c);
                if c == open {
                    quote = None;
                }
            }
            None if c.is_whitespace() => {
                if !in_whitespace {
                    out.push(' ');
                    in_whitespace = true;
                }
                continue;
            }
            None => {
                if c == '"' || c == '\'' {
                    quote = Some(c);
                }
                out.push(c);
            }
        }
        in_whitespace = false;
    }
    out
}

/// Compact the opening tag and strip indentation from the body.
fn compact_element(element: &str) -> String {
    let Some(open_end) = element.find('>') else {
        return element.to_string();
    };
    let (open, rest) = element.split_at(open_end + 1);
    let body = INDENTATION.replace_all(rest, "\n");
    let body = body.trim_start_matches('\n');
    let body = match body.rfind('<') {
        Some(close) => format!("{}{}", body[..close].trim_end(), &body[close..]),
        None => body.to_string(),
    };
    format!("{}{}", compact_tag(open), body)
}
