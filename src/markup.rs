//! Inline markup formatting for streamed explanations.
//!
//! The formatter understands a deliberately small subset of markdown:
//!
//! | Source     | Output                |
//! |------------|-----------------------|
//! | `**X**`    | `<strong>X</strong>`  |
//! | `*X*`      | `<em>X</em>`          |
//! | `` `X` ``  | `<code>X</code>`      |
//! | blank line | `</p><p>`             |
//! | newline    | `<br>`                |
//!
//! and wraps the result in a single `<p>` container. The source text is
//! HTML-escaped before any rule runs, so model output cannot inject markup.
//!
//! # Example
//!
//! ```rust
//! use eli5_stream::markup::format;
//!
//! let html = format("**bold** and `code`");
//! assert_eq!(html, "<p><strong>bold</strong> and <code>code</code></p>");
//! ```

use std::sync::LazyLock;

use regex::Regex;

static STRONG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("static regex"));
static EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*(.*?)\*").expect("static regex"));
static CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`(.*?)`").expect("static regex"));
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("static regex"));

/// Convert accumulated plain text into display HTML.
///
/// Always re-derives the whole output from `text`; callers pass the full
/// accumulated response on every update rather than patching.
#[must_use]
pub fn format(text: &str) -> String {
    let escaped = escape_html(text);
    let strong = STRONG.replace_all(&escaped, "<strong>$1</strong>");
    let emphasis = EMPHASIS.replace_all(&strong, "<em>$1</em>");
    let code = CODE.replace_all(&emphasis, "<code>$1</code>");
    let body = code.replace("\n\n", "</p><p>").replace('\n', "<br>");
    format!("<p>{body}</p>")
}

/// Recover the text a reader would copy from formatter output.
///
/// Paragraph breaks become blank lines and `<br>` becomes a newline; all
/// other tags are stripped and entities unescaped.
#[must_use]
pub fn plain_text(html: &str) -> String {
    let with_breaks = html.replace("</p><p>", "\n\n").replace("<br>", "\n");
    let stripped = TAG.replace_all(&with_breaks, "");
    unescape_html(&stripped)
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn unescape_html(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_subset() {
        let html = format("**bold** and *italic* and `code`");
        assert_eq!(
            html,
            "<p><strong>bold</strong> and <em>italic</em> and <code>code</code></p>"
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(format(""), "<p></p>");
    }

    #[test]
    fn test_deterministic() {
        let text = "Line one\n\nLine *two*\nthree";
        assert_eq!(format(text), format(text));
    }

    #[test]
    fn test_paragraphs_and_line_breaks() {
        assert_eq!(format("a\n\nb\nc"), "<p>a</p><p>b<br>c</p>");
    }

    #[test]
    fn test_unmatched_delimiters_stay_literal() {
        assert_eq!(format("2 * 3 = 6"), "<p>2 * 3 = 6</p>");
        assert_eq!(format("a ` b"), "<p>a ` b</p>");
        assert_eq!(format("**open"), "<p><em></em>open</p>");
    }

    #[test]
    fn test_emphasis_does_not_cross_lines() {
        assert_eq!(format("*a\nb*"), "<p>*a<br>b*</p>");
    }

    #[test]
    fn test_partial_stream_renders_progressively() {
        // An unclosed strong marker reads as an empty emphasis until it closes.
        assert_eq!(format("**bo"), "<p><em></em>bo</p>");
        assert_eq!(format("**bold**"), "<p><strong>bold</strong></p>");
    }

    #[test]
    fn test_escapes_markup() {
        let html = format("<script>alert('x')</script> & \"q\"");
        assert_eq!(
            html,
            "<p>&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; &quot;q&quot;</p>"
        );
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_escape_inside_code() {
        assert_eq!(format("`<b>`"), "<p><code>&lt;b&gt;</code></p>");
    }

    #[test]
    fn test_plain_text_recovers_source() {
        let source = "Use `a < b` & **stay** calm\n\nNext\nline";
        let plain = plain_text(&format(source));
        assert_eq!(plain, "Use a < b & stay calm\n\nNext\nline");
    }
}
