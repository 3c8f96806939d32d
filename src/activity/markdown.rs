use regex::{Captures, Regex};
use std::sync::LazyLock;

static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("bold"));
static ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*(.*?)\*").expect("italic"));
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("link"));

const SAFE_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

/// Renders `**bold**`, `*italic*` and `[label](url)` as an HTML fragment.
///
/// The input is escaped before substitution so the only markup in the output
/// is the markup produced here. Anything else passes through as text.
pub fn render_inline_markdown(text: &str) -> String {
    let escaped = escape_html(text);
    let bold = BOLD.replace_all(&escaped, "<strong>$1</strong>");
    let italic = ITALIC.replace_all(&bold, "<em>$1</em>");

    LINK.replace_all(&italic, |captures: &Captures<'_>| {
        let label = &captures[1];
        let url = &captures[2];

        if has_safe_scheme(url) {
            format!(r#"<a href="{url}" target="_blank" rel="noopener noreferrer">{label}</a>"#)
        } else {
            captures[0].to_string()
        }
    })
    .into_owned()
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for character in text.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

// Relative links have no scheme and are allowed.
fn has_safe_scheme(url: &str) -> bool {
    let trimmed = url.trim();
    match trimmed.split_once(':') {
        Some((scheme, _)) if !scheme.contains(['/', '?', '#']) => SAFE_SCHEMES
            .iter()
            .any(|safe| scheme.eq_ignore_ascii_case(safe)),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::render_inline_markdown;

    #[test]
    fn renders_bold_italic_and_link() {
        assert_eq!(
            render_inline_markdown("**a** *b* [c](http://x)"),
            r#"<strong>a</strong> <em>b</em> <a href="http://x" target="_blank" rel="noopener noreferrer">c</a>"#
        );
    }

    #[test]
    fn escapes_script_tags() {
        let rendered = render_inline_markdown("<script>alert(1)</script>");

        assert!(!rendered.contains("<script"));
        assert_eq!(rendered, "&lt;script&gt;alert(1)&lt;/script&gt;");
    }

    #[test]
    fn link_url_cannot_break_out_of_attribute() {
        let rendered = render_inline_markdown(r#"[x](http://a" onclick="evil)"#);

        assert!(!rendered.contains(r#"" onclick=""#));
        assert!(rendered.contains("&quot;"));
    }

    #[test]
    fn javascript_links_stay_literal() {
        let rendered = render_inline_markdown("[click](javascript:alert(1))");

        assert!(!rendered.contains("<a "));
        assert!(rendered.starts_with("[click](javascript:alert(1)"));
    }

    #[test]
    fn bold_runs_before_italic() {
        assert_eq!(
            render_inline_markdown("**strong** and *soft*"),
            "<strong>strong</strong> and <em>soft</em>"
        );
    }

    #[test]
    fn block_syntax_passes_through() {
        assert_eq!(render_inline_markdown("# title\n- item"), "# title\n- item");
    }

    #[test]
    fn relative_links_are_kept() {
        assert_eq!(
            render_inline_markdown("[files](/files)"),
            r#"<a href="/files" target="_blank" rel="noopener noreferrer">files</a>"#
        );
    }
}
