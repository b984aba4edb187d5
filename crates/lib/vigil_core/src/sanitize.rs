//! Markup stripping for untrusted request values.
//!
//! Pure functions with no shared state; safe to call from any thread.

use std::sync::LazyLock;

use regex::Regex;

static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?(?:-->|$)").expect("comment pattern"));

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:script|style)\b[^>]*>.*?(?:</\s*(?:script|style)\s*>|$)")
        .expect("script/style pattern")
});

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(?:/?[A-Za-z][^>]*|![^>]*|\?[^>]*)>").expect("tag pattern")
});

/// Strip comments, `<script>`/`<style>` elements with their content and
/// every other tag, then escape stray angle brackets.
pub fn sanitize(value: &str) -> String {
    if !value.contains('<') && !value.contains('>') {
        return value.to_string();
    }
    let without_comments = COMMENT.replace_all(value, "");
    let without_scripts = SCRIPT_OR_STYLE.replace_all(&without_comments, "");
    let without_tags = TAG.replace_all(&without_scripts, "");
    without_tags.replace('<', "&lt;").replace('>', "&gt;")
}

/// [`sanitize`] lifted over absent values: `None` stays `None`.
pub fn sanitize_opt(value: Option<&str>) -> Option<String> {
    value.map(sanitize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_simple_markup() {
        assert_eq!(sanitize("<h1>Darkthrone</h1>"), "Darkthrone");
    }

    #[test]
    fn none_stays_none() {
        assert_eq!(sanitize_opt(None), None);
        assert_eq!(sanitize_opt(Some("<b>Mayhem</b>")), Some("Mayhem".into()));
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(sanitize("Bathory & Burzum"), "Bathory & Burzum");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn script_content_is_dropped() {
        assert_eq!(sanitize("<script>alert(1)</script>Emperor"), "Emperor");
        assert_eq!(sanitize("Ulver<SCRIPT type=x>steal()</script >"), "Ulver");
        assert_eq!(sanitize("Enslaved<style>body{}</style>"), "Enslaved");
    }

    #[test]
    fn unterminated_script_swallows_the_rest() {
        assert_eq!(sanitize("Satyricon<script>alert(1)"), "Satyricon");
    }

    #[test]
    fn event_handler_attributes_go_with_their_tag() {
        assert_eq!(sanitize("<img src=x onerror=alert(1)>"), "");
        assert_eq!(sanitize("<a href=\"javascript:x()\">Immortal</a>"), "Immortal");
    }

    #[test]
    fn comments_are_removed() {
        assert_eq!(sanitize("Gorgoroth<!-- <script>x</script> -->"), "Gorgoroth");
    }

    #[test]
    fn stray_brackets_are_escaped() {
        assert_eq!(sanitize("1 < 2 > 0"), "1 &lt; 2 &gt; 0");
        assert_eq!(sanitize("<img src=x onerror=alert(1)"), "&lt;img src=x onerror=alert(1)");
    }
}
