//! Text transforms over fetched EDGAR pages.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script.*?>.*?</script\s*>").expect("valid regex"));
static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style.*?>.*?</style\s*>").expect("valid regex"));
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(nbsp|amp|lt|gt|#149|#151);").expect("valid regex"));
static INLINE_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").expect("valid regex"));
static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));
static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a\s*>"#).expect("valid regex")
});

/// Strip script/style blocks and tags, decode the common entities, collapse
/// whitespace. Stable on its own output when that output has no angle brackets.
pub fn clean_html(html: &str) -> String {
    let text = SCRIPT_BLOCK.replace_all(html, "");
    let text = STYLE_BLOCK.replace_all(&text, "");
    let text = TAG.replace_all(&text, "");
    // Single pass so "&amp;lt;" decodes to "&lt;", not "<"
    let text = ENTITY.replace_all(&text, |caps: &Captures| match &caps[1] {
        "nbsp" => " ",
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "#149" => "•",
        _ => "—",
    });
    let text = INLINE_SPACE.replace_all(&text, " ");
    let text = BLANK_LINES.replace_all(&text, "\n");
    text.trim().to_string()
}

/// href of the first anchor that looks like a press release exhibit.
pub fn find_press_release_href(html: &str) -> Option<String> {
    ANCHOR.captures_iter(html).find_map(|caps| {
        let href = caps.get(1)?.as_str();
        let label = TAG.replace_all(caps.get(2)?.as_str(), "").to_lowercase();
        let href_lower = href.to_lowercase();

        let label_matches = label.contains("press release") || label.contains("ex-99");
        let href_matches = ["ex-99", "ex99", "press-release", "press_release", "pressrelease"]
            .iter()
            .any(|needle| href_lower.contains(needle));

        (label_matches || href_matches).then(|| href.to_string())
    })
}
