use once_cell::sync::Lazy;
use regex::Regex;

// The patterns are listed in the order they are applied, which must not change: block closings
// become paragraph breaks before the generic tag stripping erases them.
static BLOCK_CLOSING_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</p\s*>|</div\s*>|</h[1-6]\s*>").unwrap());
static LINE_BREAK_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static LIST_ITEM_CLOSING_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</li\s*>").unwrap());
static LIST_ITEM_OPENING_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<li(\s[^>]*)?>").unwrap());
static LIST_CONTAINER_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?(ul|ol)(\s[^>]*)?>").unwrap());
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static EXCESSIVE_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n\s*\n+").unwrap());
static PARAGRAPH_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

/// The entities understood by the normalizer, in decoding order. `&amp;` comes right after the
/// non-breaking space and before the remaining ones.
const ENTITIES: [(&str, &str); 6] = [
    ("&nbsp;", " "),
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
];

/// The marker which replaces the opening of a list item.
pub const BULLET_MARKER: &str = "• ";

/// Converts the HTML body of a section into plain text, where paragraphs are delimited by a
/// blank line and list items by a single newline prefixed with a bullet marker.
///
/// The conversion never fails: the markup produced by the rich-text editor is a small fixed set
/// of block and inline tags, so unknown or malformed tags are simply stripped.
pub fn normalize_html(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }

    let text = BLOCK_CLOSING_TAGS.replace_all(html, "\n\n");
    let text = LINE_BREAK_TAGS.replace_all(&text, "\n");
    let text = LIST_ITEM_CLOSING_TAGS.replace_all(&text, "\n");
    let text = LIST_ITEM_OPENING_TAGS.replace_all(&text, BULLET_MARKER);
    let text = LIST_CONTAINER_TAGS.replace_all(&text, "\n");
    let text = ANY_TAG.replace_all(&text, "");

    let mut text = text.into_owned();
    for (entity, replacement) in ENTITIES {
        if text.contains(entity) {
            text = text.replace(entity, replacement);
        }
    }

    EXCESSIVE_NEWLINES
        .replace_all(&text, "\n\n")
        .trim()
        .to_string()
}

/// Splits normalized text into its paragraphs, which are separated by blank lines. Empty
/// paragraphs are discarded.
pub fn split_paragraphs(text: &str) -> Vec<&str> {
    PARAGRAPH_SEPARATOR
        .split(text)
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .collect()
}
