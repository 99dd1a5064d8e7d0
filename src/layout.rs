use crate::normalizer::split_paragraphs;

/// Anything able to tell how wide a string renders at a given font size, in millimeters.
pub trait TextMeasure {
    /// The rendered width of `text` at `font_size` points, expressed in millimeters.
    fn text_width(&self, text: &str, font_size: f32) -> f32;
}

impl<T: TextMeasure + ?Sized> TextMeasure for &T {
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        (**self).text_width(text, font_size)
    }
}

/// Greedily wraps a single line of text so that every produced line measures at most `max_width`.
///
/// The text is split on single spaces and words are appended to the current line for as long as
/// the line still fits. A word which alone is wider than `max_width` is never split nor truncated:
/// it is emitted on its own, oversized line.
///
/// # Arguments
///
/// * `text` - The text to be wrapped, which should not contain newlines.
/// * `measure` - Returns the rendered width of a candidate line.
/// * `max_width` - The width that no line (made of more than one word) may exceed.
pub fn wrap_text<F>(text: &str, measure: F, max_width: f32) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in text.split(' ') {
        let candidate = if current_line.is_empty() {
            word.to_string()
        } else {
            format!("{current_line} {word}")
        };

        if measure(&candidate) > max_width && !current_line.is_empty() {
            lines.push(std::mem::replace(&mut current_line, word.to_string()));
        } else {
            current_line = candidate;
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    lines
}

/// A paragraph after wrapping: the sequence of lines it occupies on the page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayoutBlock {
    pub lines: Vec<String>,
}

/// Lays out normalized text: the text is split into paragraphs on blank lines, and every hard
/// line of a paragraph (a list item, or a line break) is wrapped on its own.
pub fn layout_paragraphs<M: TextMeasure>(
    text: &str,
    measure: &M,
    font_size: f32,
    max_width: f32,
) -> Vec<LayoutBlock> {
    split_paragraphs(text)
        .into_iter()
        .map(|paragraph| LayoutBlock {
            lines: paragraph
                .lines()
                .flat_map(|hard_line| {
                    wrap_text(
                        hard_line.trim_end(),
                        |candidate| measure.text_width(candidate, font_size),
                        max_width,
                    )
                })
                .collect(),
        })
        .filter(|block| !block.lines.is_empty())
        .collect()
}
