//! Overview body markup: inline HTML formatting tags toggled around the
//! editor selection, plus a parser that turns the markup into an egui
//! layout for the preview pane. Line breaks typed in the editor are kept.

use egui::{text::LayoutJob, Align, Color32, FontId, Stroke, TextFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Bold,
    Italic,
    Underline,
    Superscript,
    Subscript,
}

impl Format {
    pub const ALL: [Format; 5] = [
        Format::Bold,
        Format::Italic,
        Format::Underline,
        Format::Superscript,
        Format::Subscript,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            Self::Bold => "b",
            Self::Italic => "i",
            Self::Underline => "u",
            Self::Superscript => "sup",
            Self::Subscript => "sub",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Bold => "B",
            Self::Italic => "I",
            Self::Underline => "U",
            Self::Superscript => "x²",
            Self::Subscript => "x₂",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            Self::Bold => "Bold",
            Self::Italic => "Italic",
            Self::Underline => "Underline",
            Self::Superscript => "Superscript",
            Self::Subscript => "Subscript",
        }
    }

    fn from_tag_name(name: &str) -> Option<Self> {
        match name {
            "b" | "strong" => Some(Self::Bold),
            "i" | "em" => Some(Self::Italic),
            "u" | "ins" => Some(Self::Underline),
            "sup" => Some(Self::Superscript),
            "sub" => Some(Self::Subscript),
            _ => None,
        }
    }

    /// Superscript and subscript exclude each other.
    fn counterpart(self) -> Option<Self> {
        match self {
            Self::Superscript => Some(Self::Subscript),
            Self::Subscript => Some(Self::Superscript),
            _ => None,
        }
    }

    fn opening(self) -> String {
        format!("<{}>", self.tag())
    }

    fn closing(self) -> String {
        format!("</{}>", self.tag())
    }

    fn bit(self) -> u8 {
        1 << self as u8
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatSet(u8);

impl FormatSet {
    pub fn contains(self, format: Format) -> bool {
        self.0 & format.bit() != 0
    }

    pub fn insert(&mut self, format: Format) {
        self.0 |= format.bit();
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Open-tag nesting per format.
#[derive(Debug, Default)]
struct Depth([u16; 5]);

impl Depth {
    fn apply(&mut self, format: Format, closing: bool) {
        let slot = &mut self.0[format as usize];
        if closing {
            *slot = slot.saturating_sub(1);
        } else {
            *slot += 1;
        }
    }

    fn active(&self) -> FormatSet {
        let mut set = FormatSet::default();
        for format in Format::ALL {
            if self.0[format as usize] > 0 {
                set.insert(format);
            }
        }
        set
    }
}

/// Editor selection in character offsets, `start <= end`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn new(a: usize, b: usize) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn cursor(at: usize) -> Self {
        Self { start: at, end: at }
    }
}

fn byte_offset(text: &str, char_index: usize) -> usize {
    text.char_indices()
        .nth(char_index)
        .map_or(text.len(), |(offset, _)| offset)
}

/// Adds or removes `format` around the selection. Returns the new text and
/// the selection covering the same content. An empty selection gets an
/// empty tag pair with the cursor inside.
pub fn toggle_format(text: &str, selection: Selection, format: Format) -> (String, Selection) {
    let start = byte_offset(text, selection.start);
    let end = byte_offset(text, selection.end).max(start);
    let open = format.opening();
    let close = format.closing();
    let selected = &text[start..end];

    if text[..start].ends_with(&open) && text[end..].starts_with(&close) {
        let mut out = String::with_capacity(text.len());
        out.push_str(&text[..start - open.len()]);
        out.push_str(selected);
        out.push_str(&text[end + close.len()..]);
        let shift = open.len();
        return (
            out,
            Selection::new(selection.start - shift, selection.end - shift),
        );
    }

    if selected.len() >= open.len() + close.len()
        && selected.starts_with(&open)
        && selected.ends_with(&close)
    {
        let inner = &selected[open.len()..selected.len() - close.len()];
        let out = format!("{}{}{}", &text[..start], inner, &text[end..]);
        return (
            out,
            Selection::new(selection.start, selection.start + inner.chars().count()),
        );
    }

    if let Some(other) = format.counterpart() {
        if text[..start].ends_with(&other.opening()) && text[end..].starts_with(&other.closing())
        {
            let (unwrapped, inner) = toggle_format(text, selection, other);
            return toggle_format(&unwrapped, inner, format);
        }
    }

    let out = format!("{}{open}{selected}{close}{}", &text[..start], &text[end..]);
    let shift = open.len();
    (
        out,
        Selection::new(selection.start + shift, selection.end + shift),
    )
}

/// Formats in effect for text typed at `char_index`.
pub fn formats_at(text: &str, char_index: usize) -> FormatSet {
    let limit = byte_offset(text, char_index);
    let mut depth = Depth::default();
    for token in tokenize(text) {
        if token.end > limit {
            break;
        }
        if let Token::Tag { name, closing, .. } = &token.token {
            if let Some(format) = Format::from_tag_name(name) {
                depth.apply(format, *closing);
            }
        }
    }
    depth.active()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledSpan {
    pub text: String,
    pub formats: FormatSet,
}

pub fn parse_markup(markup: &str) -> Vec<StyledSpan> {
    let mut depth = Depth::default();
    let mut spans: Vec<StyledSpan> = Vec::new();
    for token in tokenize(markup) {
        match token.token {
            Token::Text(raw) => push_span(&mut spans, &decode_entities(raw), depth.active()),
            Token::Tag {
                name,
                closing,
                self_closing,
            } => {
                if let Some(format) = Format::from_tag_name(&name) {
                    if !self_closing {
                        depth.apply(format, closing);
                    }
                } else if breaks_line(&name, closing) {
                    push_span(&mut spans, "\n", depth.active());
                }
            }
        }
    }

    while let Some(last) = spans.last_mut() {
        let trimmed = last.text.trim_end_matches('\n').len();
        last.text.truncate(trimmed);
        if !last.text.is_empty() {
            break;
        }
        spans.pop();
    }
    spans
}

fn push_span(spans: &mut Vec<StyledSpan>, text: &str, formats: FormatSet) {
    if text.is_empty() {
        return;
    }
    match spans.last_mut() {
        Some(last) if last.formats == formats => last.text.push_str(text),
        _ => spans.push(StyledSpan {
            text: text.to_string(),
            formats,
        }),
    }
}

fn breaks_line(name: &str, closing: bool) -> bool {
    name == "br"
        || (closing
            && matches!(
                name,
                "p" | "div" | "li" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
            ))
}

#[derive(Debug, Clone, Copy)]
pub struct PreviewStyle {
    pub font_size: f32,
    pub color: Color32,
    pub strong_color: Color32,
}

pub fn layout_job(spans: &[StyledSpan], style: &PreviewStyle) -> LayoutJob {
    let mut job = LayoutJob::default();
    for span in spans {
        let formats = span.formats;
        let shifted =
            formats.contains(Format::Superscript) || formats.contains(Format::Subscript);
        let size = if shifted {
            style.font_size * 0.7
        } else {
            style.font_size
        };
        let valign = if formats.contains(Format::Superscript) {
            Align::TOP
        } else if formats.contains(Format::Subscript) {
            Align::BOTTOM
        } else {
            Align::Center
        };
        let color = if formats.contains(Format::Bold) {
            style.strong_color
        } else {
            style.color
        };
        let underline = if formats.contains(Format::Underline) {
            Stroke::new(1.0, color)
        } else {
            Stroke::NONE
        };
        job.append(
            &span.text,
            0.0,
            TextFormat {
                font_id: FontId::proportional(size),
                color,
                italics: formats.contains(Format::Italic),
                underline,
                valign,
                ..Default::default()
            },
        );
    }
    job
}

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Text(&'a str),
    Tag {
        name: String,
        closing: bool,
        self_closing: bool,
    },
}

#[derive(Debug)]
struct Spanned<'a> {
    end: usize,
    token: Token<'a>,
}

fn tokenize(text: &str) -> Vec<Spanned<'_>> {
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut cursor = 0;
    while let Some(found) = text[cursor..].find('<') {
        let lt = cursor + found;
        let Some(length) = text[lt..].find('>') else {
            break;
        };
        let gt = lt + length;
        match parse_tag(&text[lt + 1..gt]) {
            Some(tag) => {
                if lt > text_start {
                    tokens.push(Spanned {
                        end: lt,
                        token: Token::Text(&text[text_start..lt]),
                    });
                }
                tokens.push(Spanned {
                    end: gt + 1,
                    token: tag,
                });
                text_start = gt + 1;
                cursor = gt + 1;
            }
            None => cursor = lt + 1,
        }
    }
    if text_start < text.len() {
        tokens.push(Spanned {
            end: text.len(),
            token: Token::Text(&text[text_start..]),
        });
    }
    tokens
}

/// `None` when the bracketed text is not a tag, e.g. `a < b > c`.
fn parse_tag(inner: &str) -> Option<Token<'static>> {
    if inner.starts_with('!') || inner.starts_with('?') {
        return Some(Token::Tag {
            name: String::new(),
            closing: false,
            self_closing: true,
        });
    }
    let (closing, body) = match inner.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, inner),
    };
    if !body.starts_with(|ch: char| ch.is_ascii_alphabetic()) {
        return None;
    }
    let name = body
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    Some(Token::Tag {
        name,
        closing,
        self_closing: body.trim_end().ends_with('/'),
    })
}

fn decode_entities(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|semi| *semi <= 10)
            .and_then(|semi| decode_entity(&tail[1..semi]).map(|ch| (ch, semi)));
        match decoded {
            Some((ch, semi)) => {
                out.push(ch);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let digits = name.strip_prefix('#')?;
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
#[path = "tests/rich_text_tests.rs"]
mod tests;
