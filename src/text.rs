//! String helpers for slugs, excerpts and cleaning extracted or generated text.

use regex::Regex;
use std::sync::OnceLock;

/// URL slug: accents transliterated, lowercase, punctuation dropped,
/// whitespace and dashes collapsed into single `-`.
///
/// Punctuation is removed rather than replaced, so `l'homme` becomes `lhomme`.
pub fn slugify(input: &str) -> String {
    let mut ascii = String::with_capacity(input.len());
    for c in input.chars().flat_map(char::to_lowercase) {
        match transliterate(c) {
            Some(s) => ascii.push_str(s),
            None => ascii.push(c),
        }
    }

    let mut slug = String::with_capacity(ascii.len());
    let mut pending_dash = false;
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else if c == '-' || c == '_' || c.is_whitespace() {
            pending_dash = true;
        }
    }
    slug
}

fn transliterate(c: char) -> Option<&'static str> {
    let s = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => "a",
        'æ' => "ae",
        'ç' => "c",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'ñ' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => "o",
        'œ' => "oe",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'ý' | 'ÿ' => "y",
        'ß' => "ss",
        _ => return None,
    };
    Some(s)
}

/// Truncates to `limit` characters and appends `...` when something was cut.
pub fn limit(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let cut: String = text.chars().take(limit).collect();
    format!("{}...", cut.trim_end())
}

/// Normalizes text extracted from a PDF for storage and analysis:
/// line breaks and tabs become spaces, other control characters are
/// dropped and whitespace runs collapse to one space.
pub fn clean_extracted_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = true;
    for c in text.chars() {
        let c = if c.is_whitespace() {
            ' '
        } else if c.is_control() {
            continue;
        } else {
            c
        };
        if c == ' ' {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(c);
            last_space = false;
        }
    }
    out.trim_end().to_string()
}

/// Variant used by the dashboard import flow: also drops form feeds and
/// turns non-breaking spaces into plain spaces before collapsing.
pub fn clean_pdf_text(text: &str) -> String {
    let replaced: String = text
        .chars()
        .filter(|c| *c != '\u{000C}')
        .map(|c| if c == '\u{00A0}' { ' ' } else { c })
        .collect();
    clean_extracted_text(&replaced)
}

fn think_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").unwrap())
}

fn blank_lines_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").unwrap())
}

/// Removes `<think>...</think>` reasoning blocks emitted by some models.
pub fn strip_think_tags(text: &str) -> String {
    think_re().replace_all(text, "").into_owned()
}

/// Collapses three or more consecutive newlines into a blank line.
pub fn collapse_blank_lines(text: &str) -> String {
    blank_lines_re().replace_all(text, "\n\n").into_owned()
}

/// File name without directory or extension.
pub fn file_stem(file_name: &str) -> String {
    std::path::Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
