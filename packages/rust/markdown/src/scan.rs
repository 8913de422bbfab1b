//! Character-level probes for the wiki markdown dialect.
//!
//! Every probe answers "does construct X start at `ptr`?" over a rune slice and
//! reports how many runes the construct spans. An advance of `0` (or `None`)
//! means the construct is not there. Probes never mutate their input, and an
//! advance never exceeds `raw.len() - ptr`.
//!
//! An opener preceded by an odd run of backslashes is literal text.

// ---------------------------------------------------------------------------
// Probe results
// ---------------------------------------------------------------------------

/// A `#`-header at the start of a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Runes up to and including the terminating newline.
    pub advance: usize,
    /// Number of leading `#`.
    pub level: usize,
    /// Header text, trimmed.
    pub text: String,
}

/// A `[[...]]` internal link or `![[...]]` embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalLink {
    pub advance: usize,
    /// Trimmed text between the brackets. Empty for `[[ ]]`.
    pub content: String,
}

/// A `[display](ref)` link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalLink {
    pub advance: usize,
    pub display: String,
    pub reference: String,
}

/// An inline `#tag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub advance: usize,
    /// Tag text without the leading `#`.
    pub name: String,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Whether the rune at `ptr` is preceded by an odd run of backslashes.
pub fn is_escaped(raw: &[char], ptr: usize) -> bool {
    raw[..ptr.min(raw.len())]
        .iter()
        .rev()
        .take_while(|&&c| c == '\\')
        .count()
        % 2
        == 1
}

fn starts_with(raw: &[char], ptr: usize, pat: &str) -> bool {
    let mut at = ptr;
    for c in pat.chars() {
        if raw.get(at) != Some(&c) {
            return false;
        }
        at += 1;
    }
    true
}

/// `pat` starts at `ptr` and its first rune is not escaped.
pub fn unescaped(raw: &[char], ptr: usize, pat: &str) -> bool {
    starts_with(raw, ptr, pat) && !is_escaped(raw, ptr)
}

/// Index of the first occurrence of `pat` at or after `from`.
fn find(raw: &[char], from: usize, pat: &str) -> Option<usize> {
    (from..raw.len()).find(|&at| starts_with(raw, at, pat))
}

/// Index of the first unescaped occurrence of `pat` at or after `from`.
fn find_unescaped(raw: &[char], from: usize, pat: &str) -> Option<usize> {
    (from..raw.len()).find(|&at| unescaped(raw, at, pat))
}

/// Length of the run of `c` starting at `ptr`.
pub fn scan_repeat(raw: &[char], ptr: usize, c: char) -> usize {
    raw.get(ptr..)
        .map_or(0, |rest| rest.iter().take_while(|&&x| x == c).count())
}

/// Whether `span` contains a blank line, i.e. a paragraph break.
fn crosses_blank_line(span: &[char]) -> bool {
    span.iter().enumerate().any(|(i, &c)| {
        c == '\n'
            && span[i + 1..]
                .iter()
                .take_while(|&&n| n != '\n')
                .all(|&n| matches!(n, ' ' | '\t' | '\r'))
            && span[i + 1..].contains(&'\n')
    })
}

fn trim(runes: &[char], set: &[char]) -> String {
    let s: String = runes.iter().collect();
    s.trim_matches(|c| set.contains(&c)).to_string()
}

/// An unclosed fence swallows the rest of the input only when it ends with a newline.
fn unterminated(raw: &[char], ptr: usize) -> usize {
    if raw.last() == Some(&'\n') {
        raw.len() - ptr
    } else {
        0
    }
}

/// 1-based line number of the rune at `ptr`.
pub fn line_at(raw: &[char], ptr: usize) -> usize {
    raw[..ptr.min(raw.len())]
        .iter()
        .filter(|&&c| c == '\n')
        .count()
        + 1
}

// ---------------------------------------------------------------------------
// Code and math
// ---------------------------------------------------------------------------

/// `` `code` ``. The span may not cross a blank line.
pub fn scan_inline_code(raw: &[char], ptr: usize) -> usize {
    if !unescaped(raw, ptr, "`") {
        return 0;
    }
    let Some(close) = find_unescaped(raw, ptr + 1, "`") else {
        return 0;
    };
    if crosses_blank_line(&raw[ptr + 1..close]) {
        return 0;
    }
    close + 1 - ptr
}

/// `$math$`. Rejected when empty, when the opener is followed by a space, when the
/// closer is preceded by whitespace, or when the span crosses a blank line.
pub fn scan_inline_math(raw: &[char], ptr: usize) -> usize {
    if !unescaped(raw, ptr, "$") || matches!(raw.get(ptr + 1), Some(' ' | '\t')) {
        return 0;
    }
    let Some(close) = find_unescaped(raw, ptr + 1, "$") else {
        return 0;
    };
    if close == ptr + 1
        || raw[close - 1].is_whitespace()
        || crosses_blank_line(&raw[ptr + 1..close])
    {
        return 0;
    }
    close + 1 - ptr
}

/// A backtick fence of length `L >= 3`.
///
/// On a single line the closer must be exactly `L` long; across lines the first
/// run of at least `L` backticks closes the block.
pub fn scan_code_block(raw: &[char], ptr: usize) -> usize {
    if !unescaped(raw, ptr, "```") {
        return 0;
    }
    let open = scan_repeat(raw, ptr, '`');
    let body = ptr + open;

    let Some(close) = find(raw, body, "```") else {
        return unterminated(raw, ptr);
    };
    let close_len = scan_repeat(raw, close, '`');
    if !raw[ptr..close + close_len].contains(&'\n') {
        return if close_len == open {
            close + close_len - ptr
        } else {
            0
        };
    }

    let fence = "`".repeat(open);
    match find(raw, close, &fence) {
        Some(close) => close + scan_repeat(raw, close, '`') - ptr,
        None => unterminated(raw, ptr),
    }
}

/// A `$$` math block.
pub fn scan_math_block(raw: &[char], ptr: usize) -> usize {
    if !unescaped(raw, ptr, "$$") {
        return 0;
    }
    let mut from = ptr + 2;
    loop {
        let Some(close) = find_unescaped(raw, from, "$$") else {
            return unterminated(raw, ptr);
        };
        if valid_math_closing(raw, ptr, close) {
            return close + 2 - ptr;
        }
        from = close + 2;
    }
}

fn valid_math_closing(raw: &[char], open: usize, close: usize) -> bool {
    let rest = &raw[close + 2..];
    if rest.iter().all(|&c| matches!(c, ' ' | '\r' | '\n')) {
        return true;
    }
    // Inline blocks may be followed by anything.
    if !raw[open..close].contains(&'\n') {
        return true;
    }
    match rest.iter().position(|&c| c == '\n') {
        Some(eol) => rest[..eol].iter().all(|&c| matches!(c, ' ' | '\r')),
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Block structure
// ---------------------------------------------------------------------------

/// One or more `#` at the start of a line, followed by a space or newline.
pub fn scan_header(raw: &[char], ptr: usize) -> Option<Header> {
    if !unescaped(raw, ptr, "#") {
        return None;
    }
    let indented_by_spaces = raw[..ptr]
        .iter()
        .rev()
        .take_while(|&&c| c != '\n')
        .all(|&c| c == ' ');
    if !indented_by_spaces {
        return None;
    }

    let level = scan_repeat(raw, ptr, '#');
    let cur = ptr + level;
    match raw.get(cur) {
        Some(' ' | '\n') => {}
        Some('\r') if raw.get(cur + 1) == Some(&'\n') => {}
        _ => return None,
    }

    let end = find(raw, cur, "\n").map_or(raw.len(), |eol| eol + 1);
    Some(Header {
        advance: end - ptr,
        level,
        text: trim(&raw[cur..end], &[' ', '\t', '\r', '\n']),
    })
}

/// `\` plus any rune.
pub fn scan_escaped(raw: &[char], ptr: usize) -> usize {
    if unescaped(raw, ptr, "\\") && ptr + 1 < raw.len() {
        2
    } else {
        0
    }
}

// ---------------------------------------------------------------------------
// Links and tags
// ---------------------------------------------------------------------------

/// `[[...]]` on a single line, at least five runes long.
pub fn scan_internal_link(raw: &[char], ptr: usize) -> Option<InternalLink> {
    if !unescaped(raw, ptr, "[[") || raw.len() - ptr < 5 {
        return None;
    }
    let start = ptr + 2;
    let close = find(raw, start, "]]")?;
    if close == start {
        return None;
    }
    let inner = &raw[start..close];
    if inner.iter().any(|&c| c == '\n' || c == '\r') {
        return None;
    }
    Some(InternalLink {
        advance: close + 2 - ptr,
        content: trim(inner, &[' ', '\t']),
    })
}

/// `![[...]]`.
pub fn scan_embed(raw: &[char], ptr: usize) -> Option<InternalLink> {
    if !unescaped(raw, ptr, "![[") {
        return None;
    }
    let link = scan_internal_link(raw, ptr + 1)?;
    Some(InternalLink {
        advance: link.advance + 1,
        content: link.content,
    })
}

/// `[display](ref)`: the display holds no unescaped `]`, neither part crosses a
/// blank line, and the ref holds no whitespace.
pub fn scan_external_link(raw: &[char], ptr: usize) -> Option<ExternalLink> {
    if !unescaped(raw, ptr, "[") || raw.len() - ptr < 5 {
        return None;
    }
    let start = ptr + 1;
    let mid = find_unescaped(raw, start, "](")?;
    let display = &raw[start..mid];
    let bare_bracket = display
        .iter()
        .enumerate()
        .any(|(i, &c)| c == ']' && !is_escaped(raw, start + i));
    if bare_bracket || crosses_blank_line(display) {
        return None;
    }

    let ref_start = mid + 2;
    let close = find_unescaped(raw, ref_start, ")")?;
    let reference = &raw[ref_start..close];
    if crosses_blank_line(reference) {
        return None;
    }
    let reference = trim(reference, &[' ', '\t', '\r', '\n']);
    if reference.chars().any(char::is_whitespace) {
        return None;
    }

    Some(ExternalLink {
        advance: close + 1 - ptr,
        display: trim(display, &[' ', '\t', '\r', '\n']),
        reference,
    })
}

fn tag_rune(c: char) -> bool {
    c.is_alphabetic() || c.is_numeric() || matches!(c, '-' | '_' | '/')
}

/// `#` followed by a letter, digit or underscore, then the longest run of
/// letters, digits, `-`, `_` and `/`.
pub fn scan_tag(raw: &[char], ptr: usize) -> Option<Tag> {
    if !unescaped(raw, ptr, "#") {
        return None;
    }
    let first = *raw.get(ptr + 1)?;
    if !(first.is_alphabetic() || first.is_numeric() || first == '_') {
        return None;
    }
    let end = ptr + 1 + raw[ptr + 1..].iter().take_while(|&&c| tag_rune(c)).count();
    Some(Tag {
        advance: end - ptr,
        name: raw[ptr + 1..end].iter().collect(),
    })
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

/// `%%...%%` with the same fence length on both sides. Unclosed comments run
/// to the end of the input.
pub fn scan_comment(raw: &[char], ptr: usize) -> usize {
    if !unescaped(raw, ptr, "%%") {
        return 0;
    }
    let len = scan_repeat(raw, ptr, '%');
    let fence = "%".repeat(len);
    match find(raw, ptr + len, &fence) {
        Some(close) => close + len - ptr,
        None => raw.len() - ptr,
    }
}

/// `<!-- ... -->`, or to the end of the input when unclosed.
pub fn scan_html_comment(raw: &[char], ptr: usize) -> usize {
    if !unescaped(raw, ptr, "<!--") {
        return 0;
    }
    match find(raw, ptr + 4, "-->") {
        Some(close) => close + 3 - ptr,
        None => raw.len() - ptr,
    }
}

/// Regions every stage copies through untouched: code, math and escapes.
pub fn scan_verbatim(raw: &[char], ptr: usize) -> usize {
    const PROBES: [fn(&[char], usize) -> usize; 5] = [
        scan_code_block,
        scan_math_block,
        scan_inline_code,
        scan_inline_math,
        scan_escaped,
    ];
    PROBES
        .iter()
        .map(|probe| probe(raw, ptr))
        .find(|&advance| advance > 0)
        .unwrap_or(0)
}
