//! Wiki link parsing and rewriting.
//!
//! `[[file#heading|display]]` is parsed into a [`WikiLink`], then either
//! flattened to plain text (title preprocessing) or resolved through a
//! [`PathLookup`] into a markdown link.

use std::borrow::Cow;
use std::sync::LazyLock;

use percent_encoding::{AsciiSet, CONTROLS, NON_ALPHANUMERIC, utf8_percent_encode};

use regex::Regex;
use vaultdown_index::PathLookup;
use vaultdown_shared::{AnchorStyle, StageError, TransformError};

use crate::scan::{
    ExternalLink, InternalLink, scan_embed, scan_external_link, scan_internal_link, scan_verbatim,
};
use crate::stage::{self, Edit, Stage};

// ---------------------------------------------------------------------------
// Link content
// ---------------------------------------------------------------------------

/// The parts of a wiki link's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiLink {
    /// Identifier before the first `#`. Empty for `[[#heading]]`.
    pub file_id: String,
    /// `#`-separated fragments, trimmed, in order.
    pub fragments: Vec<String>,
    /// Text after `|`, trimmed. Empty when absent.
    pub display: String,
}

impl WikiLink {
    /// Split `content` on `|`, then on `#`.
    ///
    /// Whitespace between the file id and the first `#` is rejected.
    pub fn parse(content: &str) -> Result<Self, TransformError> {
        let (identifier, display) = split_display_name(content);
        let mut parts = identifier.split('#');
        let file_id = parts.next().unwrap_or_default();
        let fragments: Vec<String> = parts.map(|f| f.trim_matches([' ', '\t']).to_string()).collect();
        if !fragments.is_empty() && file_id.trim_end_matches([' ', '\t']) != file_id {
            return Err(TransformError::InvalidLinkContent {
                content: identifier.to_string(),
            });
        }
        Ok(Self {
            file_id: file_id.to_string(),
            fragments,
            display,
        })
    }

    /// Text of a converted link: display name, else `file > frag > ...`.
    pub fn link_text(&self) -> String {
        if !self.display.is_empty() {
            return self.display.clone();
        }
        if self.file_id.is_empty() {
            return self.fragments.join(" > ");
        }
        let mut text = self.file_id.clone();
        for fragment in &self.fragments {
            text.push_str(" > ");
            text.push_str(fragment);
        }
        text
    }

    /// Text of a flattened link: display name, else file id, else fragments.
    pub fn plain_text(&self) -> String {
        if !self.display.is_empty() {
            self.display.clone()
        } else if !self.file_id.is_empty() {
            self.file_id.clone()
        } else {
            self.fragments.join(" > ")
        }
    }
}

fn split_display_name(content: &str) -> (&str, String) {
    match content.split_once('|') {
        None => (content, String::new()),
        Some((identifier, display)) => (
            identifier.trim_matches([' ', '\t']),
            display
                .trim_start_matches('|')
                .trim_matches([' ', '\t'])
                .to_string(),
        ),
    }
}

// ---------------------------------------------------------------------------
// Plain text
// ---------------------------------------------------------------------------

struct InternalLinkPlain;

impl Stage for InternalLinkPlain {
    const NAME: &'static str = "internal link plain converter";

    fn probe(&mut self, raw: &[char], ptr: usize) -> Result<Option<Edit>, TransformError> {
        if let Some(edit) = Edit::keep(scan_verbatim(raw, ptr)) {
            return Ok(Some(edit));
        }
        let Some(link) = scan_embed(raw, ptr).or_else(|| scan_internal_link(raw, ptr)) else {
            return Ok(None);
        };
        if link.content.is_empty() {
            return Ok(Edit::replace(link.advance, ""));
        }
        let text = WikiLink::parse(&link.content)?.plain_text();
        Ok(Edit::replace(link.advance, text))
    }
}

/// Replace wiki links and embeds with their plain text. No path resolution.
pub fn links_to_plain_text(raw: &[char]) -> Result<Vec<char>, StageError> {
    stage::run(&mut InternalLinkPlain, raw)
}

// ---------------------------------------------------------------------------
// Link conversion
// ---------------------------------------------------------------------------

/// How converted links are written.
#[derive(Debug, Clone, Default)]
pub struct LinkOptions {
    /// Strip `.md` from targets and complete fragment-only links.
    pub format_link: bool,
    pub anchor_style: AnchorStyle,
    /// Vault-relative path of the document being converted.
    pub self_path: Option<String>,
}

struct LinkConverter<'a> {
    lookup: &'a dyn PathLookup,
    options: &'a LinkOptions,
}

impl Stage for LinkConverter<'_> {
    const NAME: &'static str = "link converter";

    fn probe(&mut self, raw: &[char], ptr: usize) -> Result<Option<Edit>, TransformError> {
        if let Some(edit) = Edit::keep(scan_verbatim(raw, ptr)) {
            return Ok(Some(edit));
        }
        if let Some(embed) = scan_embed(raw, ptr) {
            return self.internal(&embed, true);
        }
        if let Some(link) = scan_internal_link(raw, ptr) {
            return self.internal(&link, false);
        }
        if let Some(link) = scan_external_link(raw, ptr) {
            return self.external(&link);
        }
        Ok(None)
    }
}

impl LinkConverter<'_> {
    fn internal(&self, link: &InternalLink, embed: bool) -> Result<Option<Edit>, TransformError> {
        if link.content.is_empty() {
            return Ok(Edit::replace(link.advance, ""));
        }
        let target = WikiLink::parse(&link.content)?;
        let text = target.link_text();
        let anchor = self.anchor(target.fragments.last().map(String::as_str));

        let reference = if target.file_id.is_empty() {
            match (&self.options.self_path, self.options.format_link) {
                (Some(own), true) => format!("{}{anchor}", self.format_path(own)),
                _ => anchor,
            }
        } else {
            match self.lookup.lookup(&target.file_id)? {
                Some(path) => format!("{}{anchor}", self.format_path(&path)),
                None => return Ok(Edit::replace(link.advance, text)),
            }
        };

        let bang = if embed { "!" } else { "" };
        Ok(Edit::replace(
            link.advance,
            format!("{bang}[{text}]({reference})"),
        ))
    }

    fn external(&self, link: &ExternalLink) -> Result<Option<Edit>, TransformError> {
        let reference = link.reference.as_str();
        if reference.is_empty() || reference.starts_with('#') || has_scheme(reference) {
            return Ok(Edit::keep(link.advance));
        }
        let decoded = percent_decode(reference.strip_prefix("./").unwrap_or(reference));
        let (file_id, fragment) = match decoded.split_once('#') {
            Some((file_id, fragment)) => (file_id, Some(fragment)),
            None => (&*decoded, None),
        };
        let Some(path) = self.lookup.lookup(file_id)? else {
            return Ok(Edit::keep(link.advance));
        };
        Ok(Edit::replace(
            link.advance,
            format!(
                "[{}]({}{})",
                link.display,
                self.format_path(&path),
                self.anchor(fragment)
            ),
        ))
    }

    fn format_path(&self, path: &str) -> String {
        let path = match self.options.format_link {
            true => path.strip_suffix(".md").unwrap_or(path),
            false => path,
        };
        encode_path(path)
    }

    fn anchor(&self, fragment: Option<&str>) -> String {
        match fragment {
            None | Some("") => String::new(),
            Some(block) if block.starts_with('^') => format!("#{block}"),
            Some(heading) => format!("#{}", format_anchor(heading, self.options.anchor_style)),
        }
    }
}

/// Rewrite wiki links, embeds and vault-relative markdown links into markdown
/// links resolved through `lookup`.
pub fn convert_links(
    raw: &[char],
    lookup: &dyn PathLookup,
    options: &LinkOptions,
) -> Result<Vec<char>, StageError> {
    stage::run(&mut LinkConverter { lookup, options }, raw)
}

// ---------------------------------------------------------------------------
// Anchors and encoding
// ---------------------------------------------------------------------------

/// Turn a heading into the anchor a site generator assigns it.
pub fn format_anchor(heading: &str, style: AnchorStyle) -> String {
    static HUGO_DROPPED: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\p{M}\s_-]").expect("valid regex"));
    static WHITESPACE_RUN: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

    let lowered = heading.trim().to_lowercase();
    match style {
        AnchorStyle::Hugo => HUGO_DROPPED
            .replace_all(&lowered, "")
            .chars()
            .map(|c| if c.is_whitespace() { '-' } else { c })
            .collect(),
        AnchorStyle::MarkdownIt => encode_uri_component(&WHITESPACE_RUN.replace_all(&lowered, "-")),
    }
}

fn has_scheme(reference: &str) -> bool {
    match reference.split_once(':') {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Characters escaped in a resolved link target.
const PATH: &AsciiSet = &CONTROLS.add(b' ').add(b'(').add(b')').add(b'%');

/// Everything `encodeURIComponent` escapes.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn encode_path(path: &str) -> String {
    utf8_percent_encode(path, PATH).to_string()
}

fn encode_uri_component(s: &str) -> String {
    utf8_percent_encode(s, URI_COMPONENT).to_string()
}

/// Decode `%XX` escapes. Malformed escapes stay literal; a reference that
/// does not decode to UTF-8 is returned unchanged.
fn percent_decode(s: &str) -> Cow<'_, str> {
    urlencoding::decode(s).unwrap_or(Cow::Borrowed(s))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use vaultdown_index::strict;

    use super::*;

    /// In-memory lookup keyed by exact identifier.
    struct FakeLookup(HashMap<&'static str, &'static str>);

    impl PathLookup for FakeLookup {
        fn lookup(&self, file_id: &str) -> Result<Option<String>, TransformError> {
            Ok(self.0.get(file_id).map(|p| p.to_string()))
        }
    }

    fn vault() -> FakeLookup {
        FakeLookup(HashMap::from([
            ("note", "dir/note.md"),
            ("My Note", "My Note (draft).md"),
            ("pic.png", "assets/pic.png"),
            ("other.md", "deep/other.md"),
        ]))
    }

    fn convert(input: &str, lookup: &dyn PathLookup, options: &LinkOptions) -> String {
        let raw: Vec<char> = input.chars().collect();
        convert_links(&raw, lookup, options)
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn parse_splits_display_then_fragments() {
        let link = WikiLink::parse("note#Head #sub | Shown").unwrap();
        assert_eq!(link.file_id, "note");
        assert_eq!(link.fragments, vec!["Head", "sub"]);
        assert_eq!(link.display, "Shown");
        assert_eq!(link.link_text(), "Shown");

        let link = WikiLink::parse("note#Head#sub").unwrap();
        assert_eq!(link.link_text(), "note > Head > sub");
        assert_eq!(link.plain_text(), "note");

        let link = WikiLink::parse("#Head#sub").unwrap();
        assert_eq!(link.link_text(), "Head > sub");
        assert_eq!(link.plain_text(), "Head > sub");
    }

    #[test]
    fn parse_rejects_space_before_fragment() {
        let err = WikiLink::parse("note #Head").unwrap_err();
        assert_eq!(
            err,
            TransformError::InvalidLinkContent {
                content: "note #Head".into()
            }
        );
        assert!(WikiLink::parse("note with spaces").is_ok());
    }

    #[test]
    fn plain_text_flattens_links_and_embeds() {
        let raw: Vec<char> = "# [[note|Shown]] and [[other]] ![[pic.png]] `[[x]]`"
            .chars()
            .collect();
        let out: String = links_to_plain_text(&raw).unwrap().into_iter().collect();
        assert_eq!(out, "# Shown and other pic.png `[[x]]`");
    }

    #[test]
    fn converts_internal_links_and_embeds() {
        let options = LinkOptions::default();
        assert_eq!(
            convert("see [[note]] and ![[pic.png]]", &vault(), &options),
            "see [note](dir/note.md) and ![pic.png](assets/pic.png)"
        );
        assert_eq!(
            convert("[[My Note#Some Heading|here]]", &vault(), &options),
            "[here](My%20Note%20%28draft%29.md#some-heading)"
        );
        assert_eq!(convert("[[ ]]x", &vault(), &options), "x");
    }

    #[test]
    fn format_link_strips_extension_and_completes_fragments() {
        let options = LinkOptions {
            format_link: true,
            self_path: Some("dir/current.md".into()),
            ..Default::default()
        };
        assert_eq!(
            convert("[[note#Intro]] [[#Local Part]]", &vault(), &options),
            "[note > Intro](dir/note#intro) [Local Part](dir/current#local-part)"
        );
    }

    #[test]
    fn block_references_are_verbatim() {
        let options = LinkOptions::default();
        assert_eq!(
            convert("[[note#^abc123]]", &vault(), &options),
            "[note > ^abc123](dir/note.md#^abc123)"
        );
    }

    #[test]
    fn unresolved_links_depend_on_strictness() {
        let options = LinkOptions::default();
        assert_eq!(
            convert("a [[missing|Gone]] b [x](missing.md)", &vault(), &options),
            "a Gone b [x](missing.md)"
        );

        let lookup = strict(vault());
        let raw: Vec<char> = "ok\n[[missing]]".chars().collect();
        let err = convert_links(&raw, &lookup, &options).unwrap_err();
        assert_eq!(err.stage, "link converter");
        assert_eq!(err.line, 2);
        assert_eq!(
            err.source,
            TransformError::PathNotFound {
                reference: "missing".into()
            }
        );
    }

    #[test]
    fn external_links() {
        let options = LinkOptions::default();
        let input = "[site](https://example.com) [top](#top) [mail](mailto:a@b.c)";
        assert_eq!(convert(input, &vault(), &options), input);
        assert_eq!(
            convert("[o](./other.md#Part%20Two)", &vault(), &options),
            "[o](deep/other.md#part-two)"
        );
    }

    #[test]
    fn malformed_link_fails_with_line() {
        let raw: Vec<char> = "a\nb\n[[note #x]]".chars().collect();
        let err = convert_links(&raw, &vault(), &LinkOptions::default()).unwrap_err();
        assert_eq!(err.line, 3);
        assert!(matches!(err.source, TransformError::InvalidLinkContent { .. }));
    }

    #[test]
    fn anchor_styles() {
        assert_eq!(format_anchor("Hello, World! 2", AnchorStyle::Hugo), "hello-world-2");
        assert_eq!(format_anchor("snake_case-ok", AnchorStyle::Hugo), "snake_case-ok");
        assert_eq!(format_anchor("日本語 見出し", AnchorStyle::Hugo), "日本語-見出し");
        assert_eq!(
            format_anchor("  Hello,   World ", AnchorStyle::MarkdownIt),
            "hello%2C-world"
        );
        assert_eq!(format_anchor("Ä", AnchorStyle::MarkdownIt), "%C3%A4");
    }

    #[test]
    fn scheme_detection() {
        assert!(has_scheme("https://x"));
        assert!(has_scheme("mailto:a@b"));
        assert!(!has_scheme("notes/a.md"));
        assert!(!has_scheme("a b:c"));
        assert!(!has_scheme(":x"));
    }

    #[test]
    fn percent_decoding() {
        assert_eq!(percent_decode("My%20Note.md"), "My Note.md");
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%E3%81%82"), "あ");
    }

    #[test]
    fn malformed_escapes_stay_literal() {
        assert_eq!(percent_decode("a%+1b.md"), "a%+1b.md");
        assert_eq!(percent_decode("a%zzb.md"), "a%zzb.md");
        assert_eq!(percent_decode("a%4"), "a%4");
        assert_eq!(percent_decode("%FF.md"), "%FF.md");

        let lookup = FakeLookup(HashMap::from([("a%+1b.md", "x/a%+1b.md")]));
        assert_eq!(
            convert("[x](a%+1b.md)", &lookup, &LinkOptions::default()),
            "[x](x/a%25+1b.md)"
        );
    }

    #[test]
    fn path_encoding_escapes_reserved_and_non_ascii() {
        assert_eq!(encode_path("My Note (draft).md"), "My%20Note%20%28draft%29.md");
        assert_eq!(encode_path("100%/a-b_c.md"), "100%25/a-b_c.md");
        assert_eq!(encode_path("メモ.md"), "%E3%83%A1%E3%83%A2.md");
        assert_eq!(encode_uri_component("a!~*'()b"), "a!~*'()b");
        assert_eq!(encode_uri_component("a b/c"), "a%20b%2Fc");
    }
}
