//! Markdown element parser.
//!
//! Produces the semantic element forest for one document: ATX headings
//! (nested by level, each carrying the scope it governs), wiki links
//! (`[[note]]`, `[[note#heading]]`, `[[#heading]]`) and inline Markdown
//! reference links. The parser is total; anything link-shaped that does not
//! parse is left as plain text.

use once_cell::sync::Lazy;
use regex::Regex;
use tower_lsp::lsp_types::{Position, Range};

use crate::text::TextBuffer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Heading(Heading),
    WikiLink(RefLink),
    InlineRef(RefLink),
}

impl Element {
    pub fn range(&self) -> &Range {
        match self {
            Element::Heading(heading) => &heading.range,
            Element::WikiLink(link) | Element::InlineRef(link) => &link.range,
        }
    }
}

/// An ATX heading. `range` covers the heading line only; `scope` runs from
/// the heading line to the next heading of equal or lower level, or EOF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: u8,
    pub text: String,
    pub range: Range,
    pub scope: Range,
    pub children: Vec<Heading>,
}

/// A reference to another note and/or a heading within it. `target_note`
/// is `None` for in-document references like `[[#heading]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefLink {
    pub target_note: Option<String>,
    pub target_heading: Option<String>,
    pub range: Range,
}

static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}(?<hashes>#{1,6}) +(?<text>.*)$").unwrap());

static WIKI_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[(?<target>[^\[\]\n]+?)\]\]").unwrap());

static INLINE_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(?<display>[^\[\]\n]*)\]\(<?(?<dest>[^()<>\n]*)>?\)").unwrap());

static FENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^ {0,3}(`{3,}|~{3,})").unwrap());

pub fn parse(buffer: &TextBuffer) -> Vec<Element> {
    let text = buffer.text();
    let masked = masked_lines(&text);

    let flat = scan_headings(buffer, &text, &masked);
    let scoped = assign_scopes(buffer, flat);
    let headings = build_tree(scoped);

    let links = scan_wiki_links(buffer, &text, &masked);
    let inline = scan_inline_refs(buffer, &text, &masked);

    let mut elements: Vec<Element> = headings
        .into_iter()
        .map(Element::Heading)
        .chain(links.into_iter().map(Element::WikiLink))
        .chain(inline.into_iter().map(Element::InlineRef))
        .collect();

    elements.sort_by_key(|element| {
        let start = element.range().start;
        (start.line, start.character)
    });

    elements
}

/// Pre-order traversal over a heading forest.
pub fn headings_preorder(headings: &[Heading]) -> Vec<&Heading> {
    let mut out = Vec::new();
    let mut stack: Vec<&Heading> = headings.iter().rev().collect();

    while let Some(heading) = stack.pop() {
        out.push(heading);
        stack.extend(heading.children.iter().rev());
    }

    out
}

/// Top-level headings of an element sequence, in document order.
pub fn heading_roots(elements: &[Element]) -> Vec<&Heading> {
    elements
        .iter()
        .filter_map(|element| match element {
            Element::Heading(heading) => Some(heading),
            _ => None,
        })
        .collect()
}

pub fn range_contains(range: &Range, position: Position) -> bool {
    (range.start.line, range.start.character) <= (position.line, position.character)
        && (position.line, position.character) <= (range.end.line, range.end.character)
}

/// Lines inside fenced or indented code blocks, fence delimiters included.
fn masked_lines(text: &str) -> Vec<bool> {
    let mut masked = Vec::new();
    let mut fence: Option<(char, usize)> = None;

    for line in text.split('\n') {
        match fence {
            Some((ch, len)) => {
                masked.push(true);
                let trimmed = line.trim_start();
                let closing = trimmed.chars().take_while(|c| *c == ch).count();
                if closing >= len && trimmed.chars().all(|c| c == ch || c.is_whitespace()) {
                    fence = None;
                }
            }
            None => {
                if let Some(captures) = FENCE_RE.captures(line) {
                    let delim = &captures[1];
                    fence = Some((delim.chars().next().unwrap(), delim.len()));
                    masked.push(true);
                } else {
                    masked.push(line.starts_with("    ") || line.starts_with('\t'));
                }
            }
        }
    }

    masked
}

fn line_range(buffer: &TextBuffer, line: usize) -> Range {
    let width = buffer
        .line_text(line)
        .map(|text| {
            text.trim_end_matches(['\n', '\r'])
                .encode_utf16()
                .count() as u32
        })
        .unwrap_or(0);

    Range {
        start: Position {
            line: line as u32,
            character: 0,
        },
        end: Position {
            line: line as u32,
            character: width,
        },
    }
}

fn scan_headings(buffer: &TextBuffer, text: &str, masked: &[bool]) -> Vec<Heading> {
    text.split('\n')
        .enumerate()
        .filter(|(line_nr, _)| !masked.get(*line_nr).copied().unwrap_or(false))
        .filter_map(|(line_nr, line)| {
            let captures = HEADING_RE.captures(line)?;

            Some(Heading {
                level: captures["hashes"].len() as u8,
                text: captures["text"].trim_end().to_string(),
                range: line_range(buffer, line_nr),
                scope: Range::default(),
                children: Vec::new(),
            })
        })
        .collect()
}

fn assign_scopes(buffer: &TextBuffer, mut flat: Vec<Heading>) -> Vec<Heading> {
    let eof = buffer.full_range().end;
    let starts: Vec<(Position, u8)> = flat
        .iter()
        .map(|heading| (heading.range.start, heading.level))
        .collect();

    for (index, heading) in flat.iter_mut().enumerate() {
        let end = starts[index + 1..]
            .iter()
            .find(|(_, level)| *level <= heading.level)
            .map(|(start, _)| *start)
            .unwrap_or(eof);

        heading.scope = Range {
            start: heading.range.start,
            end,
        };
    }

    flat
}

/// Re-parents the flat heading list: each heading becomes a child of the
/// nearest preceding heading with a strictly smaller level.
fn build_tree(flat: Vec<Heading>) -> Vec<Heading> {
    let mut roots: Vec<Heading> = Vec::new();
    let mut open: Vec<Heading> = Vec::new();

    fn close(roots: &mut Vec<Heading>, open: &mut Vec<Heading>, done: Heading) {
        match open.last_mut() {
            Some(parent) => parent.children.push(done),
            None => roots.push(done),
        }
    }

    for heading in flat {
        while open.last().is_some_and(|top| top.level >= heading.level) {
            let done = open.pop().unwrap();
            close(&mut roots, &mut open, done);
        }
        open.push(heading);
    }

    while let Some(done) = open.pop() {
        close(&mut roots, &mut open, done);
    }

    roots
}

fn scan_wiki_links(buffer: &TextBuffer, text: &str, masked: &[bool]) -> Vec<RefLink> {
    WIKI_LINK_RE
        .captures_iter(text)
        .filter_map(|captures| {
            let full = captures.get(0)?;
            let payload = captures.name("target")?.as_str().trim();

            let (note, heading) = match payload.split_once('#') {
                Some((note, heading)) => (note, Some(heading)),
                None => (payload, None),
            };

            if note.is_empty() && heading.map_or(true, str::is_empty) {
                return None;
            }

            let range = buffer.byte_range_to_range(full.range());
            if masked
                .get(range.start.line as usize)
                .copied()
                .unwrap_or(false)
            {
                return None;
            }

            Some(RefLink {
                target_note: (!note.is_empty()).then(|| note.to_string()),
                target_heading: heading.filter(|h| !h.is_empty()).map(String::from),
                range,
            })
        })
        .collect()
}

fn scan_inline_refs(buffer: &TextBuffer, text: &str, masked: &[bool]) -> Vec<RefLink> {
    INLINE_LINK_RE
        .captures_iter(text)
        .filter_map(|captures| {
            let full = captures.get(0)?;
            let dest = captures.name("dest")?.as_str().trim();

            if ["http://", "https://", "data:", "mailto:"]
                .iter()
                .any(|scheme| dest.starts_with(scheme))
            {
                return None;
            }

            let dest = dest.replace("%20", " ");
            let (note, heading) = match dest.split_once('#') {
                Some((note, heading)) => (note, Some(heading)),
                None => (dest.as_str(), None),
            };

            // Only extensionless or .md destinations count as note references.
            let note = match note.strip_suffix(".md") {
                Some(stripped) => stripped,
                None if note.rsplit('/').next().is_some_and(|tail| tail.contains('.')) => {
                    return None
                }
                None => note,
            };

            if note.is_empty() && heading.map_or(true, str::is_empty) {
                return None;
            }

            let range = buffer.byte_range_to_range(full.range());
            if masked
                .get(range.start.line as usize)
                .copied()
                .unwrap_or(false)
            {
                return None;
            }

            Some(RefLink {
                target_note: (!note.is_empty()).then(|| note.to_string()),
                target_heading: heading.filter(|h| !h.is_empty()).map(String::from),
                range,
            })
        })
        .collect()
}
