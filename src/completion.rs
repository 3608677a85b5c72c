//! Completion inside partially typed wiki links.
//!
//! With the cursor after `[[` and before any `]]`, candidates are the
//! folder's note names; once the partial contains a `#`, candidates become
//! the headings of the already resolved target note. Matching is
//! case-insensitive substring; candidates come back sorted by name.

use itertools::Itertools;
use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionList, CompletionResponse, Position,
};

use crate::config::Settings;
use crate::document::Document;
use crate::folder::Folder;
use crate::resolve;

pub fn get_completions(
    folder: &Folder,
    document: &Document,
    position: Position,
    settings: &Settings,
) -> Option<CompletionResponse> {
    let partial = partial_link(document, position)?;

    let items = match partial.split_once('#') {
        Some((note_part, heading_part)) => {
            if !settings.heading_completions {
                return None;
            }
            heading_candidates(folder, document, note_part, heading_part)
        }
        None => note_candidates(folder, &partial),
    };

    if items.is_empty() {
        return None;
    }

    Some(CompletionResponse::List(CompletionList {
        is_incomplete: true,
        items,
    }))
}

/// The text between the nearest unclosed `[[` and the cursor, if the
/// cursor sits inside a wiki link under construction.
fn partial_link(document: &Document, position: Position) -> Option<String> {
    let line = document.text().line_text(position.line as usize)?;
    let prefix = utf16_prefix(&line, position.character as usize);

    let open = prefix.rfind("[[")?;
    let partial = &prefix[open + 2..];

    if partial.contains("]]") {
        return None;
    }

    Some(partial.to_string())
}

fn note_candidates(folder: &Folder, partial: &str) -> Vec<CompletionItem> {
    let needle = partial.trim().to_lowercase();

    folder
        .documents()
        .filter_map(|document| document.note_name())
        .filter(|name| name.to_lowercase().contains(&needle))
        .unique()
        .sorted()
        .map(|name| CompletionItem {
            label: name.to_string(),
            kind: Some(CompletionItemKind::FILE),
            ..Default::default()
        })
        .collect()
}

fn heading_candidates(
    folder: &Folder,
    document: &Document,
    note_part: &str,
    heading_part: &str,
) -> Vec<CompletionItem> {
    let target_note = {
        let trimmed = note_part.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    };

    let Some(resolved) = resolve::resolve(folder, document, target_note, None) else {
        return Vec::new();
    };

    let needle = heading_part.trim().to_lowercase();

    resolved
        .document
        .headings()
        .into_iter()
        .map(|heading| heading.text.as_str())
        .filter(|text| text.to_lowercase().contains(&needle))
        .unique()
        .sorted()
        .map(|text| CompletionItem {
            label: text.to_string(),
            kind: Some(CompletionItemKind::REFERENCE),
            ..Default::default()
        })
        .collect()
}

/// The prefix of `line` covering `cu` UTF-16 code units.
fn utf16_prefix(line: &str, cu: usize) -> &str {
    let mut taken = 0;
    for (idx, ch) in line.char_indices() {
        if taken >= cu {
            return &line[..idx];
        }
        taken += ch.len_utf16();
    }
    line
}
