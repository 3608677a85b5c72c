//! Wiki reference resolution.
//!
//! A reference resolves within one folder, by note name (basename without
//! `.md`), never by pointer. Note-name matching is case-insensitive; when
//! several notes share a name, the first in sorted canonical-path order
//! wins and the collision is surfaced as a diagnostic.

use crate::document::Document;
use crate::folder::Folder;
use crate::parse::Heading;

#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    pub document: &'a Document,
    pub heading: Option<&'a Heading>,
}

/// Resolves a reference from `source` against `folder`.
///
/// Rules, in order: a missing note name targets the source document
/// itself; otherwise the note name is matched case-insensitively across
/// the folder; a heading part must match the text of some heading in the
/// target (pre-order, trimmed, case-insensitive) or the whole reference is
/// unresolved.
pub fn resolve<'a>(
    folder: &'a Folder,
    source: &'a Document,
    target_note: Option<&str>,
    target_heading: Option<&str>,
) -> Option<Resolved<'a>> {
    let document = match target_note {
        None => source,
        Some(name) => *folder.find_by_note_name(name.trim()).first()?,
    };

    let heading = match target_heading {
        None => None,
        Some(wanted) => Some(find_heading(document, wanted)?),
    };

    Some(Resolved { document, heading })
}

/// First heading in pre-order whose trimmed text matches case-insensitively.
pub fn find_heading<'a>(document: &'a Document, wanted: &str) -> Option<&'a Heading> {
    let wanted = wanted.trim().to_lowercase();

    document
        .headings()
        .into_iter()
        .find(|heading| heading.text.trim().to_lowercase() == wanted)
}

/// Whether more than one note in the folder answers to this name.
pub fn is_ambiguous(folder: &Folder, target_note: &str) -> bool {
    folder.find_by_note_name(target_note.trim()).len() > 1
}
