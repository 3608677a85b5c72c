//! A note document: text buffer plus its parsed element tree.
//!
//! Elements are derived state; every text change rebuilds them with a full
//! re-parse.

use std::fs;
use std::path::{Path, PathBuf};

use tower_lsp::lsp_types::{DidChangeTextDocumentParams, Position, TextDocumentItem};

use crate::error::{Error, Result};
use crate::parse::{self, Element, Heading, RefLink};
use crate::path::NotePath;
use crate::text::TextBuffer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: PathBuf,
    path: NotePath,
    text: TextBuffer,
    elements: Vec<Element>,
}

impl Document {
    fn assemble(root: &Path, path: NotePath, text: TextBuffer) -> Result<Document> {
        if !path.is_under(root) {
            return Err(Error::BadPath(format!(
                "{} lies outside folder root {}",
                path.as_path().display(),
                root.display()
            )));
        }

        let elements = parse::parse(&text);

        Ok(Document {
            root: root.to_path_buf(),
            path,
            text,
            elements,
        })
    }

    /// Reads the document from disk.
    pub fn load(root: &Path, path: NotePath) -> Result<Document> {
        let contents = fs::read_to_string(path.as_path())?;
        Document::assemble(root, path, TextBuffer::new(&contents))
    }

    /// Builds the document from an LSP `didOpen` payload.
    pub fn from_open(root: &Path, item: &TextDocumentItem) -> Result<Document> {
        let path = NotePath::from_uri(&item.uri)?;
        Document::assemble(root, path, TextBuffer::new(&item.text))
    }

    /// Applies LSP content changes in order, re-parsing the element tree.
    pub fn apply_change(&self, params: &DidChangeTextDocumentParams) -> Result<Document> {
        let mut text = self.text.clone();

        for change in &params.content_changes {
            text = match change.range {
                Some(range) => text.apply_edits(&[(range, change.text.clone())])?,
                None => TextBuffer::new(&change.text),
            };
        }

        Document::assemble(&self.root, self.path.clone(), text)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self) -> &NotePath {
        &self.path
    }

    pub fn text(&self) -> &TextBuffer {
        &self.text
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn note_name(&self) -> Option<&str> {
        self.path.note_name()
    }

    /// All headings in pre-order, the order heading references resolve in.
    pub fn headings(&self) -> Vec<&Heading> {
        let roots = parse::heading_roots(&self.elements);
        roots
            .into_iter()
            .flat_map(|root| parse::headings_preorder(std::slice::from_ref(root)))
            .collect()
    }

    /// All reference elements (wiki links and inline refs), with a flag for
    /// wiki links, which are the only ones that produce diagnostics.
    pub fn references(&self) -> impl Iterator<Item = (&RefLink, bool)> {
        self.elements.iter().filter_map(|element| match element {
            Element::WikiLink(link) => Some((link, true)),
            Element::InlineRef(link) => Some((link, false)),
            Element::Heading(_) => None,
        })
    }

    /// The reference element under the cursor, if any.
    pub fn reference_at(&self, position: Position) -> Option<&RefLink> {
        self.references()
            .map(|(link, _)| link)
            .find(|link| parse::range_contains(&link.range, position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::lsp_types::{
        Range, TextDocumentContentChangeEvent, Url, VersionedTextDocumentIdentifier,
    };

    fn doc(root: &str, file: &str, text: &str) -> Document {
        let path = NotePath::from_fs_path(Path::new(file)).unwrap();
        Document::assemble(Path::new(root), path, TextBuffer::new(text)).unwrap()
    }

    fn change_params(uri: &str, range: Option<Range>, text: &str) -> DidChangeTextDocumentParams {
        DidChangeTextDocumentParams {
            text_document: VersionedTextDocumentIdentifier {
                uri: Url::parse(uri).unwrap(),
                version: 2,
            },
            content_changes: vec![TextDocumentContentChangeEvent {
                range,
                range_length: None,
                text: text.to_string(),
            }],
        }
    }

    #[test]
    fn path_outside_root_is_rejected() {
        let path = NotePath::from_fs_path(Path::new("/elsewhere/a.md")).unwrap();
        let result = Document::assemble(Path::new("/wiki"), path, TextBuffer::new(""));

        assert!(matches!(result, Err(Error::BadPath(_))));
    }

    #[test]
    fn incremental_change_reparses_elements() {
        let document = doc("/wiki", "/wiki/a.md", "# Hello\n");

        let edited = document
            .apply_change(&change_params(
                "file:///wiki/a.md",
                Some(Range {
                    start: Position::new(0, 2),
                    end: Position::new(0, 7),
                }),
                "World",
            ))
            .unwrap();

        assert_eq!(edited.text().text(), "# World\n");
        let headings = edited.headings();
        assert_eq!(headings.len(), 1);
        assert_eq!(headings[0].text, "World");
    }

    #[test]
    fn full_change_replaces_text() {
        let document = doc("/wiki", "/wiki/a.md", "old\n");
        let edited = document
            .apply_change(&change_params("file:///wiki/a.md", None, "# New\n"))
            .unwrap();

        assert_eq!(edited.text().text(), "# New\n");
        assert_eq!(edited.headings().len(), 1);
    }

    #[test]
    fn headings_come_back_in_preorder() {
        let document = doc("/wiki", "/wiki/a.md", "# A\n## B\n# C\n## D\n");
        let texts: Vec<&str> = document
            .headings()
            .iter()
            .map(|h| h.text.as_str())
            .collect();

        assert_eq!(texts, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn reference_at_finds_link_under_cursor() {
        let document = doc("/wiki", "/wiki/b.md", "see [[a]] here\n");

        let link = document.reference_at(Position::new(0, 6)).unwrap();
        assert_eq!(link.target_note.as_deref(), Some("a"));

        assert!(document.reference_at(Position::new(0, 12)).is_none());
    }
}
