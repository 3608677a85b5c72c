use tower_lsp::lsp_types::{Location, Position};

use crate::document::Document;
use crate::folder::Folder;
use crate::resolve;

/// Resolves the reference under the cursor to a single location: the
/// target heading's scope, or the whole target document when the
/// reference names no heading.
pub fn goto_definition(
    folder: &Folder,
    document: &Document,
    cursor_position: Position,
) -> Option<Location> {
    let link = document.reference_at(cursor_position)?;

    let resolved = resolve::resolve(
        folder,
        document,
        link.target_note.as_deref(),
        link.target_heading.as_deref(),
    )?;

    let range = match resolved.heading {
        Some(heading) => heading.scope,
        None => resolved.document.text().full_range(),
    };

    Some(Location {
        uri: resolved.document.path().uri().clone(),
        range,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_folder;
    use std::fs;
    use tower_lsp::lsp_types::Range;

    fn doc_at<'a>(folder: &'a Folder, dir: &std::path::Path, file: &str) -> &'a Document {
        folder
            .get(&crate::path::NotePath::from_fs_path(&dir.join(file)).unwrap())
            .unwrap()
    }

    #[test]
    fn note_link_targets_the_whole_document() {
        let (_temp, dir, folder) = create_test_folder(|dir| {
            fs::write(dir.join("a.md"), "# Hello\n").unwrap();
            fs::write(dir.join("b.md"), "[[a]]").unwrap();
        });

        let location =
            goto_definition(&folder, doc_at(&folder, &dir, "b.md"), Position::new(0, 2)).unwrap();

        assert!(location.uri.as_str().ends_with("a.md"));
        assert_eq!(
            location.range,
            Range {
                start: Position::new(0, 0),
                end: Position::new(1, 0),
            }
        );
    }

    #[test]
    fn heading_link_targets_the_heading_scope() {
        let (_temp, dir, folder) = create_test_folder(|dir| {
            fs::write(dir.join("a.md"), "# One\n## Two\n").unwrap();
            fs::write(dir.join("b.md"), "[[a#two]]").unwrap();
        });

        let location =
            goto_definition(&folder, doc_at(&folder, &dir, "b.md"), Position::new(0, 3)).unwrap();

        assert_eq!(
            location.range,
            Range {
                start: Position::new(1, 0),
                end: Position::new(2, 0),
            }
        );
    }

    #[test]
    fn plain_text_has_no_definition() {
        let (_temp, dir, folder) = create_test_folder(|dir| {
            fs::write(dir.join("a.md"), "just words\n").unwrap();
        });

        assert!(
            goto_definition(&folder, doc_at(&folder, &dir, "a.md"), Position::new(0, 3)).is_none()
        );
    }

    #[test]
    fn broken_link_has_no_definition() {
        let (_temp, dir, folder) = create_test_folder(|dir| {
            fs::write(dir.join("b.md"), "[[ghost]]").unwrap();
        });

        assert!(
            goto_definition(&folder, doc_at(&folder, &dir, "b.md"), Position::new(0, 2)).is_none()
        );
    }

    #[test]
    fn inline_ref_also_resolves() {
        let (_temp, dir, folder) = create_test_folder(|dir| {
            fs::write(dir.join("a.md"), "# Hello\n").unwrap();
            fs::write(dir.join("b.md"), "[go](a)").unwrap();
        });

        let location =
            goto_definition(&folder, doc_at(&folder, &dir, "b.md"), Position::new(0, 2)).unwrap();
        assert!(location.uri.as_str().ends_with("a.md"));
    }
}
