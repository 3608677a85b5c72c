//! Hover provider.
//!
//! Hovering a reference shows the target as Markdown: the scope text of
//! the referenced heading, or the whole note when the reference names no
//! heading. Disabled entirely via [`Settings::hover`].

use tower_lsp::lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind, Position};

use crate::config::Settings;
use crate::document::Document;
use crate::folder::Folder;
use crate::resolve;

pub fn hover(
    folder: &Folder,
    document: &Document,
    cursor_position: Position,
    settings: &Settings,
) -> Option<Hover> {
    if !settings.hover {
        return None;
    }

    let link = document.reference_at(cursor_position)?;

    let resolved = resolve::resolve(
        folder,
        document,
        link.target_note.as_deref(),
        link.target_heading.as_deref(),
    )?;

    let value = match resolved.heading {
        Some(heading) => resolved.document.text().slice(heading.scope),
        None => resolved.document.text().text(),
    };

    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range: Some(link.range),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_folder;
    use std::fs;

    fn doc_at<'a>(folder: &'a Folder, dir: &std::path::Path, file: &str) -> &'a Document {
        folder
            .get(&crate::path::NotePath::from_fs_path(&dir.join(file)).unwrap())
            .unwrap()
    }

    fn markup(hover: Hover) -> String {
        match hover.contents {
            HoverContents::Markup(content) => content.value,
            other => panic!("expected markup contents, got {:?}", other),
        }
    }

    #[test]
    fn note_link_previews_the_whole_note() {
        let (_temp, dir, folder) = create_test_folder(|dir| {
            fs::write(dir.join("a.md"), "# Hello\nbody\n").unwrap();
            fs::write(dir.join("b.md"), "[[a]]").unwrap();
        });

        let result = hover(
            &folder,
            doc_at(&folder, &dir, "b.md"),
            Position::new(0, 2),
            &Settings::default(),
        )
        .unwrap();

        assert_eq!(markup(result), "# Hello\nbody\n");
    }

    #[test]
    fn heading_link_previews_the_scope() {
        let (_temp, dir, folder) = create_test_folder(|dir| {
            fs::write(dir.join("a.md"), "# One\nintro\n## Two\ndetail\n# Three\n").unwrap();
            fs::write(dir.join("b.md"), "[[a#two]]").unwrap();
        });

        let result = hover(
            &folder,
            doc_at(&folder, &dir, "b.md"),
            Position::new(0, 3),
            &Settings::default(),
        )
        .unwrap();

        assert_eq!(markup(result), "## Two\ndetail\n");
    }

    #[test]
    fn disabled_setting_suppresses_hover() {
        let (_temp, dir, folder) = create_test_folder(|dir| {
            fs::write(dir.join("a.md"), "# Hello\n").unwrap();
            fs::write(dir.join("b.md"), "[[a]]").unwrap();
        });

        let settings = Settings {
            hover: false,
            ..Settings::default()
        };

        assert!(hover(
            &folder,
            doc_at(&folder, &dir, "b.md"),
            Position::new(0, 2),
            &settings,
        )
        .is_none());
    }
}
