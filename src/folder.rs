//! One indexed workspace folder: a map from canonical note paths to parsed
//! documents.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::document::Document;
use crate::path::{self, NotePath};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub name: String,
    root: PathBuf,
    documents: BTreeMap<NotePath, Document>,
}

impl Folder {
    /// Scans `root` recursively for Markdown files and indexes each one.
    /// Returns `None` when `root` is not a directory; a folder with zero
    /// notes is still a folder.
    pub fn try_load(name: &str, root: &Path) -> Option<Folder> {
        let root = path::normalize(root);
        if !root.is_dir() {
            return None;
        }

        // With follow_links, walkdir compares each followed directory
        // against its ancestors; a symlink cycle becomes an error entry
        // instead of looping, and flatten drops it.
        let md_paths = WalkDir::new(&root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| {
                !entry
                    .file_name()
                    .to_str()
                    .map(|name| name.starts_with('.'))
                    .unwrap_or(false)
            })
            .flatten()
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
            })
            .collect_vec();

        let documents: BTreeMap<NotePath, Document> = md_paths
            .par_iter()
            .flat_map(|entry| {
                let note_path = NotePath::from_fs_path(entry.path()).ok()?;
                let document = Document::load(&root, note_path.clone()).ok()?;
                Some((note_path, document))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .collect();

        Some(Folder {
            name: name.to_string(),
            root,
            documents,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contains(&self, path: &NotePath) -> bool {
        path.is_under(&self.root)
    }

    pub fn get(&self, path: &NotePath) -> Option<&Document> {
        self.documents.get(path)
    }

    /// Documents in sorted canonical-path order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Inserts or replaces a document, returning the new folder value.
    pub fn update_document(&self, document: Document) -> Folder {
        let mut documents = self.documents.clone();
        documents.insert(document.path().clone(), document);

        Folder {
            name: self.name.clone(),
            root: self.root.clone(),
            documents,
        }
    }

    /// Removes a document, returning the new folder value.
    pub fn remove_document(&self, path: &NotePath) -> Folder {
        let mut documents = self.documents.clone();
        documents.remove(path);

        Folder {
            name: self.name.clone(),
            root: self.root.clone(),
            documents,
        }
    }

    /// All documents whose note name matches, case-insensitively, in
    /// sorted canonical-path order. More than one element means the name
    /// is ambiguous in this folder.
    pub fn find_by_note_name(&self, name: &str) -> Vec<&Document> {
        self.documents
            .values()
            .filter(|document| {
                document
                    .note_name()
                    .is_some_and(|candidate| candidate.eq_ignore_ascii_case(name))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_folder_dir;
    use std::fs;

    #[test]
    fn scan_finds_markdown_case_insensitively() {
        let (_temp, dir) = create_test_folder_dir();
        fs::write(dir.join("a.md"), "# A\n").unwrap();
        fs::write(dir.join("b.MD"), "# B\n").unwrap();
        fs::write(dir.join("notes.txt"), "not markdown").unwrap();
        fs::create_dir(dir.join("sub")).unwrap();
        fs::write(dir.join("sub/c.md"), "# C\n").unwrap();

        let folder = Folder::try_load("wiki", &dir).unwrap();
        assert_eq!(folder.len(), 3);
    }

    #[test]
    fn hidden_directories_are_skipped() {
        let (_temp, dir) = create_test_folder_dir();
        fs::create_dir(dir.join(".obsidian")).unwrap();
        fs::write(dir.join(".obsidian/conf.md"), "# hidden\n").unwrap();
        fs::write(dir.join("a.md"), "# A\n").unwrap();

        let folder = Folder::try_load("wiki", &dir).unwrap();
        assert_eq!(folder.len(), 1);
    }

    #[test]
    fn missing_root_yields_none() {
        let (_temp, dir) = create_test_folder_dir();
        assert!(Folder::try_load("gone", &dir.join("missing")).is_none());
    }

    #[test]
    fn empty_root_is_still_a_folder() {
        let (_temp, dir) = create_test_folder_dir();
        let folder = Folder::try_load("empty", &dir).unwrap();
        assert!(folder.is_empty());
    }

    #[test]
    fn update_then_remove_round_trips() {
        let (_temp, dir) = create_test_folder_dir();
        fs::write(dir.join("a.md"), "# A\n").unwrap();
        let folder = Folder::try_load("wiki", &dir).unwrap();

        fs::write(dir.join("b.md"), "# B\n").unwrap();
        let path = NotePath::from_fs_path(&dir.join("b.md")).unwrap();
        let document = Document::load(&dir, path.clone()).unwrap();

        let updated = folder.update_document(document);
        assert_eq!(updated.len(), 2);

        let removed = updated.remove_document(&path);
        assert_eq!(removed, folder);
    }

    #[test]
    fn find_by_note_name_is_case_insensitive_and_sorted() {
        let (_temp, dir) = create_test_folder_dir();
        fs::create_dir(dir.join("sub")).unwrap();
        fs::write(dir.join("sub/Plan.md"), "# sub\n").unwrap();
        fs::write(dir.join("plan.md"), "# top\n").unwrap();

        let folder = Folder::try_load("wiki", &dir).unwrap();
        let matches = folder.find_by_note_name("PLAN");

        assert_eq!(matches.len(), 2);
        // Sorted canonical-path order: <dir>/plan.md before <dir>/sub/Plan.md.
        assert!(matches[0].path().as_path().ends_with("plan.md"));
    }
}
