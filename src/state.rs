//! The server's revisioned state: every indexed folder, the client's
//! capabilities, and the last diagnostics published per folder.
//!
//! Handlers read the current state, compute a new folder map, and commit it
//! through [`State::update_state`], which diffs diagnostics against the
//! previous revision and enqueues exactly the publishes that changed.
//! Commits happen under one write guard on the backend's state cell, so an
//! update is atomic from the client's perspective and `revision` strictly
//! increases.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tower_lsp::lsp_types::ClientCapabilities;

use crate::config::Settings;
use crate::diagnostics::{self, FolderDiagnostics};
use crate::document::Document;
use crate::folder::Folder;
use crate::path::NotePath;
use crate::publish::Publisher;

pub struct State {
    pub client_caps: ClientCapabilities,
    pub settings: Settings,
    /// Retained for future client-specific behavior; currently unused.
    pub client_is_vscode: bool,
    folders: BTreeMap<PathBuf, Folder>,
    revision: u64,
    last_published: HashMap<PathBuf, FolderDiagnostics>,
}

impl State {
    pub fn new(
        client_caps: ClientCapabilities,
        settings: Settings,
        client_is_vscode: bool,
        folders: BTreeMap<PathBuf, Folder>,
    ) -> State {
        State {
            client_caps,
            settings,
            client_is_vscode,
            folders,
            revision: 0,
            last_published: HashMap::new(),
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn folders(&self) -> &BTreeMap<PathBuf, Folder> {
        &self.folders
    }

    /// The folder whose root contains `path`.
    pub fn folder_for(&self, path: &NotePath) -> Option<&Folder> {
        self.folders.values().find(|folder| folder.contains(path))
    }

    pub fn document(&self, path: &NotePath) -> Option<&Document> {
        self.folder_for(path)?.get(path)
    }

    pub fn hierarchical_symbols(&self) -> bool {
        self.client_caps
            .text_document
            .as_ref()
            .and_then(|caps| caps.document_symbol.as_ref())
            .and_then(|caps| caps.hierarchical_document_symbol_support)
            .unwrap_or(false)
    }

    /// Commits a new folder map: recomputes diagnostics, enqueues the
    /// per-path diff for every folder whose diagnostic map changed
    /// (including empty arrays that clear stale diagnostics on the
    /// client), and bumps the revision.
    pub fn update_state(&mut self, folders: BTreeMap<PathBuf, Folder>, publisher: &Publisher) {
        // Folders that disappeared clear whatever they last published.
        let removed_roots: Vec<PathBuf> = self
            .last_published
            .keys()
            .filter(|root| !folders.contains_key(*root))
            .cloned()
            .collect();

        for root in removed_roots {
            if let Some(previous) = self.last_published.remove(&root) {
                for (path, diags) in previous {
                    if !diags.is_empty() {
                        publisher.enqueue(path.uri().clone(), Vec::new());
                    }
                }
            }
        }

        for (root, folder) in &folders {
            let fresh = diagnostics::folder_diagnostics(folder, &self.settings);
            let previous = self.last_published.get(root);

            if previous == Some(&fresh) {
                continue;
            }

            let empty = FolderDiagnostics::new();
            let previous = previous.unwrap_or(&empty);

            for (path, diags) in &fresh {
                if previous.get(path) != Some(diags) {
                    publisher.enqueue(path.uri().clone(), diags.clone());
                }
            }

            // Documents that left the folder clear their diagnostics too.
            for (path, diags) in previous {
                if !fresh.contains_key(path) && !diags.is_empty() {
                    publisher.enqueue(path.uri().clone(), Vec::new());
                }
            }

            self.last_published.insert(root.clone(), fresh);
        }

        self.folders = folders;
        self.revision += 1;
    }

    /// Convenience for handlers that modify a single folder.
    pub fn update_folder(&mut self, folder: Folder, publisher: &Publisher) {
        let mut folders = self.folders.clone();
        folders.insert(folder.root().to_path_buf(), folder);
        self.update_state(folders, publisher);
    }

    pub fn remove_folder(&mut self, root: &Path, publisher: &Publisher) {
        let mut folders = self.folders.clone();
        folders.remove(&crate::path::normalize(root));
        self.update_state(folders, publisher);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::PublishMessage;
    use crate::test_utils::create_test_folder;
    use std::fs;
    use tokio::sync::mpsc;
    use tower_lsp::lsp_types::Url;

    struct Harness {
        publisher: Publisher,
        rx: mpsc::UnboundedReceiver<PublishMessage>,
    }

    impl Harness {
        fn new() -> Harness {
            let (publisher, rx) = Publisher::channel();
            Harness { publisher, rx }
        }

        fn drain(&mut self) -> Vec<(Url, usize)> {
            let mut out = Vec::new();
            while let Ok(message) = self.rx.try_recv() {
                if let PublishMessage::Publish(publish) = message {
                    out.push((publish.uri, publish.diagnostics.len()));
                }
            }
            out
        }
    }

    fn state_with(folder: &Folder) -> State {
        let mut folders = BTreeMap::new();
        folders.insert(folder.root().to_path_buf(), folder.clone());
        State::new(
            ClientCapabilities::default(),
            Settings::default(),
            false,
            folders,
        )
    }

    #[test]
    fn revision_strictly_increases() {
        let (_temp, _dir, folder) = create_test_folder(|dir| {
            fs::write(dir.join("a.md"), "# A\n").unwrap();
        });
        let mut harness = Harness::new();
        let mut state = state_with(&folder);

        assert_eq!(state.revision(), 0);
        state.update_state(state.folders().clone(), &harness.publisher);
        let after_first = state.revision();
        state.update_state(state.folders().clone(), &harness.publisher);

        assert!(after_first > 0);
        assert!(state.revision() > after_first);
        harness.drain();
    }

    #[test]
    fn unchanged_diagnostics_publish_nothing() {
        let (_temp, _dir, folder) = create_test_folder(|dir| {
            fs::write(dir.join("b.md"), "[[a]]").unwrap();
        });
        let mut harness = Harness::new();
        let mut state = state_with(&folder);

        state.update_state(state.folders().clone(), &harness.publisher);
        assert_eq!(harness.drain().len(), 1);

        // Same folders again: the diagnostic map is identical, no publish.
        state.update_state(state.folders().clone(), &harness.publisher);
        assert!(harness.drain().is_empty());
    }

    #[test]
    fn fixing_a_reference_publishes_the_clear() {
        let (_temp, dir, folder) = create_test_folder(|dir| {
            fs::write(dir.join("b.md"), "[[a]]").unwrap();
        });
        let mut harness = Harness::new();
        let mut state = state_with(&folder);

        state.update_state(state.folders().clone(), &harness.publisher);
        let initial = harness.drain();
        assert_eq!(initial.len(), 1);
        assert_eq!(initial[0].1, 1);

        // Create the missing note, as didCreateFiles would.
        fs::write(dir.join("a.md"), "# Hello\n").unwrap();
        let path = crate::path::NotePath::from_fs_path(&dir.join("a.md")).unwrap();
        let document = crate::document::Document::load(&dir, path).unwrap();
        let updated = state.folders()[folder.root()].update_document(document);

        state.update_folder(updated, &harness.publisher);
        let publishes = harness.drain();

        // b.md clears (empty array) and a.md gets its first, empty, set.
        assert_eq!(publishes.len(), 2);
        assert!(publishes.iter().all(|(_, count)| *count == 0));
        assert!(publishes
            .iter()
            .any(|(uri, _)| uri.as_str().ends_with("b.md")));
    }

    #[test]
    fn only_changed_paths_are_republished() {
        let (_temp, dir, folder) = create_test_folder(|dir| {
            fs::write(dir.join("ok.md"), "# Fine\n").unwrap();
            fs::write(dir.join("broken.md"), "[[ghost]]").unwrap();
        });
        let mut harness = Harness::new();
        let mut state = state_with(&folder);

        state.update_state(state.folders().clone(), &harness.publisher);
        harness.drain();

        // Another broken link appears in broken.md; ok.md is untouched.
        fs::write(dir.join("broken.md"), "[[ghost]] [[phantom]]").unwrap();
        let path = crate::path::NotePath::from_fs_path(&dir.join("broken.md")).unwrap();
        let document = crate::document::Document::load(&dir, path).unwrap();
        let updated = state.folders()[folder.root()].update_document(document);

        state.update_folder(updated, &harness.publisher);
        let publishes = harness.drain();

        assert_eq!(publishes.len(), 1);
        assert!(publishes[0].0.as_str().ends_with("broken.md"));
        assert_eq!(publishes[0].1, 2);
    }

    #[test]
    fn removed_folder_clears_its_published_diagnostics() {
        let (_temp, _dir, folder) = create_test_folder(|dir| {
            fs::write(dir.join("b.md"), "[[a]]").unwrap();
        });
        let mut harness = Harness::new();
        let mut state = state_with(&folder);

        state.update_state(state.folders().clone(), &harness.publisher);
        harness.drain();

        state.remove_folder(folder.root(), &harness.publisher);
        let publishes = harness.drain();

        assert_eq!(publishes.len(), 1);
        assert_eq!(publishes[0].1, 0);
    }
}
