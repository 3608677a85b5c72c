//! Per-folder diagnostics: broken wiki references, ambiguous reference
//! targets, duplicate headings.
//!
//! The returned map carries an entry for every document in the folder,
//! empty arrays included, so the state manager can diff revisions and
//! publish "cleared" diagnostics.

use std::collections::BTreeMap;

use itertools::Itertools;
use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity};

use crate::config::Settings;
use crate::document::Document;
use crate::folder::Folder;
use crate::path::NotePath;
use crate::resolve;

pub const SOURCE: &str = "cairn";

pub type FolderDiagnostics = BTreeMap<NotePath, Vec<Diagnostic>>;

pub fn folder_diagnostics(folder: &Folder, settings: &Settings) -> FolderDiagnostics {
    let broken_counts = settings
        .broken_link_diagnostics
        .then(|| count_broken_references(folder))
        .unwrap_or_default();

    folder
        .documents()
        .map(|document| {
            let mut diags = Vec::new();

            if settings.broken_link_diagnostics {
                diags.extend(reference_diagnostics(folder, document, &broken_counts));
            }
            diags.extend(duplicate_heading_diagnostics(document));

            (document.path().clone(), diags)
        })
        .collect()
}

fn reference_diagnostics(
    folder: &Folder,
    document: &Document,
    broken_counts: &BTreeMap<String, usize>,
) -> Vec<Diagnostic> {
    document
        .references()
        .filter(|(_, is_wiki)| *is_wiki)
        .flat_map(|(link, _)| {
            let mut diags = Vec::new();

            let resolved = resolve::resolve(
                folder,
                document,
                link.target_note.as_deref(),
                link.target_heading.as_deref(),
            );

            if resolved.is_none() {
                let uses = broken_counts
                    .get(&reference_key(
                        link.target_note.as_deref(),
                        link.target_heading.as_deref(),
                    ))
                    .copied()
                    .unwrap_or(1);

                let message = match uses {
                    n if n > 1 => format!("Unresolved reference, used {} times", n),
                    _ => "Unresolved reference".to_string(),
                };

                diags.push(Diagnostic {
                    range: link.range,
                    severity: Some(DiagnosticSeverity::WARNING),
                    source: Some(SOURCE.into()),
                    message,
                    ..Default::default()
                });
            }

            // Ambiguity is a property of the note-name lookup alone; a link
            // whose heading part later fails to resolve still hit it.
            if let Some(target) = link.target_note.as_deref() {
                if resolve::is_ambiguous(folder, target) {
                    diags.push(Diagnostic {
                        range: link.range,
                        severity: Some(DiagnosticSeverity::WARNING),
                        source: Some(SOURCE.into()),
                        message: format!(
                            "Ambiguous reference: multiple notes are named \"{}\"",
                            target
                        ),
                        ..Default::default()
                    });
                }
            }

            diags
        })
        .collect()
}

/// Headings whose trimmed, case-folded text repeats within one document.
/// Resolution still picks the first occurrence; these are informational.
fn duplicate_heading_diagnostics(document: &Document) -> Vec<Diagnostic> {
    document
        .headings()
        .into_iter()
        .into_group_map_by(|heading| heading.text.trim().to_lowercase())
        .into_values()
        .filter(|group| group.len() > 1)
        .flat_map(|group| group.into_iter().skip(1))
        .map(|heading| Diagnostic {
            range: heading.range,
            severity: Some(DiagnosticSeverity::INFORMATION),
            source: Some(SOURCE.into()),
            message: format!("Duplicate heading \"{}\" in this note", heading.text),
            ..Default::default()
        })
        .sorted_by_key(|diag| (diag.range.start.line, diag.range.start.character))
        .collect()
}

fn reference_key(target_note: Option<&str>, target_heading: Option<&str>) -> String {
    format!(
        "{}#{}",
        target_note.unwrap_or_default().trim().to_lowercase(),
        target_heading.unwrap_or_default().trim().to_lowercase()
    )
}

fn count_broken_references(folder: &Folder) -> BTreeMap<String, usize> {
    folder
        .documents()
        .flat_map(|document| {
            document
                .references()
                .filter(|(_, is_wiki)| *is_wiki)
                .filter(|(link, _)| {
                    resolve::resolve(
                        folder,
                        document,
                        link.target_note.as_deref(),
                        link.target_heading.as_deref(),
                    )
                    .is_none()
                })
                .map(|(link, _)| {
                    reference_key(link.target_note.as_deref(), link.target_heading.as_deref())
                })
                .collect_vec()
        })
        .counts()
        .into_iter()
        .collect()
}
