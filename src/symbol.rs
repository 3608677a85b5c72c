//! Document symbols from the heading tree.
//!
//! Clients advertising hierarchical support get nested `DocumentSymbol`
//! values mirroring heading nesting; older clients get a flat
//! `SymbolInformation` list with an `H{level}: ` name prefix.

use tower_lsp::lsp_types::{
    DocumentSymbol, DocumentSymbolResponse, Location, SymbolInformation, SymbolKind,
};

use crate::document::Document;
use crate::parse::{self, Heading};

pub fn document_symbol(document: &Document, hierarchical: bool) -> Option<DocumentSymbolResponse> {
    let roots = parse::heading_roots(document.elements());
    if roots.is_empty() {
        return None;
    }

    if hierarchical {
        Some(DocumentSymbolResponse::Nested(
            roots.into_iter().map(to_document_symbol).collect(),
        ))
    } else {
        Some(DocumentSymbolResponse::Flat(
            document
                .headings()
                .into_iter()
                .map(|heading| to_symbol_information(document, heading))
                .collect(),
        ))
    }
}

#[allow(deprecated)] // `deprecated` is a required field of DocumentSymbol
fn to_document_symbol(heading: &Heading) -> DocumentSymbol {
    DocumentSymbol {
        name: heading.text.clone(),
        detail: None,
        kind: SymbolKind::STRING,
        tags: None,
        deprecated: None,
        range: heading.scope,
        selection_range: heading.range,
        children: (!heading.children.is_empty())
            .then(|| heading.children.iter().map(to_document_symbol).collect()),
    }
}

#[allow(deprecated)]
fn to_symbol_information(document: &Document, heading: &Heading) -> SymbolInformation {
    SymbolInformation {
        name: format!("H{}: {}", heading.level, heading.text),
        kind: SymbolKind::STRING,
        tags: None,
        deprecated: None,
        location: Location {
            uri: document.path().uri().clone(),
            range: heading.range,
        },
        container_name: None,
    }
}
