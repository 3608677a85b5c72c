//! The cairn language server binary: LSP over stdio.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tokio::sync::RwLock;
use tower_lsp::jsonrpc;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};

use cairn::config::Settings;
use cairn::document::Document;
use cairn::error::{Error, Result};
use cairn::folder::Folder;
use cairn::path::NotePath;
use cairn::publish::{self, Publisher};
use cairn::state::State;
use cairn::{completion, gotodef, hover, symbol};

struct Backend {
    client: Client,
    publisher: Publisher,
    state: RwLock<Option<State>>,
}

impl Backend {
    fn new(client: Client) -> Backend {
        Backend {
            publisher: publish::spawn(client.clone()),
            client,
            state: RwLock::new(None),
        }
    }

    async fn log_warning(&self, message: impl Into<String>) {
        self.client
            .log_message(MessageType::WARNING, message.into())
            .await;
    }

    fn open_document(&self, state: &mut State, params: &DidOpenTextDocumentParams) -> Result<()> {
        let path = NotePath::from_uri(&params.text_document.uri)?;
        let folder = state
            .folder_for(&path)
            .ok_or_else(|| Error::UnknownDocument(path.as_path().to_path_buf()))?;

        let document = Document::from_open(folder.root(), &params.text_document)?;
        let updated = folder.update_document(document);
        state.update_folder(updated, &self.publisher);

        Ok(())
    }

    fn change_document(
        &self,
        state: &mut State,
        params: &DidChangeTextDocumentParams,
    ) -> Result<()> {
        let path = NotePath::from_uri(&params.text_document.uri)?;
        let folder = state
            .folder_for(&path)
            .ok_or_else(|| Error::UnknownDocument(path.as_path().to_path_buf()))?;
        let document = folder
            .get(&path)
            .ok_or_else(|| Error::UnknownDocument(path.as_path().to_path_buf()))?;

        let updated = folder.update_document(document.apply_change(params)?);
        state.update_folder(updated, &self.publisher);

        Ok(())
    }

    /// `didClose` re-reads the note from disk when it still exists, so the
    /// index reflects the saved file rather than the editor buffer; a note
    /// deleted out from under the editor is dropped from the index.
    fn close_document(&self, state: &mut State, params: &DidCloseTextDocumentParams) -> Result<()> {
        let path = NotePath::from_uri(&params.text_document.uri)?;
        let folder = state
            .folder_for(&path)
            .ok_or_else(|| Error::UnknownDocument(path.as_path().to_path_buf()))?;

        let updated = if path.as_path().exists() {
            folder.update_document(Document::load(folder.root(), path.clone())?)
        } else {
            folder.remove_document(&path)
        };
        state.update_folder(updated, &self.publisher);

        Ok(())
    }

    fn create_file(&self, state: &mut State, uri: &str) -> Result<()> {
        let uri = Url::parse(uri).map_err(|_| Error::BadPath(uri.to_string()))?;
        let path = NotePath::from_uri(&uri)?;
        let folder = state
            .folder_for(&path)
            .ok_or_else(|| Error::UnknownDocument(path.as_path().to_path_buf()))?;

        let updated = folder.update_document(Document::load(folder.root(), path)?);
        state.update_folder(updated, &self.publisher);

        Ok(())
    }

    fn delete_file(&self, state: &mut State, uri: &str) -> Result<()> {
        let uri = Url::parse(uri).map_err(|_| Error::BadPath(uri.to_string()))?;
        let path = NotePath::from_uri(&uri)?;
        let folder = state
            .folder_for(&path)
            .ok_or_else(|| Error::UnknownDocument(path.as_path().to_path_buf()))?;

        let updated = folder.remove_document(&path);
        state.update_folder(updated, &self.publisher);

        Ok(())
    }
}

/// Workspace roots in preference order: `workspaceFolders`, then
/// `rootUri`, then `rootPath`.
fn workspace_roots(params: &InitializeParams) -> Result<Vec<(String, PathBuf)>> {
    if let Some(folders) = params.workspace_folders.as_ref().filter(|f| !f.is_empty()) {
        return folders
            .iter()
            .map(|folder| {
                let path = folder
                    .uri
                    .to_file_path()
                    .map_err(|_| Error::BadPath(folder.uri.to_string()))?;
                Ok((folder.name.clone(), path))
            })
            .collect();
    }

    #[allow(deprecated)]
    let root = match (&params.root_uri, &params.root_path) {
        (Some(uri), _) => Some(
            uri.to_file_path()
                .map_err(|_| Error::BadPath(uri.to_string()))?,
        ),
        (None, Some(path)) => Some(PathBuf::from(path)),
        (None, None) => None,
    };

    let root = root.ok_or(Error::NoWorkspace)?;
    let name = root
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workspace".to_string());

    Ok(vec![(name, root)])
}

fn server_capabilities() -> ServerCapabilities {
    let md_filter = FileOperationFilter {
        scheme: Some("file".to_string()),
        pattern: FileOperationPattern {
            glob: "**/*.md".to_string(),
            matches: Some(FileOperationPatternKind::File),
            options: Some(FileOperationPatternOptions {
                ignore_case: Some(true),
            }),
        },
    };

    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(
            TextDocumentSyncOptions {
                open_close: Some(true),
                change: Some(TextDocumentSyncKind::INCREMENTAL),
                ..Default::default()
            },
        )),
        completion_provider: Some(CompletionOptions {
            trigger_characters: Some(
                ["[", ":", "|", "@"].iter().map(|c| c.to_string()).collect(),
            ),
            ..Default::default()
        }),
        definition_provider: Some(OneOf::Left(true)),
        hover_provider: Some(HoverProviderCapability::Simple(true)),
        document_symbol_provider: Some(OneOf::Left(true)),
        workspace: Some(WorkspaceServerCapabilities {
            workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                supported: Some(true),
                change_notifications: Some(OneOf::Left(true)),
            }),
            // DidRename stays unadvertised: VSCode renames arrive as
            // close+open, which the text sync path already covers.
            file_operations: Some(WorkspaceFileOperationsServerCapabilities {
                did_create: Some(FileOperationRegistrationOptions {
                    filters: vec![md_filter.clone()],
                }),
                did_delete: Some(FileOperationRegistrationOptions {
                    filters: vec![md_filter],
                }),
                ..Default::default()
            }),
        }),
        ..Default::default()
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> jsonrpc::Result<InitializeResult> {
        let roots = match workspace_roots(&params) {
            Ok(roots) => roots,
            Err(err) => {
                self.client
                    .log_message(MessageType::ERROR, format!("initialize failed: {}", err))
                    .await;
                return Err(err.into());
            }
        };

        // A broken settings file falls back to defaults.
        let settings =
            Settings::new(&roots[0].1, &params.capabilities).unwrap_or_else(|_| Settings::default());

        let mut folders = BTreeMap::new();
        for (name, root) in &roots {
            match Folder::try_load(name, root) {
                Some(folder) => {
                    folders.insert(folder.root().to_path_buf(), folder);
                }
                None => {
                    self.log_warning(format!(
                        "workspace folder {} does not exist, skipping",
                        root.display()
                    ))
                    .await;
                }
            }
        }

        if folders.is_empty() {
            return Err(Error::NoWorkspace.into());
        }

        let client_is_vscode = params
            .client_info
            .as_ref()
            .is_some_and(|info| info.name == "Visual Studio Code");

        let mut state = State::new(
            params.capabilities,
            settings,
            client_is_vscode,
            BTreeMap::new(),
        );
        state.update_state(folders, &self.publisher);

        *self.state.write().await = Some(state);

        Ok(InitializeResult {
            capabilities: server_capabilities(),
            server_info: Some(ServerInfo {
                name: "cairn".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        self.publisher.start();
        self.client
            .log_message(MessageType::INFO, "cairn language server initialized")
            .await;
    }

    async fn shutdown(&self) -> jsonrpc::Result<()> {
        self.publisher.stop();
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let mut guard = self.state.write().await;
        let Some(state) = guard.as_mut() else {
            self.log_warning("didOpen before initialize").await;
            return;
        };

        if let Err(err) = self.open_document(state, &params) {
            self.log_warning(format!("didOpen: {}", err)).await;
        }
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let mut guard = self.state.write().await;
        let Some(state) = guard.as_mut() else {
            self.log_warning("didChange before initialize").await;
            return;
        };

        if let Err(err) = self.change_document(state, &params) {
            self.log_warning(format!("didChange: {}", err)).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let mut guard = self.state.write().await;
        let Some(state) = guard.as_mut() else {
            self.log_warning("didClose before initialize").await;
            return;
        };

        if let Err(err) = self.close_document(state, &params) {
            self.log_warning(format!("didClose: {}", err)).await;
        }
    }

    async fn did_change_workspace_folders(&self, params: DidChangeWorkspaceFoldersParams) {
        let mut guard = self.state.write().await;
        let Some(state) = guard.as_mut() else {
            self.log_warning("didChangeWorkspaceFolders before initialize")
                .await;
            return;
        };

        for removed in &params.event.removed {
            match removed.uri.to_file_path() {
                Ok(root) => state.remove_folder(&root, &self.publisher),
                Err(_) => {
                    self.log_warning(format!("bad folder uri: {}", removed.uri))
                        .await
                }
            }
        }

        for added in &params.event.added {
            let Ok(root) = added.uri.to_file_path() else {
                self.log_warning(format!("bad folder uri: {}", added.uri))
                    .await;
                continue;
            };

            match Folder::try_load(&added.name, &root) {
                Some(folder) => state.update_folder(folder, &self.publisher),
                None => {
                    self.log_warning(format!(
                        "workspace folder {} does not exist, skipping",
                        root.display()
                    ))
                    .await
                }
            }
        }
    }

    async fn did_create_files(&self, params: CreateFilesParams) {
        let mut guard = self.state.write().await;
        let Some(state) = guard.as_mut() else {
            self.log_warning("didCreateFiles before initialize").await;
            return;
        };

        for file in &params.files {
            if let Err(err) = self.create_file(state, &file.uri) {
                self.log_warning(format!("didCreateFiles: {}", err)).await;
            }
        }
    }

    async fn did_delete_files(&self, params: DeleteFilesParams) {
        let mut guard = self.state.write().await;
        let Some(state) = guard.as_mut() else {
            self.log_warning("didDeleteFiles before initialize").await;
            return;
        };

        for file in &params.files {
            if let Err(err) = self.delete_file(state, &file.uri) {
                self.log_warning(format!("didDeleteFiles: {}", err)).await;
            }
        }
    }

    async fn completion(
        &self,
        params: CompletionParams,
    ) -> jsonrpc::Result<Option<CompletionResponse>> {
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or(Error::NotInitialized)?;

        let path = NotePath::from_uri(&params.text_document_position.text_document.uri)
            .map_err(jsonrpc::Error::from)?;

        let Some(folder) = state.folder_for(&path) else {
            self.log_warning(format!("completion in untracked document {}", path.as_path().display()))
                .await;
            return Ok(None);
        };
        let Some(document) = folder.get(&path) else {
            return Ok(None);
        };

        Ok(completion::get_completions(
            folder,
            document,
            params.text_document_position.position,
            &state.settings,
        ))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> jsonrpc::Result<Option<GotoDefinitionResponse>> {
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or(Error::NotInitialized)?;

        let path = NotePath::from_uri(&params.text_document_position_params.text_document.uri)
            .map_err(jsonrpc::Error::from)?;

        let Some(folder) = state.folder_for(&path) else {
            self.log_warning(format!(
                "definition in untracked document {}",
                path.as_path().display()
            ))
            .await;
            return Ok(None);
        };
        let Some(document) = folder.get(&path) else {
            return Ok(None);
        };

        Ok(gotodef::goto_definition(
            folder,
            document,
            params.text_document_position_params.position,
        )
        .map(GotoDefinitionResponse::Scalar))
    }

    async fn hover(&self, params: HoverParams) -> jsonrpc::Result<Option<Hover>> {
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or(Error::NotInitialized)?;

        let path = NotePath::from_uri(&params.text_document_position_params.text_document.uri)
            .map_err(jsonrpc::Error::from)?;

        let Some(folder) = state.folder_for(&path) else {
            self.log_warning(format!(
                "hover in untracked document {}",
                path.as_path().display()
            ))
            .await;
            return Ok(None);
        };
        let Some(document) = folder.get(&path) else {
            return Ok(None);
        };

        Ok(hover::hover(
            folder,
            document,
            params.text_document_position_params.position,
            &state.settings,
        ))
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> jsonrpc::Result<Option<DocumentSymbolResponse>> {
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or(Error::NotInitialized)?;

        let path = NotePath::from_uri(&params.text_document.uri).map_err(jsonrpc::Error::from)?;

        let Some(document) = state.document(&path) else {
            self.log_warning(format!(
                "documentSymbol in untracked document {}",
                path.as_path().display()
            ))
            .await;
            return Ok(None);
        };

        Ok(symbol::document_symbol(
            document,
            state.hierarchical_symbols(),
        ))
    }
}

#[tokio::main]
async fn main() {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(Backend::new);
    Server::new(stdin, stdout, socket).serve(service).await;
}
