//! Diagnostic publish queue.
//!
//! One task owns the LSP client end and drains a message channel in FIFO
//! order. Until `Start` arrives, publishes accumulate; after `Stop`,
//! nothing further is drained. Handlers only ever see the [`Publisher`]
//! handle.

use std::collections::VecDeque;
use std::future::Future;

use tokio::sync::mpsc;
use tower_lsp::lsp_types::{Diagnostic, Url};
use tower_lsp::Client;

#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticsPublish {
    pub uri: Url,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug)]
pub enum PublishMessage {
    Start,
    Stop,
    Publish(DiagnosticsPublish),
}

/// Handle through which handlers enqueue work for the queue task.
#[derive(Debug, Clone)]
pub struct Publisher {
    tx: mpsc::UnboundedSender<PublishMessage>,
}

impl Publisher {
    pub fn start(&self) {
        let _ = self.tx.send(PublishMessage::Start);
    }

    /// Terminal: the queue task exits after seeing this.
    pub fn stop(&self) {
        let _ = self.tx.send(PublishMessage::Stop);
    }

    pub fn enqueue(&self, uri: Url, diagnostics: Vec<Diagnostic>) {
        let _ = self
            .tx
            .send(PublishMessage::Publish(DiagnosticsPublish { uri, diagnostics }));
    }
}

impl Publisher {
    /// A publisher with a bare channel, for embedders (and tests) that
    /// drive [`drain`] with their own sink instead of an LSP client.
    pub fn channel() -> (Publisher, mpsc::UnboundedReceiver<PublishMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Publisher { tx }, rx)
    }
}

/// Spawns the queue task against a real LSP client.
pub fn spawn(client: Client) -> Publisher {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(drain(rx, move |publish: DiagnosticsPublish| {
        let client = client.clone();
        async move {
            client
                .publish_diagnostics(publish.uri, publish.diagnostics, None)
                .await;
        }
    }));

    Publisher { tx }
}

/// The queue state machine, generic over the notification sink so tests
/// can observe the drained order.
pub async fn drain<F, Fut>(mut rx: mpsc::UnboundedReceiver<PublishMessage>, mut sink: F)
where
    F: FnMut(DiagnosticsPublish) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut started = false;
    let mut pending: VecDeque<DiagnosticsPublish> = VecDeque::new();

    while let Some(message) = rx.recv().await {
        match message {
            PublishMessage::Start => {
                started = true;
                while let Some(publish) = pending.pop_front() {
                    sink(publish).await;
                }
            }
            PublishMessage::Stop => break,
            PublishMessage::Publish(publish) => {
                if started {
                    sink(publish).await;
                } else {
                    pending.push_back(publish);
                }
            }
        }
    }
}
