/// A signed-in board session: the mutation engine plus the push listener
/// that keeps it in sync with other clients.
use kanbanai_core::error::EngineError;
use kanbanai_core::host::BoardHost;
use kanbanai_core::store::RemoteStore;
use kanbanai_core::sync::{Connectivity, PushMessage};
use kanbanai_core::MutationEngine;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::push::PushChannel;

pub struct BoardSession<S, H> {
    engine: Arc<MutationEngine<S, H>>,
    channel: Arc<PushChannel>,
    listener: JoinHandle<()>,
}

impl<S, H> BoardSession<S, H>
where
    S: RemoteStore + 'static,
    H: BoardHost + 'static,
{
    /// Load the board, connect the push channel and start listening.
    ///
    /// A failed initial load has already been reported through the host; the
    /// session still starts so a later push or user action can recover it.
    pub async fn start(store: Arc<S>, host: Arc<H>, channel: Arc<PushChannel>) -> Self {
        let engine = Arc::new(MutationEngine::new(store, host.clone()));
        let messages = channel.subscribe();
        let connectivity = channel.connectivity();

        if let Err(e) = engine.load().await {
            log::warn!("[session] Initial load failed: {}", e);
        }
        if !engine.is_session_ended() {
            channel.connect();
        }

        let listener = tokio::spawn(listen(
            engine.clone(),
            host,
            channel.clone(),
            messages,
            connectivity,
        ));
        Self {
            engine,
            channel,
            listener,
        }
    }

    pub fn engine(&self) -> &Arc<MutationEngine<S, H>> {
        &self.engine
    }

    pub fn is_listening(&self) -> bool {
        !self.listener.is_finished()
    }

    /// Stop listening and drop the push connection.
    pub fn logout(self) {
        self.listener.abort();
        self.channel.close();
        log::info!("[session] Logged out");
    }
}

async fn listen<S: RemoteStore, H: BoardHost>(
    engine: Arc<MutationEngine<S, H>>,
    host: Arc<H>,
    channel: Arc<PushChannel>,
    mut messages: broadcast::Receiver<PushMessage>,
    mut connectivity: watch::Receiver<Connectivity>,
) {
    // Peers' changes made while offline were never pushed, so every connect
    // after the first one re-reads the board.
    let mut connected_before = *connectivity.borrow() == Connectivity::Online;
    loop {
        tokio::select! {
            received = messages.recv() => {
                let message = match received {
                    Ok(message) => message,
                    // A columns refresh reloads both slices.
                    Err(RecvError::Lagged(missed)) => {
                        log::warn!("[session] Missed {} push message(s), reloading board", missed);
                        PushMessage::ColumnsChanged
                    }
                    Err(RecvError::Closed) => break,
                };
                if !refresh(&engine, message).await {
                    break;
                }
            }
            changed = connectivity.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *connectivity.borrow_and_update();
                log::info!("[session] Push channel {:?}", state);
                host.connectivity_changed(state);
                if state == Connectivity::Online {
                    if connected_before {
                        log::info!("[session] Reconnected, reloading board");
                        if !refresh(&engine, PushMessage::ColumnsChanged).await {
                            break;
                        }
                    }
                    connected_before = true;
                }
            }
        }
    }
    channel.close();
    log::info!("[session] Listener stopped");
}

/// Apply one invalidation. False once the session can no longer continue.
async fn refresh<S: RemoteStore, H: BoardHost>(
    engine: &MutationEngine<S, H>,
    message: PushMessage,
) -> bool {
    if engine.is_session_ended() {
        return false;
    }
    match engine.handle_push(message).await {
        Ok(()) => true,
        Err(EngineError::Unauthorized | EngineError::SessionEnded) => false,
        Err(e) => {
            log::debug!("[session] Refresh after {:?} failed: {}", message, e);
            true
        }
    }
}
