/// Collaborators the engine calls out to: the view, the notification area,
/// the confirmation dialog and the auth module.
use async_trait::async_trait;

use crate::state::BoardState;
use crate::sync::Connectivity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

#[async_trait]
pub trait BoardHost: Send + Sync {
    /// Called after every state change. Must not call back into the engine.
    fn render(&self, state: &BoardState);

    /// Best-effort user feedback for a terminal outcome.
    fn notify(&self, kind: NoticeKind, message: &str);

    /// Gate for destructive operations.
    async fn confirm(&self, message: &str) -> bool;

    /// The server rejected the credential; clear it and leave the board.
    fn on_unauthorized(&self);

    fn connectivity_changed(&self, _state: Connectivity) {}
}
