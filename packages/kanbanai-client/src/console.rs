/// Terminal host for the board watcher: prints the board on every render and
/// routes notices into the log.
use async_trait::async_trait;
use chrono::NaiveDate;
use kanbanai_core::host::{BoardHost, NoticeKind};
use kanbanai_core::state::BoardState;
use kanbanai_core::sync::Connectivity;
use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
pub struct ConsoleHost {
    signed_out: AtomicBool,
}

impl ConsoleHost {
    pub fn signed_out(&self) -> bool {
        self.signed_out.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BoardHost for ConsoleHost {
    fn render(&self, state: &BoardState) {
        let today = chrono::Local::now().date_naive();
        println!("{}", format_board(state, today));
    }

    fn notify(&self, kind: NoticeKind, message: &str) {
        match kind {
            NoticeKind::Error => log::error!("[board] {}", message),
            NoticeKind::Success | NoticeKind::Info => log::info!("[board] {}", message),
        }
    }

    /// The watcher never asks for destructive operations.
    async fn confirm(&self, message: &str) -> bool {
        log::info!("[board] Declined: {}", message);
        false
    }

    fn on_unauthorized(&self) {
        self.signed_out.store(true, Ordering::SeqCst);
        log::error!("[board] The server rejected the token. Update client.json and restart.");
    }

    fn connectivity_changed(&self, state: Connectivity) {
        match state {
            Connectivity::Online => log::info!("[board] Live updates connected"),
            Connectivity::Offline => log::warn!("[board] Live updates offline, retrying"),
        }
    }
}

/// Plain-text board: one heading per column, then its tasks.
pub fn format_board(state: &BoardState, today: NaiveDate) -> String {
    let mut out = String::new();
    for column in state.columns() {
        let tasks: Vec<_> = state.tasks_in(&column.id).collect();
        let _ = writeln!(out, "{} ({})", column.name, tasks.len());
        for task in tasks {
            let _ = write!(out, "  - {} [{}]", task.title, task.priority);
            if let Some(assignee) = &task.assignee {
                let _ = write!(out, " @{}", assignee);
            }
            if task.is_overdue(today) {
                out.push_str(" (overdue)");
            }
            out.push('\n');
        }
    }
    out
}
