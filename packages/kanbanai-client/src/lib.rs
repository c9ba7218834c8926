/// KanbanAI board client: HTTP store, push channel and the session that ties
/// them to the mutation engine.
pub mod config;
pub mod console;
pub mod logging;
pub mod push;
pub mod remote;
pub mod session;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use crate::console::ConsoleHost;
use crate::push::{PushChannel, WsConnector};
use crate::remote::HttpStore;
use crate::session::BoardSession;

/// Watch the configured board until Ctrl-C or until the server rejects the
/// token.
pub async fn run() -> ExitCode {
    let config = config::load_config(&config::default_config_path());
    if let Err(e) = logging::init(config.log_to_file) {
        eprintln!("failed to initialize logger: {}", e);
    }

    let Some(token) = config.token.as_deref().filter(|t| !t.trim().is_empty()) else {
        log::error!(
            "[main] No token in {}; sign in and store it as \"token\"",
            config::default_config_path().display()
        );
        return ExitCode::FAILURE;
    };
    let store = match HttpStore::from_config(&config, token) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            log::error!("[main] {}", e);
            return ExitCode::FAILURE;
        }
    };

    let host = Arc::new(ConsoleHost::default());
    let channel = Arc::new(PushChannel::new(
        WsConnector::new(config.ws_url.clone()),
        config.reconnect_delay(),
    ));
    log::info!("[main] Watching {}", config.api_base);
    let session = BoardSession::start(store, host.clone(), channel).await;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    let code = loop {
        tokio::select! {
            _ = &mut ctrl_c => break ExitCode::SUCCESS,
            _ = tick.tick() => {
                if host.signed_out() || !session.is_listening() {
                    break ExitCode::FAILURE;
                }
            }
        }
    };
    session.logout();
    code
}
