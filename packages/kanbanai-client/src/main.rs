use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    kanbanai_client::run().await
}
