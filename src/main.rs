mod config;

use std::sync::Arc;

use chat_relay::ChatRelay;
use config::AppConfig;
use groq_api::GroqHandler;
use notebook_store::{AppState, NotebookStore, UploadDir};
use tokio::{net::TcpListener, sync::watch, task::JoinHandle};
use tracing::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    info!(
        "Starting... CARGO_PKG_NAME={}, CARGO_PKG_VERSION={}, version={}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        option_env!("version").unwrap_or("(not defined at compile)")
    );

    let config = AppConfig::from_env()?;

    let relay = match &config.groq_api_key {
        Some(api_key) => ChatRelay::new(Arc::new(GroqHandler::new(api_key, &config.groq_base_url))),
        None => {
            error!("FATAL: GROQ_API_KEY environment variable not set. Chatbot will not function.");
            ChatRelay::unavailable()
        }
    };

    tokio::fs::create_dir_all(&config.uploads_dir).await?;
    let notebooks = AppState {
        store: Arc::new(NotebookStore::new(
            config.db_file.clone(),
            UploadDir::new(&config.uploads_dir),
        )),
        frontend_dir: config.frontend_dir.clone(),
        max_upload_bytes: config.max_upload_bytes,
    };

    info!(
        "Chat relay available={}, notebooks in {}, uploads up to {} bytes",
        relay.is_available(),
        config.db_file.display(),
        config.max_upload_bytes
    );

    let chat_listener = TcpListener::bind((config.bind_addr.as_str(), config.chat_port)).await?;
    let notebook_listener =
        TcpListener::bind((config.bind_addr.as_str(), config.notebook_port)).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let chat_task = tokio::spawn(chat_relay::serve(
        chat_listener,
        Arc::new(relay),
        wait_for_shutdown(shutdown_rx.clone()),
    ));
    let notebook_task = tokio::spawn(notebook_store::serve(
        notebook_listener,
        notebooks,
        wait_for_shutdown(shutdown_rx),
    ));

    let _signal_err = tokio::signal::ctrl_c().await;
    info!("Received Ctrl-C, shutting down.");
    let _ = shutdown_tx.send(true);

    join_server("chat relay", chat_task).await;
    join_server("notebook store", notebook_task).await;
    Ok(())
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn join_server(name: &str, task: JoinHandle<std::io::Result<()>>) {
    match task.await {
        Ok(Ok(())) => info!("{} stopped", name),
        Ok(Err(e)) => error!("{} ended with error: {}", name, e),
        Err(e) => error!("{} task failed: {}", name, e),
    }
}
