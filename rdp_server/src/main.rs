//! Standalone server binary.
//!
//! Usage:
//!   cargo run -p rdp_server -- [--addr 0.0.0.0:8000]
//!
//! Serves the example chat application over the reliable datagram protocol
//! using the in-memory `ChatHandler`.
//!
//! Console commands:
//!   status - Show server status
//!   quit   - Shutdown server

use std::env;
use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::Context;
use rdp_server::{ChatHandler, RdpServer};
use rdp_shared::config::RdpConfig;
use tokio::sync::mpsc;
use tracing::info;

fn parse_args() -> RdpConfig {
    let mut cfg = RdpConfig::default();
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            _ => i += 1,
        }
    }
    cfg
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args();
    let port: u16 = cfg
        .server_addr
        .rsplit(':')
        .next()
        .context("parse server_addr port")?
        .parse()
        .context("parse server_addr port")?;

    info!(addr = %cfg.server_addr, "Starting server");

    let mut server = RdpServer::new(&cfg);
    let shutdown = server.shutdown_handle();

    let chat = Arc::new(ChatHandler::new());
    server.on_message(move |payload| chat.handle(payload));

    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            if stdin.lock().read_line(&mut line).is_err() {
                break;
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Server ready. Type 'status' for info, 'quit' to exit.");
    println!();

    let console_shutdown = shutdown.clone();
    tokio::spawn(async move {
        while let Some(line) = console_rx.recv().await {
            match line.as_str() {
                "status" => println!("Server running on {}", cfg.server_addr),
                "quit" | "exit" => {
                    println!("Shutting down");
                    console_shutdown.close();
                    break;
                }
                other => println!("Unknown command: {other}"),
            }
        }
    });

    server.listen(port).await.context("listen")?;
    Ok(())
}
