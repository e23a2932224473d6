//! Standalone client demo binary.
//!
//! Usage:
//!   cargo run -p rdp_client -- [--addr 127.0.0.1:8000]
//!
//! A minimal chat client driving the example adapter: `login <name>` logs
//! in, `say <text>` sends a message, `fetch` lists messages newer than the
//! last fetch, `quit` sends `EXIT` and exits.

use std::env;
use std::io::{BufRead, Write};
use std::net::SocketAddr;

use anyhow::Context;
use rdp_client::RdpClient;
use rdp_shared::app::{self, Method, Status};
use rdp_shared::config::RdpConfig;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::info;

fn parse_args() -> String {
    let mut addr = "127.0.0.1:8000".to_string();
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                addr = args[i + 1].clone();
                i += 2;
            }
            _ => i += 1,
        }
    }
    addr
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let server_addr: SocketAddr = parse_args().parse().context("parse --addr")?;
    info!(server = %server_addr, "Starting client");

    let client = RdpClient::connect(&RdpConfig::default())
        .await
        .context("connect")?;

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
            if !line.is_empty() {
                if console_tx.blocking_send(line).is_err() {
                    break;
                }
            }
        }
    });

    println!("Client ready. Commands: login <name>, say <text>, fetch, quit");
    println!();

    let mut username: Option<String> = None;
    let mut last_fetch: f64 = 0.0;

    while let Some(line) = console_rx.recv().await {
        let tokens: Vec<&str> = line.splitn(2, ' ').collect();
        let command = tokens[0];
        let rest = tokens.get(1).copied().unwrap_or("");

        let request = match command {
            "login" => {
                if rest.is_empty() {
                    println!("Usage: login <name>");
                    continue;
                }
                username = Some(rest.to_string());
                Some(app::encode_request(Method::Login, &json!({"username": rest})))
            }
            "say" => match &username {
                Some(name) => Some(app::encode_request(
                    Method::Message,
                    &json!({"username": name, "message": rest}),
                )),
                None => {
                    println!("Log in first: login <name>");
                    None
                }
            },
            "fetch" => match &username {
                Some(name) => Some(app::encode_request(
                    Method::Fetch,
                    &json!({"username": name, "timestamp": last_fetch}),
                )),
                None => {
                    println!("Log in first: login <name>");
                    None
                }
            },
            "quit" | "exit" => match &username {
                Some(name) => Some(app::encode_request(Method::Exit, &json!({"username": name}))),
                None => break,
            },
            _ => {
                println!("Unknown command: {command}");
                None
            }
        };

        let Some(request) = request else { continue };

        let correlation_id = match client.send(request, server_addr).await {
            Ok(id) => id,
            Err(e) => {
                println!("Send error: {e}");
                continue;
            }
        };

        let reply = match client.response(&correlation_id).await {
            Ok(reply) => reply,
            Err(e) => {
                println!("No response: {e}");
                continue;
            }
        };

        match app::parse_response(&reply) {
            Ok(parsed) => {
                println!("{}: {}", parsed.status, parsed.message);
                if let Some(data) = &parsed.data {
                    if command == "fetch" {
                        if let Some(messages) = data.as_array() {
                            for entry in messages {
                                println!("  {}", entry);
                            }
                        }
                        last_fetch = now_secs();
                    }
                }
            }
            Err(status) => println!("Malformed response: {status}"),
        }

        if command == "quit" || command == "exit" {
            if matches!(
                app::parse_response(&reply).map(|p| p.status),
                Ok(Status::Success)
            ) {
                break;
            }
        }
    }

    client.close();
    Ok(())
}

/// Wall clock reading for the `fetch` cursor.
fn now_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
