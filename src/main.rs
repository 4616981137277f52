// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! BT Terminal

mod cli;

use anyhow::{bail, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bt_terminal::bluetooth::{BluezAdapter, EndpointAdapter, LinkManager, Peer, PeerAddress};
use bt_terminal::config::Config;
use bt_terminal::console::{payload_bytes, render_event, ConsoleCommand};
use bt_terminal::state::ConnectionState;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // Initialize logging
    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting BT Terminal v{}...", env!("CARGO_PKG_VERSION"));

    let adapter = Arc::new(BluezAdapter::new().await);
    if !adapter.is_available() {
        error!("No Bluetooth adapter found");
        bail!("Bluetooth is unavailable");
    }
    if let Some(name) = &config.link.device_name {
        adapter.set_name(name).await?;
    }

    let (manager, mut events) = LinkManager::spawn(adapter, config.link.settings());

    if !manager.is_enabled().await {
        if !config.link.enable_on_start {
            bail!("Bluetooth is not enabled");
        }
        manager.set_enabled(true).await?;
    }

    manager
        .listen(config.link.listen_on_start && !cli.no_listen)
        .await?;

    if let Some(address) = &cli.connect {
        let address = PeerAddress::new(address.as_str());
        let peer = match &cli.name {
            Some(name) => Peer::new(address, name.as_str()),
            None => Peer::from_address(address),
        };
        manager.connect(peer).await?;
    }

    info!("Ready. Type /quit to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                println!("{}", render_event(&event));
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        error!("Failed to read input: {}", e);
                        break;
                    }
                };

                match ConsoleCommand::parse(&line) {
                    Ok(ConsoleCommand::Payload(text)) => {
                        if manager.get_state() != ConnectionState::Connected {
                            println!("! not connected");
                            continue;
                        }
                        manager.write(payload_bytes(&text, cli.crlf)).await;
                    }
                    Ok(ConsoleCommand::Connect(peer)) => manager.connect(peer).await?,
                    Ok(ConsoleCommand::Disconnect) => manager.disconnect().await?,
                    Ok(ConsoleCommand::Listen(enable)) => manager.listen(enable).await?,
                    Ok(ConsoleCommand::State) => {
                        let status = manager.status();
                        match status.peer {
                            Some(peer) => println!("[{} to {}]", status.state.title(), peer.name),
                            None => println!("[{}]", status.state.title()),
                        }
                    }
                    Ok(ConsoleCommand::Quit) => break,
                    Ok(ConsoleCommand::Empty) => {}
                    Err(e) => println!("! {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    manager.stop().await;
    info!("BT Terminal stopped");
    Ok(())
}
