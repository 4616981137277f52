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

//! Terminal front-end helpers: input line parsing and event rendering.

use thiserror::Error;

use crate::bluetooth::{Peer, PeerAddress};
use crate::events::LinkEvent;

/// A line typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Text to send to the peer.
    Payload(String),
    Connect(Peer),
    Disconnect,
    Listen(bool),
    State,
    Quit,
    /// Nothing to do.
    Empty,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("usage: /connect <ADDR> [NAME]")]
    ConnectUsage,
    #[error("usage: /listen on|off")]
    ListenUsage,
    #[error("unknown command: /{0}")]
    Unknown(String),
}

impl ConsoleCommand {
    /// Parse one input line. Lines starting with `/` are commands, everything
    /// else is payload.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some(command) = line.strip_prefix('/') else {
            if line.is_empty() {
                return Ok(ConsoleCommand::Empty);
            }
            return Ok(ConsoleCommand::Payload(line.to_string()));
        };

        let mut words = command.split_whitespace();
        match words.next().unwrap_or("") {
            "connect" => {
                let address = words.next().ok_or(ParseError::ConnectUsage)?;
                let address = PeerAddress::new(address);
                let name: Vec<&str> = words.collect();
                let peer = if name.is_empty() {
                    Peer::from_address(address)
                } else {
                    Peer::new(address, name.join(" "))
                };
                Ok(ConsoleCommand::Connect(peer))
            }
            "disconnect" => Ok(ConsoleCommand::Disconnect),
            "listen" => match words.next() {
                Some("on") => Ok(ConsoleCommand::Listen(true)),
                Some("off") => Ok(ConsoleCommand::Listen(false)),
                _ => Err(ParseError::ListenUsage),
            },
            "state" => Ok(ConsoleCommand::State),
            "quit" | "exit" => Ok(ConsoleCommand::Quit),
            other => Err(ParseError::Unknown(other.to_string())),
        }
    }
}

/// Bytes put on the wire for a payload line. The text goes out as typed
/// unless `crlf` asks for a line terminator.
pub fn payload_bytes(text: &str, crlf: bool) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    if crlf {
        bytes.extend_from_slice(b"\r\n");
    }
    bytes
}

/// One display line for an event.
pub fn render_event(event: &LinkEvent) -> String {
    match event {
        LinkEvent::StateChanged(state) => format!("[{}]", state.title()),
        LinkEvent::PeerIdentified(name) => format!("Connected to {}", name),
        LinkEvent::DataReceived(data) => String::from_utf8_lossy(data).into_owned(),
        LinkEvent::DataSent(data) => format!("> {}", String::from_utf8_lossy(data).trim_end()),
        LinkEvent::Notice(text) => format!("! {}", text),
    }
}
