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

//! Error types for the connection manager.

use std::io;
use thiserror::Error;

/// Errors surfaced by the link layer.
#[derive(Debug, Error)]
pub enum LinkError {
    /// No local Bluetooth adapter is present.
    #[error("Bluetooth is unavailable")]
    Unavailable,

    /// The listening socket could not be created.
    #[error("unable to listen: {0}")]
    Listen(#[source] io::Error),

    /// The outbound socket could not be created.
    #[error("unable to create socket: {0}")]
    Socket(#[source] io::Error),

    /// A peer address could not be understood by the adapter.
    #[error("invalid peer address: {0}")]
    InvalidAddress(String),

    /// The manager has been stopped and accepts no further commands.
    #[error("connection manager stopped")]
    Stopped,

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;
