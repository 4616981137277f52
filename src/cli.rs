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

//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

/// Serial terminal over a Bluetooth RFCOMM link.
#[derive(Parser, Debug, Clone)]
#[command(name = "bt-terminal")]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to the user config directory).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Dial this peer address at startup.
    #[arg(long)]
    pub connect: Option<String>,

    /// Display name for the peer given with --connect.
    #[arg(long, requires = "connect")]
    pub name: Option<String>,

    /// Do not listen for inbound connections at startup.
    #[arg(long)]
    pub no_listen: bool,

    /// Terminate each input line with CRLF when sending.
    #[arg(long)]
    pub crlf: bool,

    /// Log level (trace, debug, info, warn, error), overrides the config.
    #[arg(long)]
    pub log_level: Option<String>,
}
