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

//! Bluetooth communication module.
//!
//! Manages the single RFCOMM serial link: listening for a peer, dialing a
//! peer, and the one live session.

mod acceptor;
mod adapter;
#[cfg(feature = "bluez")]
mod bluez;
mod connector;
mod manager;
mod role;
mod session;
#[cfg(test)]
mod testing;

pub use acceptor::Acceptor;
pub use adapter::{
    Accepted, BoxedStream, EndpointAdapter, LinkStream, ListenSocket, OutboundSocket, Peer,
    PeerAddress, ServiceRecord, SPP_UUID,
};
#[cfg(feature = "bluez")]
pub use bluez::BluezAdapter;
pub use connector::Connector;
pub use manager::{LinkManager, LinkSettings};
pub use role::RoleId;
pub use session::{Session, SessionWriter, DEFAULT_READ_BUFFER};
