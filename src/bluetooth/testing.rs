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

//! Endpoint adapter stub for unit tests.

use async_trait::async_trait;
use std::io;

use super::adapter::{
    BoxedStream, EndpointAdapter, ListenSocket, OutboundSocket, PeerAddress, ServiceRecord,
};
use crate::error::{LinkError, Result};

/// How outbound connects behave.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Dial {
    /// Never completes.
    Stalled,
    /// Completes immediately with a stream whose far end is already gone.
    Ready,
}

/// Powered adapter that cannot listen.
pub(crate) struct StubAdapter {
    dial: Dial,
}

impl StubAdapter {
    pub(crate) fn new(dial: Dial) -> Self {
        Self { dial }
    }
}

struct StubDial(Dial);

#[async_trait]
impl OutboundSocket for StubDial {
    async fn connect(self: Box<Self>) -> io::Result<BoxedStream> {
        match self.0 {
            Dial::Stalled => std::future::pending().await,
            Dial::Ready => {
                let (local, _remote) = tokio::io::duplex(64);
                Ok(Box::new(local))
            }
        }
    }
}

#[async_trait]
impl EndpointAdapter for StubAdapter {
    fn is_available(&self) -> bool {
        true
    }

    async fn is_enabled(&self) -> bool {
        true
    }

    async fn request_enable(&self) -> Result<()> {
        Ok(())
    }

    async fn disable(&self) -> Result<()> {
        Ok(())
    }

    async fn cancel_discovery(&self) {}

    fn create_outbound_socket(
        &self,
        _peer: &PeerAddress,
        _service: &ServiceRecord,
    ) -> Result<Box<dyn OutboundSocket>> {
        Ok(Box::new(StubDial(self.dial)))
    }

    async fn create_listening_socket(
        &self,
        _service: &ServiceRecord,
    ) -> Result<Box<dyn ListenSocket>> {
        Err(LinkError::Listen(io::Error::new(
            io::ErrorKind::Unsupported,
            "no listener",
        )))
    }
}
