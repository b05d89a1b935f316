//! ATT client requests over a [`Transport`]
//!
//! Requests are encoded into a buffer capped at the connection MTU and sent
//! as one PDU. Responses arrive asynchronously and are handled by whoever
//! drives the receive side.

use log::debug;
use thiserror::Error;

use crate::att::encoder;
use crate::att::HandleRange;
use crate::config::att::{GATT_CHARAC_UUID, MAX_MTU};
use crate::debug::HexDump;
use crate::transport::{Transport, TransportError};
use crate::uuid::Uuid;

/// Request could not be issued
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    /// Handle 0 is never a valid attribute
    #[error("attribute handle not resolved")]
    NotReady,

    #[error("request does not fit the MTU")]
    Encode,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Client side of one ATT bearer
pub struct AttClient<T: Transport> {
    transport: T,
    mtu: usize,
}

impl<T: Transport> AttClient<T> {
    pub fn new(transport: T) -> Self {
        let mtu = transport.mtu().min(MAX_MTU);
        Self { transport, mtu }
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    async fn send_encoded<F>(&mut self, encode: F) -> Result<(), RequestError>
    where
        F: FnOnce(&mut [u8]) -> usize,
    {
        let mut buf = [0u8; MAX_MTU];
        let len = encode(&mut buf[..self.mtu]);
        if len == 0 {
            return Err(RequestError::Encode);
        }
        debug!("ATT TX: {}", HexDump(&buf[..len]));

        let sent = self.transport.send(&buf[..len]).await?;
        if sent != len {
            return Err(TransportError::ShortWrite {
                sent,
                expected: len,
            }
            .into());
        }
        Ok(())
    }

    /// Read request for a characteristic value
    pub async fn read(&mut self, handle: u16) -> Result<(), RequestError> {
        if handle == 0 {
            return Err(RequestError::NotReady);
        }
        self.send_encoded(|out| encoder::encode_read_req(handle, out))
            .await
    }

    /// Write command, no response expected
    pub async fn write(&mut self, handle: u16, value: &[u8]) -> Result<(), RequestError> {
        if handle == 0 {
            return Err(RequestError::NotReady);
        }
        self.send_encoded(|out| encoder::encode_write_cmd(handle, value, out))
            .await
    }

    /// Write request, answered by a write response
    pub async fn write_req(&mut self, handle: u16, value: &[u8]) -> Result<(), RequestError> {
        if handle == 0 {
            return Err(RequestError::NotReady);
        }
        self.send_encoded(|out| encoder::encode_write_req(handle, value, out))
            .await
    }

    /// Read-by-type for characteristic declarations in `start..=end`
    pub async fn discover_characteristics(
        &mut self,
        start: u16,
        end: u16,
    ) -> Result<(), RequestError> {
        let range = HandleRange { start, end };
        let uuid = Uuid::from_u16(GATT_CHARAC_UUID);
        self.send_encoded(|out| encoder::encode_read_by_type_req(range, &uuid, out))
            .await
    }

    /// Acknowledge an indication
    pub async fn confirm(&mut self) -> Result<(), RequestError> {
        self.send_encoded(encoder::encode_confirmation).await
    }
}
