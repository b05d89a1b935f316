//! BlueZ transport: raw ATT over an LE L2CAP socket
//!
//! ATT runs on the fixed L2CAP channel 4, so this opens a SeqPacket socket
//! bound to the local adapter and connects it to that channel on the
//! device. One socket packet is one ATT PDU.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use bluer::l2cap::{SeqPacket, Socket, SocketAddr};
use bluer::{Address, AddressType};
use log::{error, info};
use tokio::time::timeout;

use crate::config::att::{CID, DEFAULT_LE_MTU, MAX_MTU};
use crate::config::timing::CONNECT_TIMEOUT_MS;
use crate::transport::{Transport, TransportError};

/// Connection parameters shared by every device in a run
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Adapter name such as `hci0`
    pub adapter: String,
    /// Device uses a random address
    pub random: bool,
    /// ATT MTU assumed for the whole session
    pub mtu: usize,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            adapter: "hci0".into(),
            random: false,
            mtu: DEFAULT_LE_MTU,
        }
    }
}

/// Connected ATT channel to one device
pub struct BluezTransport {
    socket: SeqPacket,
    address: Address,
    mtu: usize,
}

impl BluezTransport {
    /// Connect to `address`, giving up after the connect timeout
    pub async fn connect(
        session: &bluer::Session,
        address: Address,
        options: &ConnectOptions,
    ) -> Result<Self> {
        let adapter = session
            .adapter(&options.adapter)
            .with_context(|| format!("Adapter {} not available", options.adapter))?;
        let local = adapter
            .address()
            .await
            .with_context(|| format!("Cannot read address of {}", options.adapter))?;

        let socket = Socket::<SeqPacket>::new_seq_packet().context("Cannot create L2CAP socket")?;
        socket
            .bind(SocketAddr {
                addr: local,
                addr_type: AddressType::LePublic,
                psm: 0,
                cid: CID,
            })
            .context("Cannot bind L2CAP socket")?;

        let addr_type = if options.random {
            AddressType::LeRandom
        } else {
            AddressType::LePublic
        };
        let target = SocketAddr {
            addr: address,
            addr_type,
            psm: 0,
            cid: CID,
        };

        info!("BlueZ: connecting to {} via {}", address, options.adapter);
        let socket = timeout(Duration::from_millis(CONNECT_TIMEOUT_MS), socket.connect(target))
            .await
            .map_err(|_| anyhow!("Connection to {} timed out", address))?
            .with_context(|| format!("Cannot connect to {}", address))?;
        info!("BlueZ: connected to {}", address);

        Ok(Self {
            socket,
            address,
            mtu: options.mtu.clamp(DEFAULT_LE_MTU, MAX_MTU),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }
}

impl Transport for BluezTransport {
    async fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let sent = self.socket.send(data).await.map_err(|e| {
            error!("BlueZ: send to {} failed: {}", self.address, e);
            TransportError::Io
        })?;
        if sent < data.len() {
            return Err(TransportError::ShortWrite {
                sent,
                expected: data.len(),
            });
        }
        Ok(sent)
    }

    async fn receive(
        &mut self,
        buf: &mut [u8],
        wait: Duration,
    ) -> Result<Option<usize>, TransportError> {
        match timeout(wait, self.socket.recv(buf)).await {
            Err(_) => Ok(None),
            Ok(Ok(0)) => Err(TransportError::Closed),
            Ok(Ok(len)) => Ok(Some(len)),
            Ok(Err(e)) => {
                error!("BlueZ: receive from {} failed: {}", self.address, e);
                Err(TransportError::Io)
            }
        }
    }

    fn mtu(&self) -> usize {
        self.mtu
    }
}
