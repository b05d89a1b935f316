//! Per-device session state machine
//!
//! A session owns everything about one connected device: its ATT client,
//! characteristic table, cached build, version and status, the log decoder
//! with its output sink, and an optional firmware transfer. Every inbound
//! PDU goes through [`DeviceSession::process`], which interprets it against
//! the current [`SessionState`] and issues the next request.

pub mod events;
pub mod state;

use log::{debug, error, info, warn};
use thiserror::Error;

use crate::att::{decode, DecodeError, ErrorResponse, Pdu};
use crate::chars::{CharTable, Characteristic, NotReady, Role};
use crate::client::{AttClient, RequestError};
use crate::commands::Command;
use crate::config::att::{END_HANDLE, START_HANDLE};
use crate::config::limits::MAX_DEVICES;
use crate::debug::PduDump;
use crate::firmware::{FirmwareError, FirmwareUpdate, ImageSource};
use crate::logs::{BlockOutcome, DecoderOptions, LogDecoder, LogSink};
use crate::transport::{Transport, TransportError};
use crate::wed::{
    ConfigPayload, FirmwareState, FirmwareStatus, I2cResult, MaintCommand, PayloadError, Status,
    Version,
};

pub use events::{ExtendedStatusReport, SessionEvent};
pub use state::SessionState;

/// Boxed image so sessions for files and in-memory images share a type
pub type Firmware = FirmwareUpdate<Box<dyn ImageSource>>;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    NotReady(#[from] NotReady),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("error ({}) on handle {handle:#06x}", crate::att::ecode_name(*code))]
    Att { code: u8, handle: u16 },

    #[error(transparent)]
    Firmware(#[from] FirmwareError),

    #[error("download timed out")]
    Timeout,
}

impl From<ErrorResponse> for SessionError {
    fn from(err: ErrorResponse) -> Self {
        SessionError::Att {
            code: err.code,
            handle: err.handle,
        }
    }
}

/// Per-session switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Scan every characteristic declaration before reading the device
    pub full_discovery: bool,
    pub decoder: DecoderOptions,
}

pub struct DeviceSession<T: Transport, S: LogSink> {
    index: usize,
    client: AttClient<T>,
    chars: CharTable,
    state: SessionState,
    options: SessionOptions,
    scanning: bool,
    started: bool,
    build: Option<String>,
    version: Option<Version>,
    status: Option<Status>,
    decoder: LogDecoder,
    sink: S,
    firmware: Option<Firmware>,
}

impl<T: Transport, S: LogSink> DeviceSession<T, S> {
    pub fn new(index: usize, transport: T, sink: S, options: SessionOptions) -> Self {
        debug_assert!(index < MAX_DEVICES);
        Self {
            index,
            client: AttClient::new(transport),
            chars: CharTable::new(),
            state: SessionState::None,
            options,
            scanning: false,
            started: false,
            build: None,
            version: None,
            status: None,
            decoder: LogDecoder::new(options.decoder),
            sink,
            firmware: None,
        }
    }

    /// Attach the image a firmware update command will upload
    pub fn with_firmware(mut self, firmware: Firmware) -> Self {
        self.firmware = Some(firmware);
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == SessionState::Done
    }

    pub fn is_live(&self) -> bool {
        self.options.decoder.live
    }

    pub fn build(&self) -> Option<&str> {
        self.build.as_deref()
    }

    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    pub fn chars(&self) -> &CharTable {
        &self.chars
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn client(&self) -> &AttClient<T> {
        &self.client
    }

    /// Status is known and the command is still pending
    pub fn needs_dispatch(&self) -> bool {
        self.state == SessionState::Idle && !self.started
    }

    /// Kick off discovery
    pub async fn start(&mut self) -> Result<(), SessionError> {
        if self.options.full_discovery {
            info!("Session {}: discovering handles", self.index);
            self.scanning = true;
            self.client
                .discover_characteristics(START_HANDLE, END_HANDLE)
                .await?;
            return Ok(());
        }
        self.discover_next().await
    }

    /// Advance to the next discovery step whose characteristic is resolved
    async fn discover_next(&mut self) -> Result<(), SessionError> {
        while let Some((next, role)) = self.state.next_discovery() {
            self.state = next;
            if let Some(handle) = self.chars.handle_of(role) {
                self.client.read(handle).await?;
                return Ok(());
            }
            info!("Session {}: no {} characteristic, skipping", self.index, role);
        }
        // Nothing left to read the status from
        Err(NotReady(Role::Status).into())
    }

    /// Wait up to `timeout` for the next PDU from the device
    pub async fn receive(
        &mut self,
        buf: &mut [u8],
        timeout: core::time::Duration,
    ) -> Result<Option<usize>, SessionError> {
        Ok(self.client.transport_mut().receive(buf, timeout).await?)
    }

    /// Interpret one inbound PDU against the current state
    pub async fn process(&mut self, pdu: &[u8]) -> Result<Vec<SessionEvent>, SessionError> {
        let mut events = Vec::new();

        match decode(pdu)? {
            Pdu::Error(err) => self.on_error(err).await?,
            Pdu::Notification(value) => {
                if value.handle == self.chars.handle_of(Role::LogBlock).unwrap_or(0)
                    || self.state == SessionState::Download
                {
                    self.on_log_block(pdu, &mut events);
                } else {
                    debug!("Session {}: {}", self.index, PduDump(pdu));
                    events.push(SessionEvent::Unhandled(pdu.to_vec()));
                }
            }
            Pdu::Indication(_) => {
                self.client.confirm().await?;
                debug!("Session {}: {}", self.index, PduDump(pdu));
                events.push(SessionEvent::Unhandled(pdu.to_vec()));
            }
            Pdu::ReadByTypeResp(list) => {
                let mut last = 0;
                for entry in list.iter().filter_map(Characteristic::from_declaration) {
                    info!(
                        "Session {}: handle {:#06x} properties {:#04x} value handle {:#06x} UUID {}",
                        self.index, entry.handle, entry.properties, entry.value_handle, entry.uuid
                    );
                    self.chars.resolve([entry]);
                    last = entry.handle;
                    events.push(SessionEvent::Characteristic(entry));
                }
                if last != 0 && last < END_HANDLE {
                    self.client.discover_characteristics(last + 1, END_HANDLE).await?;
                } else if self.scanning {
                    self.scanning = false;
                    self.discover_next().await?;
                }
            }
            Pdu::ReadResp(data) => self.on_read(pdu, data, &mut events).await?,
            Pdu::WriteResp => debug!("Session {}: write acknowledged", self.index),
            _ => {
                debug!("Session {}: {}", self.index, PduDump(pdu));
                events.push(SessionEvent::Unhandled(pdu.to_vec()));
            }
        }

        Ok(events)
    }

    async fn on_error(&mut self, err: ErrorResponse) -> Result<(), SessionError> {
        if !err.is_not_found() {
            return Err(err.into());
        }

        if self.scanning {
            info!("Session {}: handle discovery complete", self.index);
            self.scanning = false;
            return self.discover_next().await;
        }
        match self.state {
            state if state.is_discovery() => self.discover_next().await,
            SessionState::Status => Err(NotReady(Role::Status).into()),
            _ => Err(err.into()),
        }
    }

    fn on_log_block(&mut self, pdu: &[u8], events: &mut Vec<SessionEvent>) {
        let downloading = self.state == SessionState::Download;

        match self.decoder.decode_notification(pdu, &mut self.sink) {
            Ok(BlockOutcome::EndOfStream { .. }) if downloading => {
                info!("Session {}: device closed the log stream", self.index);
                self.finish_download(events);
            }
            Ok(BlockOutcome::EndOfStream { .. }) => {}
            Ok(BlockOutcome::Decoded { .. }) => {
                let remaining = self.status.map_or(0, |s| s.num_log_entries);
                if downloading && self.decoder.is_complete(remaining) {
                    self.finish_download(events);
                }
            }
            Err(e) => {
                warn!("Session {}: {}, dropping rest of notification", self.index, e);
                events.push(SessionEvent::Desync(e));
            }
        }
    }

    fn finish_download(&mut self, events: &mut Vec<SessionEvent>) {
        let read = self.decoder.read_count();
        let total = self.decoder.total();
        info!("Session {}: downloaded {} of {} entries", self.index, read, total);
        events.push(SessionEvent::DownloadDone { read, total });
        self.state = SessionState::Done;
    }

    async fn on_read(
        &mut self,
        pdu: &[u8],
        data: &[u8],
        events: &mut Vec<SessionEvent>,
    ) -> Result<(), SessionError> {
        match self.state {
            SessionState::Build => {
                let end = data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
                let build = String::from_utf8_lossy(&data[..end]).into_owned();
                info!("Session {}: build {}", self.index, build);
                self.build = Some(build.clone());
                events.push(SessionEvent::Build(build));
                self.discover_next().await?;
            }
            SessionState::Version => {
                let version = Version::parse(data)?;
                let compatible = version.is_config_compatible();
                if !compatible {
                    warn!(
                        "Session {}: version {} (< 1.8.89: incompatible config)",
                        self.index, version
                    );
                }
                self.decoder.set_version(&version);
                self.version = Some(version);
                events.push(SessionEvent::Version {
                    version,
                    compatible,
                });
                self.discover_next().await?;
            }
            SessionState::Status => {
                let status = Status::parse(data)?;
                info!("Session {}: {}", self.index, status.report());
                self.status = Some(status);
                self.state = SessionState::Idle;
                events.push(SessionEvent::Status(status));
            }
            SessionState::Download | SessionState::Idle => {
                let status = Status::parse(data)?;
                debug!("Session {}: keep-alive {}", self.index, status.report());
                self.status = Some(status);
                events.push(SessionEvent::KeepAlive(status));
                if self.state == SessionState::Download
                    && status.num_log_entries == 0
                    && self.decoder.is_complete(0)
                {
                    self.finish_download(events);
                }
            }
            SessionState::FirmwareStatus | SessionState::FirmwareStatusWait => {
                let status = FirmwareStatus::parse(data)?;
                self.on_firmware_status(status, events).await?;
            }
            SessionState::DebugIo => {
                let result = I2cResult::parse(data)?;
                if result.is_ok() {
                    info!("Session {}: i2c read {:#04x}", self.index, result.data);
                } else {
                    warn!("Session {}: i2c failed ({})", self.index, result.status);
                }
                events.push(SessionEvent::I2c(result));
                self.state = SessionState::Done;
            }
            SessionState::ExtendedStatus => {
                let status = Status::parse(data)?;
                self.status = Some(status);
                events.push(SessionEvent::ExtendedStatus {
                    status,
                    version: self.version,
                });
                self.state = SessionState::Done;
            }
            SessionState::None | SessionState::Done => {
                debug!("Session {}: {}", self.index, PduDump(pdu));
                events.push(SessionEvent::Unhandled(pdu.to_vec()));
            }
        }
        Ok(())
    }

    async fn on_firmware_status(
        &mut self,
        status: FirmwareStatus,
        events: &mut Vec<SessionEvent>,
    ) -> Result<(), SessionError> {
        let handle = self.chars.require(Role::Firmware)?;
        let firmware = self.firmware.as_mut().ok_or(FirmwareError::NoImage)?;

        if self.state == SessionState::FirmwareStatus && status.state != FirmwareState::Idle {
            return Err(FirmwareError::Unfinished.into());
        }

        match status.state {
            FirmwareState::Idle | FirmwareState::Wait => {
                if self.state == SessionState::FirmwareStatus {
                    firmware.begin(&mut self.client, handle).await?;
                    self.state = SessionState::FirmwareStatusWait;
                }
                self.client.read(handle).await?;
            }
            FirmwareState::UploadReady => {
                let progress = firmware.upload_round(&mut self.client, handle).await?;
                debug!("Session {}: {}", self.index, progress);
                events.push(SessionEvent::FirmwareProgress(progress));
                self.client.read(handle).await?;
            }
            FirmwareState::UpdateReady => {
                firmware.commit(&mut self.client, handle).await?;
                events.push(SessionEvent::FirmwareDone);
                self.state = SessionState::Done;
            }
            FirmwareState::Error(code) => return Err(FirmwareError::Device(code).into()),
            FirmwareState::Unknown(state) => return Err(FirmwareError::UnknownState(state).into()),
        }
        Ok(())
    }

    /// Dispatch the user command, once per session
    pub async fn execute(&mut self, command: &Command) -> Result<Vec<SessionEvent>, SessionError> {
        let mut events = Vec::new();
        self.started = true;
        info!("Session {}: running {}", self.index, command.name());

        match command {
            Command::Status => self.state = SessionState::Done,
            Command::ExtendedStatus => {
                let handle = self.chars.require(Role::Status)?;
                self.client.read(handle).await?;
                self.state = SessionState::ExtendedStatus;
            }
            Command::Download(_) => {
                let total = self.status.map_or(0, |s| s.num_log_entries);
                if total == 0 && !self.is_live() {
                    info!("Session {}: nothing to download", self.index);
                    events.push(SessionEvent::NothingToDownload);
                    self.state = SessionState::Done;
                    return Ok(events);
                }
                self.write_config(command).await?;
                self.decoder.start_download(total);
                self.state = SessionState::Download;
            }
            Command::FirmwareUpdate => {
                let handle = self.chars.require(Role::Firmware)?;
                if self.firmware.is_none() {
                    return Err(FirmwareError::NoImage.into());
                }
                self.client.read(handle).await?;
                self.state = SessionState::FirmwareStatus;
            }
            Command::I2c(i2c) => {
                let handle = self.chars.require(Role::Debug)?;
                self.client.write(handle, &i2c.encode()).await?;
                self.client.read(handle).await?;
                self.state = SessionState::DebugIo;
            }
            _ => {
                self.write_config(command).await?;
                events.push(SessionEvent::ConfigWritten);
                self.state = SessionState::Done;
            }
        }
        Ok(events)
    }

    async fn write_config(&mut self, command: &Command) -> Result<(), SessionError> {
        let handle = self.chars.require(Role::Config)?;
        if let Some(payload) = command.config_payload(self.version.as_ref()) {
            self.client.write(handle, &payload.encode()).await?;
        }
        Ok(())
    }

    /// Refresh the status to keep the link up
    pub async fn keep_alive(&mut self) -> Result<(), SessionError> {
        let Some(handle) = self.chars.handle_of(Role::Status) else {
            return Ok(());
        };
        debug!("Session {}: keep alive", self.index);
        self.client.read(handle).await?;
        Ok(())
    }

    /// Last words before disconnecting
    ///
    /// An interrupted upload leaves the device half updated, so it gets a
    /// CPU reset.
    pub async fn shutdown(&mut self) {
        if self.state != SessionState::FirmwareStatusWait {
            return;
        }
        let Some(handle) = self.chars.handle_of(Role::Config) else {
            error!("Session {}: cannot reset device, no config characteristic", self.index);
            return;
        };
        warn!("Session {}: firmware update interrupted, resetting device", self.index);
        let reset = ConfigPayload::Maint(MaintCommand::Reset).encode();
        if let Err(e) = self.client.write(handle, &reset).await {
            error!("Session {}: reset failed: {}", self.index, e);
        }
    }
}
