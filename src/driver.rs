//! Session driver
//!
//! Runs every connected device through its session in one cooperative
//! loop. Each pass polls the quit signal, then gives each live device one
//! bounded receive, so a quiet device never stalls the others.

use std::time::{Duration, Instant};

use log::{error, info, warn};

use crate::commands::Command;
use crate::config::att::RX_BUFFER_SIZE;
use crate::config::timing::{DOWNLOAD_TIMEOUT_MS, KEEPALIVE_MS, POLL_MS};
use crate::logs::LogSink;
use crate::session::{DeviceSession, SessionError, SessionEvent, SessionState};
use crate::transport::Transport;

/// Per-device wall clock timers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness {
    /// Last request or packet, drives the keep-alive
    last_activity: Instant,
    /// Last packet received, drives the download timeout
    last_packet: Instant,
}

impl Liveness {
    pub fn new(now: Instant) -> Self {
        Self {
            last_activity: now,
            last_packet: now,
        }
    }

    /// A PDU arrived
    pub fn packet(&mut self, now: Instant) {
        self.last_activity = now;
        self.last_packet = now;
    }

    /// A request went out without a reply yet
    pub fn activity(&mut self, now: Instant) {
        self.last_activity = now;
    }

    pub fn keep_alive_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_activity) >= Duration::from_millis(KEEPALIVE_MS)
    }

    pub fn download_timed_out(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_packet) > Duration::from_millis(DOWNLOAD_TIMEOUT_MS)
    }
}

/// User quit signal, polled once per pass
pub trait Interrupt {
    fn quit_requested(&mut self) -> bool;
}

/// Never quits
pub struct NoInterrupt;

impl Interrupt for NoInterrupt {
    fn quit_requested(&mut self) -> bool {
        false
    }
}

impl Interrupt for &std::sync::atomic::AtomicBool {
    fn quit_requested(&mut self) -> bool {
        self.load(std::sync::atomic::Ordering::Relaxed)
    }
}

/// Driver bookkeeping for one session
struct Slot {
    liveness: Liveness,
    result: Option<Result<(), SessionError>>,
}

/// Drive all sessions until each is done or failed, or the user quits
///
/// Every event is handed to `on_event` with the session index. A failed
/// session is counted as done and the others carry on. Sessions still
/// running when the user quits report `Ok`. All sessions get a shutdown
/// pass before returning.
pub async fn run<T, S, I, F>(
    sessions: &mut [DeviceSession<T, S>],
    command: &Command,
    interrupt: &mut I,
    mut on_event: F,
) -> Vec<Result<(), SessionError>>
where
    T: Transport,
    S: LogSink,
    I: Interrupt,
    F: FnMut(usize, &SessionEvent),
{
    let now = Instant::now();
    let mut slots: Vec<Slot> = sessions
        .iter()
        .map(|_| Slot {
            liveness: Liveness::new(now),
            result: None,
        })
        .collect();

    for (session, slot) in sessions.iter_mut().zip(slots.iter_mut()) {
        if let Err(e) = session.start().await {
            error!("Device {}: {}", session.index(), e);
            slot.result = Some(Err(e));
        }
    }

    let mut buf = [0u8; RX_BUFFER_SIZE];
    let poll = Duration::from_millis(POLL_MS);

    while slots.iter().any(|slot| slot.result.is_none()) {
        if interrupt.quit_requested() {
            info!("Driver: quit requested");
            break;
        }

        for (session, slot) in sessions.iter_mut().zip(slots.iter_mut()) {
            if slot.result.is_some() {
                continue;
            }
            let index = session.index();
            match poll_session(session, &mut slot.liveness, command, &mut buf, poll, &mut on_event)
                .await
            {
                Err(e) => {
                    error!("Device {}: {}", index, e);
                    slot.result = Some(Err(e));
                }
                Ok(()) if session.is_done() => {
                    info!("Device {}: done", index);
                    slot.result = Some(Ok(()));
                }
                Ok(()) => {}
            }
        }
    }

    for session in sessions.iter_mut() {
        session.shutdown().await;
    }

    slots
        .into_iter()
        .map(|slot| slot.result.unwrap_or(Ok(())))
        .collect()
}

/// One pass for one session: dispatch, receive, then the timers
async fn poll_session<T, S, F>(
    session: &mut DeviceSession<T, S>,
    liveness: &mut Liveness,
    command: &Command,
    buf: &mut [u8],
    poll: Duration,
    on_event: &mut F,
) -> Result<(), SessionError>
where
    T: Transport,
    S: LogSink,
    F: FnMut(usize, &SessionEvent),
{
    let index = session.index();

    if session.needs_dispatch() {
        for event in session.execute(command).await? {
            on_event(index, &event);
        }
        // Download silence is measured from the request
        liveness.packet(Instant::now());
        if session.is_done() {
            return Ok(());
        }
    }

    if let Some(len) = session.receive(buf, poll).await? {
        liveness.packet(Instant::now());
        for event in session.process(&buf[..len]).await? {
            on_event(index, &event);
        }
        return Ok(());
    }

    let now = Instant::now();
    let state = session.state();
    if state == SessionState::Download && !session.is_live() && liveness.download_timed_out(now) {
        warn!("Device {}: no log data for {} ms", index, DOWNLOAD_TIMEOUT_MS);
        return Err(SessionError::Timeout);
    }
    if state.accepts_keep_alive() && liveness.keep_alive_due(now) {
        session.keep_alive().await?;
        liveness.activity(now);
    }
    Ok(())
}
