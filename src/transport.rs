//! ATT transport trait for abstraction and testability
//!
//! One transport carries whole ATT PDUs over a connected channel, one PDU
//! per send and per receive. The BlueZ L2CAP socket implements it in the
//! binary; tests use [`mock::MockTransport`].

use core::future::Future;
use core::time::Duration;

use thiserror::Error;

/// Errors that can occur on the ATT channel
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Socket level failure, details are logged where it happened
    #[error("transport I/O error")]
    Io,

    /// Peer closed the channel
    #[error("connection closed")]
    Closed,

    /// PDU was only partly sent
    #[error("short write: sent {sent} of {expected} bytes")]
    ShortWrite { sent: usize, expected: usize },

    /// Connection or send did not complete in time
    #[error("transport timed out")]
    Timeout,
}

/// Duplex PDU channel to one device
pub trait Transport {
    /// Send one PDU, returning the bytes written
    ///
    /// A write shorter than `data` is reported as [`TransportError::ShortWrite`].
    fn send(&mut self, data: &[u8]) -> impl Future<Output = Result<usize, TransportError>>;

    /// Wait up to `timeout` for one PDU
    ///
    /// Returns `Ok(None)` on timeout, which is not an error.
    fn receive(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> impl Future<Output = Result<Option<usize>, TransportError>>;

    /// MTU fixed at connect time
    fn mtu(&self) -> usize;
}

#[cfg(test)]
pub mod mock {
    //! Mock transport for testing

    use super::*;
    use crate::config::att::DEFAULT_LE_MTU;
    use core::cell::RefCell;
    use heapless::{Deque, Vec};

    pub const MOCK_FRAME_SIZE: usize = 64;
    pub const MOCK_QUEUE_LEN: usize = 256;

    pub type Frame = Vec<u8, MOCK_FRAME_SIZE>;

    /// Mock transport for unit testing
    pub struct MockTransport {
        /// PDUs returned by receive(), oldest first
        rx_frames: RefCell<Deque<Frame, MOCK_QUEUE_LEN>>,
        /// PDUs passed to send()
        tx_frames: RefCell<Vec<Frame, MOCK_QUEUE_LEN>>,
        /// Error to return on next send
        next_send_error: RefCell<Option<TransportError>>,
        /// Send call index that fails, counted from 0
        fail_send_at: RefCell<Option<(usize, TransportError)>>,
        /// Error to return on next receive
        next_receive_error: RefCell<Option<TransportError>>,
        send_calls: RefCell<usize>,
        mtu: usize,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::with_mtu(DEFAULT_LE_MTU)
        }

        pub fn with_mtu(mtu: usize) -> Self {
            Self {
                rx_frames: RefCell::new(Deque::new()),
                tx_frames: RefCell::new(Vec::new()),
                next_send_error: RefCell::new(None),
                fail_send_at: RefCell::new(None),
                next_receive_error: RefCell::new(None),
                send_calls: RefCell::new(0),
                mtu,
            }
        }

        /// Queue a PDU to be returned by receive()
        pub fn queue_rx(&self, pdu: &[u8]) {
            let mut frame = Frame::new();
            let _ = frame.extend_from_slice(pdu);
            let _ = self.rx_frames.borrow_mut().push_back(frame);
        }

        /// All PDUs sent so far
        pub fn sent(&self) -> Vec<Frame, MOCK_QUEUE_LEN> {
            self.tx_frames.borrow().clone()
        }

        /// Most recent PDU sent
        pub fn last_sent(&self) -> Option<Frame> {
            self.tx_frames.borrow().last().cloned()
        }

        pub fn clear_sent(&self) {
            self.tx_frames.borrow_mut().clear();
        }

        /// Set an error to be returned by the next send() call
        pub fn set_next_send_error(&self, error: TransportError) {
            *self.next_send_error.borrow_mut() = Some(error);
        }

        /// Fail the send() call with this index; the PDU is not recorded
        pub fn fail_send_at(&self, call: usize, error: TransportError) {
            *self.fail_send_at.borrow_mut() = Some((call, error));
        }

        /// Set an error to be returned by the next receive() call
        pub fn set_next_receive_error(&self, error: TransportError) {
            *self.next_receive_error.borrow_mut() = Some(error);
        }
    }

    impl Default for MockTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Transport for MockTransport {
        async fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
            let call = {
                let mut calls = self.send_calls.borrow_mut();
                let call = *calls;
                *calls += 1;
                call
            };

            if let Some(error) = self.next_send_error.borrow_mut().take() {
                return Err(error);
            }
            let scheduled = *self.fail_send_at.borrow();
            if let Some((at, error)) = scheduled {
                if at == call {
                    return Err(error);
                }
            }

            let mut frame = Frame::new();
            frame
                .extend_from_slice(data)
                .map_err(|_| TransportError::ShortWrite {
                    sent: 0,
                    expected: data.len(),
                })?;
            self.tx_frames
                .borrow_mut()
                .push(frame)
                .map_err(|_| TransportError::Io)?;
            Ok(data.len())
        }

        async fn receive(
            &mut self,
            buf: &mut [u8],
            _timeout: Duration,
        ) -> Result<Option<usize>, TransportError> {
            if let Some(error) = self.next_receive_error.borrow_mut().take() {
                return Err(error);
            }
            let Some(frame) = self.rx_frames.borrow_mut().pop_front() else {
                return Ok(None);
            };
            let count = core::cmp::min(buf.len(), frame.len());
            buf[..count].copy_from_slice(&frame[..count]);
            Ok(Some(count))
        }

        fn mtu(&self) -> usize {
            self.mtu
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_mock_receive_frames_in_order() {
            let mut transport = MockTransport::new();

            futures::executor::block_on(async {
                transport.queue_rx(&[0x0B, 0x01]);
                transport.queue_rx(&[0x1B, 0x29, 0x00]);

                let mut buf = [0u8; 32];
                let n = transport
                    .receive(&mut buf, Duration::from_millis(20))
                    .await
                    .unwrap();
                assert_eq!(n, Some(2));
                assert_eq!(&buf[..2], &[0x0B, 0x01]);

                let n = transport
                    .receive(&mut buf, Duration::from_millis(20))
                    .await
                    .unwrap();
                assert_eq!(n, Some(3));

                // Empty queue is a timeout
                let n = transport
                    .receive(&mut buf, Duration::from_millis(20))
                    .await
                    .unwrap();
                assert_eq!(n, None);
            });
        }

        #[test]
        fn test_mock_send_records() {
            let mut transport = MockTransport::new();

            futures::executor::block_on(async {
                transport.send(&[0x0A, 0x25, 0x00]).await.unwrap();
                transport.send(&[0x52, 0x27, 0x00, 0x06]).await.unwrap();

                let sent = transport.sent();
                assert_eq!(sent.len(), 2);
                assert_eq!(sent[0].as_slice(), &[0x0A, 0x25, 0x00]);
                assert_eq!(
                    transport.last_sent().unwrap().as_slice(),
                    &[0x52, 0x27, 0x00, 0x06]
                );
            });
        }

        #[test]
        fn test_mock_send_errors() {
            let mut transport = MockTransport::new();

            futures::executor::block_on(async {
                transport.set_next_send_error(TransportError::Io);
                assert_eq!(transport.send(&[1]).await, Err(TransportError::Io));

                // Error is cleared
                assert_eq!(transport.send(&[2]).await, Ok(1));

                transport.fail_send_at(3, TransportError::Timeout);
                assert_eq!(transport.send(&[3]).await, Ok(1));
                assert_eq!(transport.send(&[4]).await, Err(TransportError::Timeout));
                assert_eq!(transport.send(&[5]).await, Ok(1));

                let sent = transport.sent();
                assert_eq!(sent.len(), 3);
            });
        }

        #[test]
        fn test_mock_receive_error() {
            let mut transport = MockTransport::new();

            futures::executor::block_on(async {
                transport.set_next_receive_error(TransportError::Closed);
                let mut buf = [0u8; 8];
                assert_eq!(
                    transport.receive(&mut buf, Duration::ZERO).await,
                    Err(TransportError::Closed)
                );
                assert_eq!(transport.receive(&mut buf, Duration::ZERO).await, Ok(None));
            });
        }
    }
}
