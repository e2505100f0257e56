use std::time::Duration;

use agilent_vacuum_transport::{Transport, TransportError};
use bytes::BytesMut;
use tokio::time::Instant;
use tokio_util::codec::Decoder;

use crate::codec::{Reply, WindowCodec, MAX_FRAME_LEN};
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 64;
const MAX_DRAIN_BYTES: usize = 4 * 1024;
/// Stand-in deadline for timeouts too large to add to the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Reads complete replies from a [`Transport`].
///
/// Handles partial reads internally; callers always get complete frames.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    codec: WindowCodec,
}

impl<T: Transport> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(MAX_FRAME_LEN * 2),
            codec: WindowCodec,
        }
    }

    /// Read the next complete reply, waiting at most `timeout` in total.
    ///
    /// Fails with [`FrameError::Timeout`] when nothing arrived,
    /// [`FrameError::Incomplete`] when bytes arrived but no full frame did,
    /// and [`FrameError::ConnectionClosed`] at end of stream.
    pub async fn read_frame(&mut self, timeout: Duration) -> Result<Reply> {
        let now = Instant::now();
        let deadline = now.checked_add(timeout).unwrap_or(now + FAR_FUTURE);
        let mut received = self.buf.len();

        loop {
            if let Some(reply) = self.codec.decode(&mut self.buf)? {
                return Ok(reply);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(if received == 0 {
                    FrameError::Timeout(timeout)
                } else {
                    FrameError::Incomplete { received }
                });
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            match self.inner.read_with_timeout(&mut chunk, remaining).await {
                Ok(n) => {
                    received += n;
                    self.buf.extend_from_slice(&chunk[..n]);
                }
                Err(TransportError::Timeout(_)) => continue,
                Err(err) if err.is_closed() => return Err(FrameError::ConnectionClosed),
                Err(err) => return Err(FrameError::Transport(err)),
            }
        }
    }

    /// Drop buffered bytes that belong to an earlier exchange.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Discard stale input until the line stays quiet for `quiet`.
    ///
    /// Used after an exchange was abandoned midway, so its late reply cannot
    /// be mistaken for the answer to the next request. Returns the number of
    /// bytes thrown away.
    pub async fn drain(&mut self, quiet: Duration) -> Result<usize> {
        let mut discarded = self.buf.len();
        self.buf.clear();
        self.inner.clear_input().await?;

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        while discarded < MAX_DRAIN_BYTES {
            match self.inner.read_with_timeout(&mut chunk, quiet).await {
                Ok(n) => discarded += n,
                Err(TransportError::Timeout(_)) => break,
                Err(err) if err.is_closed() => return Err(FrameError::ConnectionClosed),
                Err(err) => return Err(FrameError::Transport(err)),
            }
        }

        if discarded > 0 {
            tracing::debug!(
                link = %self.inner.describe(),
                discarded,
                "drained stale bytes"
            );
        }
        Ok(discarded)
    }

    /// Mutably borrow the underlying transport, e.g. to write a request.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    use agilent_vacuum_transport::{MockReply, MockTransport};
    use bytes::BytesMut;

    use super::*;
    use crate::code::ResultCode;
    use crate::codec::{encode_frame, encode_result, Access};

    fn status_reply(value: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(0, 205, Access::Read, value, &mut buf).unwrap();
        buf.to_vec()
    }

    async fn request(mock: &MockTransport) -> FrameReader<MockTransport> {
        let mut reader = FrameReader::new(mock.clone());
        reader.get_mut().write(b"request").await.unwrap();
        reader
    }

    #[tokio::test(start_paused = true)]
    async fn reads_single_frame() {
        let mock = MockTransport::new();
        mock.push_reply(MockReply::bytes(status_reply(b"000005")));

        let mut reader = request(&mock).await;
        let reply = reader.read_frame(Duration::from_millis(100)).await.unwrap();
        assert!(matches!(reply, Reply::Data(ref f) if f.payload.as_ref() == b"000005"));
    }

    #[tokio::test(start_paused = true)]
    async fn assembles_frame_from_partial_reads() {
        let wire = status_reply(b"000000");
        let mock = MockTransport::new();
        let mut reply = MockReply::silence();
        for (i, byte) in wire.iter().enumerate() {
            reply = reply.then(Duration::from_millis(i as u64), [*byte]);
        }
        mock.push_reply(reply);

        let mut reader = request(&mock).await;
        let reply = reader.read_frame(Duration::from_millis(100)).await.unwrap();
        assert!(matches!(reply, Reply::Data(ref f) if f.window == 205));
    }

    #[tokio::test(start_paused = true)]
    async fn silence_is_timeout() {
        let mock = MockTransport::new();
        let mut reader = request(&mock).await;

        let err = reader.read_frame(Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, FrameError::Timeout(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn partial_frame_is_incomplete() {
        let wire = status_reply(b"000000");
        let mock = MockTransport::new();
        mock.push_reply(MockReply::bytes(&wire[..5]));

        let mut reader = request(&mock).await;
        let err = reader.read_frame(Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, FrameError::Incomplete { received: 5 }));
    }

    #[tokio::test(start_paused = true)]
    async fn eof_is_connection_closed() {
        let mock = MockTransport::new();
        mock.push_reply(MockReply::eof());

        let mut reader = request(&mock).await;
        let err = reader.read_frame(Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn skips_line_noise_before_frame() {
        let mut wire = b"\x00\xFF\r\n".to_vec();
        let mut ack = BytesMut::new();
        encode_result(0, ResultCode::Ack, &mut ack).unwrap();
        wire.extend_from_slice(&ack);

        let mock = MockTransport::new();
        mock.push_reply(MockReply::bytes(wire));

        let mut reader = request(&mock).await;
        let reply = reader.read_frame(Duration::from_millis(50)).await.unwrap();
        assert_eq!(
            reply,
            Reply::Code {
                address: 0,
                code: ResultCode::Ack
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_timeout_still_reads() {
        let mock = MockTransport::new();
        mock.inject(Duration::from_millis(5), status_reply(b"000005"));

        let mut reader = FrameReader::new(mock.clone());
        let reply = reader.read_frame(Duration::MAX).await.unwrap();
        assert!(matches!(reply, Reply::Data(ref f) if f.payload.as_ref() == b"000005"));
    }

    #[tokio::test(start_paused = true)]
    async fn drain_discards_late_reply() {
        let mock = MockTransport::new();
        mock.push_reply(MockReply::after(
            Duration::from_millis(30),
            status_reply(b"000001"),
        ));

        let mut reader = request(&mock).await;
        let discarded = reader.drain(Duration::from_millis(50)).await.unwrap();
        assert_eq!(discarded, status_reply(b"000001").len());

        let err = reader.read_frame(Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, FrameError::Timeout(_)));
    }
}
