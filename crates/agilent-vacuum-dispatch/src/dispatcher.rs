use std::time::Duration;

use agilent_vacuum_frame::{encode_frame, Access, FrameReader, Reply, ResultCode};
use agilent_vacuum_transport::Transport;
use bytes::BytesMut;
use tokio::sync::Mutex;

use crate::command::{CommandDescriptor, Request, Value};
use crate::error::{DispatchError, Result};

/// Timeout and retry policy of a link session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Controller address on the line. RS-232 links use 0.
    pub address: u8,
    /// How long to wait for a complete reply to one request.
    pub response_timeout: Duration,
    /// Total attempts per command, including the first.
    pub max_attempts: u32,
    /// Pause before the first retry; doubled for each further one.
    pub initial_backoff: Duration,
    /// Upper bound for the pause between retries.
    pub max_backoff: Duration,
    /// Quiet period that ends a drain of stale input.
    pub drain_quiet: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            address: 0,
            response_timeout: Duration::from_millis(500),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(500),
            drain_quiet: Duration::from_millis(20),
        }
    }
}

struct Link {
    reader: FrameReader<Box<dyn Transport>>,
    /// Set while an exchange is in progress. Still set on entry means the
    /// previous exchange was abandoned and its reply may still arrive.
    dirty: bool,
    open: bool,
}

/// Owns one link session and runs commands over it one at a time.
///
/// The link lock is held for a whole request/response/retry cycle, so
/// concurrent callers queue and every reply belongs to the request just
/// written.
pub struct Dispatcher {
    link: Mutex<Link>,
    config: DispatchConfig,
    endpoint: String,
}

impl Dispatcher {
    pub fn new(transport: Box<dyn Transport>, config: DispatchConfig) -> Self {
        let endpoint = transport.describe();
        Self {
            link: Mutex::new(Link {
                reader: FrameReader::new(transport),
                dirty: false,
                open: true,
            }),
            config,
            endpoint,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run one command against the configured address.
    pub async fn dispatch(&self, descriptor: &CommandDescriptor, request: Request) -> Result<Value> {
        self.dispatch_to(self.config.address, descriptor, request)
            .await
    }

    /// Run one command against `address`.
    ///
    /// Timeouts, corrupt frames and replies from the wrong address or window
    /// are retried with exponential backoff. Result codes, undecodable data
    /// and end of stream are returned at once.
    pub async fn dispatch_to(
        &self,
        address: u8,
        descriptor: &CommandDescriptor,
        request: Request,
    ) -> Result<Value> {
        let (access, payload) = match &request {
            Request::Read => (Access::Read, Vec::new()),
            Request::Write(value) => (Access::Write, descriptor.encode_value(value)?),
        };
        let mut wire = BytesMut::new();
        encode_frame(address, descriptor.window, access, &payload, &mut wire)
            .map_err(DispatchError::Encoding)?;

        let mut link = self.link.lock().await;
        if !link.open {
            return Err(DispatchError::Closed);
        }
        if link.dirty {
            link.reader.drain(self.config.drain_quiet).await?;
        } else {
            link.reader.clear();
        }

        link.dirty = true;
        let result = self
            .exchange(&mut link.reader, address, descriptor, access, &wire)
            .await;
        link.dirty = matches!(&result, Err(err) if err.is_transient() || err.is_link_failure());
        result
    }

    async fn exchange(
        &self,
        reader: &mut FrameReader<Box<dyn Transport>>,
        address: u8,
        descriptor: &CommandDescriptor,
        access: Access,
        wire: &[u8],
    ) -> Result<Value> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut backoff = self.config.initial_backoff.min(self.config.max_backoff);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2).min(self.config.max_backoff);
                reader.clear();
                if let Err(err) = reader.get_mut().clear_input().await {
                    return Err(link_failure(attempt, err.into()));
                }
            }

            match self.attempt(reader, address, descriptor, access, wire).await {
                Ok(value) => {
                    tracing::debug!(
                        window = descriptor.window,
                        command = descriptor.name,
                        attempt,
                        "command completed"
                    );
                    return Ok(value);
                }
                Err(err) if err.is_transient() => {
                    tracing::warn!(
                        window = descriptor.window,
                        command = descriptor.name,
                        attempt,
                        max_attempts,
                        error = %err,
                        "attempt failed"
                    );
                    last_error = Some(err);
                }
                Err(err @ DispatchError::Transport(_)) => {
                    return Err(link_failure(attempt, err));
                }
                Err(err) => {
                    tracing::debug!(
                        window = descriptor.window,
                        command = descriptor.name,
                        attempt,
                        error = %err,
                        "command refused"
                    );
                    return Err(err);
                }
            }
        }

        let source = last_error.unwrap_or(DispatchError::Timeout(self.config.response_timeout));
        tracing::error!(
            window = descriptor.window,
            command = descriptor.name,
            attempts = max_attempts,
            error = %source,
            "retries exhausted"
        );
        Err(DispatchError::Com {
            attempts: max_attempts,
            source: Box::new(source),
        })
    }

    async fn attempt(
        &self,
        reader: &mut FrameReader<Box<dyn Transport>>,
        address: u8,
        descriptor: &CommandDescriptor,
        access: Access,
        wire: &[u8],
    ) -> Result<Value> {
        reader.get_mut().write(wire).await.map_err(|err| {
            if err.is_closed() {
                DispatchError::Eof
            } else {
                DispatchError::Transport(err)
            }
        })?;

        let reply = reader.read_frame(self.config.response_timeout).await?;
        if reply.address() != address {
            return Err(DispatchError::AddressMismatch {
                expected: address,
                actual: reply.address(),
            });
        }

        match reply {
            Reply::Code { code, .. } => match (code, access) {
                (ResultCode::Ack, Access::Write) => Ok(Value::Ack),
                (ResultCode::Ack, Access::Read) => {
                    Err(descriptor.protocol("read acknowledged without data".to_string()))
                }
                (ResultCode::WindowDisabled, _) => Err(DispatchError::WindowDisabled {
                    window: descriptor.window,
                }),
                (code, _) => Err(DispatchError::Rejected {
                    window: descriptor.window,
                    code,
                }),
            },
            Reply::Data(frame) => {
                if frame.window != descriptor.window {
                    return Err(DispatchError::WindowMismatch {
                        expected: descriptor.window,
                        actual: frame.window,
                    });
                }
                match access {
                    Access::Read => descriptor.decode_value(&frame.payload),
                    Access::Write => {
                        Err(descriptor.protocol("write answered with data".to_string()))
                    }
                }
            }
        }
    }

    /// Tear down the session. Later commands fail with [`DispatchError::Closed`].
    pub async fn close(&self) -> Result<()> {
        let mut link = self.link.lock().await;
        if link.open {
            link.open = false;
            link.reader.clear();
            link.reader.get_mut().close().await?;
            tracing::debug!(link = %self.endpoint, "link session closed");
        }
        Ok(())
    }

    pub async fn is_open(&self) -> bool {
        self.link.lock().await.open
    }
}

fn link_failure(attempts: u32, err: DispatchError) -> DispatchError {
    match err {
        DispatchError::Eof => DispatchError::Eof,
        err => DispatchError::Com {
            attempts,
            source: Box::new(err),
        },
    }
}
