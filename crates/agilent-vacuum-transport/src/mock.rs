//! Scripted controller for deterministic tests.
//!
//! Every `write()` consumes the next queued [`MockReply`]; its chunks then
//! "arrive" at fixed offsets from the write instant on the tokio clock, so
//! tests run under a paused clock see exact timing. Writes with no queued
//! reply get silence. Clones share state, which lets a test keep a handle
//! after boxing the transport into a dispatcher.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::{Result, TransportError};
use crate::traits::{Connector, Transport};

const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn later(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay).unwrap_or(now + FAR_FUTURE)
}

/// Reply behaviour for one request.
#[derive(Debug, Clone, Default)]
pub struct MockReply {
    chunks: Vec<(Duration, Vec<u8>)>,
    eof_after: Option<Duration>,
}

impl MockReply {
    /// Reply bytes that are available immediately.
    pub fn bytes(data: impl AsRef<[u8]>) -> Self {
        Self::after(Duration::ZERO, data)
    }

    /// Reply bytes that arrive `delay` after the request is written.
    pub fn after(delay: Duration, data: impl AsRef<[u8]>) -> Self {
        Self::default().then(delay, data)
    }

    /// No reply at all; the read times out.
    pub fn silence() -> Self {
        Self::default()
    }

    /// The controller hangs up instead of replying.
    pub fn eof() -> Self {
        Self {
            chunks: Vec::new(),
            eof_after: Some(Duration::ZERO),
        }
    }

    /// Add another chunk arriving `delay` after the request.
    pub fn then(mut self, delay: Duration, data: impl AsRef<[u8]>) -> Self {
        self.chunks.push((delay, data.as_ref().to_vec()));
        self
    }

    /// Close the stream `delay` after the request, once earlier chunks are read.
    pub fn then_eof(mut self, delay: Duration) -> Self {
        self.eof_after = Some(delay);
        self
    }
}

/// Observable events on the mock link, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Write { at: Instant, data: Vec<u8> },
    Read { at: Instant, data: Vec<u8> },
    Cleared { discarded: usize },
    Closed,
}

#[derive(Debug)]
struct Arrival {
    at: Instant,
    data: Vec<u8>,
}

#[derive(Debug)]
struct MockState {
    replies: VecDeque<MockReply>,
    inbox: VecDeque<Arrival>,
    eof_at: Option<Instant>,
    open: bool,
    events: Vec<MockEvent>,
}

/// A [`Transport`] that replays scripted controller replies.
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    name: String,
}

enum Step {
    Deliver(usize),
    Wait(Duration),
    Eof,
    Timeout(Duration),
}

impl MockTransport {
    pub fn new() -> Self {
        Self::named("mock")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                replies: VecDeque::new(),
                inbox: VecDeque::new(),
                eof_at: None,
                open: true,
                events: Vec::new(),
            })),
            name: name.into(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the reply for the next unanswered request.
    pub fn push_reply(&self, reply: MockReply) -> &Self {
        self.lock().replies.push_back(reply);
        self
    }

    /// Make bytes arrive `delay` from now, independent of any request.
    pub fn inject(&self, delay: Duration, data: impl AsRef<[u8]>) {
        self.lock().inbox.push_back(Arrival {
            at: later(Instant::now(), delay),
            data: data.as_ref().to_vec(),
        });
    }

    /// Every request written so far.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.lock()
            .events
            .iter()
            .filter_map(|event| match event {
                MockEvent::Write { data, .. } => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.lock().events.clone()
    }

    pub fn remaining_replies(&self) -> usize {
        self.lock().replies.len()
    }

    /// Reopen after `close()`; connectors call this for each new session.
    pub fn reopen(&self) {
        let mut state = self.lock();
        state.open = true;
        state.inbox.clear();
        state.eof_at = None;
    }

    fn next_step(&self, capacity: usize, deadline: Instant) -> Result<Step> {
        let mut state = self.lock();
        if !state.open {
            return Err(TransportError::NotConnected);
        }
        let now = Instant::now();

        if let Some(front) = state.inbox.front() {
            if front.at <= now {
                return Ok(Step::Deliver(capacity.min(front.data.len())));
            }
            if front.at < deadline {
                return Ok(Step::Wait(front.at - now));
            }
        } else if let Some(eof_at) = state.eof_at {
            if eof_at <= now {
                return Ok(Step::Eof);
            }
            if eof_at < deadline {
                return Ok(Step::Wait(eof_at - now));
            }
        }

        Ok(Step::Timeout(deadline.saturating_duration_since(now)))
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.lock();
        if !state.open {
            return Err(TransportError::NotConnected);
        }
        let now = Instant::now();
        state.events.push(MockEvent::Write {
            at: now,
            data: data.to_vec(),
        });

        if let Some(reply) = state.replies.pop_front() {
            for (delay, chunk) in reply.chunks {
                state.inbox.push_back(Arrival {
                    at: later(now, delay),
                    data: chunk,
                });
            }
            if let Some(delay) = reply.eof_after {
                state.eof_at = Some(later(now, delay));
            }
        }
        Ok(())
    }

    async fn read_with_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let deadline = later(Instant::now(), timeout);
        loop {
            match self.next_step(buf.len(), deadline)? {
                Step::Deliver(n) => {
                    let mut state = self.lock();
                    let Some(front) = state.inbox.front_mut() else {
                        continue;
                    };
                    let data: Vec<u8> = front.data.drain(..n).collect();
                    if front.data.is_empty() {
                        state.inbox.pop_front();
                    }
                    buf[..n].copy_from_slice(&data);
                    state.events.push(MockEvent::Read {
                        at: Instant::now(),
                        data,
                    });
                    return Ok(n);
                }
                Step::Wait(delay) => tokio::time::sleep(delay).await,
                Step::Eof => return Err(TransportError::Closed),
                Step::Timeout(remaining) => {
                    tokio::time::sleep(remaining).await;
                    return Err(TransportError::Timeout(timeout));
                }
            }
        }
    }

    async fn clear_input(&mut self) -> Result<()> {
        let mut state = self.lock();
        if !state.open {
            return Err(TransportError::NotConnected);
        }
        let now = Instant::now();
        let mut discarded = 0;
        while state.inbox.front().is_some_and(|arrival| arrival.at <= now) {
            if let Some(arrival) = state.inbox.pop_front() {
                discarded += arrival.data.len();
            }
        }
        state.events.push(MockEvent::Cleared { discarded });
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.lock();
        if state.open {
            state.open = false;
            state.events.push(MockEvent::Closed);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

/// Hands out the shared [`MockTransport`] on every `open()`.
#[derive(Debug, Clone)]
pub struct MockConnector {
    transport: MockTransport,
    failures: Arc<Mutex<VecDeque<std::io::ErrorKind>>>,
    opens: Arc<Mutex<usize>>,
}

impl MockConnector {
    pub fn new(transport: MockTransport) -> Self {
        Self {
            transport,
            failures: Arc::new(Mutex::new(VecDeque::new())),
            opens: Arc::new(Mutex::new(0)),
        }
    }

    /// Make the next `open()` fail with `kind`.
    pub fn fail_next_open(&self, kind: std::io::ErrorKind) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(kind);
    }

    /// Number of successful opens.
    pub fn open_count(&self) -> usize {
        *self.opens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn transport(&self) -> &MockTransport {
        &self.transport
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self) -> Result<Box<dyn Transport>> {
        let failure = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(kind) = failure {
            return Err(TransportError::Open {
                target: self.transport.name.clone(),
                source: std::io::Error::from(kind),
            });
        }

        self.transport.reopen();
        *self.opens.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(Box::new(self.transport.clone()))
    }

    fn describe(&self) -> String {
        self.transport.name.clone()
    }
}
