//! The host-interface side of the co-simulation: the agent that loads
//! programs, polls status and decides pass/fail.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;

/// Transport endpoint of the controlling agent.
///
/// The driver hands payloads over as little-endian byte strings exactly one
/// port width long.
pub trait HostEndpoint {
    /// The agent considers the run finished.
    fn done(&self) -> bool;

    /// Completion code reported by the agent, 0 meaning success.
    fn exit_code(&self) -> i32;

    /// Mark the endpoint done. Idempotent, and must be safe to call from an
    /// asynchronous context.
    fn stop(&self);

    /// Fetch one payload of `len` bytes if one is ready. Never blocks.
    fn recv_nonblocking(&mut self, len: usize) -> Option<Vec<u8>>;

    /// Accept one payload from the model. There is no back-pressure on this
    /// path.
    fn send(&mut self, payload: &[u8]);
}

impl<H: HostEndpoint + ?Sized> HostEndpoint for Box<H> {
    fn done(&self) -> bool {
        (**self).done()
    }
    fn exit_code(&self) -> i32 {
        (**self).exit_code()
    }
    fn stop(&self) {
        (**self).stop()
    }
    fn recv_nonblocking(&mut self, len: usize) -> Option<Vec<u8>> {
        (**self).recv_nonblocking(len)
    }
    fn send(&mut self, payload: &[u8]) {
        (**self).send(payload)
    }
}

/// Cancellation flag shared between the driver and a signal handler. The
/// handler only sets it; the driver polls it between cycles.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Built-in agent for loopback designs.
///
/// Streams a byte image to the model one payload unit at a time, zero
/// padding the tail, and expects every unit back in order. Finishes with
/// code 0 once everything came back, or with the 1-based index of the first
/// payload that did not match.
pub struct LoopbackHost {
    image: Vec<u8>,
    cursor: usize,
    in_flight: VecDeque<Vec<u8>>,
    echoed: usize,
    /// `Some` once the comparison finished
    verdict: Option<i32>,
    stopped: AtomicBool,
}

impl LoopbackHost {
    pub fn new(image: Vec<u8>) -> Self {
        let verdict = image.is_empty().then_some(0);
        Self {
            image,
            cursor: 0,
            in_flight: VecDeque::new(),
            echoed: 0,
            verdict,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let image = std::fs::read(path)
            .with_context(|| format!("could not read payload file `{}`", path.display()))?;
        tracing::info!(bytes = image.len(), "loaded payload image");
        Ok(Self::new(image))
    }

    /// Number of payloads that came back intact.
    pub fn echoed(&self) -> usize {
        self.echoed
    }

    fn finish(&mut self, code: i32) {
        if self.verdict.is_none() {
            self.verdict = Some(code);
        }
    }
}

impl HostEndpoint for LoopbackHost {
    fn done(&self) -> bool {
        self.verdict.is_some() || self.stopped.load(Ordering::SeqCst)
    }

    fn exit_code(&self) -> i32 {
        self.verdict.unwrap_or(0)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn recv_nonblocking(&mut self, len: usize) -> Option<Vec<u8>> {
        if len == 0 || self.cursor >= self.image.len() {
            return None;
        }
        let end = (self.cursor + len).min(self.image.len());
        let mut payload = self.image[self.cursor..end].to_vec();
        payload.resize(len, 0);
        self.cursor += len;
        self.in_flight.push_back(payload.clone());
        Some(payload)
    }

    fn send(&mut self, payload: &[u8]) {
        if self.verdict.is_some() {
            tracing::trace!("payload after completion ignored");
            return;
        }
        let index = self.echoed + 1;
        match self.in_flight.pop_front() {
            Some(expected) if expected == payload => {
                self.echoed += 1;
                tracing::trace!(index, "payload echoed");
                if self.cursor >= self.image.len() && self.in_flight.is_empty() {
                    self.finish(0);
                }
            }
            expected => {
                tracing::warn!(index, ?expected, got = ?payload, "loopback mismatch");
                self.finish(i32::try_from(index).unwrap_or(i32::MAX));
            }
        }
    }
}
