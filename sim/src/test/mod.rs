//! Scripted stand-ins for the collaborators of the driver: a model whose
//! ports follow a script, an agent that records traffic, and trace and
//! diagnostic sinks that stay readable after being boxed away.


use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::rc::Rc;

use crate::framework::{EvalFault, HostModel, PortDrive, PortSnapshot};
use crate::host::HostEndpoint;
use crate::trace::TraceSink;

#[derive(Clone, Default)]
pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl io::Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Model whose outputs are a function of the main-loop cycle.
pub struct ScriptedModel {
    pub width: u32,
    /// host edge on every `edge_every`-th step, counted from the first
    /// reset step
    pub edge_every: u64,
    pub ready: fn(u64) -> bool,
    /// cycle -> outbound bits
    pub outbound: BTreeMap<u64, u64>,
    pub fault_at: Option<u64>,
    /// reset step that raises a fault
    pub reset_fault_at: Option<u64>,

    pub seed: Option<u64>,
    pub steps: u64,
    pub reset_steps: u64,
    pub reset_advances: u64,
    /// completed main-loop cycles
    pub cycle: u64,
    pub quiesced: bool,
    pub reset_drives: Vec<PortDrive>,
    /// drives written in the main loop, with the cycle they were written on
    pub drives: Vec<(u64, PortDrive)>,

    in_main_loop: bool,
    ports: PortSnapshot,
}

impl ScriptedModel {
    pub fn new(width: u32) -> Self {
        Self {
            width,
            edge_every: 1,
            ready: |_| true,
            outbound: BTreeMap::new(),
            fault_at: None,
            reset_fault_at: None,
            seed: None,
            steps: 0,
            reset_steps: 0,
            reset_advances: 0,
            cycle: 0,
            quiesced: false,
            reset_drives: Vec::new(),
            drives: Vec::new(),
            in_main_loop: false,
            ports: PortSnapshot::default(),
        }
    }

    pub fn edge_every(mut self, steps: u64) -> Self {
        self.edge_every = steps;
        self
    }

    pub fn ready(mut self, ready: fn(u64) -> bool) -> Self {
        self.ready = ready;
        self
    }

    pub fn send_at(mut self, cycle: u64, bits: u64) -> Self {
        self.outbound.insert(cycle, bits);
        self
    }

    pub fn fault_at(mut self, cycle: u64) -> Self {
        self.fault_at = Some(cycle);
        self
    }

    pub fn fault_in_reset(mut self, step: u64) -> Self {
        self.reset_fault_at = Some(step);
        self
    }
}

impl HostModel for ScriptedModel {
    fn host_width(&self) -> u32 {
        self.width
    }

    fn init(&mut self, seed: u64) {
        self.seed = Some(seed);
    }

    fn eval(&mut self, reset: bool) -> Result<(), EvalFault> {
        let edge = self.steps % self.edge_every == 0;
        self.steps += 1;
        if reset {
            let step = self.reset_steps;
            self.reset_steps += 1;
            self.ports = PortSnapshot {
                host_clk_edge: edge,
                ..Default::default()
            };
            if self.reset_fault_at == Some(step) {
                return Err(EvalFault::new(format!("scripted fault at reset step {step}")));
            }
            return Ok(());
        }

        self.in_main_loop = true;
        let cycle = self.cycle;
        let out = self.outbound.get(&cycle).copied();
        self.ports = PortSnapshot {
            host_clk_edge: edge,
            host_in_ready: (self.ready)(cycle),
            host_out_valid: out.is_some(),
            host_out_bits: out.unwrap_or(0),
        };
        if self.fault_at == Some(cycle) {
            return Err(EvalFault::new(format!("scripted fault at cycle {cycle}")));
        }
        Ok(())
    }

    fn advance(&mut self, reset: bool) {
        if reset {
            self.reset_advances += 1;
        } else {
            self.cycle += 1;
        }
    }

    fn snapshot(&self) -> PortSnapshot {
        self.ports
    }

    fn drive(&mut self, drive: PortDrive) {
        if self.in_main_loop {
            self.drives.push((self.cycle, drive));
        } else {
            self.reset_drives.push(drive);
        }
    }

    fn quiesce_debug(&mut self) {
        self.quiesced = true;
    }

    fn print(&self, out: &mut dyn io::Write) -> io::Result<()> {
        writeln!(out, "scripted cycle={}", self.cycle)
    }
}

/// Agent that hands out queued payloads and records what comes back.
#[derive(Default)]
pub struct ScriptedHost {
    pub inbound: VecDeque<Vec<u8>>,
    pub recv_calls: usize,
    pub sent: Vec<Vec<u8>>,
    /// payload that makes the agent finish, with its completion code
    pub finish_on: Option<(Vec<u8>, i32)>,
    pub finished: Option<i32>,
    pub stopped: Cell<bool>,
}

impl ScriptedHost {
    pub fn with_inbound(payloads: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            inbound: payloads.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn finish_on(mut self, payload: Vec<u8>, code: i32) -> Self {
        self.finish_on = Some((payload, code));
        self
    }
}

impl HostEndpoint for ScriptedHost {
    fn done(&self) -> bool {
        self.finished.is_some() || self.stopped.get()
    }

    fn exit_code(&self) -> i32 {
        self.finished.unwrap_or(0)
    }

    fn stop(&self) {
        self.stopped.set(true);
    }

    fn recv_nonblocking(&mut self, len: usize) -> Option<Vec<u8>> {
        self.recv_calls += 1;
        let mut payload = self.inbound.pop_front()?;
        payload.resize(len, 0);
        Some(payload)
    }

    fn send(&mut self, payload: &[u8]) {
        self.sent.push(payload.to_vec());
        if let Some((marker, code)) = &self.finish_on {
            if marker.as_slice() == payload {
                self.finished = Some(*code);
            }
        }
    }
}

/// Trace sink that only remembers which cycles were recorded.
#[derive(Clone, Default)]
pub struct RecordingTrace {
    pub cycles: Rc<RefCell<Vec<u64>>>,
    pub closed: Rc<Cell<bool>>,
    /// cycle whose record fails with an I/O error
    pub fail_at: Option<u64>,
}

impl RecordingTrace {
    pub fn failing_at(cycle: u64) -> Self {
        Self {
            fail_at: Some(cycle),
            ..Default::default()
        }
    }
}

impl TraceSink for RecordingTrace {
    fn record(&mut self, cycle: u64, _ports: &PortSnapshot, _drive: &PortDrive) -> io::Result<()> {
        if self.fail_at == Some(cycle) {
            return Err(io::Error::new(io::ErrorKind::Other, "trace disk full"));
        }
        self.cycles.borrow_mut().push(cycle);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed.set(true);
        Ok(())
    }
}
