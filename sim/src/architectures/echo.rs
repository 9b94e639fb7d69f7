//! Loopback tile. Every payload accepted on the host input comes back out on
//! the host output, in order.
//!
//! The host port lives on a divided clock domain and is reset through a
//! register pipeline clocked by that domain. While the inbound port offers a
//! payload that has not been taken, the tile checks that the payload stays
//! put and raises an [`EvalFault`] otherwise.

use std::collections::VecDeque;

use crate::framework::{EvalFault, HostModel, PortDrive, PortSnapshot};
use crate::utils::width_mask;

/// Payloads the tile can hold before it stops accepting.
pub const FIFO_DEPTH: usize = 2;

/// Combinational results of the last `eval`, consumed by `advance`.
#[derive(Debug, Clone, Copy)]
struct Settled {
    edge: bool,
    in_reset: bool,
    ready: bool,
    out_valid: bool,
    drive: PortDrive,
}

pub struct EchoTile {
    width: u32,
    divider: u32,
    stall_every: Option<u64>,

    // registers
    phase: u32,
    reset_pipe: Vec<bool>,
    fifo: VecDeque<u64>,
    host_cycles: u64,
    /// inbound payload offered on the last host edge and not taken
    offered: Option<u64>,
    debug_req_valid: bool,
    debug_resp_ready: bool,

    drive: PortDrive,
    ports: PortSnapshot,
    settled: Option<Settled>,
}

impl EchoTile {
    /// A tile with `width` bit host ports whose host clock ticks every
    /// `divider` simulation steps, reset through `reset_stages` registers.
    pub fn new(width: u32, divider: u32, reset_stages: usize) -> Self {
        Self {
            width,
            divider: divider.max(1),
            stall_every: None,
            phase: 0,
            reset_pipe: vec![true; reset_stages],
            fifo: VecDeque::with_capacity(FIFO_DEPTH),
            host_cycles: 0,
            offered: None,
            debug_req_valid: false,
            debug_resp_ready: false,
            drive: PortDrive::default(),
            ports: PortSnapshot::default(),
            settled: None,
        }
    }

    /// Drop inbound ready on every `period`-th host cycle.
    pub fn with_stall_every(mut self, period: u64) -> Self {
        self.stall_every = Some(period.max(2));
        self
    }

    pub fn fifo_len(&self) -> usize {
        self.fifo.len()
    }

    /// Host clock cycles since the tile left reset.
    pub fn host_cycles(&self) -> u64 {
        self.host_cycles
    }

    pub fn debug_port(&self) -> (bool, bool) {
        (self.debug_req_valid, self.debug_resp_ready)
    }

    fn internal_reset(&self, reset: bool) -> bool {
        self.reset_pipe.last().copied().unwrap_or(reset)
    }

    fn check_offer(&self, drive: &PortDrive) -> Result<(), EvalFault> {
        let Some(bits) = self.offered else {
            return Ok(());
        };
        if !drive.host_in_valid {
            return Err(EvalFault::new(format!(
                "inbound payload {bits:#x} withdrawn before it was accepted"
            )));
        }
        if drive.host_in_bits != bits {
            return Err(EvalFault::new(format!(
                "inbound payload changed from {bits:#x} to {:#x} before it was accepted",
                drive.host_in_bits
            )));
        }
        Ok(())
    }
}

impl HostModel for EchoTile {
    fn host_width(&self) -> u32 {
        self.width
    }

    fn init(&mut self, seed: u64) {
        self.phase = (seed % u64::from(self.divider)) as u32;
        for (i, stage) in self.reset_pipe.iter_mut().enumerate() {
            *stage = seed.rotate_right(((8 + i) % 64) as u32) & 1 == 1;
        }
        self.debug_req_valid = seed & 1 == 1;
        self.debug_resp_ready = (seed >> 1) & 1 == 1;
    }

    fn eval(&mut self, reset: bool) -> Result<(), EvalFault> {
        let edge = self.phase == 0;
        let in_reset = self.internal_reset(reset);
        let stalled = self
            .stall_every
            .is_some_and(|n| self.host_cycles % n == n - 1);
        let ready = !in_reset && !stalled && self.fifo.len() < FIFO_DEPTH;
        let out_valid = !in_reset && !self.fifo.is_empty();

        self.ports = PortSnapshot {
            host_clk_edge: edge,
            host_in_ready: ready,
            host_out_valid: out_valid,
            host_out_bits: self.fifo.front().copied().unwrap_or(0) & width_mask(self.width),
        };
        self.settled = Some(Settled {
            edge,
            in_reset,
            ready,
            out_valid,
            drive: self.drive,
        });

        if edge && !in_reset {
            self.check_offer(&self.drive)?;
        }
        Ok(())
    }

    fn advance(&mut self, reset: bool) {
        let Some(s) = self.settled.take() else {
            return;
        };
        self.phase = (self.phase + 1) % self.divider;
        if !s.edge {
            return;
        }

        // host clock domain
        if !self.reset_pipe.is_empty() {
            self.reset_pipe.rotate_right(1);
            self.reset_pipe[0] = reset;
        }
        if s.in_reset {
            self.fifo.clear();
            self.offered = None;
            self.host_cycles = 0;
            return;
        }
        self.host_cycles += 1;

        if s.out_valid && s.drive.host_out_ready {
            self.fifo.pop_front();
        }
        let accept = s.ready && s.drive.host_in_valid;
        if accept {
            self.fifo
                .push_back(s.drive.host_in_bits & width_mask(self.width));
        }
        self.offered = (s.drive.host_in_valid && !accept).then_some(s.drive.host_in_bits);
    }

    fn snapshot(&self) -> PortSnapshot {
        self.ports
    }

    fn drive(&mut self, drive: PortDrive) {
        self.drive = drive;
    }

    fn quiesce_debug(&mut self) {
        self.debug_req_valid = false;
        self.debug_resp_ready = false;
    }

    fn print(&self, out: &mut dyn std::io::Write) -> std::io::Result<()> {
        writeln!(
            out,
            "echo: phase={} reset={:?} host_cycles={} in_ready={} out_valid={} fifo={:x?} offered={:x?}",
            self.phase,
            self.reset_pipe,
            self.host_cycles,
            self.ports.host_in_ready,
            self.ports.host_out_valid,
            self.fifo,
            self.offered,
        )
    }
}
