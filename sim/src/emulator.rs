//! The cycle loop bridging a [`HostModel`] and a [`HostEndpoint`].

use std::io::Write;

use anyhow::Context;

use crate::config::{payload_len, ConfigError, RunConfig};
use crate::framework::{EvalFault, HostModel, PortDrive, PortSnapshot};
use crate::host::{HostEndpoint, StopToken};
use crate::report::{Outcome, RunReport};
use crate::trace::TraceSink;
use crate::utils::{get_u64, payload_bytes};

/// Host clock edges held in reset. Counting edges of the host domain rather
/// than simulation steps keeps a pipelined reset working at any clock ratio.
pub const RESET_HOST_EDGES: u32 = 3;

/// Inbound payload waiting for the model to accept it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct HostLatch {
    bits: u64,
    valid: bool,
}

/// Co-simulation driver. Owns the cycle counter and the inbound latch; the
/// model and the endpoint are borrowed back through accessors once the run
/// is over.
pub struct Emulator<M: HostModel, H: HostEndpoint> {
    model: M,
    host: H,
    config: RunConfig,
    trace: Option<Box<dyn TraceSink>>,
    /// destination of `--print-state` dumps
    diag: Box<dyn Write>,
    stop: StopToken,
    payload_len: usize,
    cycle_count: u64,
    latch: HostLatch,
    out_ready: bool,
    /// first fault and the cycle it was raised on
    fault: Option<(u64, EvalFault)>,
    unverified_sends: usize,
}

impl<M: HostModel, H: HostEndpoint> Emulator<M, H> {
    /// Validate the port width and seed the model.
    pub fn new(mut model: M, host: H, config: RunConfig) -> Result<Self, ConfigError> {
        let payload_len = payload_len(model.host_width())?;
        model.init(config.seed);
        Ok(Self {
            model,
            host,
            config,
            trace: None,
            diag: Box::new(std::io::stderr()),
            stop: StopToken::new(),
            payload_len,
            cycle_count: 0,
            latch: HostLatch::default(),
            out_ready: false,
            fault: None,
            unverified_sends: 0,
        })
    }

    pub fn with_trace(mut self, trace: Box<dyn TraceSink>) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Open the trace configured in [`RunConfig::trace`] for the model's
    /// port width.
    pub fn with_configured_trace(self) -> Result<Self, ConfigError> {
        match self.config.open_trace(self.model.host_width())? {
            Some(trace) => Ok(self.with_trace(trace)),
            None => Ok(self),
        }
    }

    pub fn with_diagnostics(mut self, diag: Box<dyn Write>) -> Self {
        self.diag = diag;
        self
    }

    /// Token a signal handler can use to end the run at the next cycle
    /// boundary.
    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }
    pub fn model(&self) -> &M {
        &self.model
    }
    pub fn host(&self) -> &H {
        &self.host
    }
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    fn port_drive(&self) -> PortDrive {
        PortDrive {
            host_in_valid: self.latch.valid,
            host_in_bits: self.latch.bits,
            host_out_ready: self.out_ready,
        }
    }

    fn record_fault(&mut self, cycle: u64, fault: EvalFault) {
        tracing::error!(cycle, %fault, "evaluation fault, stopping after this cycle");
        if self.fault.is_none() {
            self.fault = Some((cycle, fault));
        }
    }

    /// Hold reset until [`RESET_HOST_EDGES`] host clock edges went by, with
    /// every host handshake input deasserted. Returns the number of
    /// simulation steps taken.
    pub fn reset(&mut self) -> Result<u64, EvalFault> {
        self.latch = HostLatch::default();
        self.out_ready = false;
        let drive = self.port_drive();
        self.model.drive(drive);

        let mut edges = 0;
        let mut steps = 0;
        while edges < RESET_HOST_EDGES {
            let evaluated = self.model.eval(true);
            let edge = self.model.snapshot().host_clk_edge;
            self.model.advance(true);
            evaluated?;
            steps += 1;
            if edge {
                edges += 1;
            }
        }

        self.model.quiesce_debug();
        tracing::info!(steps, "reset sequence finished");
        Ok(steps)
    }

    /// Whether the loop should stop before the next cycle. A pending stop
    /// request is forwarded to the endpoint here.
    pub fn is_terminate(&self) -> bool {
        if self.stop.is_stopped() && !self.host.done() {
            tracing::warn!(cycle = self.cycle_count, "stop requested");
            self.host.stop();
        }
        self.host.done()
            || self.fault.is_some()
            || self
                .config
                .max_cycles
                .is_some_and(|max| self.cycle_count >= max)
    }

    /// Run one full clock step.
    pub fn step(&mut self) -> anyhow::Result<()> {
        let cycle = self.cycle_count;

        if let Err(fault) = self.model.eval(false) {
            self.record_fault(cycle, fault);
        }
        let ports = self.model.snapshot();

        if ports.host_clk_edge {
            self.host_handshake(cycle, &ports);
        }

        if self.config.verbose && cycle >= self.config.trace_start {
            self.model
                .print(&mut self.diag)
                .context("could not print model state")?;
        }

        // cycle 0 carries the initial state
        if cycle == 0 || cycle >= self.config.trace_start {
            let drive = self.port_drive();
            if let Some(trace) = self.trace.as_mut() {
                trace
                    .record(cycle, &ports, &drive)
                    .with_context(|| format!("could not write trace record for cycle {cycle}"))?;
            }
        }

        self.model.advance(false);
        self.cycle_count += 1;
        Ok(())
    }

    fn host_handshake(&mut self, cycle: u64, ports: &PortSnapshot) {
        // `host_in_ready` was computed against the latch driven so far, so a
        // high value means that payload is consumed on this edge.
        if ports.host_in_ready || !self.latch.valid {
            match self.host.recv_nonblocking(self.payload_len) {
                Some(bytes) => {
                    self.latch = HostLatch {
                        bits: get_u64(&bytes),
                        valid: true,
                    };
                    tracing::trace!(cycle, bits = self.latch.bits, "inbound payload latched");
                }
                None => self.latch.valid = false,
            }
        }

        if ports.host_out_valid {
            let payload = payload_bytes(ports.host_out_bits, self.payload_len);
            tracing::trace!(cycle, bits = ports.host_out_bits, "outbound payload");
            self.host.send(&payload);
            if self.fault.is_some() {
                self.unverified_sends += 1;
            }
        }
        self.out_ready = true;

        let drive = self.port_drive();
        self.model.drive(drive);
    }

    /// Flush and drop the trace sink. Further records are not written.
    pub fn close_trace(&mut self) -> anyhow::Result<()> {
        match self.trace.take() {
            Some(mut trace) => trace.close().context("could not close trace"),
            None => Ok(()),
        }
    }

    /// Reset the model, loop until a termination condition fires, then
    /// close the trace.
    pub fn run(&mut self) -> anyhow::Result<RunReport> {
        if let Err(fault) = self.reset() {
            self.record_fault(self.cycle_count, fault);
        }

        let looped = self.run_loop();
        let closed = self.close_trace();
        looped?;
        closed?;

        let report = self.report();
        tracing::info!(cycles = report.cycles, outcome = ?report.outcome, "run finished");
        Ok(report)
    }

    fn run_loop(&mut self) -> anyhow::Result<()> {
        while !self.is_terminate() {
            self.step()?;
        }
        Ok(())
    }

    /// Outcome of the run so far.
    pub fn report(&self) -> RunReport {
        let outcome = Outcome::classify(
            self.fault.as_ref().map(|(_, fault)| fault),
            self.host.exit_code(),
            self.cycle_count,
            self.config.max_cycles,
        );
        let cycles = match &self.fault {
            Some((cycle, _)) => *cycle,
            None => self.cycle_count,
        };
        RunReport {
            outcome,
            seed: self.config.seed,
            cycles,
            unverified_sends: self.unverified_sends,
        }
    }
}
