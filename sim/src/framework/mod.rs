//! The hardware model is opaque to the driver. It is reached through a narrow
//! capability interface: two half-cycle primitives and a handful of
//! host-facing ports. Any generated or hand-written design can sit behind
//! [`HostModel`].

/// Widest host port the driver can shuttle, in bits.
pub const MAX_PAYLOAD_BITS: u32 = 64;

/// The model detected a violation of one of its own invariants while
/// settling combinational logic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct EvalFault(pub String);

impl EvalFault {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Model outputs on the host-facing ports, sampled once per cycle right
/// after combinational evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortSnapshot {
    /// The (possibly divided) host clock transitions on this cycle.
    pub host_clk_edge: bool,
    pub host_in_ready: bool,
    pub host_out_valid: bool,
    pub host_out_bits: u64,
}

/// Inputs on the host-facing ports. Written only by the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortDrive {
    pub host_in_valid: bool,
    pub host_in_bits: u64,
    pub host_out_ready: bool,
}

/// During a cycle the signals held in registers are propagated through the
/// combinational logic ([`HostModel::eval`]); the results are latched at the
/// end of the cycle ([`HostModel::advance`]). Both primitives take the value
/// of the reset input for that cycle.
///
/// Inputs written with [`HostModel::drive`] after `eval` are not visible to
/// the model until the following `eval`.
pub trait HostModel {
    /// Width of `host_in_bits` and `host_out_bits`, in bits.
    fn host_width(&self) -> u32;

    /// Seed the initial register contents. Called once, before reset.
    fn init(&mut self, seed: u64);

    /// Settle combinational logic for the current cycle.
    ///
    /// An `Err` reports an internal fault. The model must still accept the
    /// matching [`HostModel::advance`] so the cycle can finish cleanly.
    fn eval(&mut self, reset: bool) -> Result<(), EvalFault>;

    /// Latch next state. Must follow [`HostModel::eval`].
    fn advance(&mut self, reset: bool);

    fn snapshot(&self) -> PortSnapshot;

    fn drive(&mut self, drive: PortDrive);

    /// Deassert the debug request-valid and response-ready inputs. Designs
    /// without a debug port keep the default.
    fn quiesce_debug(&mut self) {}

    /// Human readable dump of the model state.
    fn print(&self, out: &mut dyn std::io::Write) -> std::io::Result<()>;
}

impl<M: HostModel + ?Sized> HostModel for Box<M> {
    fn host_width(&self) -> u32 {
        (**self).host_width()
    }
    fn init(&mut self, seed: u64) {
        (**self).init(seed)
    }
    fn eval(&mut self, reset: bool) -> Result<(), EvalFault> {
        (**self).eval(reset)
    }
    fn advance(&mut self, reset: bool) {
        (**self).advance(reset)
    }
    fn snapshot(&self) -> PortSnapshot {
        (**self).snapshot()
    }
    fn drive(&mut self, drive: PortDrive) {
        (**self).drive(drive)
    }
    fn quiesce_debug(&mut self) {
        (**self).quiesce_debug()
    }
    fn print(&self, out: &mut dyn std::io::Write) -> std::io::Result<()> {
        (**self).print(out)
    }
}
