//! Waveform output. The driver decides when a record is due; sinks decide
//! how it looks on disk.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use vcd::{IdCode, SimulationCommand, Value};

use crate::framework::{PortDrive, PortSnapshot};

/// Consumer of per-cycle state records. Opened before the main loop and
/// closed after it, whatever the outcome.
pub trait TraceSink {
    /// Record the host-facing port state of `cycle`.
    fn record(&mut self, cycle: u64, ports: &PortSnapshot, drive: &PortDrive) -> io::Result<()>;

    /// Flush everything written so far. No records follow.
    fn close(&mut self) -> io::Result<()>;
}

/// Byte sink shared with the VCD writer so it can be flushed on close.
#[derive(Clone)]
struct SharedOut(Rc<RefCell<Box<dyn Write>>>);

impl Write for SharedOut {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.borrow_mut().flush()
    }
}

struct PortIds {
    cycle: IdCode,
    clk_edge: IdCode,
    in_valid: IdCode,
    in_ready: IdCode,
    in_bits: IdCode,
    out_valid: IdCode,
    out_ready: IdCode,
    out_bits: IdCode,
}

/// Value change dump of the host-facing ports under a `Testbench` scope,
/// one timestamp per recorded cycle.
pub struct VcdTrace {
    writer: vcd::Writer<SharedOut>,
    out: SharedOut,
    ids: PortIds,
    width: u32,
    /// last values written, `None` before the first record
    last: Option<(PortSnapshot, PortDrive)>,
}

impl VcdTrace {
    /// Write the VCD header for ports `width` bits wide.
    pub fn new(out: Box<dyn Write>, width: u32) -> io::Result<Self> {
        let out = SharedOut(Rc::new(RefCell::new(out)));
        let mut writer = vcd::Writer::new(out.clone());

        writer.add_module("Testbench")?;
        let ids = PortIds {
            cycle: writer.add_wire(64, "cycle")?,
            clk_edge: writer.add_wire(1, "host_clk_edge")?,
            in_valid: writer.add_wire(1, "host_in_valid")?,
            in_ready: writer.add_wire(1, "host_in_ready")?,
            in_bits: writer.add_wire(width, "host_in_bits")?,
            out_valid: writer.add_wire(1, "host_out_valid")?,
            out_ready: writer.add_wire(1, "host_out_ready")?,
            out_bits: writer.add_wire(width, "host_out_bits")?,
        };
        writer.upscope()?;
        writer.enddefinitions()?;

        Ok(Self {
            writer,
            out,
            ids,
            width,
            last: None,
        })
    }

    fn vector(&mut self, id: IdCode, val: u64, width: u32) -> io::Result<()> {
        let bits = (0..width)
            .rev()
            .map(|i| scalar(i < 64 && (val >> i) & 1 == 1))
            .collect::<Vec<_>>();
        self.writer.change_vector(id, &bits)
    }

    fn write_all(&mut self, cycle: u64, ports: &PortSnapshot, drive: &PortDrive) -> io::Result<()> {
        let ids = &self.ids;
        let (edge, in_valid, in_ready) = (ids.clk_edge, ids.in_valid, ids.in_ready);
        let (out_valid, out_ready) = (ids.out_valid, ids.out_ready);
        let (cycle_id, in_bits, out_bits) = (ids.cycle, ids.in_bits, ids.out_bits);

        self.writer.change_scalar(edge, scalar(ports.host_clk_edge))?;
        self.writer.change_scalar(in_valid, scalar(drive.host_in_valid))?;
        self.writer.change_scalar(in_ready, scalar(ports.host_in_ready))?;
        self.writer.change_scalar(out_valid, scalar(ports.host_out_valid))?;
        self.writer.change_scalar(out_ready, scalar(drive.host_out_ready))?;
        self.vector(cycle_id, cycle, 64)?;
        self.vector(in_bits, drive.host_in_bits, self.width)?;
        self.vector(out_bits, ports.host_out_bits, self.width)
    }

    fn write_changes(
        &mut self,
        cycle: u64,
        ports: &PortSnapshot,
        drive: &PortDrive,
        prev: &(PortSnapshot, PortDrive),
    ) -> io::Result<()> {
        let (prev_ports, prev_drive) = prev;
        let ids = &self.ids;
        let scalars = [
            (ids.clk_edge, ports.host_clk_edge, prev_ports.host_clk_edge),
            (ids.in_valid, drive.host_in_valid, prev_drive.host_in_valid),
            (ids.in_ready, ports.host_in_ready, prev_ports.host_in_ready),
            (ids.out_valid, ports.host_out_valid, prev_ports.host_out_valid),
            (ids.out_ready, drive.host_out_ready, prev_drive.host_out_ready),
        ];
        let (cycle_id, in_bits, out_bits) = (ids.cycle, ids.in_bits, ids.out_bits);

        for (id, cur, old) in scalars {
            if cur != old {
                self.writer.change_scalar(id, scalar(cur))?;
            }
        }
        // the cycle counter changes on every record
        self.vector(cycle_id, cycle, 64)?;
        if drive.host_in_bits != prev_drive.host_in_bits {
            self.vector(in_bits, drive.host_in_bits, self.width)?;
        }
        if ports.host_out_bits != prev_ports.host_out_bits {
            self.vector(out_bits, ports.host_out_bits, self.width)?;
        }
        Ok(())
    }
}

fn scalar(bit: bool) -> Value {
    if bit {
        Value::V1
    } else {
        Value::V0
    }
}

impl TraceSink for VcdTrace {
    fn record(&mut self, cycle: u64, ports: &PortSnapshot, drive: &PortDrive) -> io::Result<()> {
        self.writer.timestamp(cycle)?;
        match self.last.take() {
            None => {
                self.writer.begin(SimulationCommand::Dumpvars)?;
                self.write_all(cycle, ports, drive)?;
                self.writer.end()?;
            }
            Some(prev) => self.write_changes(cycle, ports, drive, &prev)?,
        }
        self.last = Some((*ports, *drive));
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}
