//! Run configuration, fixed once the run starts.

use std::io;
use std::path::PathBuf;

use crate::framework::MAX_PAYLOAD_BITS;
use crate::trace::{TraceSink, VcdTrace};

/// Startup failures. All of them are fatal before reset begins.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("host port width must be a non-zero multiple of 8 up to {max} bits, got {0}", max = MAX_PAYLOAD_BITS)]
    PayloadWidth(u32),
    #[error("could not open trace file `{}`", .path.display())]
    TraceFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not write trace header")]
    TraceHeader(#[source] io::Error),
}

/// Number of whole bytes in a host port `width_bits` wide.
pub fn payload_len(width_bits: u32) -> Result<usize, ConfigError> {
    if width_bits == 0 || width_bits % 8 != 0 || width_bits > MAX_PAYLOAD_BITS {
        return Err(ConfigError::PayloadWidth(width_bits));
    }
    Ok((width_bits / 8) as usize)
}

/// Where the waveform goes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TraceTarget {
    #[default]
    None,
    Stdout,
    File(PathBuf),
}

impl TraceTarget {
    /// `-` selects stdout, anything else is a file path.
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            None => Self::None,
            Some("-") => Self::Stdout,
            Some(path) => Self::File(PathBuf::from(path)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub seed: u64,
    /// `None` runs until the agent finishes
    pub max_cycles: Option<u64>,
    /// first cycle printed and traced (cycle 0 is always traced)
    pub trace_start: u64,
    /// print the model state every cycle from `trace_start` on
    pub verbose: bool,
    /// announce the cycle count of a successful run
    pub print_cycles: bool,
    pub trace: TraceTarget,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            max_cycles: None,
            trace_start: 0,
            verbose: false,
            print_cycles: false,
            trace: TraceTarget::None,
        }
    }
}

impl RunConfig {
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
    pub fn set_max_cycles(mut self, max_cycles: Option<u64>) -> Self {
        self.max_cycles = max_cycles;
        self
    }
    pub fn set_trace_start(mut self, start: u64) -> Self {
        self.trace_start = start;
        self
    }
    pub fn set_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
    pub fn set_print_cycles(mut self, print_cycles: bool) -> Self {
        self.print_cycles = print_cycles;
        self
    }
    pub fn set_trace(mut self, trace: TraceTarget) -> Self {
        self.trace = trace;
        self
    }

    /// Open the configured trace sink for ports `width` bits wide.
    pub fn open_trace(&self, width: u32) -> Result<Option<Box<dyn TraceSink>>, ConfigError> {
        let out: Box<dyn io::Write> = match &self.trace {
            TraceTarget::None => return Ok(None),
            TraceTarget::Stdout => Box::new(io::BufWriter::new(io::stdout())),
            TraceTarget::File(path) => {
                let file = std::fs::File::create(path).map_err(|source| {
                    ConfigError::TraceFile {
                        path: path.clone(),
                        source,
                    }
                })?;
                Box::new(io::BufWriter::new(file))
            }
        };
        let trace = VcdTrace::new(out, width).map_err(ConfigError::TraceHeader)?;
        Ok(Some(Box::new(trace)))
    }
}

/// Wall clock seconds mixed with the process id.
pub fn default_seed() -> u64 {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    secs ^ u64::from(std::process::id())
}
