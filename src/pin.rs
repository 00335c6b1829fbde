//
// pin.rs: Abstract pins and physical ports
//
// A 'Pin' is the design-side view of an I/O: its direction, width,
// gearing and the signals the design reads and drives. A 'Port' is
// the pad-side view the buffers connect to.
//

use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::errors::ErrorCode;
use crate::netlist::{CircuitBuilder, SignalId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Direction {
    I,
    O,
    Oe,
    Io,
}

impl Direction {
    pub fn name(&self) -> &'static str {
        match self {
            Direction::I => "i",
            Direction::O => "o",
            Direction::Oe => "oe",
            Direction::Io => "io",
        }
    }

    pub fn has_input(&self) -> bool {
        matches!(self, Direction::I | Direction::Io)
    }

    pub fn has_output(&self) -> bool {
        matches!(self, Direction::O | Direction::Oe | Direction::Io)
    }

    pub fn has_enable(&self) -> bool {
        matches!(self, Direction::Oe | Direction::Io)
    }
}

impl Default for Direction {
    fn default() -> Self {
        Direction::Io
    }
}

impl FromStr for Direction {
    type Err = ErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "i" => Ok(Direction::I),
            "o" => Ok(Direction::O),
            "oe" => Ok(Direction::Oe),
            "io" => Ok(Direction::Io),
            _ => Err(ErrorCode::UnknownDirection { name: s.to_string() }),
        }
    }
}

impl TryFrom<String> for Direction {
    type Error = ErrorCode;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Gearing: how many data phases are moved per clock cycle on a
// pin. 'xdr' values outside the catalog don't get a Gear at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gear {
    // Combinational, no register.
    Comb,
    // Single data rate, registered.
    Sdr,
    Ddr,
    // Quad data rate, needs a fast edge clock.
    Qdr,
    // 7:1 gearing, needs a fast edge clock.
    Septuple,
}

pub const ALL_GEARS: [Gear; 5] = [Gear::Comb, Gear::Sdr, Gear::Ddr, Gear::Qdr, Gear::Septuple];

impl Gear {
    pub fn from_xdr(xdr: u32) -> Option<Gear> {
        ALL_GEARS.iter().copied().find(|gear| gear.xdr() == xdr)
    }

    pub fn xdr(&self) -> u32 {
        match self {
            Gear::Comb => 0,
            Gear::Sdr => 1,
            Gear::Ddr => 2,
            Gear::Qdr => 4,
            Gear::Septuple => 7,
        }
    }

    // Number of data streams the design sees.
    pub fn phases(&self) -> usize {
        match self {
            Gear::Comb | Gear::Sdr => 1,
            _ => self.xdr() as usize,
        }
    }

    pub fn needs_fast_clock(&self) -> bool {
        matches!(self, Gear::Qdr | Gear::Septuple)
    }
}

// The design side of an I/O. Signals are created in the builder when
// the pin is made, named after the pin, and don't change afterwards.
#[derive(Clone, Debug)]
pub struct Pin {
    pub name: String,
    pub width: usize,
    pub dir: Direction,
    pub xdr: u32,
    // One entry per phase. Empty if the direction has no input
    // (respectively output).
    pub i: Vec<SignalId>,
    pub o: Vec<SignalId>,
    pub oe: Option<SignalId>,
    pub i_clk: Option<SignalId>,
    pub o_clk: Option<SignalId>,
    pub i_fclk: Option<SignalId>,
    pub o_fclk: Option<SignalId>,
}

impl Pin {
    pub fn new<B: CircuitBuilder>(m: &mut B, name: &str, width: usize, dir: Direction, xdr: u32) -> Pin {
        // Unknown gears get a single stream; the gear check rejects them
        // later.
        let phases = Gear::from_xdr(xdr).map_or(1, |gear| gear.phases());

        let mut streams = |prefix: &str| -> Vec<SignalId> {
            if phases < 2 {
                vec![m.add_signal(&format!("{}__{}", name, prefix), width)]
            } else {
                (0..phases)
                    .map(|n| m.add_signal(&format!("{}__{}{}", name, prefix, n), width))
                    .collect()
            }
        };

        let i = if dir.has_input() { streams("i") } else { Vec::new() };
        let o = if dir.has_output() { streams("o") } else { Vec::new() };

        let mut clock = |prefix: &str, present: bool| {
            if present {
                Some(m.add_signal(&format!("{}__{}", name, prefix), 1))
            } else {
                None
            }
        };

        let i_clk = clock("i_clk", dir.has_input() && xdr > 0);
        let i_fclk = clock("i_fclk", dir.has_input() && xdr > 2);
        let o_clk = clock("o_clk", dir.has_output() && xdr > 0);
        let o_fclk = clock("o_fclk", dir.has_output() && xdr > 2);
        let oe = if dir.has_enable() {
            Some(m.add_signal(&format!("{}__oe", name), 1))
        } else {
            None
        };

        Pin {
            name: name.to_string(),
            width,
            dir,
            xdr,
            i,
            o,
            oe,
            i_clk,
            o_clk,
            i_fclk,
            o_fclk,
        }
    }

    pub fn gear(&self) -> Option<Gear> {
        Gear::from_xdr(self.xdr)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Port {
    SingleEnded { io: SignalId },
    Differential { p: SignalId, n: SignalId },
}

impl Port {
    pub fn single<B: CircuitBuilder>(m: &mut B, name: &str, width: usize) -> Port {
        Port::SingleEnded {
            io: m.add_signal(&format!("{}__io", name), width),
        }
    }

    pub fn diff<B: CircuitBuilder>(m: &mut B, name: &str, width: usize) -> Port {
        let p = m.add_signal(&format!("{}__p", name), width);
        let n = m.add_signal(&format!("{}__n", name), width);
        Port::Differential { p, n }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Port::SingleEnded { .. } => "single-ended",
            Port::Differential { .. } => "differential",
        }
    }
}
