//
// iobuf.rs: I/O buffer synthesis
//
// Turning an abstract Pin into vendor primitives happens in two
// layers. The gear stage ('xdr_buffer') puts registers or
// (de)serializers between the pin's signals and a set of pad-side
// signals, picking the primitive from a (path, gearing) table. The
// pad layer ('get_input' and friends) then instantiates one pad
// buffer per bit, connecting those signals to the physical port.
//

use log::{debug, warn};

use crate::devices::{self, Family, INPUT_REGISTER, OUTPUT_REGISTER};
use crate::errors::{in_context, Error, ErrorCode};
use crate::netlist::{CircuitBuilder, Expr, Instance, SignalId};
use crate::pin::{Direction, Gear, Pin, Port};
use crate::resource::{Attrs, Component};

// Pad-side signals produced (or, at gearing zero, reused) by the gear
// stage: what the pad buffer reads into, drives out, and its
// active-high tristate control.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct XdrSignals {
    pub i: Option<SignalId>,
    pub o: Option<SignalId>,
    pub t: Option<SignalId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Path {
    Input,
    Output,
    Enable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Passthrough,
    Register(&'static str),
    Serdes(&'static str),
}

// The whole gearing decision lives here. The gearing has already been
// checked against the family, so a missing serdes row is a bug.
fn dispatch(family: Family, path: Path, gear: Gear) -> Result<Stage, ErrorCode> {
    let serdes = |gear: Gear| {
        family
            .serdes_primitives(gear)
            .ok_or(ErrorCode::Internal("gearing has no serdes primitives"))
    };

    Ok(match (path, gear) {
        (_, Gear::Comb) => Stage::Passthrough,
        // The tristate control is only ever registered, whatever the gearing.
        (Path::Enable, _) => Stage::Register(OUTPUT_REGISTER),
        (Path::Input, Gear::Sdr) => Stage::Register(INPUT_REGISTER),
        (Path::Output, Gear::Sdr) => Stage::Register(OUTPUT_REGISTER),
        (Path::Input, gear) => Stage::Serdes(serdes(gear)?.input),
        (Path::Output, gear) => Stage::Serdes(serdes(gear)?.output),
    })
}

fn check_gear(family: Family, pin: &Pin) -> Result<Gear, ErrorCode> {
    match pin.gear() {
        Some(gear) if family.supports_gear(gear) => Ok(gear),
        _ => Err(ErrorCode::UnsupportedGear {
            pin: pin.name.clone(),
            xdr: pin.xdr,
            supported: family.supported_xdrs(),
        }),
    }
}

fn required(sig: Option<SignalId>, what: &'static str) -> Result<SignalId, ErrorCode> {
    sig.ok_or(ErrorCode::Internal(what))
}

// The buffers drive a new signal, and the pin sees its negation.
fn input_negation<B: CircuitBuilder>(m: &mut B, z: SignalId, invert: bool) -> SignalId {
    if invert {
        let a = m.signal_like(z, "_n");
        m.add_comb(z, Expr::from(a).not());
        a
    } else {
        z
    }
}

// The pin's signal is negated into a new one, which feeds the buffers.
fn output_negation<B: CircuitBuilder>(m: &mut B, a: SignalId, invert: bool) -> SignalId {
    if invert {
        let z = m.signal_like(a, "_n");
        m.add_comb(z, Expr::from(a).not());
        z
    } else {
        a
    }
}

fn register(kind: &str, clk: SignalId, d: Expr, q: Expr) -> Instance {
    Instance::new(kind)
        .input("SCLK", clk)
        .input("SP", Expr::konst(1, 1))
        .input("CD", Expr::konst(0, 1))
        .input("D", d)
        .output("Q", q)
}

fn serdes_clocks(kind: &str, sclk: SignalId, eclk: Option<SignalId>) -> Instance {
    let inst = Instance::new(kind).input("SCLK", sclk);
    let inst = match eclk {
        Some(eclk) => inst.input("ECLK", eclk),
        None => inst,
    };
    inst.input("RST", Expr::konst(0, 1))
}

fn fast_clock(gear: Gear, fclk: Option<SignalId>) -> Result<Option<SignalId>, ErrorCode> {
    if gear.needs_fast_clock() {
        Ok(Some(required(fclk, "gearing needs a fast clock")?))
    } else {
        Ok(None)
    }
}

fn input_stage<B: CircuitBuilder>(
    m: &mut B,
    family: Family,
    pin: &Pin,
    gear: Gear,
    pin_i: &[SignalId],
) -> Result<SignalId, ErrorCode> {
    let stage = dispatch(family, Path::Input, gear)?;
    if stage == Stage::Passthrough {
        return Ok(pin_i[0]);
    }

    let clk = required(pin.i_clk, "registered input without a clock")?;
    let i = m.add_signal(&format!("{}_xdr_i", pin.name), pin.width);

    match stage {
        Stage::Register(kind) => {
            for bit in 0..pin.width {
                m.add_instance(register(kind, clk, i.bit(bit), pin_i[0].bit(bit)));
            }
        }
        Stage::Serdes(kind) => {
            let fclk = fast_clock(gear, pin.i_fclk)?;
            for bit in 0..pin.width {
                let mut inst = serdes_clocks(kind, clk, fclk).input("D", i.bit(bit));
                for (n, q) in pin_i.iter().enumerate() {
                    inst = inst.output(&format!("Q{}", n), q.bit(bit));
                }
                m.add_instance(inst);
            }
        }
        Stage::Passthrough => unreachable!(),
    }

    Ok(i)
}

fn output_stage<B: CircuitBuilder>(
    m: &mut B,
    family: Family,
    pin: &Pin,
    gear: Gear,
    pin_o: &[SignalId],
) -> Result<SignalId, ErrorCode> {
    let stage = dispatch(family, Path::Output, gear)?;
    if stage == Stage::Passthrough {
        return Ok(pin_o[0]);
    }

    let clk = required(pin.o_clk, "registered output without a clock")?;
    let o = m.add_signal(&format!("{}_xdr_o", pin.name), pin.width);

    match stage {
        Stage::Register(kind) => {
            for bit in 0..pin.width {
                m.add_instance(register(kind, clk, pin_o[0].bit(bit), o.bit(bit)));
            }
        }
        Stage::Serdes(kind) => {
            let fclk = fast_clock(gear, pin.o_fclk)?;
            for bit in 0..pin.width {
                let mut inst = serdes_clocks(kind, clk, fclk);
                for (n, d) in pin_o.iter().enumerate() {
                    inst = inst.input(&format!("D{}", n), d.bit(bit));
                }
                m.add_instance(inst.output("Q", o.bit(bit)));
            }
        }
        Stage::Passthrough => unreachable!(),
    }

    Ok(o)
}

fn enable_stage<B: CircuitBuilder>(
    m: &mut B,
    family: Family,
    pin: &Pin,
    gear: Gear,
) -> Result<SignalId, ErrorCode> {
    let oe = required(pin.oe, "tristate pin without an output enable")?;
    let t = m.add_signal(&format!("{}_xdr_t", pin.name), pin.width);

    match dispatch(family, Path::Enable, gear)? {
        Stage::Passthrough => m.add_comb(t, Expr::from(oe).replicate(pin.width).not()),
        Stage::Register(kind) => {
            let clk = required(pin.o_clk, "registered enable without a clock")?;
            for bit in 0..pin.width {
                m.add_instance(register(kind, clk, Expr::from(oe).not(), t.bit(bit)));
            }
        }
        Stage::Serdes(_) => return Err(ErrorCode::Internal("tristate enable can't be serialized")),
    }

    Ok(t)
}

// The gear stage. Inversion is applied to the pin side, independently
// for the input and output paths.
pub fn xdr_buffer<B: CircuitBuilder>(
    m: &mut B,
    family: Family,
    pin: &Pin,
    i_invert: bool,
    o_invert: bool,
) -> Result<XdrSignals, ErrorCode> {
    let gear = check_gear(family, pin)?;
    let mut signals = XdrSignals::default();

    if pin.dir.has_input() {
        if pin.i.len() != gear.phases() {
            return Err(ErrorCode::Internal("pin input streams don't match its gearing"));
        }
        let pin_i = pin
            .i
            .iter()
            .map(|&z| input_negation(m, z, i_invert))
            .collect::<Vec<_>>();
        signals.i = Some(input_stage(m, family, pin, gear, &pin_i)?);
    }

    if pin.dir.has_output() {
        if pin.o.len() != gear.phases() {
            return Err(ErrorCode::Internal("pin output streams don't match its gearing"));
        }
        let pin_o = pin
            .o
            .iter()
            .map(|&a| output_negation(m, a, o_invert))
            .collect::<Vec<_>>();
        signals.o = Some(output_stage(m, family, pin, gear, &pin_o)?);
    }

    if pin.dir.has_enable() {
        signals.t = Some(enable_stage(m, family, pin, gear)?);
    }

    Ok(signals)
}

////////////////////////////////////////////////////////////////////////
// Pad buffers.
//

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Buffer {
    Input,
    Output,
    Tristate,
    InputOutput,
}

impl Buffer {
    fn primitive(&self) -> &'static str {
        match self {
            Buffer::Input => "IB",
            Buffer::Output => "OB",
            Buffer::Tristate => "OBZ",
            Buffer::InputOutput => "BB",
        }
    }

    fn direction(&self) -> Direction {
        match self {
            Buffer::Input => Direction::I,
            Buffer::Output => Direction::O,
            Buffer::Tristate => Direction::Oe,
            Buffer::InputOutput => Direction::Io,
        }
    }

    fn feature(&self, diff: bool) -> &'static str {
        match (self, diff) {
            (Buffer::Input, false) => "single-ended input",
            (Buffer::Output, false) => "single-ended output",
            (Buffer::Tristate, false) => "single-ended tristate",
            (Buffer::InputOutput, false) => "single-ended input/output",
            (Buffer::Input, true) => "differential input",
            (Buffer::Output, true) => "differential output",
            (Buffer::Tristate, true) => "differential tristate",
            (Buffer::InputOutput, true) => "differential input/output",
        }
    }

    // Which of the (input, output) paths an 'invert' request applies to.
    fn inversion(&self, invert: bool) -> (bool, bool) {
        match self {
            Buffer::Input => (invert, false),
            Buffer::Output | Buffer::Tristate => (false, invert),
            Buffer::InputOutput => (invert, invert),
        }
    }

    // One pad buffer for one bit. On the negative leg of a
    // differential pair, output data is inverted and input data
    // is left unconnected.
    fn instance(
        &self,
        name: String,
        xdr: &XdrSignals,
        pad: Expr,
        bit: usize,
        negative: bool,
    ) -> Result<Instance, ErrorCode> {
        let i = || required(xdr.i, "input buffer without an input signal");
        let o = || -> Result<Expr, ErrorCode> {
            let o = required(xdr.o, "output buffer without an output signal")?.bit(bit);
            Ok(if negative { o.not() } else { o })
        };
        let t = || required(xdr.t, "tristate buffer without an enable signal");

        let inst = Instance::new(self.primitive()).named(name);
        Ok(match self {
            Buffer::Input => {
                let inst = inst.input("I", pad);
                if negative {
                    inst
                } else {
                    inst.output("O", i()?.bit(bit))
                }
            }
            Buffer::Output => inst.input("I", o()?).output("O", pad),
            Buffer::Tristate => inst
                .input("T", t()?.bit(bit))
                .input("I", o()?)
                .output("O", pad),
            Buffer::InputOutput => {
                let inst = inst.input("T", t()?.bit(bit)).input("I", o()?);
                let inst = if negative {
                    inst
                } else {
                    inst.output("O", i()?.bit(bit))
                };
                inst.inout("B", pad)
            }
        })
    }
}

fn get_buffer<B: CircuitBuilder>(
    m: &mut B,
    family: Family,
    buffer: Buffer,
    diff: bool,
    pin: &Pin,
    port: &Port,
    attrs: &Attrs,
    invert: bool,
) -> Result<XdrSignals, Error> {
    let feature = buffer.feature(diff);

    in_context(&pin.name, (|| -> Result<XdrSignals, ErrorCode> {
        if matches!(port, Port::Differential { .. }) != diff {
            return Err(ErrorCode::WrongPortKind {
                feature,
                kind: port.kind(),
            });
        }

        if pin.dir != buffer.direction() {
            return Err(ErrorCode::WrongDirection {
                feature,
                pin: pin.name.clone(),
                dir: pin.dir.name(),
            });
        }

        let (primary, negative) = match *port {
            Port::SingleEnded { io } => (io, None),
            Port::Differential { p, n } => {
                let skip = family.should_skip_port_component(attrs, Component::N);
                (p, if skip { None } else { Some(n) })
            }
        };

        let port_width = m.signal_width(primary);
        if port_width != pin.width {
            return Err(ErrorCode::PortWidthMismatch {
                pin_width: pin.width,
                port_width,
            });
        }

        let standard = devices::io_type(attrs);
        if !family.knows_io_type(standard) {
            warn!("{}: I/O standard {} is not known for {}", pin.name, standard, family);
        }

        let (i_invert, o_invert) = buffer.inversion(invert);
        let xdr = xdr_buffer(m, family, pin, i_invert, o_invert)?;

        for bit in 0..pin.width {
            let name = format!("{}_{}", pin.name, bit);
            m.add_instance(buffer.instance(name, &xdr, primary.bit(bit), bit, false)?);
            if let Some(n) = negative {
                let name = format!("{}_{}_n", pin.name, bit);
                m.add_instance(buffer.instance(name, &xdr, n.bit(bit), bit, true)?);
            }
        }

        debug!(
            "{}: {} {} x{} at gearing {}{}",
            pin.name,
            family,
            buffer.primitive(),
            pin.width,
            pin.xdr,
            if negative.is_some() { " (both legs)" } else { "" }
        );

        Ok(xdr)
    })())
}

pub fn get_input<B: CircuitBuilder>(
    m: &mut B,
    family: Family,
    pin: &Pin,
    port: &Port,
    attrs: &Attrs,
    invert: bool,
) -> Result<XdrSignals, Error> {
    get_buffer(m, family, Buffer::Input, false, pin, port, attrs, invert)
}

pub fn get_output<B: CircuitBuilder>(
    m: &mut B,
    family: Family,
    pin: &Pin,
    port: &Port,
    attrs: &Attrs,
    invert: bool,
) -> Result<XdrSignals, Error> {
    get_buffer(m, family, Buffer::Output, false, pin, port, attrs, invert)
}

pub fn get_tristate<B: CircuitBuilder>(
    m: &mut B,
    family: Family,
    pin: &Pin,
    port: &Port,
    attrs: &Attrs,
    invert: bool,
) -> Result<XdrSignals, Error> {
    get_buffer(m, family, Buffer::Tristate, false, pin, port, attrs, invert)
}

pub fn get_input_output<B: CircuitBuilder>(
    m: &mut B,
    family: Family,
    pin: &Pin,
    port: &Port,
    attrs: &Attrs,
    invert: bool,
) -> Result<XdrSignals, Error> {
    get_buffer(m, family, Buffer::InputOutput, false, pin, port, attrs, invert)
}

pub fn get_diff_input<B: CircuitBuilder>(
    m: &mut B,
    family: Family,
    pin: &Pin,
    port: &Port,
    attrs: &Attrs,
    invert: bool,
) -> Result<XdrSignals, Error> {
    get_buffer(m, family, Buffer::Input, true, pin, port, attrs, invert)
}

pub fn get_diff_output<B: CircuitBuilder>(
    m: &mut B,
    family: Family,
    pin: &Pin,
    port: &Port,
    attrs: &Attrs,
    invert: bool,
) -> Result<XdrSignals, Error> {
    get_buffer(m, family, Buffer::Output, true, pin, port, attrs, invert)
}

pub fn get_diff_tristate<B: CircuitBuilder>(
    m: &mut B,
    family: Family,
    pin: &Pin,
    port: &Port,
    attrs: &Attrs,
    invert: bool,
) -> Result<XdrSignals, Error> {
    get_buffer(m, family, Buffer::Tristate, true, pin, port, attrs, invert)
}

pub fn get_diff_input_output<B: CircuitBuilder>(
    m: &mut B,
    family: Family,
    pin: &Pin,
    port: &Port,
    attrs: &Attrs,
    invert: bool,
) -> Result<XdrSignals, Error> {
    get_buffer(m, family, Buffer::InputOutput, true, pin, port, attrs, invert)
}
