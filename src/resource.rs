//
// resource.rs: Board resources
//
// A Resource is a named, numbered bundle of pin assignments for one
// logical interface on the board. Resources are declared once, when
// the board is described, and are read-only afterwards. This file
// also flattens requested resources into per-bit port constraints,
// which is what the constraint file templates consume.
//

use indexmap::IndexMap;
use serde::Deserialize;

use crate::errors::ErrorCode;
use crate::pin::Direction;

// Electrical attributes (IO_TYPE, PULLMODE, ...). Insertion order is
// kept, as it's the order they get written out in.
pub type Attrs = IndexMap<String, String>;

// Connector reference: pins given relative to connector 'name_number'.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Conn(pub String, pub usize);

#[derive(Clone, Debug, PartialEq)]
pub struct Pins {
    pub names: Vec<String>,
    pub dir: Direction,
    pub invert: bool,
}

fn split_names(names: &str) -> Result<Vec<String>, ErrorCode> {
    let names = names.split_whitespace().map(String::from).collect::<Vec<_>>();
    if names.is_empty() {
        return Err(ErrorCode::EmptyPins);
    }
    if names.iter().any(|name| name == "-") {
        return Err(ErrorCode::NotConnectedPin);
    }
    Ok(names)
}

fn conn_names(names: Vec<String>, conn: Option<&Conn>) -> Vec<String> {
    match conn {
        Some(Conn(conn_name, conn_number)) => names
            .into_iter()
            .map(|name| format!("{}_{}:{}", conn_name, conn_number, name))
            .collect(),
        None => names,
    }
}

fn check_width(names: &[String], width: Option<usize>) -> Result<(), ErrorCode> {
    match width {
        Some(expected) if expected != names.len() => Err(ErrorCode::WidthMismatch {
            expected,
            actual: names.len(),
            pins: names.join(" "),
        }),
        _ => Ok(()),
    }
}

impl Pins {
    pub fn new(names: &str, dir: Direction) -> Result<Pins, ErrorCode> {
        Ok(Pins {
            names: split_names(names)?,
            dir,
            invert: false,
        })
    }

    pub fn inverted(self) -> Self {
        Pins { invert: true, ..self }
    }

    pub fn invert_if(self, invert: bool) -> Self {
        Pins { invert, ..self }
    }

    pub fn conn(self, conn: Option<&Conn>) -> Self {
        Pins {
            names: conn_names(self.names, conn),
            ..self
        }
    }

    pub fn assert_width(self, width: usize) -> Result<Self, ErrorCode> {
        check_width(&self.names, Some(width))?;
        Ok(self)
    }

    pub fn width(&self) -> usize {
        self.names.len()
    }
}

// Active-low pins.
pub fn pins_n(names: &str, dir: Direction) -> Result<Pins, ErrorCode> {
    Ok(Pins::new(names, dir)?.inverted())
}

#[derive(Clone, Debug, PartialEq)]
pub struct DiffPairs {
    pub p: Vec<String>,
    pub n: Vec<String>,
    pub dir: Direction,
    pub invert: bool,
}

impl DiffPairs {
    pub fn new(p: &str, n: &str, dir: Direction) -> Result<DiffPairs, ErrorCode> {
        let p = split_names(p)?;
        let n = split_names(n)?;
        if p.len() != n.len() {
            return Err(ErrorCode::DiffPairMismatch {
                p: p.len(),
                n: n.len(),
            });
        }
        Ok(DiffPairs {
            p,
            n,
            dir,
            invert: false,
        })
    }

    pub fn invert_if(self, invert: bool) -> Self {
        DiffPairs { invert, ..self }
    }

    pub fn conn(self, conn: Option<&Conn>) -> Self {
        DiffPairs {
            p: conn_names(self.p, conn),
            n: conn_names(self.n, conn),
            ..self
        }
    }

    pub fn assert_width(self, width: usize) -> Result<Self, ErrorCode> {
        check_width(&self.p, Some(width))?;
        Ok(self)
    }

    pub fn width(&self) -> usize {
        self.p.len()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Io {
    Pins(Pins),
    DiffPairs(DiffPairs),
    Subsignals(Vec<Subsignal>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Subsignal {
    pub name: String,
    pub io: Io,
    pub attrs: Attrs,
}

impl Subsignal {
    pub fn new(name: &str, io: Io) -> Self {
        Subsignal {
            name: name.to_string(),
            io,
            attrs: Attrs::new(),
        }
    }

    pub fn pins(name: &str, pins: Pins) -> Self {
        Subsignal::new(name, Io::Pins(pins))
    }

    pub fn with_attrs(self, attrs: Attrs) -> Self {
        Subsignal { attrs, ..self }
    }

    pub fn dir(&self) -> Option<Direction> {
        match &self.io {
            Io::Pins(pins) => Some(pins.dir),
            Io::DiffPairs(pairs) => Some(pairs.dir),
            Io::Subsignals(_) => None,
        }
    }

    pub fn invert(&self) -> bool {
        match &self.io {
            Io::Pins(pins) => pins.invert,
            Io::DiffPairs(pairs) => pairs.invert,
            Io::Subsignals(_) => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Resource {
    pub name: String,
    pub number: usize,
    pub io: Io,
    pub attrs: Attrs,
    // Frequency in Hz, for clock inputs.
    pub clock: Option<f64>,
}

impl Resource {
    pub fn new(name: &str, number: usize, io: Io) -> Self {
        Resource {
            name: name.to_string(),
            number,
            io,
            attrs: Attrs::new(),
            clock: None,
        }
    }

    // A resource from one of the interface families, named after the
    // family unless renamed later.
    pub fn family(number: usize, default_name: &str, ios: Vec<Subsignal>, attrs: Option<&Attrs>) -> Self {
        Resource {
            attrs: attrs.cloned().unwrap_or_default(),
            ..Resource::new(default_name, number, Io::Subsignals(ios))
        }
    }

    pub fn with_name(self, name: &str) -> Self {
        Resource {
            name: name.to_string(),
            ..self
        }
    }

    pub fn with_attrs(self, attrs: Attrs) -> Self {
        Resource { attrs, ..self }
    }

    pub fn with_clock(self, frequency: f64) -> Self {
        Resource {
            clock: Some(frequency),
            ..self
        }
    }

    // 'name_number', as the resource is known in ports and errors.
    pub fn full_name(&self) -> String {
        format!("{}_{}", self.name, self.number)
    }

    pub fn subsignals(&self) -> &[Subsignal] {
        match &self.io {
            Io::Subsignals(subs) => subs,
            _ => &[],
        }
    }

    pub fn subsignal(&self, name: &str) -> Option<&Subsignal> {
        self.subsignals().iter().find(|sub| sub.name == name)
    }
}

////////////////////////////////////////////////////////////////////////
// Connectors.
//

#[derive(Clone, Debug, PartialEq)]
pub struct Connector {
    pub name: String,
    pub number: usize,
    // Connector pin name to device pin.
    pub pins: IndexMap<String, String>,
}

impl Connector {
    // Positional form: the n-th name (from 1) is connector pin n, and
    // '-' marks a connector pin with no device pin behind it.
    pub fn new(name: &str, number: usize, io: &str) -> Self {
        let pins = io
            .split_whitespace()
            .enumerate()
            .filter(|(_, pin)| *pin != "-")
            .map(|(n, pin)| ((n + 1).to_string(), pin.to_string()))
            .collect();
        Connector {
            name: name.to_string(),
            number,
            pins,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}_{}", self.name, self.number)
    }
}

////////////////////////////////////////////////////////////////////////
// Port constraints.
//

// Which signal of a port a constraint is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Component {
    Io,
    P,
    N,
}

impl Component {
    pub fn name(&self) -> &'static str {
        match self {
            Component::Io => "io",
            Component::P => "p",
            Component::N => "n",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PortConstraint {
    pub port: String,
    pub pin: String,
    pub attrs: Attrs,
}

fn map_pin(pin: &str, connectors: &IndexMap<String, Connector>) -> Result<String, ErrorCode> {
    match pin.split_once(':') {
        None => Ok(pin.to_string()),
        Some((conn, conn_pin)) => connectors
            .get(conn)
            .and_then(|conn| conn.pins.get(conn_pin))
            .cloned()
            .ok_or_else(|| ErrorCode::UnknownConnectorPin {
                pin: pin.to_string(),
            }),
    }
}

fn push_bits(
    out: &mut Vec<PortConstraint>,
    port: &str,
    pins: &[String],
    attrs: &Attrs,
    connectors: &IndexMap<String, Connector>,
) -> Result<(), ErrorCode> {
    for (bit, pin) in pins.iter().enumerate() {
        let port = if pins.len() == 1 {
            port.to_string()
        } else {
            format!("{}[{}]", port, bit)
        };
        out.push(PortConstraint {
            port,
            pin: map_pin(pin, connectors)?,
            attrs: attrs.clone(),
        });
    }
    Ok(())
}

fn collect_constraints<F>(
    out: &mut Vec<PortConstraint>,
    path: &str,
    io: &Io,
    attrs: &Attrs,
    connectors: &IndexMap<String, Connector>,
    skip: &F,
) -> Result<(), ErrorCode>
where
    F: Fn(&Attrs, Component) -> bool,
{
    match io {
        Io::Pins(pins) => {
            let port = format!("{}__{}", path, Component::Io.name());
            push_bits(out, &port, &pins.names, attrs, connectors)?;
        }
        Io::DiffPairs(pairs) => {
            for (component, names) in [(Component::P, &pairs.p), (Component::N, &pairs.n)].iter() {
                if skip(attrs, *component) {
                    continue;
                }
                let port = format!("{}__{}", path, component.name());
                push_bits(out, &port, names, attrs, connectors)?;
            }
        }
        Io::Subsignals(subs) => {
            for sub in subs.iter() {
                let mut sub_attrs = attrs.clone();
                sub_attrs.extend(sub.attrs.iter().map(|(k, v)| (k.clone(), v.clone())));
                let sub_path = format!("{}__{}", path, sub.name);
                collect_constraints(out, &sub_path, &sub.io, &sub_attrs, connectors, skip)?;
            }
        }
    }
    Ok(())
}

// Per-bit (port name, device pin, attributes) for a resource.
// 'skip' decides whether a port component gets no constraint at all.
pub fn port_constraints<F>(
    resource: &Resource,
    connectors: &IndexMap<String, Connector>,
    skip: F,
) -> Result<Vec<PortConstraint>, ErrorCode>
where
    F: Fn(&Attrs, Component) -> bool,
{
    let mut out = Vec::new();
    collect_constraints(
        &mut out,
        &resource.full_name(),
        &resource.io,
        &resource.attrs,
        connectors,
        &skip,
    )?;
    Ok(out)
}

// Port name a resource's clock constraint attaches to: the first
// single-ended or positive port.
pub fn clock_port(resource: &Resource) -> String {
    let mut path = resource.full_name();
    let mut io = &resource.io;
    loop {
        match io {
            Io::Pins(_) => return format!("{}__io", path),
            Io::DiffPairs(_) => return format!("{}__p", path),
            Io::Subsignals(subs) => match subs.first() {
                Some(sub) => {
                    path = format!("{}__{}", path, sub.name);
                    io = &sub.io;
                }
                None => return path,
            },
        }
    }
}
