//
// netlist.rs: Circuit building
//
// The platform layer never owns the design it is adding to. Instead,
// it talks to a CircuitBuilder, which can create signals, add
// primitive instances and make combinational assignments. 'Module' is
// a plain in-memory CircuitBuilder that simply records everything it
// is given, which is what the command-line tool and the tests use.
//

use std::fmt;

use itertools::Itertools;

// Handle to a signal created through a CircuitBuilder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(usize);

impl SignalId {
    pub fn bit(self, bit: usize) -> Expr {
        Expr::Bit(self, bit)
    }
}

// The (deliberately small) expression language needed to wire up
// buffers: whole signals, single bits, constants, negation and bit
// replication.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Signal(SignalId),
    Bit(SignalId, usize),
    Const { value: u64, width: usize },
    Not(Box<Expr>),
    Replicate(Box<Expr>, usize),
}

impl Expr {
    pub fn konst(value: u64, width: usize) -> Expr {
        Expr::Const { value, width }
    }

    pub fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    pub fn replicate(self, count: usize) -> Expr {
        Expr::Replicate(Box::new(self), count)
    }
}

impl From<SignalId> for Expr {
    fn from(sig: SignalId) -> Self {
        Expr::Signal(sig)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Param {
    Str(String),
    Int(i64),
}

impl From<&str> for Param {
    fn from(s: &str) -> Self {
        Param::Str(s.to_string())
    }
}

impl From<String> for Param {
    fn from(s: String) -> Self {
        Param::Str(s)
    }
}

impl From<i64> for Param {
    fn from(i: i64) -> Self {
        Param::Int(i)
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Str(s) => write!(f, "{:?}", s),
            Param::Int(i) => write!(f, "{}", i),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortDir {
    In,
    Out,
    InOut,
}

// An instance of a vendor primitive. Built up with the chaining
// helpers below, then handed over to a CircuitBuilder.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    pub kind: String,
    pub name: Option<String>,
    pub params: Vec<(String, Param)>,
    pub ports: Vec<(String, PortDir, Expr)>,
}

impl Instance {
    pub fn new(kind: &str) -> Self {
        Instance {
            kind: kind.to_string(),
            name: None,
            params: Vec::new(),
            ports: Vec::new(),
        }
    }

    pub fn named(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    pub fn param(mut self, name: &str, value: impl Into<Param>) -> Self {
        self.params.push((name.to_string(), value.into()));
        self
    }

    pub fn input(mut self, port: &str, expr: impl Into<Expr>) -> Self {
        self.ports.push((port.to_string(), PortDir::In, expr.into()));
        self
    }

    pub fn output(mut self, port: &str, expr: impl Into<Expr>) -> Self {
        self.ports.push((port.to_string(), PortDir::Out, expr.into()));
        self
    }

    pub fn inout(mut self, port: &str, expr: impl Into<Expr>) -> Self {
        self.ports.push((port.to_string(), PortDir::InOut, expr.into()));
        self
    }

    // Look up what's connected to a port.
    pub fn port(&self, name: &str) -> Option<&Expr> {
        self.ports
            .iter()
            .find(|(port, _, _)| port == name)
            .map(|(_, _, expr)| expr)
    }

    pub fn get_param(&self, name: &str) -> Option<&Param> {
        self.params
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, value)| value)
    }
}

pub trait CircuitBuilder {
    fn add_signal(&mut self, name: &str, width: usize) -> SignalId;

    fn signal_name(&self, sig: SignalId) -> &str;

    fn signal_width(&self, sig: SignalId) -> usize;

    fn add_instance(&mut self, instance: Instance);

    fn add_comb(&mut self, lhs: SignalId, rhs: Expr);

    // New signal with the same shape as 'sig', with a suffixed name.
    fn signal_like(&mut self, sig: SignalId, suffix: &str) -> SignalId {
        let name = format!("{}{}", self.signal_name(sig), suffix);
        let width = self.signal_width(sig);
        self.add_signal(&name, width)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SignalData {
    pub name: String,
    pub width: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Module {
    pub signals: Vec<SignalData>,
    pub instances: Vec<Instance>,
    pub comb: Vec<(SignalId, Expr)>,
}

impl Module {
    pub fn new() -> Self {
        Default::default()
    }

    // Instances of the given primitive.
    pub fn instances_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Instance> + 'a {
        self.instances.iter().filter(move |inst| inst.kind == kind)
    }

    pub fn instance(&self, name: &str) -> Option<&Instance> {
        self.instances
            .iter()
            .find(|inst| inst.name.as_deref() == Some(name))
    }

    pub fn find_signal(&self, name: &str) -> Option<SignalId> {
        self.signals
            .iter()
            .position(|sig| sig.name == name)
            .map(SignalId)
    }

    // The expression driving 'sig' combinationally, if any.
    pub fn driver(&self, sig: SignalId) -> Option<&Expr> {
        self.comb
            .iter()
            .find(|(lhs, _)| *lhs == sig)
            .map(|(_, rhs)| rhs)
    }

    pub fn fmt_expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::Signal(sig) => self.signal_name(*sig).to_string(),
            Expr::Bit(sig, bit) => format!("{}[{}]", self.signal_name(*sig), bit),
            Expr::Const { value, width } => format!("{}'d{}", width, value),
            Expr::Not(inner) => format!("~{}", self.fmt_expr(inner)),
            Expr::Replicate(inner, count) => format!("{{{}{{{}}}}}", count, self.fmt_expr(inner)),
        }
    }
}

impl CircuitBuilder for Module {
    fn add_signal(&mut self, name: &str, width: usize) -> SignalId {
        self.signals.push(SignalData {
            name: name.to_string(),
            width,
        });
        SignalId(self.signals.len() - 1)
    }

    fn signal_name(&self, sig: SignalId) -> &str {
        &self.signals[sig.0].name
    }

    fn signal_width(&self, sig: SignalId) -> usize {
        self.signals[sig.0].width
    }

    fn add_instance(&mut self, instance: Instance) {
        self.instances.push(instance);
    }

    fn add_comb(&mut self, lhs: SignalId, rhs: Expr) {
        self.comb.push((lhs, rhs));
    }
}

// A readable dump of everything in the module, one item per line.
impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for sig in self.signals.iter() {
            writeln!(f, "wire {} [{}]", sig.name, sig.width)?;
        }
        for inst in self.instances.iter() {
            let params = inst
                .params
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .join(", ");
            let ports = inst
                .ports
                .iter()
                .map(|(name, dir, expr)| {
                    let arrow = match dir {
                        PortDir::In => "<-",
                        PortDir::Out => "->",
                        PortDir::InOut => "<>",
                    };
                    format!("{} {} {}", name, arrow, self.fmt_expr(expr))
                })
                .join(", ");
            writeln!(
                f,
                "{} {} #({}) ({})",
                inst.kind,
                inst.name.as_deref().unwrap_or("-"),
                params,
                ports
            )?;
        }
        for (lhs, rhs) in self.comb.iter() {
            writeln!(f, "assign {} = {}", self.signal_name(*lhs), self.fmt_expr(rhs))?;
        }
        Ok(())
    }
}
