//
// platform.rs: Lattice platforms
//
// A Platform is one FPGA on one board: the device, the toolchain that
// builds for it, the resources and connectors the board provides and
// the choice of default clock. It's the entry point for everything
// else. Buffers get synthesized for its family, resources get
// requested from it, and it produces the build plan for a design.
//

use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use log::{debug, info};
use serde::Deserialize;

use crate::devices::{self, Family};
use crate::errors::{in_context, Error, ErrorCode};
use crate::iobuf::{self, XdrSignals};
use crate::netlist::{CircuitBuilder, Expr, Instance, SignalId};
use crate::pin::{Pin, Port};
use crate::plan::{BuildPlan, Syntax};
use crate::resource::{self, Attrs, Component, Connector, PortConstraint, Resource};
use crate::templates;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Toolchain {
    // yosys, nextpnr and Project Trellis.
    Trellis,
    // Lattice Diamond.
    Diamond,
}

const TRELLIS_TOOLS: [&str; 3] = ["yosys", "nextpnr-ecp5", "ecppack"];
const DIAMOND_TOOLS: [&str; 2] = ["pnmainc", "ddtcmd"];

impl Toolchain {
    pub fn name(&self) -> &'static str {
        match self {
            Toolchain::Trellis => "Trellis",
            Toolchain::Diamond => "Diamond",
        }
    }

    pub fn required_tools(&self) -> &'static [&'static str] {
        match self {
            Toolchain::Trellis => &TRELLIS_TOOLS,
            Toolchain::Diamond => &DIAMOND_TOOLS,
        }
    }
}

impl FromStr for Toolchain {
    type Err = ErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Trellis" => Ok(Toolchain::Trellis),
            "Diamond" => Ok(Toolchain::Diamond),
            _ => Err(ErrorCode::UnknownToolchain { name: s.to_string() }),
        }
    }
}

impl TryFrom<String> for Toolchain {
    type Error = ErrorCode;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for Toolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Where the 'sync' clock comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum DefaultClock {
    // An input pin, given by resource name (number 0).
    Resource(String),
    // MachXO2/MachXO3L internal oscillator.
    Osch { frequency_mhz: f64 },
    // ECP5 internal oscillator.
    Oscg { div: u32 },
}

impl DefaultClock {
    fn oscillator(&self) -> Option<&'static str> {
        match self {
            DefaultClock::Resource(_) => None,
            DefaultClock::Osch { .. } => Some("OSCH"),
            DefaultClock::Oscg { .. } => Some("OSCG"),
        }
    }

    fn name(&self) -> &str {
        match self {
            DefaultClock::Resource(name) => name,
            _ => self.oscillator().unwrap_or_default(),
        }
    }
}

// Knobs for the generated files. Options are whitespace-separated
// extra command-line arguments. Script fragments are inserted as-is,
// and a placeholder comment appears where one isn't given.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Overrides {
    pub verbose: bool,
    pub read_verilog_opts: Option<String>,
    pub synth_opts: Option<String>,
    pub script_after_read: Option<String>,
    pub script_after_synth: Option<String>,
    pub yosys_opts: Option<String>,
    pub nextpnr_opts: Option<String>,
    pub ecppack_opts: Option<String>,
    pub add_preferences: Option<String>,
    pub script_project: Option<String>,
    pub script_after_export: Option<String>,
    pub add_constraints: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ClockConstraint {
    // On a top-level port.
    Port { port: String, frequency: f64 },
    // On a net inside the top-level module.
    Net { net: String, frequency: f64 },
}

// Name of the net the internal oscillators drive.
pub const SYNC_CLOCK_NET: &str = "clk";

// The elaborated design a plan is built around: RTLIL for Trellis,
// Verilog for Diamond.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Design {
    pub top: String,
    pub debug_verilog: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Platform {
    pub family: Family,
    pub device: String,
    pub package: String,
    pub speed: String,
    // [C]ommercial or [I]ndustrial.
    pub grade: String,
    pub toolchain: Toolchain,
    pub overrides: Overrides,
    default_clk: Option<DefaultClock>,
    default_rst: Option<String>,
    resources: IndexMap<(String, usize), Resource>,
    connectors: IndexMap<String, Connector>,
    requested: Vec<(String, usize)>,
    files: IndexMap<String, String>,
}

impl Platform {
    pub fn new(
        family: Family,
        device: &str,
        package: &str,
        speed: &str,
        toolchain: Option<Toolchain>,
    ) -> Result<Platform, Error> {
        let toolchain = toolchain.unwrap_or_else(|| family.default_toolchain());
        in_context(device, (|| -> Result<(), ErrorCode> {
            if !family.toolchains().contains(&toolchain) {
                return Err(ErrorCode::UnsupportedToolchain {
                    toolchain: toolchain.name(),
                    family: family.name(),
                });
            }
            if toolchain == Toolchain::Trellis {
                devices::nextpnr_device_option(device)?;
                devices::nextpnr_package_option(package)?;
            }
            Ok(())
        })())?;

        Ok(Platform {
            family,
            device: device.to_string(),
            package: package.to_string(),
            speed: speed.to_string(),
            grade: "C".to_string(),
            toolchain,
            overrides: Overrides::default(),
            default_clk: None,
            default_rst: None,
            resources: IndexMap::new(),
            connectors: IndexMap::new(),
            requested: Vec::new(),
            files: IndexMap::new(),
        })
    }

    pub fn with_grade(self, grade: &str) -> Self {
        Platform {
            grade: grade.to_string(),
            ..self
        }
    }

    pub fn with_overrides(self, overrides: Overrides) -> Self {
        Platform { overrides, ..self }
    }

    pub fn with_default_clock(self, clock: DefaultClock) -> Result<Self, Error> {
        let unavailable = match clock {
            DefaultClock::Osch { .. } => !self.family.is_machxo(),
            DefaultClock::Oscg { .. } => self.family != Family::ECP5,
            DefaultClock::Resource(_) => false,
        };
        if unavailable {
            return Err(Error {
                code: ErrorCode::UnsupportedOscillator {
                    oscillator: clock.oscillator().unwrap_or_default(),
                    family: self.family.name(),
                },
                context: self.device.clone(),
            });
        }
        Ok(Platform {
            default_clk: Some(clock),
            ..self
        })
    }

    pub fn with_default_reset(self, name: &str) -> Self {
        Platform {
            default_rst: Some(name.to_string()),
            ..self
        }
    }

    pub fn default_clock(&self) -> Option<&DefaultClock> {
        self.default_clk.as_ref()
    }

    ////////////////////////////////////////////////////////////////////
    // Resources and connectors.
    //

    pub fn add_resources(&mut self, resources: Vec<Resource>) -> Result<(), Error> {
        for res in resources.into_iter() {
            let key = (res.name.clone(), res.number);
            if self.resources.contains_key(&key) {
                let name = res.full_name();
                return Err(Error {
                    code: ErrorCode::DuplicateResource { name: name.clone() },
                    context: name,
                });
            }
            self.resources.insert(key, res);
        }
        Ok(())
    }

    pub fn add_connectors(&mut self, connectors: Vec<Connector>) -> Result<(), Error> {
        for conn in connectors.into_iter() {
            let name = conn.full_name();
            if self.connectors.contains_key(&name) {
                return Err(Error {
                    code: ErrorCode::DuplicateResource { name: name.clone() },
                    context: name,
                });
            }
            self.connectors.insert(name, conn);
        }
        Ok(())
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    pub fn lookup(&self, name: &str, number: usize) -> Result<&Resource, Error> {
        let full_name = format!("{}_{}", name, number);
        self.resources
            .get(&(name.to_string(), number))
            .ok_or_else(|| Error {
                code: ErrorCode::UnknownResource {
                    name: full_name.clone(),
                },
                context: full_name,
            })
    }

    // Mark a resource as used by the design. Only requested resources
    // get constraints.
    pub fn request(&mut self, name: &str, number: usize) -> Result<&Resource, Error> {
        let full_name = self.lookup(name, number)?.full_name();
        let key = (name.to_string(), number);
        if self.requested.contains(&key) {
            return Err(Error {
                code: ErrorCode::AlreadyRequested {
                    what: "resource",
                    name: full_name.clone(),
                },
                context: full_name,
            });
        }
        debug!("requested {}", full_name);
        self.requested.push(key);
        self.lookup(name, number)
    }

    pub fn requested(&self) -> impl Iterator<Item = &Resource> {
        self.requested
            .iter()
            .filter_map(move |key| self.resources.get(key))
    }

    ////////////////////////////////////////////////////////////////////
    // Extra source files.
    //

    pub fn add_file(&mut self, file_name: &str, content: String) -> Result<(), Error> {
        if self.files.contains_key(file_name) {
            return Err(Error {
                code: ErrorCode::DuplicateFile {
                    name: file_name.to_string(),
                },
                context: self.device.clone(),
            });
        }
        self.files.insert(file_name.to_string(), content);
        Ok(())
    }

    // Names of added files with one of the given extensions, in the
    // order they were added.
    pub fn iter_files<'a>(&'a self, exts: &'a [&'a str]) -> impl Iterator<Item = &'a str> + 'a {
        self.files
            .keys()
            .map(String::as_str)
            .filter(move |name| exts.iter().any(|ext| name.ends_with(ext)))
    }

    ////////////////////////////////////////////////////////////////////
    // Constraints.
    //

    pub fn required_tools(&self) -> &'static [&'static str] {
        self.toolchain.required_tools()
    }

    pub fn should_skip_port_component(&self, attrs: &Attrs, component: Component) -> bool {
        self.family.should_skip_port_component(attrs, component)
    }

    pub fn iter_port_constraints_bits(&self) -> Result<Vec<PortConstraint>, Error> {
        let mut constraints = Vec::new();
        for res in self.requested() {
            let bits = resource::port_constraints(res, &self.connectors, |attrs, component| {
                self.should_skip_port_component(attrs, component)
            });
            constraints.extend(in_context(&res.full_name(), bits)?);
        }
        Ok(constraints)
    }

    // Frequency (Hz) of the default clock, where known.
    pub fn default_clk_constraint(&self) -> Result<Option<f64>, Error> {
        let clock = match &self.default_clk {
            Some(clock) => clock,
            None => return Ok(None),
        };
        match clock {
            DefaultClock::Osch { frequency_mhz } => {
                in_context(clock.name(), check_osch_frequency(*frequency_mhz))?;
                Ok(Some((frequency_mhz * 1e6).round()))
            }
            DefaultClock::Oscg { div } => {
                in_context(clock.name(), check_oscg_divider(*div))?;
                Ok(Some(devices::OSCG_BASE_HZ / *div as f64))
            }
            DefaultClock::Resource(name) => Ok(self.lookup(name, 0)?.clock),
        }
    }

    pub fn iter_clock_constraints(&self) -> Result<Vec<ClockConstraint>, Error> {
        let mut constraints = self
            .requested()
            .filter_map(|res| {
                res.clock.map(|frequency| ClockConstraint::Port {
                    port: resource::clock_port(res),
                    frequency,
                })
            })
            .collect::<Vec<_>>();

        let internal = self
            .default_clk
            .as_ref()
            .map_or(false, |clock| clock.oscillator().is_some());
        if internal {
            if let Some(frequency) = self.default_clk_constraint()? {
                constraints.push(ClockConstraint::Net {
                    net: SYNC_CLOCK_NET.to_string(),
                    frequency,
                });
            }
        }
        Ok(constraints)
    }

    ////////////////////////////////////////////////////////////////////
    // Default clock domain.
    //

    // Builds the 'sync' clock: the internal oscillator if that's the
    // default clock, or the given pad signal otherwise. The reset pad
    // (or constant deassertion) passes through a two-flop synchronizer
    // into SGSR. Returns the clock net, if there is a default clock.
    pub fn create_sync_domain<B: CircuitBuilder>(
        &self,
        m: &mut B,
        clk_pad: Option<SignalId>,
        rst_pad: Option<SignalId>,
    ) -> Result<Option<SignalId>, Error> {
        let clock = match &self.default_clk {
            Some(clock) => clock,
            None => return Ok(None),
        };

        in_context(clock.name(), (|| -> Result<Option<SignalId>, ErrorCode> {
            let clk = m.add_signal(SYNC_CLOCK_NET, 1);
            match clock {
                DefaultClock::Osch { frequency_mhz } => {
                    check_osch_frequency(*frequency_mhz)?;
                    let sed_stdby = m.add_signal("osch_sedstdby", 1);
                    m.add_instance(
                        Instance::new("OSCH")
                            .param("NOM_FREQ", format!("{:.2}", frequency_mhz))
                            .input("STDBY", Expr::konst(0, 1))
                            .output("OSC", clk)
                            .output("SEDSTDBY", sed_stdby),
                    );
                }
                DefaultClock::Oscg { div } => {
                    check_oscg_divider(*div)?;
                    m.add_instance(
                        Instance::new("OSCG")
                            .param("DIV", *div as i64)
                            .output("OSC", clk),
                    );
                }
                DefaultClock::Resource(name) => {
                    let pad = clk_pad.ok_or_else(|| ErrorCode::MissingClock { name: name.clone() })?;
                    m.add_comb(clk, Expr::from(pad));
                }
            }

            let rst = match rst_pad {
                Some(rst) => Expr::from(rst),
                None => Expr::konst(0, 1),
            };
            let gsr0 = m.add_signal("gsr0", 1);
            let gsr1 = m.add_signal("gsr1", 1);
            m.add_instance(
                Instance::new("FD1S3AX")
                    .param("GSR", "DISABLED")
                    .input("CK", clk)
                    .input("D", rst.not())
                    .output("Q", gsr0),
            );
            m.add_instance(
                Instance::new("FD1S3AX")
                    .param("GSR", "DISABLED")
                    .input("CK", clk)
                    .input("D", gsr0)
                    .output("Q", gsr1),
            );
            m.add_instance(Instance::new("SGSR").input("CLK", clk).input("GSR", gsr1));
            debug!("created sync domain from {}", clock.name());
            Ok(Some(clk))
        })())
    }

    ////////////////////////////////////////////////////////////////////
    // Buffers, for this platform's family.
    //

    pub fn get_input<B: CircuitBuilder>(
        &self,
        m: &mut B,
        pin: &Pin,
        port: &Port,
        attrs: &Attrs,
        invert: bool,
    ) -> Result<XdrSignals, Error> {
        iobuf::get_input(m, self.family, pin, port, attrs, invert)
    }

    pub fn get_output<B: CircuitBuilder>(
        &self,
        m: &mut B,
        pin: &Pin,
        port: &Port,
        attrs: &Attrs,
        invert: bool,
    ) -> Result<XdrSignals, Error> {
        iobuf::get_output(m, self.family, pin, port, attrs, invert)
    }

    pub fn get_tristate<B: CircuitBuilder>(
        &self,
        m: &mut B,
        pin: &Pin,
        port: &Port,
        attrs: &Attrs,
        invert: bool,
    ) -> Result<XdrSignals, Error> {
        iobuf::get_tristate(m, self.family, pin, port, attrs, invert)
    }

    pub fn get_input_output<B: CircuitBuilder>(
        &self,
        m: &mut B,
        pin: &Pin,
        port: &Port,
        attrs: &Attrs,
        invert: bool,
    ) -> Result<XdrSignals, Error> {
        iobuf::get_input_output(m, self.family, pin, port, attrs, invert)
    }

    pub fn get_diff_input<B: CircuitBuilder>(
        &self,
        m: &mut B,
        pin: &Pin,
        port: &Port,
        attrs: &Attrs,
        invert: bool,
    ) -> Result<XdrSignals, Error> {
        iobuf::get_diff_input(m, self.family, pin, port, attrs, invert)
    }

    pub fn get_diff_output<B: CircuitBuilder>(
        &self,
        m: &mut B,
        pin: &Pin,
        port: &Port,
        attrs: &Attrs,
        invert: bool,
    ) -> Result<XdrSignals, Error> {
        iobuf::get_diff_output(m, self.family, pin, port, attrs, invert)
    }

    pub fn get_diff_tristate<B: CircuitBuilder>(
        &self,
        m: &mut B,
        pin: &Pin,
        port: &Port,
        attrs: &Attrs,
        invert: bool,
    ) -> Result<XdrSignals, Error> {
        iobuf::get_diff_tristate(m, self.family, pin, port, attrs, invert)
    }

    pub fn get_diff_input_output<B: CircuitBuilder>(
        &self,
        m: &mut B,
        pin: &Pin,
        port: &Port,
        attrs: &Attrs,
        invert: bool,
    ) -> Result<XdrSignals, Error> {
        iobuf::get_diff_input_output(m, self.family, pin, port, attrs, invert)
    }

    ////////////////////////////////////////////////////////////////////
    // Build plan.
    //

    pub fn prepare(&self, name: &str, design: &Design) -> Result<BuildPlan, Error> {
        let ports = self.iter_port_constraints_bits()?;
        let clocks = self.iter_clock_constraints()?;

        let mut plan = BuildPlan::new(name);
        let steps = match self.toolchain {
            Toolchain::Trellis => in_context(name, templates::trellis_steps(self, name))?,
            Toolchain::Diamond => templates::diamond_steps(self, name),
        };
        for step in steps.iter() {
            debug!("step: {}", step.render(Syntax::Sh));
        }

        plan.add_file(plan.script(Syntax::Sh), templates::sh_script(self, &steps));
        plan.add_file(plan.script(Syntax::Bat), templates::bat_script(self, &steps));
        for (file_name, content) in self.files.iter() {
            plan.add_file(file_name.clone(), content.clone());
        }

        match self.toolchain {
            Toolchain::Trellis => {
                plan.add_file(format!("{}.il", name), templates::rtlil_file(&design.top));
            }
            Toolchain::Diamond => {
                plan.add_file(format!("{}.v", name), templates::verilog_file(&design.top));
            }
        }
        if let Some(debug_verilog) = &design.debug_verilog {
            plan.add_file(
                format!("{}.debug.v", name),
                templates::verilog_file(debug_verilog),
            );
        }

        match self.toolchain {
            Toolchain::Trellis => {
                plan.add_file(format!("{}.ys", name), templates::yosys_script(self, name));
                plan.add_file(
                    format!("{}.lpf", name),
                    templates::lpf_file(self, name, &ports, Some(&clocks)),
                );
            }
            Toolchain::Diamond => {
                plan.add_file(format!("{}.tcl", name), templates::tcl_script(self, name));
                plan.add_file(
                    format!("{}.lpf", name),
                    templates::lpf_file(self, name, &ports, None),
                );
                plan.add_file(
                    format!("{}.sdc", name),
                    templates::sdc_file(self, name, &clocks),
                );
            }
        }

        plan.steps = steps;
        info!(
            "prepared {} build of '{}' for {}: {} files, {} steps",
            self.toolchain,
            name,
            self.device,
            plan.files.len(),
            plan.steps.len()
        );
        Ok(plan)
    }
}

fn check_osch_frequency(frequency_mhz: f64) -> Result<(), ErrorCode> {
    if devices::is_osch_frequency(frequency_mhz) {
        Ok(())
    } else {
        Err(ErrorCode::InvalidOschFrequency {
            frequency: frequency_mhz,
        })
    }
}

fn check_oscg_divider(div: u32) -> Result<(), ErrorCode> {
    if (devices::OSCG_MIN_DIV..=devices::OSCG_MAX_DIV).contains(&div) {
        Ok(())
    } else {
        Err(ErrorCode::InvalidOscgDivider { div })
    }
}
