//
// config.rs: Board description files
//
// Boards are described in TOML: the device, the toolchain and its
// overrides, the default clock and reset, then the connectors and
// resources the board provides, and any source files that go with
// it. Loading a board file gives a Platform with all its resources
// added, but none yet requested.
//

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::devices::Family;
use crate::errors::{in_context, Error, ErrorCode, FileError, FileErrorKind};
use crate::interface::{self, DirectUsb, I2c, Irda, Ps2, Spi, Uart, Ulpi};
use crate::pin::Direction;
use crate::platform::{DefaultClock, Overrides, Platform, Toolchain};
use crate::resource::{Attrs, Conn, Connector, DiffPairs, Io, Pins, Resource};

#[derive(Clone, Debug, Deserialize)]
pub struct Board {
    pub platform: PlatformDesc,
    #[serde(default)]
    pub overrides: Overrides,
    #[serde(default, rename = "connector")]
    pub connectors: Vec<ConnectorDesc>,
    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceDesc>,
    // Extra source files, by name, given inline.
    #[serde(default)]
    pub files: IndexMap<String, String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PlatformDesc {
    pub family: Family,
    pub device: String,
    pub package: String,
    pub speed: String,
    pub grade: Option<String>,
    pub toolchain: Option<Toolchain>,
    // A resource name, "OSCH" or "OSCG".
    pub default_clk: Option<String>,
    pub default_rst: Option<String>,
    pub osch_frequency: Option<f64>,
    pub oscg_div: Option<u32>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ConnectorDesc {
    pub name: String,
    #[serde(default)]
    pub number: usize,
    // Device pins in connector pin order, '-' where unconnected.
    pub pins: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ResourceDesc {
    #[serde(default)]
    pub number: usize,
    // Replaces the interface's own name.
    pub name: Option<String>,
    // Frequency in Hz, if this is a clock input.
    pub clock: Option<f64>,
    #[serde(flatten)]
    pub kind: ResourceKind,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceKind {
    Uart(Uart),
    Irda(Irda),
    Spi(Spi),
    I2c(I2c),
    Usb(DirectUsb),
    Ulpi(Ulpi),
    Ps2(Ps2),
    Pins(PinsDesc),
    DiffPairs(DiffPairsDesc),
}

// A plain resource, with no interface rules applied.
#[derive(Clone, Debug, Deserialize)]
pub struct PinsDesc {
    pub pins: String,
    #[serde(default)]
    pub dir: Direction,
    #[serde(default)]
    pub invert: bool,
    pub width: Option<usize>,
    pub conn: Option<Conn>,
    #[serde(default)]
    pub attrs: Attrs,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DiffPairsDesc {
    pub p: String,
    pub n: String,
    #[serde(default)]
    pub dir: Direction,
    #[serde(default)]
    pub invert: bool,
    pub width: Option<usize>,
    pub conn: Option<Conn>,
    #[serde(default)]
    pub attrs: Attrs,
}

fn plain_name<'a>(desc: &'a ResourceDesc, kind: &'static str) -> Result<&'a str, ErrorCode> {
    desc.name.as_deref().ok_or(ErrorCode::MissingName { kind })
}

impl ResourceDesc {
    pub fn build(&self) -> Result<Resource, Error> {
        let number = self.number;
        let res = match &self.kind {
            ResourceKind::Uart(desc) => interface::uart(number, desc)?,
            ResourceKind::Irda(desc) => interface::irda(number, desc)?,
            ResourceKind::Spi(desc) => interface::spi(number, desc)?,
            ResourceKind::I2c(desc) => interface::i2c(number, desc)?,
            ResourceKind::Usb(desc) => interface::direct_usb(number, desc)?,
            ResourceKind::Ulpi(desc) => interface::ulpi(number, desc)?,
            ResourceKind::Ps2(desc) => interface::ps2(number, desc)?,
            ResourceKind::Pins(desc) => {
                let name = in_context("resource", plain_name(self, "pins"))?;
                let pins = in_context(&format!("{}_{}", name, number), (|| -> Result<Pins, ErrorCode> {
                    let pins = Pins::new(&desc.pins, desc.dir)?
                        .invert_if(desc.invert)
                        .conn(desc.conn.as_ref());
                    match desc.width {
                        Some(width) => pins.assert_width(width),
                        None => Ok(pins),
                    }
                })())?;
                Resource::new(name, number, Io::Pins(pins)).with_attrs(desc.attrs.clone())
            }
            ResourceKind::DiffPairs(desc) => {
                let name = in_context("resource", plain_name(self, "diff_pairs"))?;
                let pairs = in_context(&format!("{}_{}", name, number), (|| -> Result<DiffPairs, ErrorCode> {
                    let pairs = DiffPairs::new(&desc.p, &desc.n, desc.dir)?
                        .invert_if(desc.invert)
                        .conn(desc.conn.as_ref());
                    match desc.width {
                        Some(width) => pairs.assert_width(width),
                        None => Ok(pairs),
                    }
                })())?;
                Resource::new(name, number, Io::DiffPairs(pairs)).with_attrs(desc.attrs.clone())
            }
        };

        let res = match &self.name {
            Some(name) => res.with_name(name),
            None => res,
        };
        Ok(match self.clock {
            Some(frequency) => res.with_clock(frequency),
            None => res,
        })
    }
}

fn default_clock(desc: &PlatformDesc) -> Result<Option<DefaultClock>, ErrorCode> {
    Ok(match desc.default_clk.as_deref() {
        None => None,
        Some("OSCH") => Some(DefaultClock::Osch {
            frequency_mhz: desc.osch_frequency.ok_or(ErrorCode::MissingOscillatorSetting {
                oscillator: "OSCH",
                setting: "osch_frequency",
            })?,
        }),
        Some("OSCG") => Some(DefaultClock::Oscg {
            div: desc.oscg_div.ok_or(ErrorCode::MissingOscillatorSetting {
                oscillator: "OSCG",
                setting: "oscg_div",
            })?,
        }),
        Some(name) => Some(DefaultClock::Resource(name.to_string())),
    })
}

impl Board {
    pub fn into_platform(self) -> Result<Platform, Error> {
        let desc = &self.platform;
        let mut platform = Platform::new(
            desc.family,
            &desc.device,
            &desc.package,
            &desc.speed,
            desc.toolchain,
        )?
        .with_overrides(self.overrides.clone());
        if let Some(grade) = &desc.grade {
            platform = platform.with_grade(grade);
        }
        if let Some(clock) = in_context(&desc.device, default_clock(desc))? {
            platform = platform.with_default_clock(clock)?;
        }
        if let Some(rst) = &desc.default_rst {
            platform = platform.with_default_reset(rst);
        }

        let connectors = self
            .connectors
            .iter()
            .map(|conn| Connector::new(&conn.name, conn.number, &conn.pins))
            .collect();
        platform.add_connectors(connectors)?;

        let resources = self
            .resources
            .iter()
            .map(ResourceDesc::build)
            .collect::<Result<Vec<_>, _>>()?;
        platform.add_resources(resources)?;

        for (file_name, content) in self.files.iter() {
            platform.add_file(file_name, content.clone())?;
        }

        Ok(platform)
    }
}

pub fn from_str(text: &str) -> Result<Board, toml::de::Error> {
    toml::from_str(text)
}

pub fn load(file_name: &Path) -> Result<Platform, FileError> {
    (|| -> Result<Platform, FileErrorKind> {
        let text = fs::read_to_string(file_name)?;
        let board = from_str(&text)?;
        Ok(board.into_platform()?)
    })()
    .map_err(|err| FileError {
        file: file_name.to_path_buf(),
        err,
    })
}
