//
// interface.rs: Standard interface resources
//
// Builders for the peripheral interfaces boards commonly expose. Each
// takes a description of which pins carry which lines, works out the
// direction of every line from the interface's rules (and its role,
// where it has one), and returns a Resource. The descriptions
// deserialize straight out of a board file.
//

use std::convert::TryFrom;
use std::str::FromStr;

use serde::Deserialize;

use crate::errors::{in_context, Error, ErrorCode};
use crate::pin::Direction;
use crate::resource::{pins_n, Attrs, Conn, Pins, Resource, Subsignal};

// Build one Subsignal of a single pin.
fn line(name: &str, pins: &str, dir: Direction, conn: Option<&Conn>) -> Result<Subsignal, ErrorCode> {
    let pins = Pins::new(pins, dir)?.conn(conn).assert_width(1)?;
    Ok(Subsignal::pins(name, pins))
}

// And one which may be several pins wide.
fn lines(name: &str, pins: &str, dir: Direction, conn: Option<&Conn>) -> Result<Subsignal, ErrorCode> {
    Ok(Subsignal::pins(name, Pins::new(pins, dir)?.conn(conn)))
}

fn optional_line(
    ios: &mut Vec<Subsignal>,
    name: &str,
    pins: &Option<String>,
    dir: Direction,
    conn: Option<&Conn>,
) -> Result<(), ErrorCode> {
    if let Some(pins) = pins {
        ios.push(line(name, pins, dir, conn)?);
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////
// UART
//

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum UartRole {
    // Data communication equipment: the modem end.
    Dce,
    // Data terminal equipment: the computer end.
    Dte,
}

impl FromStr for UartRole {
    type Err = ErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dce" => Ok(UartRole::Dce),
            "dte" => Ok(UartRole::Dte),
            _ => Err(ErrorCode::UnknownRole {
                name: s.to_string(),
                expected: "'dce' or 'dte'",
            }),
        }
    }
}

impl TryFrom<String> for UartRole {
    type Error = ErrorCode;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Uart {
    pub rx: String,
    pub tx: String,
    pub rts: Option<String>,
    pub cts: Option<String>,
    pub dtr: Option<String>,
    pub dsr: Option<String>,
    pub dcd: Option<String>,
    pub ri: Option<String>,
    pub role: Option<UartRole>,
    pub conn: Option<Conn>,
    pub attrs: Option<Attrs>,
}

pub fn uart(number: usize, desc: &Uart) -> Result<Resource, Error> {
    in_context(&format!("uart_{}", number), build_uart(number, desc))
}

fn build_uart(number: usize, desc: &Uart) -> Result<Resource, ErrorCode> {
    let flow_control = [&desc.rts, &desc.cts, &desc.dtr, &desc.dsr, &desc.dcd, &desc.ri];
    if flow_control.iter().any(|line| line.is_some()) && desc.role.is_none() {
        return Err(ErrorCode::MissingRole);
    }

    let (dce_to_dte, dte_to_dce) = match desc.role {
        Some(UartRole::Dte) => (Direction::I, Direction::O),
        _ => (Direction::O, Direction::I),
    };

    let conn = desc.conn.as_ref();
    let mut ios = vec![
        line("rx", &desc.rx, Direction::I, conn)?,
        line("tx", &desc.tx, Direction::O, conn)?,
    ];
    optional_line(&mut ios, "rts", &desc.rts, dte_to_dce, conn)?;
    optional_line(&mut ios, "cts", &desc.cts, dce_to_dte, conn)?;
    optional_line(&mut ios, "dtr", &desc.dtr, dte_to_dce, conn)?;
    optional_line(&mut ios, "dsr", &desc.dsr, dce_to_dte, conn)?;
    optional_line(&mut ios, "dcd", &desc.dcd, dce_to_dte, conn)?;
    optional_line(&mut ios, "ri", &desc.ri, dce_to_dte, conn)?;

    Ok(Resource::family(number, "uart", ios, desc.attrs.as_ref()))
}

////////////////////////////////////////////////////////////////////////
// IrDA
//

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Irda {
    pub rx: String,
    pub tx: String,
    // Active-high enable.
    pub en: Option<String>,
    // Shutdown, i.e. active-low enable.
    pub sd: Option<String>,
    pub conn: Option<Conn>,
    pub attrs: Option<Attrs>,
}

pub fn irda(number: usize, desc: &Irda) -> Result<Resource, Error> {
    in_context(&format!("irda_{}", number), build_irda(number, desc))
}

fn build_irda(number: usize, desc: &Irda) -> Result<Resource, ErrorCode> {
    let conn = desc.conn.as_ref();
    let en = match (&desc.en, &desc.sd) {
        (Some(en), None) => line("en", en, Direction::O, conn)?,
        (None, Some(sd)) => Subsignal::pins("en", pins_n(sd, Direction::O)?.conn(conn).assert_width(1)?),
        _ => return Err(ErrorCode::ExclusiveEnable),
    };

    let ios = vec![
        line("rx", &desc.rx, Direction::I, conn)?,
        line("tx", &desc.tx, Direction::O, conn)?,
        en,
    ];

    Ok(Resource::family(number, "irda", ios, desc.attrs.as_ref()))
}

////////////////////////////////////////////////////////////////////////
// SPI
//

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum SpiRole {
    Controller,
    Peripheral,
}

impl Default for SpiRole {
    fn default() -> Self {
        SpiRole::Controller
    }
}

impl FromStr for SpiRole {
    type Err = ErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "controller" => Ok(SpiRole::Controller),
            "peripheral" => Ok(SpiRole::Peripheral),
            _ => Err(ErrorCode::UnknownRole {
                name: s.to_string(),
                expected: "'controller' or 'peripheral'",
            }),
        }
    }
}

impl TryFrom<String> for SpiRole {
    type Error = ErrorCode;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Spi {
    // Active-low chip selects.
    pub cs_n: String,
    pub clk: String,
    pub copi: Option<String>,
    pub cipo: Option<String>,
    pub int: Option<String>,
    pub reset: Option<String>,
    #[serde(default)]
    pub role: SpiRole,
    pub conn: Option<Conn>,
    pub attrs: Option<Attrs>,
}

pub fn spi(number: usize, desc: &Spi) -> Result<Resource, Error> {
    in_context(&format!("spi_{}", number), build_spi(number, desc))
}

fn build_spi(number: usize, desc: &Spi) -> Result<Resource, ErrorCode> {
    if desc.copi.is_none() && desc.cipo.is_none() {
        return Err(ErrorCode::MissingDataLine);
    }

    let conn = desc.conn.as_ref();
    let mut ios = Vec::new();

    match desc.role {
        SpiRole::Controller => {
            // A controller may drive several chip selects, interrupts
            // and resets, so those aren't width-checked.
            ios.push(Subsignal::pins("cs", pins_n(&desc.cs_n, Direction::O)?.conn(conn)));
            ios.push(line("clk", &desc.clk, Direction::O, conn)?);
            optional_line(&mut ios, "copi", &desc.copi, Direction::O, conn)?;
            optional_line(&mut ios, "cipo", &desc.cipo, Direction::I, conn)?;
            if let Some(int) = &desc.int {
                ios.push(lines("int", int, Direction::I, conn)?);
            }
            if let Some(reset) = &desc.reset {
                ios.push(lines("reset", reset, Direction::O, conn)?);
            }
        }
        SpiRole::Peripheral => {
            ios.push(Subsignal::pins(
                "cs",
                pins_n(&desc.cs_n, Direction::I)?.conn(conn).assert_width(1)?,
            ));
            ios.push(line("clk", &desc.clk, Direction::I, conn)?);
            optional_line(&mut ios, "copi", &desc.copi, Direction::I, conn)?;
            optional_line(&mut ios, "cipo", &desc.cipo, Direction::Oe, conn)?;
            optional_line(&mut ios, "int", &desc.int, Direction::Oe, conn)?;
            optional_line(&mut ios, "reset", &desc.reset, Direction::I, conn)?;
        }
    }

    Ok(Resource::family(number, "spi", ios, desc.attrs.as_ref()))
}

////////////////////////////////////////////////////////////////////////
// I2C
//

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct I2c {
    pub scl: String,
    pub sda: String,
    pub conn: Option<Conn>,
    pub attrs: Option<Attrs>,
}

pub fn i2c(number: usize, desc: &I2c) -> Result<Resource, Error> {
    in_context(&format!("i2c_{}", number), build_i2c(number, desc))
}

fn build_i2c(number: usize, desc: &I2c) -> Result<Resource, ErrorCode> {
    let conn = desc.conn.as_ref();
    let ios = vec![
        line("scl", &desc.scl, Direction::Io, conn)?,
        line("sda", &desc.sda, Direction::Io, conn)?,
    ];
    Ok(Resource::family(number, "i2c", ios, desc.attrs.as_ref()))
}

////////////////////////////////////////////////////////////////////////
// USB, with the data lines wired straight to FPGA pins.
//

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct DirectUsb {
    pub d_p: String,
    pub d_n: String,
    pub pullup: Option<String>,
    pub vbus_valid: Option<String>,
    pub conn: Option<Conn>,
    pub attrs: Option<Attrs>,
}

pub fn direct_usb(number: usize, desc: &DirectUsb) -> Result<Resource, Error> {
    in_context(&format!("usb_{}", number), build_direct_usb(number, desc))
}

fn build_direct_usb(number: usize, desc: &DirectUsb) -> Result<Resource, ErrorCode> {
    let conn = desc.conn.as_ref();
    let mut ios = vec![
        line("d_p", &desc.d_p, Direction::Io, conn)?,
        line("d_n", &desc.d_n, Direction::Io, conn)?,
    ];
    optional_line(&mut ios, "pullup", &desc.pullup, Direction::O, conn)?;
    optional_line(&mut ios, "vbus_valid", &desc.vbus_valid, Direction::I, conn)?;
    Ok(Resource::family(number, "usb", ios, desc.attrs.as_ref()))
}

////////////////////////////////////////////////////////////////////////
// ULPI, for an external USB PHY.
//

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Ulpi {
    pub data: String,
    pub clk: String,
    pub dir: String,
    pub nxt: String,
    pub stp: String,
    pub rst: Option<String>,
    // "i" when the PHY supplies the clock, "o" when we do.
    pub clk_dir: Option<String>,
    #[serde(default)]
    pub rst_invert: bool,
    pub conn: Option<Conn>,
    pub attrs: Option<Attrs>,
}

pub const ULPI_DATA_WIDTH: usize = 8;

pub fn ulpi(number: usize, desc: &Ulpi) -> Result<Resource, Error> {
    in_context(&format!("usb_{}", number), build_ulpi(number, desc))
}

fn build_ulpi(number: usize, desc: &Ulpi) -> Result<Resource, ErrorCode> {
    let clk_dir = match desc.clk_dir.as_deref() {
        None | Some("i") => Direction::I,
        Some("o") => Direction::O,
        Some(name) => {
            return Err(ErrorCode::UnknownClockDirection {
                name: name.to_string(),
            })
        }
    };

    let conn = desc.conn.as_ref();
    let data = Pins::new(&desc.data, Direction::Io)?
        .conn(conn)
        .assert_width(ULPI_DATA_WIDTH)?;
    let mut ios = vec![
        Subsignal::pins("data", data),
        line("clk", &desc.clk, clk_dir, conn)?,
        line("dir", &desc.dir, Direction::I, conn)?,
        line("nxt", &desc.nxt, Direction::I, conn)?,
        line("stp", &desc.stp, Direction::O, conn)?,
    ];
    if let Some(rst) = &desc.rst {
        let rst = Pins::new(rst, Direction::O)?
            .invert_if(desc.rst_invert)
            .conn(conn)
            .assert_width(1)?;
        ios.push(Subsignal::pins("rst", rst));
    }

    Ok(Resource::family(number, "usb", ios, desc.attrs.as_ref()))
}

////////////////////////////////////////////////////////////////////////
// PS/2
//

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Ps2 {
    pub clk: String,
    pub dat: String,
    pub conn: Option<Conn>,
    pub attrs: Option<Attrs>,
}

pub fn ps2(number: usize, desc: &Ps2) -> Result<Resource, Error> {
    in_context(&format!("ps2_{}", number), build_ps2(number, desc))
}

fn build_ps2(number: usize, desc: &Ps2) -> Result<Resource, ErrorCode> {
    let conn = desc.conn.as_ref();
    let ios = vec![
        line("clk", &desc.clk, Direction::I, conn)?,
        line("dat", &desc.dat, Direction::Io, conn)?,
    ];
    Ok(Resource::family(number, "ps2", ios, desc.attrs.as_ref()))
}
