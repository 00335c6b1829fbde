//
// devices.rs: Lattice family parameterisation data
//
// This file provides an abstraction layer over the supported FPGA
// families, in those cases where they can be handled uniformly:
// which gearings they can synthesize and with which primitives,
// which I/O standards they know about, and the device option tables
// the open-source toolchain needs.
//

use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use serde::Deserialize;

use crate::errors::ErrorCode;
use crate::pin::Gear;
use crate::platform::Toolchain;
use crate::resource::{Attrs, Component};

// The primitives used to serialize/deserialize one gearing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GearPrimitives {
    pub gear: Gear,
    pub input: &'static str,
    pub output: &'static str,
}

// Used for single-data-rate registers, and for the registered
// tristate enable at every gearing above zero.
pub const INPUT_REGISTER: &str = "IFS1P3DX";
pub const OUTPUT_REGISTER: &str = "OFS1P3DX";

// 'Family' is the main enum that can be matched on for family-specific
// behaviour, or method calls made on it to extract per-family
// parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Family {
    MachXO2,
    MachXO3L,
    ECP5,
}

struct FamilyData {
    name: &'static str,
    // Multi-phase gearings, beyond combinational and registered.
    serdes: &'static [GearPrimitives],
    single_ended_io_types: &'static [&'static str],
    differential_io_types: &'static [&'static str],
    toolchains: &'static [Toolchain],
}

const ECP5_SERDES: [GearPrimitives; 3] = [
    GearPrimitives { gear: Gear::Ddr, input: "IDDRX1F", output: "ODDRX1F" },
    GearPrimitives { gear: Gear::Qdr, input: "IDDRX2F", output: "ODDRX2F" },
    GearPrimitives { gear: Gear::Septuple, input: "IDDR71B", output: "ODDR71B" },
];

// MachXO2 and MachXO3L primitives are the same.
const MACHXO_SERDES: [GearPrimitives; 1] = [
    GearPrimitives { gear: Gear::Ddr, input: "IDDRXE", output: "ODDRXE" },
];

const MACHXO_SINGLE_ENDED_IO_TYPES: [&str; 22] = [
    "PCI33", "LVTTL33", "LVCMOS33", "LVCMOS25", "LVCMOS18", "LVCMOS15", "LVCMOS12",
    "LVCMOS25R33", "LVCMOS18R33", "LVCMOS18R25", "LVCMOS15R33", "LVCMOS15R25", "LVCMOS12R33",
    "LVCMOS12R25", "LVCMOS10R33", "LVCMOS10R25", "SSTL25_I", "SSTL25_II", "SSTL18_I",
    "SSTL18_II", "HSTL18_I", "HSTL18_II",
];

const MACHXO_DIFFERENTIAL_IO_TYPES: [&str; 23] = [
    "LVDS25", "LVDS25E", "RSDS25", "RSDS25E", "BLVDS25", "BLVDS25E", "MLVDS25", "MLVDS25E",
    "LVPECL33", "LVPECL33E", "SSTL25D_I", "SSTL25D_II", "SSTL18D_I", "SSTL18D_II",
    "HSTL18D_I", "HSTL18D_II", "LVTTL33D", "LVCMOS33D", "LVCMOS25D", "LVCMOS18D", "LVCMOS15D",
    "LVCMOS12D", "MIPI",
];

const ECP5_SINGLE_ENDED_IO_TYPES: [&str; 13] = [
    "HSUL12", "LVCMOS12", "LVCMOS15", "LVCMOS18", "LVCMOS25", "LVCMOS33", "LVTTL33",
    "SSTL135_I", "SSTL135_II", "SSTL15_I", "SSTL15_II", "SSTL18_I", "SSTL18_II",
];

const ECP5_DIFFERENTIAL_IO_TYPES: [&str; 21] = [
    "BLVDS25", "BLVDS25E", "HSUL12D", "LVCMOS18D", "LVCMOS25D", "LVCMOS33D",
    "LVDS", "LVDS25E", "LVPECL33", "LVPECL33E", "LVTTL33D", "MLVDS", "MLVDS25E",
    "SLVS", "SSTL135D_I", "SSTL135D_II", "SSTL15D_I", "SSTL15D_II", "SSTL18D_I",
    "SSTL18D_II", "SUBLVDS",
];

const MACHXO2_DATA: FamilyData = FamilyData {
    name: "MachXO2",
    serdes: &MACHXO_SERDES,
    single_ended_io_types: &MACHXO_SINGLE_ENDED_IO_TYPES,
    differential_io_types: &MACHXO_DIFFERENTIAL_IO_TYPES,
    toolchains: &[Toolchain::Diamond],
};

const MACHXO3L_DATA: FamilyData = FamilyData {
    name: "MachXO3L",
    ..MACHXO2_DATA
};

const ECP5_DATA: FamilyData = FamilyData {
    name: "ECP5",
    serdes: &ECP5_SERDES,
    single_ended_io_types: &ECP5_SINGLE_ENDED_IO_TYPES,
    differential_io_types: &ECP5_DIFFERENTIAL_IO_TYPES,
    toolchains: &[Toolchain::Trellis, Toolchain::Diamond],
};

// I/O standard assumed when a port has no IO_TYPE attribute.
pub const DEFAULT_IO_TYPE: &str = "LVCMOS25";

// Nominal frequencies (MHz) of the MachXO2/MachXO3L internal OSCH
// oscillator, from the "MachXO2 sysCLOCK PLL Design and Usage
// Guide". The guide lists 15.65 twice; it appears once here.
pub const OSCH_FREQUENCIES: [f64; 63] = [
    2.08, 2.15, 2.22, 2.29, 2.38, 2.46, 2.56, 2.66, 2.77, 2.89,
    3.02, 3.17, 3.33, 3.50, 3.69, 3.91, 4.16, 4.29, 4.43, 4.59,
    4.75, 4.93, 5.12, 5.32, 5.54, 5.78, 6.05, 6.33, 6.65, 7.00,
    7.39, 7.82, 8.31, 8.58, 8.87, 9.17, 9.50, 9.85, 10.23, 10.64,
    11.08, 11.57, 12.09, 12.67, 13.30, 14.00, 14.78, 15.65, 16.63,
    17.73, 19.00, 20.46, 22.17, 24.18, 26.60, 29.56, 33.25, 38.00, 44.33,
    53.20, 66.50, 88.67, 133.00,
];

// The ECP5 OSCG oscillator runs at a nominal 310 MHz before its divider.
pub const OSCG_BASE_HZ: f64 = 310e6;
pub const OSCG_MIN_DIV: u32 = 2;
pub const OSCG_MAX_DIV: u32 = 128;

const NEXTPNR_DEVICE_OPTIONS: [(&str, &str); 10] = [
    ("LFE5U-12F", "--12k"),
    ("LFE5U-25F", "--25k"),
    ("LFE5U-45F", "--45k"),
    ("LFE5U-85F", "--85k"),
    ("LFE5UM-25F", "--um-25k"),
    ("LFE5UM-45F", "--um-45k"),
    ("LFE5UM-85F", "--um-85k"),
    ("LFE5UM5G-25F", "--um5g-25k"),
    ("LFE5UM5G-45F", "--um5g-45k"),
    ("LFE5UM5G-85F", "--um5g-85k"),
];

const NEXTPNR_PACKAGE_OPTIONS: [(&str, &str); 5] = [
    ("BG256", "caBGA256"),
    ("MG285", "csfBGA285"),
    ("BG381", "caBGA381"),
    ("BG554", "caBGA554"),
    ("BG756", "caBGA756"),
];

pub fn nextpnr_device_option(device: &str) -> Result<&'static str, ErrorCode> {
    NEXTPNR_DEVICE_OPTIONS
        .iter()
        .find(|(name, _)| *name == device)
        .map(|(_, option)| *option)
        .ok_or_else(|| ErrorCode::UnknownDevice {
            device: device.to_string(),
        })
}

pub fn nextpnr_package_option(package: &str) -> Result<&'static str, ErrorCode> {
    NEXTPNR_PACKAGE_OPTIONS
        .iter()
        .find(|(name, _)| *name == package)
        .map(|(_, option)| *option)
        .ok_or_else(|| ErrorCode::UnknownPackage {
            package: package.to_string(),
        })
}

pub fn io_type(attrs: &Attrs) -> &str {
    attrs
        .get("IO_TYPE")
        .map(String::as_str)
        .unwrap_or(DEFAULT_IO_TYPE)
}

// Only exact table entries are accepted. The same value feeds both the
// OSCH NOM_FREQ parameter and the clock constraint.
pub fn is_osch_frequency(frequency_mhz: f64) -> bool {
    OSCH_FREQUENCIES.iter().any(|freq| *freq == frequency_mhz)
}

impl Family {
    fn get_family_data(&self) -> &FamilyData {
        match self {
            Family::MachXO2 => &MACHXO2_DATA,
            Family::MachXO3L => &MACHXO3L_DATA,
            Family::ECP5 => &ECP5_DATA,
        }
    }

    pub fn name(&self) -> &'static str {
        self.get_family_data().name
    }

    pub fn is_machxo(&self) -> bool {
        matches!(self, Family::MachXO2 | Family::MachXO3L)
    }

    pub fn serdes_primitives(&self, gear: Gear) -> Option<&'static GearPrimitives> {
        self.get_family_data()
            .serdes
            .iter()
            .find(|prims| prims.gear == gear)
    }

    pub fn supports_gear(&self, gear: Gear) -> bool {
        match gear {
            Gear::Comb | Gear::Sdr => true,
            _ => self.serdes_primitives(gear).is_some(),
        }
    }

    // Gear values accepted by this family, for error messages.
    pub fn supported_xdrs(&self) -> String {
        crate::pin::ALL_GEARS
            .iter()
            .filter(|gear| self.supports_gear(**gear))
            .map(|gear| gear.xdr())
            .join(", ")
    }

    pub fn single_ended_io_types(&self) -> &'static [&'static str] {
        self.get_family_data().single_ended_io_types
    }

    pub fn differential_io_types(&self) -> &'static [&'static str] {
        self.get_family_data().differential_io_types
    }

    pub fn toolchains(&self) -> &'static [Toolchain] {
        self.get_family_data().toolchains
    }

    pub fn default_toolchain(&self) -> Toolchain {
        self.toolchains()[0]
    }

    pub fn knows_io_type(&self, io_type: &str) -> bool {
        self.single_ended_io_types()
            .iter()
            .chain(self.differential_io_types().iter())
            .any(|known| *known == io_type)
    }

    // A differential I/O is placed by instantiating a buffer on the
    // non-inverting pin only; the macro-cell implies the other leg.
    pub fn should_skip_port_component(&self, attrs: &Attrs, component: Component) -> bool {
        let io_type = io_type(attrs);
        component == Component::N
            && self
                .differential_io_types()
                .iter()
                .any(|diff_type| *diff_type == io_type)
    }
}

impl FromStr for Family {
    type Err = ErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "machxo2" => Ok(Family::MachXO2),
            "machxo3l" => Ok(Family::MachXO3L),
            "ecp5" => Ok(Family::ECP5),
            _ => Err(ErrorCode::UnknownFamily { name: s.to_string() }),
        }
    }
}

impl TryFrom<String> for Family {
    type Error = ErrorCode;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
