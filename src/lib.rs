//
// lib.rs: The lattice-plat platform library.
//
// lattice-plat is the board-support layer between an HDL design and
// the Lattice MachXO2/MachXO3L and ECP5 toolchains. It synthesizes
// I/O buffers out of vendor primitives, describes board resources and
// their pins, and generates the constraint files and scripts that
// drive Yosys/nextpnr/Trellis or Diamond.
//
// The lattice-plat binary is a thin wrapper around "build", but the
// library can be driven directly, starting from a platform::Platform
// (or a board file loaded through config::load) and a
// netlist::CircuitBuilder to add buffers to.
//

pub mod config;
pub mod devices;
pub mod errors;
pub mod interface;
pub mod iobuf;
pub mod netlist;
pub mod pin;
pub mod plan;
pub mod platform;
pub mod resource;
pub mod templates;

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use errors::{FileError, FileErrorKind};

pub struct Config {
    // Base name of every generated file, and the design's top module.
    pub name: String,
    // RTLIL for Trellis, Verilog for Diamond.
    pub design: PathBuf,
    pub debug_verilog: Option<PathBuf>,
    // Glob patterns for extra source files.
    pub add_files: Vec<String>,
    pub out_dir: PathBuf,
}

fn read_file(file_name: &Path) -> Result<String, FileError> {
    fs::read_to_string(file_name).map_err(|e| FileError {
        file: file_name.to_path_buf(),
        err: e.into(),
    })
}

// Expand the glob patterns and add every matching file to the
// platform, under its base name.
fn add_files(platform: &mut platform::Platform, patterns: &[String]) -> Result<(), FileError> {
    for pattern in patterns.iter() {
        let in_pattern = |err: FileErrorKind| FileError {
            file: pattern.into(),
            err,
        };
        let paths = glob::glob(pattern).map_err(|e| in_pattern(e.into()))?;
        for path in paths {
            let path = path.map_err(|e| in_pattern(e.into_error().into()))?;
            let content = read_file(&path)?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string_lossy().into_owned());
            info!("adding {}", path.display());
            platform
                .add_file(&file_name, content)
                .map_err(|e| FileError {
                    file: path.clone(),
                    err: e.into(),
                })?;
        }
    }
    Ok(())
}

// Load the board, request every resource it has, and write out the
// build plan for the given design.
pub fn build(board_file: &str, config: &Config) -> Result<plan::BuildPlan, FileError> {
    let mut platform = config::load(Path::new(board_file))?;

    let in_board = |err: errors::Error| FileError {
        file: board_file.into(),
        err: err.into(),
    };
    let keys = platform
        .resources()
        .map(|res| (res.name.clone(), res.number))
        .collect::<Vec<_>>();
    for (name, number) in keys.iter() {
        platform.request(name, *number).map_err(in_board)?;
    }

    add_files(&mut platform, &config.add_files)?;

    let design = platform::Design {
        top: read_file(&config.design)?,
        debug_verilog: match &config.debug_verilog {
            Some(file_name) => Some(read_file(file_name)?),
            None => None,
        },
    };

    let plan = platform.prepare(&config.name, &design).map_err(in_board)?;
    plan.write_files(&config.out_dir)?;
    Ok(plan)
}
