//
// main.rs: Entry point for the lattice-plat binary.
//
// Two subcommands: 'build' turns a board file and a design into the
// files and scripts for a toolchain run, and 'iobuf' shows the
// primitives synthesized for a single pin, which is handy when
// checking what a gearing turns into.
//

extern crate clap;
extern crate lattice_plat;

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};

use std::path::PathBuf;
use std::process;

use anyhow::{anyhow, Context, Result};

use lattice_plat::devices::Family;
use lattice_plat::errors::Error;
use lattice_plat::iobuf::{self, XdrSignals};
use lattice_plat::netlist::Module;
use lattice_plat::pin::{Direction, Pin, Port};
use lattice_plat::plan::Syntax;
use lattice_plat::resource::Attrs;

fn build(matches: &ArgMatches) -> Result<()> {
    // Required arguments, so clap has already checked they're present.
    let board_file = matches.value_of("BOARD.toml").unwrap_or_default();
    let config = lattice_plat::Config {
        name: matches.value_of("name").unwrap_or("top").to_string(),
        design: PathBuf::from(matches.value_of("design").unwrap_or_default()),
        debug_verilog: matches.value_of("debug-verilog").map(PathBuf::from),
        add_files: matches
            .values_of("add-file")
            .map(|files| files.map(String::from).collect())
            .unwrap_or_default(),
        out_dir: PathBuf::from(matches.value_of("out").unwrap_or(".")),
    };

    let plan = lattice_plat::build(board_file, &config)?;
    println!(
        "Wrote {} files to {}, run {} to build.",
        plan.files.len(),
        config.out_dir.display(),
        plan.script(Syntax::Sh)
    );
    Ok(())
}

fn iobuf(matches: &ArgMatches) -> Result<()> {
    let family: Family = matches.value_of("family").unwrap_or_default().parse()?;
    let dir: Direction = matches.value_of("dir").unwrap_or("io").parse()?;
    let width: usize = matches
        .value_of("width")
        .unwrap_or("1")
        .parse()
        .context("bad --width")?;
    let xdr: u32 = matches
        .value_of("xdr")
        .unwrap_or("0")
        .parse()
        .context("bad --xdr")?;
    let invert = matches.is_present("invert");
    let diff = matches.is_present("diff");

    let mut attrs = Attrs::new();
    if let Some(io_type) = matches.value_of("io-type") {
        attrs.insert("IO_TYPE".to_string(), io_type.to_string());
    }

    let mut m = Module::new();
    let pin = Pin::new(&mut m, "pin", width, dir, xdr);
    let port = if diff {
        Port::diff(&mut m, "port", width)
    } else {
        Port::single(&mut m, "port", width)
    };

    let get_buffer: fn(&mut Module, Family, &Pin, &Port, &Attrs, bool) -> Result<XdrSignals, Error> = match (dir, diff) {
        (Direction::I, false) => iobuf::get_input,
        (Direction::O, false) => iobuf::get_output,
        (Direction::Oe, false) => iobuf::get_tristate,
        (Direction::Io, false) => iobuf::get_input_output,
        (Direction::I, true) => iobuf::get_diff_input,
        (Direction::O, true) => iobuf::get_diff_output,
        (Direction::Oe, true) => iobuf::get_diff_tristate,
        (Direction::Io, true) => iobuf::get_diff_input_output,
    };
    get_buffer(&mut m, family, &pin, &port, &attrs, invert)?;

    print!("{}", m);
    Ok(())
}

fn main() {
    let matches = App::new("lattice-plat")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Lattice MachXO2/MachXO3L and ECP5 platform support")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .global(true)
                .help("More logging, repeat for more detail"),
        )
        .subcommand(
            SubCommand::with_name("build")
                .about("Generate build files for a design")
                .arg(
                    Arg::with_name("BOARD.toml")
                        .help("Board description")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::with_name("name")
                        .long("name")
                        .takes_value(true)
                        .required(true)
                        .help("Top-level module, and base name of generated files"),
                )
                .arg(
                    Arg::with_name("design")
                        .long("design")
                        .takes_value(true)
                        .required(true)
                        .help("Design netlist: RTLIL for Trellis, Verilog for Diamond"),
                )
                .arg(
                    Arg::with_name("debug-verilog")
                        .long("debug-verilog")
                        .takes_value(true)
                        .help("Verilog of the design, kept alongside for reference"),
                )
                .arg(
                    Arg::with_name("add-file")
                        .long("add-file")
                        .takes_value(true)
                        .multiple(true)
                        .number_of_values(1)
                        .help("Extra source files (glob pattern)"),
                )
                .arg(
                    Arg::with_name("out")
                        .short("o")
                        .long("out")
                        .takes_value(true)
                        .help("Output directory"),
                ),
        )
        .subcommand(
            SubCommand::with_name("iobuf")
                .about("Show the primitives synthesized for one pin")
                .arg(
                    Arg::with_name("family")
                        .long("family")
                        .takes_value(true)
                        .required(true)
                        .help("MachXO2, MachXO3L or ECP5"),
                )
                .arg(
                    Arg::with_name("dir")
                        .long("dir")
                        .takes_value(true)
                        .possible_values(&["i", "o", "oe", "io"])
                        .help("Pin direction"),
                )
                .arg(
                    Arg::with_name("width")
                        .long("width")
                        .takes_value(true)
                        .help("Pin width"),
                )
                .arg(
                    Arg::with_name("xdr")
                        .long("xdr")
                        .takes_value(true)
                        .help("Gearing: 0, 1, 2, 4 or 7"),
                )
                .arg(
                    Arg::with_name("invert")
                        .long("invert")
                        .takes_value(false)
                        .help("Active-low pin"),
                )
                .arg(
                    Arg::with_name("diff")
                        .long("diff")
                        .takes_value(false)
                        .help("Differential port"),
                )
                .arg(
                    Arg::with_name("io-type")
                        .long("io-type")
                        .takes_value(true)
                        .help("IO_TYPE attribute"),
                ),
        )
        .get_matches();

    // '-v' may come before or after the subcommand.
    let verbose = matches.subcommand().1.map_or(0, |sub| sub.occurrences_of("verbose"));
    let log_level = match u64::max(matches.occurrences_of("verbose"), verbose) {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // stdout is for the iobuf dump.
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    let res = match matches.subcommand() {
        ("build", Some(sub)) => build(sub),
        ("iobuf", Some(sub)) => iobuf(sub),
        _ => Err(anyhow!("no subcommand given")),
    };

    if let Err(e) = res {
        eprintln!("{:#}", e);
        process::exit(1);
    }
}
