//
// templates.rs: Build file generation
//
// Generates the text of every file a build needs: the design itself,
// wrapped with a header, the Yosys script or Diamond project, the
// constraint files, and the shell and batch scripts that run each
// step. Each generator builds up a String line by line.
//

use itertools::Itertools;

use crate::devices::{nextpnr_device_option, nextpnr_package_option};
use crate::errors::ErrorCode;
use crate::platform::{ClockConstraint, Platform, Toolchain};
use crate::plan::{Step, Syntax};
use crate::resource::PortConstraint;

pub const AUTOGENERATED: &str = "Automatically generated by lattice-plat. Do not edit.";

// Tcl word quoting.
pub fn tcl_escape(s: &str) -> String {
    let mut buf = String::from("{");
    for c in s.chars() {
        if matches!(c, '{' | '}' | '\\') {
            buf.push('\\');
        }
        buf.push(c);
    }
    buf.push('}');
    buf
}

// Environment variable a build script reads a tool's path from.
pub fn tool_env_var(tool: &str) -> String {
    tool.to_ascii_uppercase().replace('-', "_").replace('+', "X")
}

// Environment variable naming a script to source before building.
pub fn toolchain_env_var(toolchain: Toolchain) -> String {
    format!("LATTICE_PLAT_ENV_{}", toolchain.name().to_ascii_uppercase())
}

// Extra command-line options, given as a single whitespace-separated
// string.
fn options(opts: &Option<String>) -> Vec<String> {
    opts.iter()
        .flat_map(|opts| opts.split_whitespace())
        .map(String::from)
        .collect()
}

fn or_placeholder(value: &Option<String>, name: &str) -> String {
    match value {
        Some(value) => value.clone(),
        None => format!("# ({} placeholder)", name),
    }
}

fn line(buf: &mut String, parts: &[&str]) {
    buf.push_str(&parts.iter().filter(|part| !part.is_empty()).join(" "));
    buf.push('\n');
}

// Full Diamond device name, e.g. LCMXO2-1200HC-4SG32C.
pub fn diamond_device(platform: &Platform) -> String {
    format!(
        "{}-{}{}{}",
        platform.device, platform.speed, platform.package, platform.grade
    )
}

////////////////////////////////////////////////////////////////////////
// Design files.
//

pub fn rtlil_file(text: &str) -> String {
    format!("# {}\n{}\n", AUTOGENERATED, text)
}

pub fn verilog_file(text: &str) -> String {
    format!("/* {} */\n{}\n", AUTOGENERATED, text)
}

////////////////////////////////////////////////////////////////////////
// Yosys script, for Trellis.
//

pub fn yosys_script(platform: &Platform, name: &str) -> String {
    let overrides = &platform.overrides;
    let read_opts = options(&overrides.read_verilog_opts).join(" ");
    let synth_opts = options(&overrides.synth_opts).join(" ");

    let mut buf = String::new();
    buf.push_str(&format!("# {}\n", AUTOGENERATED));
    for file in platform.iter_files(&[".v"]) {
        line(&mut buf, &["read_verilog", &read_opts, file]);
    }
    for file in platform.iter_files(&[".sv"]) {
        line(&mut buf, &["read_verilog", "-sv", &read_opts, file]);
    }
    for file in platform.iter_files(&[".il"]) {
        line(&mut buf, &["read_rtlil", file]);
    }
    buf.push_str(&format!("read_rtlil {}.il\n", name));
    buf.push_str("delete w:$verilog_initial_trigger\n");
    buf.push_str(&or_placeholder(&overrides.script_after_read, "script_after_read"));
    buf.push('\n');
    line(&mut buf, &["synth_ecp5", &synth_opts, "-top", name]);
    buf.push_str(&or_placeholder(&overrides.script_after_synth, "script_after_synth"));
    buf.push('\n');
    buf.push_str(&format!("write_json {}.json\n", name));
    buf
}

////////////////////////////////////////////////////////////////////////
// Constraints.
//

// The LPF preference file. Only Trellis reads clock frequencies from
// it, Diamond takes them from the SDC file.
pub fn lpf_file(
    platform: &Platform,
    name: &str,
    ports: &[PortConstraint],
    clocks: Option<&[ClockConstraint]>,
) -> String {
    let mut buf = String::new();
    buf.push_str(&format!("# {}\n", AUTOGENERATED));
    buf.push_str("BLOCK ASYNCPATHS;\n");
    buf.push_str("BLOCK RESETPATHS;\n");
    for constraint in ports.iter() {
        buf.push_str(&format!(
            "LOCATE COMP \"{}\" SITE \"{}\";\n",
            constraint.port, constraint.pin
        ));
        if !constraint.attrs.is_empty() {
            let attrs = constraint
                .attrs
                .iter()
                .map(|(key, value)| format!(" {}={}", key, value))
                .join("");
            buf.push_str(&format!("IOBUF PORT \"{}\"{};\n", constraint.port, attrs));
        }
    }
    for clock in clocks.unwrap_or(&[]).iter() {
        match clock {
            ClockConstraint::Port { port, frequency } => {
                buf.push_str(&format!("FREQUENCY PORT \"{}\" {} HZ;\n", port, frequency));
            }
            ClockConstraint::Net { net, frequency } => {
                buf.push_str(&format!("FREQUENCY NET \"{}.{}\" {} HZ;\n", name, net, frequency));
            }
        }
    }
    buf.push_str(&or_placeholder(&platform.overrides.add_preferences, "add_preferences"));
    buf.push('\n');
    buf
}

pub fn sdc_file(platform: &Platform, name: &str, clocks: &[ClockConstraint]) -> String {
    let mut buf = String::new();
    for clock in clocks.iter() {
        match clock {
            ClockConstraint::Port { port, frequency } => {
                buf.push_str(&format!(
                    "create_clock -name {} -period {} [get_ports {}]\n",
                    tcl_escape(port),
                    1e9 / frequency,
                    tcl_escape(port)
                ));
            }
            ClockConstraint::Net { net, frequency } => {
                buf.push_str(&format!(
                    "create_clock -name {} -period {} [get_nets {}]\n",
                    tcl_escape(net),
                    1e9 / frequency,
                    tcl_escape(&format!("{}/{}", name, net))
                ));
            }
        }
    }
    buf.push_str(&or_placeholder(&platform.overrides.add_constraints, "add_constraints"));
    buf.push('\n');
    buf
}

////////////////////////////////////////////////////////////////////////
// Diamond project script.
//

pub fn tcl_script(platform: &Platform, name: &str) -> String {
    let overrides = &platform.overrides;

    let mut buf = String::new();
    buf.push_str(&format!(
        "prj_project new -name {} -impl impl -impl_dir {}_impl \\\n",
        name, name
    ));
    buf.push_str(&format!("    -dev {} \\\n", diamond_device(platform)));
    buf.push_str(&format!("    -lpf {}.lpf \\\n", name));
    buf.push_str("    -synthesis synplify\n");
    for file in platform.iter_files(&[".v", ".sv", ".vhd", ".vhdl"]) {
        buf.push_str(&format!("prj_src add {}\n", tcl_escape(file)));
    }
    buf.push_str(&format!("prj_src add {}.v\n", name));
    buf.push_str(&format!("prj_impl option top {}\n", name));
    buf.push_str(&format!("prj_src add {}.sdc\n", name));
    buf.push_str(&or_placeholder(&overrides.script_project, "script_project"));
    buf.push('\n');
    buf.push_str("prj_project save\n");
    for stage in ["Synthesis", "Translate", "Map", "PAR"].iter() {
        buf.push_str(&format!("prj_run {} -impl impl\n", stage));
    }
    buf.push_str("prj_run Export -impl impl -task Bitgen\n");
    if platform.family.is_machxo() {
        buf.push_str("prj_run Export -impl impl -task Jedecgen\n");
    }
    buf.push_str(&or_placeholder(&overrides.script_after_export, "script_after_export"));
    buf.push('\n');
    buf
}

////////////////////////////////////////////////////////////////////////
// Tool invocations.
//

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

pub fn trellis_steps(platform: &Platform, name: &str) -> Result<Vec<Step>, ErrorCode> {
    let overrides = &platform.overrides;
    let verbose = overrides.verbose;
    let quiet = |flag: &str| if verbose { Vec::new() } else { args(&[flag]) };

    let device_option = nextpnr_device_option(&platform.device)?;
    let package_option = nextpnr_package_option(&platform.package)?.to_ascii_uppercase();

    let yosys = [
        quiet("-q"),
        options(&overrides.yosys_opts),
        args(&["-l", &format!("{}.rpt", name), &format!("{}.ys", name)]),
    ];

    let nextpnr = [
        quiet("--quiet"),
        options(&overrides.nextpnr_opts),
        args(&[
            "--log",
            &format!("{}.tim", name),
            device_option,
            "--package",
            &package_option,
            "--speed",
            &platform.speed,
            "--json",
            &format!("{}.json", name),
            "--lpf",
            &format!("{}.lpf", name),
            "--textcfg",
            &format!("{}.config", name),
        ]),
    ];

    let ecppack = [
        if verbose { args(&["--verbose"]) } else { Vec::new() },
        options(&overrides.ecppack_opts),
        args(&[
            "--input",
            &format!("{}.config", name),
            "--bit",
            &format!("{}.bit", name),
            "--svf",
            &format!("{}.svf", name),
        ]),
    ];

    Ok(vec![
        Step::tool("yosys", yosys.concat()),
        Step::tool("nextpnr-ecp5", nextpnr.concat()),
        Step::tool("ecppack", ecppack.concat()),
    ])
}

pub fn diamond_steps(platform: &Platform, name: &str) -> Vec<Step> {
    let impl_bit = format!("{}_impl/{}_impl.bit", name, name);
    let impl_jed = format!("{}_impl/{}_impl.jed", name, name);

    let mut steps = vec![
        Step::tool("pnmainc", args(&[&format!("{}.tcl", name)])),
        Step::tool(
            "ddtcmd",
            args(&["-oft", "-bit", "-if", &impl_bit, "-of", &format!("{}.bit", name)]),
        ),
    ];

    if platform.family.is_machxo() {
        let flash_svf = format!("{}_flash.svf", name);
        steps.push(Step::tool(
            "ddtcmd",
            args(&[
                "-oft",
                "-jed",
                "-dev",
                &diamond_device(platform),
                "-if",
                &impl_jed,
                "-of",
                &format!("{}.jed", name),
            ]),
        ));
        steps.push(Step::tool(
            "ddtcmd",
            args(&[
                "-oft",
                "-svfsingle",
                "-revd",
                "-op",
                "FLASH Erase,Program,Verify",
                "-if",
                &impl_jed,
                "-of",
                &flash_svf,
            ]),
        ));
        steps.push(Step::Copy {
            from: flash_svf,
            to: format!("{}.svf", name),
        });
        steps.push(Step::tool(
            "ddtcmd",
            args(&[
                "-oft",
                "-svfsingle",
                "-revd",
                "-op",
                "SRAM Fast Program",
                "-if",
                &impl_bit,
                "-of",
                &format!("{}_sram.svf", name),
            ]),
        ));
    } else {
        steps.push(Step::tool(
            "ddtcmd",
            args(&[
                "-oft",
                "-svfsingle",
                "-revd",
                "-op",
                "Fast Program",
                "-if",
                &impl_bit,
                "-of",
                &format!("{}.svf", name),
            ]),
        ));
    }

    steps
}

////////////////////////////////////////////////////////////////////////
// Build scripts.
//

fn tool_defaults(buf: &mut String, tools: &[&str], syntax: Syntax) {
    for tool in tools.iter() {
        let env_var = tool_env_var(tool);
        match syntax {
            Syntax::Sh => buf.push_str(&format!(": ${{{}:={}}}\n", env_var, tool)),
            Syntax::Bat => {
                buf.push_str(&format!("if [%{}%] equ [\"\"] set {}=\n", env_var, env_var));
                buf.push_str(&format!("if [%{}%] equ [] set {}={}\n", env_var, env_var, tool));
            }
        }
    }
}

pub fn sh_script(platform: &Platform, steps: &[Step]) -> String {
    let env_var = toolchain_env_var(platform.toolchain);

    let mut buf = String::new();
    buf.push_str(&format!("# {}\n", AUTOGENERATED));
    buf.push_str(if platform.overrides.verbose { "set -ex\n" } else { "set -e\n" });
    buf.push_str("if [ -z \"$BASH\" ] ; then exec /bin/bash \"$0\" \"$@\"; fi\n");
    match platform.toolchain {
        Toolchain::Trellis => {
            buf.push_str(&format!("[ -n \"${}\" ] && . \"${}\"\n", env_var, env_var));
        }
        // Diamond's own environment script wants to know where it is.
        Toolchain::Diamond => {
            buf.push_str(&format!("if [ -n \"${}\" ]; then\n", env_var));
            buf.push_str(&format!("    bindir=$(dirname \"${}\")\n", env_var));
            buf.push_str(&format!("    . \"${}\"\n", env_var));
            buf.push_str("fi\n");
        }
    }
    tool_defaults(&mut buf, platform.required_tools(), Syntax::Sh);
    for step in steps.iter() {
        buf.push_str(&step.render(Syntax::Sh));
        buf.push('\n');
    }
    buf
}

pub fn bat_script(platform: &Platform, steps: &[Step]) -> String {
    let env_var = toolchain_env_var(platform.toolchain);

    let mut buf = String::new();
    buf.push_str(&format!("@rem {}\n", AUTOGENERATED));
    buf.push_str(&format!("if defined {} call %{}%\n", env_var, env_var));
    tool_defaults(&mut buf, platform.required_tools(), Syntax::Bat);
    for step in steps.iter() {
        buf.push_str(&format!("{} || exit /b\n", step.render(Syntax::Bat)));
    }
    buf
}
