//
// platform_test.rs: Platform, clock and build plan checks
//

use anyhow::Result;

use lattice_plat::config;
use lattice_plat::devices::Family;
use lattice_plat::errors::ErrorCode;
use lattice_plat::netlist::{CircuitBuilder, Module, Param};
use lattice_plat::pin::Direction;
use lattice_plat::plan::{Step, Syntax};
use lattice_plat::platform::{ClockConstraint, DefaultClock, Design, Overrides, Platform, Toolchain};
use lattice_plat::resource::{Attrs, DiffPairs, Io, Pins, Resource};
use lattice_plat::templates;

fn ecp5() -> Result<Platform> {
    Ok(Platform::new(Family::ECP5, "LFE5U-25F", "BG256", "6", None)?)
}

fn machxo2() -> Result<Platform> {
    Ok(Platform::new(Family::MachXO2, "LCMXO2-1200HC", "SG32", "4", None)?)
}

fn design() -> Design {
    Design {
        top: "module top();\nendmodule".to_string(),
        debug_verilog: None,
    }
}

fn lvds_clock() -> Result<Resource> {
    let mut attrs = Attrs::new();
    attrs.insert("IO_TYPE".to_string(), "LVDS".to_string());
    let pairs = DiffPairs::new("P3", "P4", Direction::I)?;
    Ok(Resource::new("clk", 0, Io::DiffPairs(pairs))
        .with_attrs(attrs)
        .with_clock(12e6))
}

fn file<'a>(plan: &'a lattice_plat::plan::BuildPlan, name: &str) -> &'a str {
    plan.file(name)
        .unwrap_or_else(|| panic!("no {} in {:?}", name, plan.files.keys()))
}

#[test]
fn toolchain_names() {
    assert_eq!("Trellis".parse::<Toolchain>(), Ok(Toolchain::Trellis));
    assert_eq!("Diamond".parse::<Toolchain>(), Ok(Toolchain::Diamond));
    assert_eq!(
        "trellis".parse::<Toolchain>(),
        Err(ErrorCode::UnknownToolchain {
            name: "trellis".to_string()
        })
    );
}

#[test]
fn default_toolchains() -> Result<()> {
    assert_eq!(ecp5()?.toolchain, Toolchain::Trellis);
    assert_eq!(machxo2()?.toolchain, Toolchain::Diamond);
    assert_eq!(machxo2()?.required_tools(), &["pnmainc", "ddtcmd"]);
    Ok(())
}

#[test]
fn machxo_has_no_trellis() {
    let err = Platform::new(Family::MachXO3L, "LCMXO3L-6900C", "BG256", "5", Some(Toolchain::Trellis))
        .expect_err("Trellis doesn't do MachXO");
    assert!(matches!(err.code, ErrorCode::UnsupportedToolchain { .. }));
}

#[test]
fn trellis_needs_known_device() {
    let err = Platform::new(Family::ECP5, "LFE5U-99F", "BG256", "6", None).expect_err("unknown device");
    assert_eq!(
        err.code,
        ErrorCode::UnknownDevice {
            device: "LFE5U-99F".to_string()
        }
    );
    // Diamond has no such table.
    assert!(Platform::new(Family::ECP5, "LFE5U-99F", "BG256", "6", Some(Toolchain::Diamond)).is_ok());
}

#[test]
fn env_var_names() {
    assert_eq!(templates::tool_env_var("nextpnr-ecp5"), "NEXTPNR_ECP5");
    assert_eq!(templates::tool_env_var("g++"), "GXX");
    assert_eq!(templates::toolchain_env_var(Toolchain::Diamond), "LATTICE_PLAT_ENV_DIAMOND");
}

#[test]
fn tcl_quoting() {
    assert_eq!(templates::tcl_escape("top/clk"), "{top/clk}");
    assert_eq!(templates::tcl_escape("a{b}"), "{a\\{b\\}}");
}

#[test]
fn script_quoting() {
    let step = Step::tool("yosys", vec![
        "-p".to_string(),
        "read $HOME/`id`.v".to_string(),
        "it's".to_string(),
        "plain-arg_1.v".to_string(),
        String::new(),
    ]);
    assert_eq!(
        step.render(Syntax::Sh),
        "\"$YOSYS\" -p 'read $HOME/`id`.v' 'it'\\''s' plain-arg_1.v ''"
    );
    assert_eq!(
        step.render(Syntax::Bat),
        "%YOSYS% -p \"read $HOME/`id`.v\" \"it's\" plain-arg_1.v \"\""
    );

    let copy = Step::Copy {
        from: "my build/top.svf".to_string(),
        to: "$out.svf".to_string(),
    };
    assert_eq!(copy.render(Syntax::Sh), "cp 'my build/top.svf' '$out.svf'");
    assert_eq!(copy.render(Syntax::Bat), "copy \"my build/top.svf\" \"$out.svf\"");
}

#[test]
fn requests() -> Result<()> {
    let mut platform = ecp5()?;
    platform.add_resources(vec![lvds_clock()?])?;

    let err = platform.request("led", 0).expect_err("no leds");
    assert!(matches!(err.code, ErrorCode::UnknownResource { .. }));

    assert_eq!(platform.request("clk", 0)?.full_name(), "clk_0");
    let err = platform.request("clk", 0).expect_err("requested twice");
    assert_eq!(err.to_string(), "clk_0: resource 'clk_0' has already been requested");

    let err = platform.add_resources(vec![lvds_clock()?]).expect_err("duplicate");
    assert!(matches!(err.code, ErrorCode::DuplicateResource { .. }));
    Ok(())
}

#[test]
fn trellis_plan() -> Result<()> {
    let mut platform = ecp5()?;
    platform.add_resources(vec![lvds_clock()?])?;
    platform.request("clk", 0)?;

    let plan = platform.prepare("top", &design())?;
    assert_eq!(
        plan.files.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["build_top.sh", "build_top.bat", "top.il", "top.ys", "top.lpf"]
    );

    let tools = plan
        .steps
        .iter()
        .map(|step| match step {
            Step::Tool { tool, .. } => tool.as_str(),
            Step::Copy { .. } => "copy",
        })
        .collect::<Vec<_>>();
    assert_eq!(tools, vec!["yosys", "nextpnr-ecp5", "ecppack"]);

    let nextpnr = plan.steps[1].render(Syntax::Sh);
    assert!(nextpnr.starts_with("\"$NEXTPNR_ECP5\" --quiet --log top.tim --25k"));
    assert!(nextpnr.contains("--package CABGA256 --speed 6"));
    assert!(nextpnr.contains("--lpf top.lpf"));

    let il = file(&plan, "top.il");
    assert!(il.starts_with("# Automatically generated"));
    assert!(il.contains("module top();"));
    Ok(())
}

#[test]
fn lpf_skips_implied_leg() -> Result<()> {
    let mut platform = ecp5()?;
    platform.add_resources(vec![lvds_clock()?])?;
    platform.request("clk", 0)?;

    let plan = platform.prepare("top", &design())?;
    let lpf = file(&plan, "top.lpf");
    assert!(lpf.contains("LOCATE COMP \"clk_0__p\" SITE \"P3\";\n"));
    assert!(lpf.contains("IOBUF PORT \"clk_0__p\" IO_TYPE=LVDS;\n"));
    assert!(!lpf.contains("clk_0__n"));
    assert!(lpf.contains("FREQUENCY PORT \"clk_0__p\" 12000000 HZ;\n"));
    assert!(lpf.contains("# (add_preferences placeholder)"));
    Ok(())
}

#[test]
fn unrequested_resources_are_unconstrained() -> Result<()> {
    let mut platform = ecp5()?;
    platform.add_resources(vec![lvds_clock()?])?;
    assert!(platform.iter_port_constraints_bits()?.is_empty());
    assert!(platform.iter_clock_constraints()?.is_empty());
    Ok(())
}

#[test]
fn trellis_scripts() -> Result<()> {
    let plan = ecp5()?.prepare("top", &design())?;

    let sh = file(&plan, "build_top.sh");
    assert!(sh.contains("set -e\n"));
    assert!(sh.contains("[ -n \"$LATTICE_PLAT_ENV_TRELLIS\" ] && . \"$LATTICE_PLAT_ENV_TRELLIS\"\n"));
    assert!(sh.contains(": ${NEXTPNR_ECP5:=nextpnr-ecp5}\n"));
    assert!(sh.contains("\"$YOSYS\" -q -l top.rpt top.ys\n"));

    let bat = file(&plan, "build_top.bat");
    assert!(bat.contains("if defined LATTICE_PLAT_ENV_TRELLIS call %LATTICE_PLAT_ENV_TRELLIS%\n"));
    assert!(bat.contains("if [%ECPPACK%] equ [] set ECPPACK=ecppack\n"));
    assert!(bat.contains("%YOSYS% -q -l top.rpt top.ys || exit /b\n"));
    Ok(())
}

#[test]
fn overrides_reach_the_scripts() -> Result<()> {
    let mut platform = ecp5()?.with_overrides(Overrides {
        verbose: true,
        read_verilog_opts: Some("-D FOO".to_string()),
        nextpnr_opts: Some("--timing-allow-fail --seed 3".to_string()),
        script_after_synth: Some("stat".to_string()),
        ..Default::default()
    });
    platform.add_file("extra.v", "module extra();\nendmodule".to_string())?;
    platform.add_file("notes.txt", "notes".to_string())?;

    let plan = platform.prepare("top", &design())?;
    assert!(plan.file("extra.v").is_some());
    assert!(plan.file("notes.txt").is_some());

    let ys = file(&plan, "top.ys");
    assert!(ys.contains("read_verilog -D FOO extra.v\n"));
    assert!(!ys.contains("notes.txt"));
    assert!(ys.contains("synth_ecp5 -top top\nstat\n"));
    assert!(ys.contains("# (script_after_read placeholder)"));

    let sh = file(&plan, "build_top.sh");
    assert!(sh.contains("set -ex\n"));
    assert!(sh.contains("\"$YOSYS\" -l top.rpt top.ys\n"));
    assert!(sh.contains("\"$NEXTPNR_ECP5\" --timing-allow-fail --seed 3 --log"));
    assert!(sh.contains("\"$ECPPACK\" --verbose --input top.config"));

    let err = platform
        .add_file("extra.v", String::new())
        .expect_err("added twice");
    assert_eq!(
        err.code,
        ErrorCode::DuplicateFile {
            name: "extra.v".to_string()
        }
    );
    Ok(())
}

#[test]
fn diamond_machxo_plan() -> Result<()> {
    let platform = machxo2()?.with_default_clock(DefaultClock::Osch { frequency_mhz: 2.08 })?;
    let plan = platform.prepare("top", &Design {
        debug_verilog: Some("// debug".to_string()),
        ..design()
    })?;
    assert_eq!(
        plan.files.keys().map(String::as_str).collect::<Vec<_>>(),
        vec![
            "build_top.sh",
            "build_top.bat",
            "top.v",
            "top.debug.v",
            "top.tcl",
            "top.lpf",
            "top.sdc",
        ]
    );

    let tcl = file(&plan, "top.tcl");
    assert!(tcl.contains("    -dev LCMXO2-1200HC-4SG32C \\\n"));
    assert!(tcl.contains("prj_run Export -impl impl -task Jedecgen\n"));
    assert!(tcl.contains("# (script_project placeholder)"));

    let sh = file(&plan, "build_top.sh");
    assert!(sh.contains("if [ -n \"$LATTICE_PLAT_ENV_DIAMOND\" ]; then\n"));
    assert!(sh.contains(": ${PNMAINC:=pnmainc}\n"));
    assert!(sh.contains("\"$PNMAINC\" top.tcl\n"));
    assert!(sh.contains("-op 'FLASH Erase,Program,Verify'"));
    assert!(sh.contains("cp top_flash.svf top.svf\n"));

    let bat = file(&plan, "build_top.bat");
    assert!(bat.contains("copy top_flash.svf top.svf || exit /b\n"));

    // Diamond takes clocks from the SDC file only.
    assert!(!file(&plan, "top.lpf").contains("FREQUENCY"));
    let sdc = file(&plan, "top.sdc");
    assert!(sdc.contains("create_clock -name {clk} -period 480.769"));
    assert!(sdc.contains("[get_nets {top/clk}]"));
    assert!(sdc.contains("# (add_constraints placeholder)"));
    Ok(())
}

#[test]
fn diamond_ecp5_steps() -> Result<()> {
    let platform = Platform::new(Family::ECP5, "LFE5U-45F", "BG381", "8", Some(Toolchain::Diamond))?
        .with_grade("I");
    let plan = platform.prepare("top", &design())?;

    assert!(plan.steps.iter().all(|step| matches!(step, Step::Tool { .. })));
    assert_eq!(plan.steps.len(), 3);
    let svf = plan.steps[2].render(Syntax::Sh);
    assert!(svf.ends_with("-op 'Fast Program' -if top_impl/top_impl.bit -of top.svf"));
    let svf = plan.steps[2].render(Syntax::Bat);
    assert!(svf.ends_with("-op \"Fast Program\" -if top_impl/top_impl.bit -of top.svf"));

    let tcl = file(&plan, "top.tcl");
    assert!(tcl.contains("-dev LFE5U-45F-8BG381I"));
    assert!(!tcl.contains("Jedecgen"));
    Ok(())
}

#[test]
fn osch_clock() -> Result<()> {
    let platform = machxo2()?.with_default_clock(DefaultClock::Osch { frequency_mhz: 2.08 })?;
    assert_eq!(platform.default_clk_constraint()?, Some(2_080_000.0));
    assert_eq!(
        platform.iter_clock_constraints()?,
        vec![ClockConstraint::Net {
            net: "clk".to_string(),
            frequency: 2_080_000.0,
        }]
    );

    let mut m = Module::new();
    let clk = platform.create_sync_domain(&mut m, None, None)?.expect("clock net");
    assert_eq!(m.signal_name(clk), "clk");
    let osch = m.instances_of("OSCH").next().expect("OSCH instance");
    assert_eq!(osch.get_param("NOM_FREQ"), Some(&Param::Str("2.08".to_string())));
    assert_eq!(m.instances_of("FD1S3AX").count(), 2);
    assert_eq!(m.instances_of("SGSR").count(), 1);
    Ok(())
}

#[test]
fn osch_frequency_must_be_listed() -> Result<()> {
    let platform = machxo2()?.with_default_clock(DefaultClock::Osch { frequency_mhz: 3.0 })?;
    let err = platform.default_clk_constraint().expect_err("not an OSCH frequency");
    assert_eq!(err.code, ErrorCode::InvalidOschFrequency { frequency: 3.0 });

    let mut m = Module::new();
    assert!(platform.create_sync_domain(&mut m, None, None).is_err());
    Ok(())
}

// A frequency that only rounds to a table entry is still rejected, so
// NOM_FREQ and the clock constraint can't disagree.
#[test]
fn osch_frequency_must_match_exactly() -> Result<()> {
    let platform = machxo2()?.with_default_clock(DefaultClock::Osch { frequency_mhz: 2.084 })?;
    let err = platform.default_clk_constraint().expect_err("rounds to 2.08");
    assert_eq!(err.code, ErrorCode::InvalidOschFrequency { frequency: 2.084 });

    let mut m = Module::new();
    let err = platform
        .create_sync_domain(&mut m, None, None)
        .expect_err("rounds to 2.08");
    assert_eq!(err.code, ErrorCode::InvalidOschFrequency { frequency: 2.084 });
    assert!(m.instances.is_empty());
    Ok(())
}

#[test]
fn oscillators_per_family() -> Result<()> {
    let err = ecp5()?
        .with_default_clock(DefaultClock::Osch { frequency_mhz: 2.08 })
        .expect_err("no OSCH on ECP5");
    assert!(matches!(err.code, ErrorCode::UnsupportedOscillator { oscillator: "OSCH", .. }));

    let err = machxo2()?
        .with_default_clock(DefaultClock::Oscg { div: 2 })
        .expect_err("no OSCG on MachXO2");
    assert!(matches!(err.code, ErrorCode::UnsupportedOscillator { oscillator: "OSCG", .. }));
    Ok(())
}

#[test]
fn oscg_clock() -> Result<()> {
    let platform = ecp5()?.with_default_clock(DefaultClock::Oscg { div: 2 })?;
    assert_eq!(platform.default_clk_constraint()?, Some(155e6));

    let mut m = Module::new();
    platform.create_sync_domain(&mut m, None, None)?;
    let oscg = m.instances_of("OSCG").next().expect("OSCG instance");
    assert_eq!(oscg.get_param("DIV"), Some(&Param::Int(2)));

    let too_slow = ecp5()?.with_default_clock(DefaultClock::Oscg { div: 129 })?;
    assert_eq!(
        too_slow.default_clk_constraint().map_err(|e| e.code),
        Err(ErrorCode::InvalidOscgDivider { div: 129 })
    );
    Ok(())
}

#[test]
fn pad_clock_sync_domain() -> Result<()> {
    let mut platform = ecp5()?.with_default_clock(DefaultClock::Resource("clk".to_string()))?;
    platform.add_resources(vec![lvds_clock()?])?;
    assert_eq!(platform.default_clk_constraint()?, Some(12e6));
    // Pad clocks are constrained on their port, not the net.
    assert!(platform.iter_clock_constraints()?.is_empty());

    let mut m = Module::new();
    let err = platform
        .create_sync_domain(&mut m, None, None)
        .expect_err("no pad signal");
    assert_eq!(
        err.code,
        ErrorCode::MissingClock {
            name: "clk".to_string()
        }
    );

    let mut m = Module::new();
    let pad = m.add_signal("clk_pad", 1);
    let rst = m.add_signal("rst_pad", 1);
    let clk = platform
        .create_sync_domain(&mut m, Some(pad), Some(rst))?
        .expect("clock net");
    assert_eq!(m.fmt_expr(m.driver(clk).expect("driven")), "clk_pad");
    let first = m.instances_of("FD1S3AX").next().expect("reset flop");
    assert_eq!(m.fmt_expr(first.port("D").expect("D")), "~rst_pad");
    assert_eq!(first.get_param("GSR"), Some(&Param::Str("DISABLED".to_string())));
    Ok(())
}

#[test]
fn no_default_clock() -> Result<()> {
    let platform = ecp5()?;
    let mut m = Module::new();
    assert_eq!(platform.create_sync_domain(&mut m, None, None)?, None);
    assert!(m.instances.is_empty());
    Ok(())
}

const BOARD: &str = r#"
[platform]
family = "ECP5"
device = "LFE5U-25F"
package = "BG256"
speed = "6"
default_clk = "clk"

[overrides]
nextpnr_opts = "--timing-allow-fail"

[files]
"pll.sv" = "module pll(); endmodule"

[[connector]]
name = "pmod"
pins = "A1 A2 - A4"

[[resource]]
kind = "diff_pairs"
name = "clk"
p = "P3"
n = "P4"
dir = "i"
clock = 100e6
attrs = { IO_TYPE = "LVDS" }

[[resource]]
kind = "uart"
rx = "1"
tx = "2"
conn = ["pmod", 0]

[[resource]]
kind = "pins"
name = "led"
number = 1
pins = "B1 B2"
dir = "o"
"#;

#[test]
fn board_file() -> Result<()> {
    let mut platform = config::from_str(BOARD)?.into_platform()?;
    assert_eq!(platform.toolchain, Toolchain::Trellis);
    assert_eq!(platform.overrides.nextpnr_opts.as_deref(), Some("--timing-allow-fail"));
    assert_eq!(platform.default_clock(), Some(&DefaultClock::Resource("clk".to_string())));
    assert_eq!(platform.default_clk_constraint()?, Some(100e6));

    assert_eq!(platform.iter_files(&[".sv"]).collect::<Vec<_>>(), vec!["pll.sv"]);

    let names = platform.resources().map(Resource::full_name).collect::<Vec<_>>();
    assert_eq!(names, vec!["clk_0", "uart_0", "led_1"]);

    match &platform.lookup("led", 1)?.io {
        Io::Pins(pins) => assert_eq!(*pins, Pins::new("B1 B2", Direction::O)?),
        other => panic!("led is {:?}", other),
    }

    platform.request("uart", 0)?;
    let bits = platform.iter_port_constraints_bits()?;
    let ports = bits
        .iter()
        .map(|c| (c.port.as_str(), c.pin.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(ports, vec![("uart_0__rx__io", "A1"), ("uart_0__tx__io", "A2")]);
    Ok(())
}

#[test]
fn board_file_errors() -> Result<()> {
    let no_name = BOARD.replace("name = \"led\"\n", "");
    let err = config::from_str(&no_name)?
        .into_platform()
        .expect_err("plain pins need a name");
    assert_eq!(err.code, ErrorCode::MissingName { kind: "pins" });

    let bad_kind = BOARD.replace("kind = \"uart\"", "kind = \"can\"");
    assert!(config::from_str(&bad_kind).is_err());

    let osch_on_ecp5 = BOARD.replace(
        "default_clk = \"clk\"",
        "default_clk = \"OSCH\"\nosch_frequency = 2.08",
    );
    let err = config::from_str(&osch_on_ecp5)?
        .into_platform()
        .expect_err("ECP5 has no OSCH");
    assert!(matches!(err.code, ErrorCode::UnsupportedOscillator { .. }));

    let no_div = BOARD.replace("default_clk = \"clk\"", "default_clk = \"OSCG\"");
    let err = config::from_str(&no_div)?
        .into_platform()
        .expect_err("OSCG needs a divider");
    assert_eq!(
        err.code,
        ErrorCode::MissingOscillatorSetting {
            oscillator: "OSCG",
            setting: "oscg_div",
        }
    );
    Ok(())
}
