//
// regression_test.rs: Check that tool output is as expected.
//
// These run the built lattice-plat binary end to end: argument
// parsing, board loading, plan generation and the files it leaves
// behind. Boards and designs come from 'testcases', and each build
// gets its own temporary output directory.
//

use std::fs;
use std::path::Path;
use std::process::Output;

use anyhow::Result;
use tempfile::TempDir;
use test_bin::get_test_bin;

fn check_invocation_succeeded(name: &str, res: &Output) {
    assert!(
        res.status.success(),
        "'{}' did not succeed: {}",
        name,
        String::from_utf8_lossy(&res.stderr)
    );
}

fn check_invocation_failed(name: &str, res: &Output) -> String {
    assert!(!res.status.success(), "'{}' unexpectedly succeeded", name);
    String::from_utf8_lossy(&res.stderr).into_owned()
}

fn read(dir: &Path, name: &str) -> Result<String> {
    Ok(fs::read_to_string(dir.join(name))?)
}

fn build(board: &str, design: &str, extra: &[&str], out: &Path) -> Result<Output> {
    Ok(get_test_bin("lattice-plat")
        .arg("build")
        .arg(board)
        .args(["--name", "top", "--design", design])
        .args(extra)
        .arg("-o")
        .arg(out)
        .output()?)
}

#[test]
fn test_ecp5_build() -> Result<()> {
    let out = TempDir::new()?;
    let res = build(
        "testcases/ecp5_board.toml",
        "testcases/top.il",
        &["--add-file", "testcases/extra/*.v"],
        out.path(),
    )?;
    check_invocation_succeeded("ecp5 build", &res);
    let stdout = String::from_utf8_lossy(&res.stdout);
    assert!(stdout.contains("run build_top.sh to build"), "stdout: {}", stdout);

    let mut names = fs::read_dir(out.path())?
        .map(|entry| Ok(entry?.file_name().to_string_lossy().into_owned()))
        .collect::<Result<Vec<_>>>()?;
    names.sort();
    assert_eq!(
        names,
        vec!["blink.v", "build_top.bat", "build_top.sh", "top.il", "top.lpf", "top.ys"]
    );

    let lpf = read(out.path(), "top.lpf")?;
    assert!(lpf.contains("LOCATE COMP \"clk_0__p\" SITE \"P3\";"));
    assert!(!lpf.contains("clk_0__n"));
    assert!(lpf.contains("IOBUF PORT \"rst_0__io\" IO_TYPE=LVCMOS33 PULLMODE=UP;"));
    assert!(lpf.contains("LOCATE COMP \"uart_0__tx__io\" SITE \"T2\";"));
    assert!(lpf.contains("LOCATE COMP \"led_0__io[3]\" SITE \"D5\";"));
    assert!(lpf.contains("LOCATE COMP \"spi_flash_0__cs__io\" SITE \"R2\";"));
    assert!(lpf.contains("FREQUENCY PORT \"clk_0__p\" 100000000 HZ;"));

    let ys = read(out.path(), "top.ys")?;
    assert!(ys.contains("read_verilog blink.v\n"));
    assert!(ys.contains("read_rtlil top.il\n"));

    let sh = read(out.path(), "build_top.sh")?;
    assert!(sh.contains("\"$NEXTPNR_ECP5\" --quiet --timing-allow-fail --log top.tim --25k"));

    let il = read(out.path(), "top.il")?;
    assert!(il.contains("module \\top"));
    Ok(())
}

#[test]
fn test_machxo2_build() -> Result<()> {
    let out = TempDir::new()?;
    let res = build(
        "testcases/machxo2_board.toml",
        "testcases/top.v",
        &["--debug-verilog", "testcases/top.v"],
        out.path(),
    )?;
    check_invocation_succeeded("machxo2 build", &res);

    for name in ["top.v", "top.debug.v", "top.tcl", "top.lpf", "top.sdc", "build_top.sh", "build_top.bat"].iter() {
        assert!(out.path().join(name).exists(), "{} not written", name);
    }

    let tcl = read(out.path(), "top.tcl")?;
    assert!(tcl.contains("-dev LCMXO2-7000HE-5TG144C"));

    let sdc = read(out.path(), "top.sdc")?;
    assert!(sdc.contains("[get_nets {top/clk}]"));

    let lpf = read(out.path(), "top.lpf")?;
    assert!(lpf.contains("LOCATE COMP \"i2c_0__sda__io\" SITE \"58\";"));
    assert!(!lpf.contains("FREQUENCY"));

    let bat = read(out.path(), "build_top.bat")?;
    assert!(bat.contains("copy top_flash.svf top.svf || exit /b"));
    Ok(())
}

#[test]
fn test_missing_board() -> Result<()> {
    let out = TempDir::new()?;
    let res = build("testcases/no_such_board.toml", "testcases/top.il", &[], out.path())?;
    let stderr = check_invocation_failed("missing board", &res);
    assert!(stderr.contains("no_such_board.toml"), "stderr: {}", stderr);
    Ok(())
}

#[test]
fn test_bad_board() -> Result<()> {
    let dir = TempDir::new()?;
    let board = dir.path().join("board.toml");
    let text = fs::read_to_string("testcases/machxo2_board.toml")?
        .replace("osch_frequency = 12.09", "osch_frequency = 12.5");
    fs::write(&board, text)?;

    let res = get_test_bin("lattice-plat")
        .arg("build")
        .arg(&board)
        .args(["--name", "top", "--design", "testcases/top.v", "-o"])
        .arg(dir.path().join("out"))
        .output()?;
    let stderr = check_invocation_failed("bad board", &res);
    assert!(stderr.contains("board.toml"), "stderr: {}", stderr);
    assert!(stderr.contains("12.5"), "stderr: {}", stderr);
    assert!(!dir.path().join("out").exists());
    Ok(())
}

#[test]
fn test_iobuf_dump() -> Result<()> {
    let res = get_test_bin("lattice-plat")
        .args(["iobuf", "--family", "ECP5", "--dir", "o", "--width", "2", "--xdr", "2"])
        .output()?;
    check_invocation_succeeded("iobuf", &res);
    let stdout = String::from_utf8_lossy(&res.stdout);
    assert_eq!(stdout.matches("ODDRX1F").count(), 2, "stdout: {}", stdout);
    assert!(stdout.contains("OB pin_1 "), "stdout: {}", stdout);
    Ok(())
}

#[test]
fn test_iobuf_bad_gear() -> Result<()> {
    let res = get_test_bin("lattice-plat")
        .args(["iobuf", "--family", "MachXO2", "--dir", "i", "--xdr", "4"])
        .output()?;
    let stderr = check_invocation_failed("iobuf gear 4", &res);
    assert!(stderr.contains("invalid gearing 4"), "stderr: {}", stderr);
    Ok(())
}

#[test]
fn test_iobuf_huge_gear() -> Result<()> {
    let res = get_test_bin("lattice-plat")
        .args(["iobuf", "--family", "ECP5", "--xdr", "4000000000"])
        .output()?;
    let stderr = check_invocation_failed("iobuf gear 4000000000", &res);
    assert!(stderr.contains("invalid gearing 4000000000"), "stderr: {}", stderr);
    Ok(())
}
