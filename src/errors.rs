//
// errors.rs: Error codes
//
// Every configuration failure the platform layer can report has an
// error code here. Codes are combined with a context string (the pin,
// resource or platform the failure concerns) into an Error, and
// file-level problems are wrapped up in a FileError.
//

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
#[error("{}: {}", context, code)]
pub struct Error {
    pub code: ErrorCode,
    pub context: String,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ErrorCode {
    #[error("{what} '{name}' has already been requested")]
    AlreadyRequested { what: &'static str, name: String },
    #[error("differential pair has {p} positive and {n} negative pins")]
    DiffPairMismatch { p: usize, n: usize },
    #[error("resource '{name}' is defined more than once")]
    DuplicateResource { name: String },
    #[error("file '{name}' has already been added")]
    DuplicateFile { name: String },
    #[error("pin list is empty")]
    EmptyPins,
    #[error("exactly one of 'en' (active-high enable) or 'sd' (shutdown) must be given")]
    ExclusiveEnable,
    #[error("internal error: {0}")]
    Internal(&'static str),
    #[error("OSCG divider must be an integer between 2 and 128, not {div}")]
    InvalidOscgDivider { div: u32 },
    #[error("frequency {frequency} MHz is not valid for the OSCH clock")]
    InvalidOschFrequency { frequency: f64 },
    #[error("default clock '{name}' is an external pin but no pad signal was supplied")]
    MissingClock { name: String },
    #[error("default clock {oscillator} needs '{setting}' to be set")]
    MissingOscillatorSetting {
        oscillator: &'static str,
        setting: &'static str,
    },
    #[error("{kind} resources need a name")]
    MissingName { kind: &'static str },
    #[error("at least one of 'copi' or 'cipo' must be given")]
    MissingDataLine,
    #[error("a role ('dce' or 'dte') is required when flow control lines are used")]
    MissingRole,
    #[error("'-' is not a valid pin name here")]
    NotConnectedPin,
    #[error("port is {port_width} bits wide, pin is {pin_width} bits wide")]
    PortWidthMismatch { pin_width: usize, port_width: usize },
    #[error("invalid clock direction '{name}', must be 'i' or 'o'")]
    UnknownClockDirection { name: String },
    #[error("connector pin '{pin}' is not defined")]
    UnknownConnectorPin { pin: String },
    #[error("unknown device '{device}'")]
    UnknownDevice { device: String },
    #[error("invalid direction '{name}', must be one of 'i', 'o', 'oe' or 'io'")]
    UnknownDirection { name: String },
    #[error("unknown device family '{name}'")]
    UnknownFamily { name: String },
    #[error("unknown package '{package}'")]
    UnknownPackage { package: String },
    #[error("resource '{name}' is not defined")]
    UnknownResource { name: String },
    #[error("role is expected to be {expected}, not '{name}'")]
    UnknownRole { name: String, expected: &'static str },
    #[error("unknown toolchain '{name}', must be either 'Trellis' or 'Diamond'")]
    UnknownToolchain { name: String },
    #[error("invalid gearing {xdr} for pin {pin}, must be one of {supported}")]
    UnsupportedGear {
        pin: String,
        xdr: u32,
        supported: String,
    },
    #[error("{oscillator} oscillator is not available on {family}")]
    UnsupportedOscillator {
        oscillator: &'static str,
        family: &'static str,
    },
    #[error("toolchain {toolchain} does not support {family}")]
    UnsupportedToolchain {
        toolchain: &'static str,
        family: &'static str,
    },
    #[error("expected {expected} pins, found {actual} in '{pins}'")]
    WidthMismatch {
        expected: usize,
        actual: usize,
        pins: String,
    },
    #[error("{feature} can't be used with pin {pin} of direction '{dir}'")]
    WrongDirection {
        feature: &'static str,
        pin: String,
        dir: &'static str,
    },
    #[error("{feature} can't be used with a {kind} port")]
    WrongPortKind {
        feature: &'static str,
        kind: &'static str,
    },
}

// Adapt an ErrorCode to an Error.
pub fn in_context<Val>(context: &str, res: Result<Val, ErrorCode>) -> Result<Val, Error> {
    res.map_err(|code| Error {
        code,
        context: context.to_string(),
    })
}

#[derive(Debug, Error)]
#[error("Error in {}: {}", file.display(), err)]
pub struct FileError {
    pub file: PathBuf,
    pub err: FileErrorKind,
}

#[derive(Debug, Error)]
pub enum FileErrorKind {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("malformed board description: {0}")]
    Board(#[from] toml::de::Error),
    #[error(transparent)]
    Platform(#[from] Error),
    #[error("bad file pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}
