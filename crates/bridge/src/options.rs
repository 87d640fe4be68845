//! Command-line option resolution
//!
//! Flags are matched by a long or short keyword after stripping up to two
//! `-` or `/` prefix characters. A value follows `=` or `:`; a bare flag
//! carries the empty string. The scan runs left to right and the last
//! occurrence of a flag wins. Unknown arguments are ignored.

use std::fmt;

/// Stream name used when none is given
pub const DEFAULT_STREAM_NAME: &str = "WS-default";

/// Device verbosity used when none is given
pub const DEFAULT_VERBOSITY: i32 = 2;

/// Long and short keyword of one flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    pub long: &'static str,
    pub short: Option<&'static str>,
}

impl OptionSpec {
    const fn new(long: &'static str, short: &'static str) -> Self {
        Self {
            long,
            short: Some(short),
        }
    }

    const fn long_only(long: &'static str) -> Self {
        Self { long, short: None }
    }
}

pub const HELP: OptionSpec = OptionSpec::new("help", "h");
pub const PORT: OptionSpec = OptionSpec::new("port", "p");
pub const MONTAGE: OptionSpec = OptionSpec::new("montage", "m");
pub const REFERENCE: OptionSpec = OptionSpec::new("reference", "r");
pub const VERBOSITY: OptionSpec = OptionSpec::new("verbosity", "v");
pub const STREAM_NAME: OptionSpec = OptionSpec::new("lsl-stream-name", "n");
pub const LOG_LEVEL: OptionSpec = OptionSpec::new("log-level", "l");
pub const CONFIG: OptionSpec = OptionSpec::new("config", "c");
pub const DSI_LIBRARY: OptionSpec = OptionSpec::new("dsi-library", "d");
pub const SAVE_CONFIG: OptionSpec = OptionSpec::long_only("save-config");

/// Options given on the command line
///
/// `None` means the flag was absent; `Some("")` means it was given bare or
/// with an empty value. Nothing is resolved further here: in particular an
/// absent or empty port is left for the device layer to resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    pub help: bool,
    pub port: Option<String>,
    pub montage: Option<String>,
    pub reference: Option<String>,
    pub verbosity: Option<i32>,
    pub stream_name: Option<String>,
    pub log_level: Option<String>,
    pub config_path: Option<String>,
    pub library_path: Option<String>,
    pub save_config: bool,
}

/// A flag value that could not be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    pub option: &'static str,
    pub value: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "could not interpret \"{}\" as a valid integer value for the \"{}\" option - reverting to default value",
            self.value, self.option
        )
    }
}

/// Outcome of resolving the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub options: Options,
    pub warnings: Vec<ParseWarning>,
}

impl Options {
    /// Resolve options from the arguments following the program name
    pub fn resolve<S: AsRef<str>>(args: &[S]) -> Resolution {
        let mut warnings = Vec::new();

        let options = Options {
            help: find(args, HELP).is_some(),
            port: find(args, PORT).map(str::to_string),
            montage: find(args, MONTAGE).map(str::to_string),
            reference: find(args, REFERENCE).map(str::to_string),
            verbosity: find_integer(args, VERBOSITY, &mut warnings),
            stream_name: find(args, STREAM_NAME).map(str::to_string),
            log_level: find(args, LOG_LEVEL).map(str::to_string),
            config_path: find(args, CONFIG).map(str::to_string),
            library_path: find(args, DSI_LIBRARY).map(str::to_string),
            save_config: find(args, SAVE_CONFIG).is_some(),
        };

        Resolution { options, warnings }
    }
}

/// Strip up to two leading `-` or `/` characters
fn strip_prefix(arg: &str) -> &str {
    let mut rest = arg;
    for _ in 0..2 {
        rest = rest.strip_prefix(['-', '/']).unwrap_or(rest);
    }
    rest
}

/// Value of `keyword` in `arg`, if `arg` names it
fn match_keyword<'a>(arg: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = arg.strip_prefix(keyword)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix(['=', ':'])
    }
}

/// Last value given for `spec`, scanning left to right
pub fn find<S: AsRef<str>>(args: &[S], spec: OptionSpec) -> Option<&str> {
    let mut result = None;
    for arg in args {
        let arg = strip_prefix(arg.as_ref());
        for keyword in std::iter::once(spec.long).chain(spec.short) {
            if let Some(value) = match_keyword(arg, keyword) {
                result = Some(value);
            }
        }
    }
    result
}

/// Integer value of `spec`; malformed values are reported and dropped
fn find_integer<S: AsRef<str>>(
    args: &[S],
    spec: OptionSpec,
    warnings: &mut Vec<ParseWarning>,
) -> Option<i32> {
    let value = find(args, spec)?;
    if value.is_empty() {
        return None;
    }
    match value.trim_start().parse::<i32>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warnings.push(ParseWarning {
                option: spec.long,
                value: value.to_string(),
            });
            None
        }
    }
}
