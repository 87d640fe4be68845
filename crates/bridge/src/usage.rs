//! Usage text for `--help`

const OPTIONS_HELP: &str = r#"With the exception of --help and --save-config,
the options should be given in --NAME=VALUE format. The forms -NAME=VALUE
and /NAME:VALUE are accepted too, as is the short name of each option.

  --help, -h
       Displays this help text.

  --port, -p
       Specifies the serial port address (e.g. --port=COM4 on Windows,
       --port=/dev/cu.DSI24-023-BluetoothSeri on OSX, or --port=/dev/rfcomm0 on Linux) on which to connect.
       Note: if you omit this option, or use an empty string or the string
       "default", then the API will look for an environment variable called
       DSISerialPort and use the content of that, if available.

  --montage, -m
       A list of channel specifications, comma-separated without spaces,
       (can also be space-delimited, but then you would need to enclose the
       option in quotes on the command-line).

  --reference, -r
       The name of sensor (or linear combination of sensors, without spaces)
       to be used as reference. Defaults to a "traditional" averaged-ears or
       averaged-mastoids reference if available, or the factory reference
       (typically Pz) if these sensors are not available.

  --verbosity, -v
       The higher the number, the more messages the headset will send to the
       console (and the more low-level they will tend to be). Defaults to 2.

  --lsl-stream-name, -n
       The name of the LSL outlet that will be created to stream the samples
       received from the device. If omitted, the stream will be given the name WS-default.

  --log-level, -l
       Log level (trace, debug, info, warn, error). RUST_LOG overrides it.

  --config, -c
       Path to a TOML configuration file. Defaults to
       ~/.config/dsi2lsl/config.toml when that file exists.

  --dsi-library, -d
       Path to the libDSI shared library. Defaults to the platform library
       name, looked up on the system library path.

  --save-config
       Writes the default configuration file and exits.
"#;

/// Full usage text for `program`
pub fn usage(program: &str) -> String {
    format!("Usage: {} [ --OPTIONS... ]\n\n{}", program, OPTIONS_HELP)
}

/// Print usage text to stderr
pub fn print_usage(program: &str) {
    eprint!("{}", usage(program));
}
