//! Startup flags.

use argh::{EarlyExit, FromArgs};

/// Long options that consume the following argument as their value.
const OPTIONS_WITH_VALUE: [&str; 2] = ["--log-level", "--arg-max"];

#[derive(FromArgs, Debug, PartialEq)]
/// A minimal interactive shell.
pub struct Args {
    #[argh(switch, short = 'v')]
    /// print the shell version and exit.
    pub version: bool,

    #[argh(option, default = "String::from(\"warn\")")]
    /// diagnostic log filter, e.g. "debug" or "lab_shell=trace".
    pub log_level: String,

    #[argh(option)]
    /// maximum number of arguments per command line, sentinel included; defaults to the system ARG_MAX.
    pub arg_max: Option<usize>,
}

/// What `main` should do after looking at the command line.
#[derive(Debug, PartialEq)]
pub enum Startup {
    /// Print the version banner and exit successfully.
    Version,
    /// Start the shell.
    Run(Args),
    /// Print `output` (stderr on failure) and exit.
    Exit { output: String, success: bool },
}

/// Version banner printed for `-v`.
pub fn version_banner() -> String {
    format!(
        "Shell Version: {}.{}",
        env!("CARGO_PKG_VERSION_MAJOR"),
        env!("CARGO_PKG_VERSION_MINOR")
    )
}

/// Interpret the process arguments, program name included.
pub fn parse(argv: &[String]) -> Startup {
    let Some((cmd, rest)) = argv.split_first() else {
        return Startup::Run(default_args());
    };
    let rest: Vec<&str> = rest.iter().map(String::as_str).collect();

    match first_short_option(&rest) {
        Some(b'v') => return Startup::Version,
        Some(opt) => {
            return Startup::Exit {
                output: unknown_option_message(opt),
                success: false,
            };
        }
        None => {}
    }

    match Args::from_args(&[cmd.as_str()], &rest) {
        Ok(args) if args.version => Startup::Version,
        Ok(args) => Startup::Run(args),
        Err(EarlyExit { output, status }) => Startup::Exit {
            output,
            success: status.is_ok(),
        },
    }
}

fn default_args() -> Args {
    Args {
        version: false,
        log_level: String::from("warn"),
        arg_max: None,
    }
}

/// Walk the short options left to right, getopt-style, and return the first
/// option byte. `v` is the only short option and it exits right away, so the
/// first byte always decides the outcome.
fn first_short_option(args: &[&str]) -> Option<u8> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if *arg == "--" {
            break;
        }
        if OPTIONS_WITH_VALUE.contains(arg) {
            iter.next();
            continue;
        }
        if arg.starts_with("--") {
            continue;
        }
        if let Some(opts) = arg.strip_prefix('-') {
            if let Some(opt) = opts.bytes().next() {
                return Some(opt);
            }
        }
    }
    None
}

fn unknown_option_message(opt: u8) -> String {
    if opt == b' ' || opt.is_ascii_graphic() {
        format!("Unknown option '-{}'\n", char::from(opt))
    } else {
        format!("Unknown option character '\\x{opt:x}'\n")
    }
}
