use std::ffi::OsString;

use clap::builder::OsStringValueParser;
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::PROGRAM_NAME;

/// Parsed command-line options.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Options {
    /// Emit JSON instead of text.
    pub json: bool,
    /// Print the kernel table and exit.
    pub list_kernels: bool,
    /// Kernel requested with `--kernel`.
    pub kernel: Option<String>,
    /// Number of `-v` flags.
    pub verbosity: u8,
    /// Files to checksum; `-` is standard input.
    pub files: Vec<OsString>,
}

pub fn command() -> Command {
    Command::new(PROGRAM_NAME)
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compute Internet checksums (RFC 1071) and report SIMD kernel support")
        .arg(
            Arg::new("json")
                .long("json")
                .help("Write the report or checksums as JSON.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("list-kernels")
                .long("list-kernels")
                .help("List every checksum kernel with its status and exit.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("kernel")
                .long("kernel")
                .short('k')
                .value_name("NAME")
                .help("Use the named kernel instead of the detected one.")
                .num_args(1),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Increase log verbosity; repeat for trace output.")
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("files")
                .value_name("FILE")
                .help("Files to checksum. '-' reads standard input.")
                .value_parser(OsStringValueParser::new())
                .num_args(0..)
                .action(ArgAction::Append),
        )
}

pub fn parse<I, S>(args: I) -> Result<Options, clap::Error>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
{
    let matches = command().try_get_matches_from(args)?;
    Ok(options_from(&matches))
}

fn options_from(matches: &ArgMatches) -> Options {
    Options {
        json: matches.get_flag("json"),
        list_kernels: matches.get_flag("list-kernels"),
        kernel: matches.get_one::<String>("kernel").cloned(),
        verbosity: matches.get_count("verbose"),
        files: matches
            .get_many::<OsString>("files")
            .map(|values| values.cloned().collect())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        command().debug_assert();
    }

    #[test]
    fn no_arguments_selects_the_report() {
        assert_eq!(parse(["fastcsum"]).unwrap(), Options::default());
    }

    #[test]
    fn options_are_collected() {
        let options = parse(["fastcsum", "--json", "-vv", "-k", "vec256", "a", "-", "b"]).unwrap();
        assert!(options.json);
        assert_eq!(options.verbosity, 2);
        assert_eq!(options.kernel.as_deref(), Some("vec256"));
        assert_eq!(options.files, ["a", "-", "b"].map(OsString::from));
    }

    #[test]
    fn unknown_flag_is_rejected() {
        let err = parse(["fastcsum", "--bogus"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }
}
