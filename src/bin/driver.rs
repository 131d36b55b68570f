//! src/bin/driver.rs
//! Argument parsing and the standard input forwarding loop for `logboot`.

use std::ffi::OsString;
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Arg, Command, value_parser};
use logging::{BuildConfig, ConfigResult, LaunchMode, LogConfig, LoggingSetup, SetupOptions};
use logging_sink::{Level, Record};

const PROGRAM_NAME: &str = "logboot";

/// Category used for forwarded lines and for the driver's own failures.
pub(crate) const DEFAULT_CATEGORY: &str = "logboot";

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ParsedArgs {
    pub(crate) config: Option<PathBuf>,
    pub(crate) build_config: Option<PathBuf>,
    pub(crate) category: String,
    pub(crate) level: Level,
    pub(crate) launch_mode: LaunchMode,
}

fn clap_command() -> Command {
    Command::new(PROGRAM_NAME)
        .about("Boot the logging pipeline and forward standard input as log records.")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("Runtime logging configuration (TOML).")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("build-config")
                .long("build-config")
                .value_name("FILE")
                .help("Build-time minimum levels (TOML).")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("category")
                .long("category")
                .value_name("NAME")
                .help("Category of the forwarded records.")
                .default_value(DEFAULT_CATEGORY),
        )
        .arg(
            Arg::new("level")
                .long("level")
                .value_name("LEVEL")
                .help("Level of the forwarded records.")
                .default_value("INFO")
                .value_parser(|value: &str| value.parse::<Level>()),
        )
        .arg(
            Arg::new("launch-mode")
                .long("launch-mode")
                .value_name("MODE")
                .help("normal, development or test.")
                .default_value("normal")
                .value_parser(|value: &str| value.parse::<LaunchMode>()),
        )
}

pub(crate) fn parse_args<I, S>(arguments: I) -> Result<ParsedArgs, clap::Error>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
{
    let mut matches = clap_command().try_get_matches_from(arguments)?;

    Ok(ParsedArgs {
        config: matches.remove_one::<PathBuf>("config"),
        build_config: matches.remove_one::<PathBuf>("build-config"),
        category: matches
            .remove_one::<String>("category")
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_owned()),
        level: matches.remove_one::<Level>("level").unwrap_or(Level::Info),
        launch_mode: matches
            .remove_one::<LaunchMode>("launch-mode")
            .unwrap_or_default(),
    })
}

/// Prints a clap error (or help and version output) and maps it to the
/// process status clap chose.
pub(crate) fn report_usage_error(error: &clap::Error) -> ExitCode {
    let _ = error.print();
    ExitCode::from(u8::try_from(error.exit_code()).unwrap_or(1))
}

fn load_build_config(args: &ParsedArgs) -> ConfigResult<BuildConfig> {
    args.build_config
        .as_ref()
        .map_or_else(|| Ok(BuildConfig::default()), BuildConfig::load)
}

fn load_config(args: &ParsedArgs) -> ConfigResult<LogConfig> {
    args.config
        .as_ref()
        .map_or_else(|| Ok(LogConfig::default()), LogConfig::load)
}

fn log_failure(setup: &LoggingSetup, message: &str, error: &dyn std::fmt::Display) {
    setup.log(&Record::new(Level::Error, DEFAULT_CATEGORY, message).with_thrown(error));
}

pub(crate) fn run(args: &ParsedArgs, setup: &LoggingSetup, input: impl BufRead) -> ExitCode {
    if forward(args, setup, input) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Boots logging for `args`, forwards every non-empty line of `input` and
/// shuts logging down. Returns `false` when any step failed.
///
/// Configuration failures leave the fallback console pipeline in place and
/// make the run fail once input is exhausted.
fn forward(args: &ParsedArgs, setup: &LoggingSetup, input: impl BufRead) -> bool {
    let mut succeeded = true;

    let build = match load_build_config(args) {
        Ok(build) => build,
        Err(error) => {
            setup.handle_failed_start();
            log_failure(setup, "Failed to load the build configuration", &error);
            setup.shutdown();
            return false;
        }
    };

    let options = SetupOptions {
        build,
        launch_mode: args.launch_mode,
        ..SetupOptions::default()
    };
    if let Err(error) = setup.initialize_logging_with_fallback(|| load_config(args), &options) {
        log_failure(setup, "Failed to configure logging", &error);
        succeeded = false;
    }

    for line in input.lines() {
        match line {
            Ok(line) if line.trim().is_empty() => {}
            Ok(line) => setup.log(&Record::new(args.level, args.category.as_str(), line)),
            Err(error) => {
                log_failure(setup, "Failed to read standard input", &error);
                succeeded = false;
                break;
            }
        }
    }

    setup.shutdown();
    succeeded
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn parse(arguments: &[&str]) -> ParsedArgs {
        parse_args(std::iter::once(PROGRAM_NAME).chain(arguments.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_apply_without_flags() {
        let args = parse(&[]);
        assert_eq!(args.config, None);
        assert_eq!(args.build_config, None);
        assert_eq!(args.category, DEFAULT_CATEGORY);
        assert_eq!(args.level, Level::Info);
        assert_eq!(args.launch_mode, LaunchMode::Normal);
    }

    #[test]
    fn flags_are_parsed() {
        let args = parse(&[
            "--config",
            "app.toml",
            "--build-config",
            "build.toml",
            "--category",
            "io.app",
            "--level",
            "warning",
            "--launch-mode",
            "dev",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("app.toml")));
        assert_eq!(args.build_config, Some(PathBuf::from("build.toml")));
        assert_eq!(args.category, "io.app");
        assert_eq!(args.level, Level::Warn);
        assert_eq!(args.launch_mode, LaunchMode::Development);
    }

    #[test]
    fn unknown_level_is_rejected() {
        let error = parse_args([PROGRAM_NAME, "--level", "loud"]).unwrap_err();
        assert!(error.to_string().contains("loud"));
    }

    #[test]
    fn forwards_lines_to_configured_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("out.log");
        let config = dir.path().join("logging.toml");
        std::fs::write(
            &config,
            format!(
                "[console]\nenable = false\n[file]\nenable = true\npath = '{}'\nformat = \"%p %c %s%n\"\n",
                log.display()
            ),
        )
        .unwrap();
        let args = parse(&[
            "--config",
            config.to_str().unwrap(),
            "--category",
            "io.app",
            "--level",
            "WARN",
        ]);
        let setup = LoggingSetup::new();

        assert!(forward(&args, &setup, Cursor::new("first\n\nsecond\n")));

        let written = std::fs::read_to_string(&log).unwrap();
        assert_eq!(written, "WARN io.app first\nWARN io.app second\n");
    }

    #[test]
    fn forwarded_level_below_category_level_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("out.log");
        let config = dir.path().join("logging.toml");
        std::fs::write(
            &config,
            format!(
                "level = \"WARN\"\n[console]\nenable = false\n[file]\nenable = true\npath = '{}'\nformat = \"%s%n\"\n",
                log.display()
            ),
        )
        .unwrap();
        let args = parse(&["--config", config.to_str().unwrap()]);
        let setup = LoggingSetup::new();

        assert!(forward(&args, &setup, Cursor::new("quiet\n")));
        assert_eq!(std::fs::read_to_string(&log).unwrap(), "");
    }

    #[test]
    fn missing_build_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let args = parse(&["--build-config", missing.to_str().unwrap()]);
        let setup = LoggingSetup::new();

        assert!(!forward(&args, &setup, Cursor::new("ignored\n")));
    }
}
