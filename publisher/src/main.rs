//! Publish synthetic analytics events and print what the reporter recorded.
//!
//! # Usage
//!
//! ```sh
//! cargo run --release --bin analytics-publisher -- --config reporter.yaml --property namespace=gateway --events 100
//! ```

use analytics_publisher::{load_properties, parse_property, publish};
use analytics_reporter::{ConfigBag, ReporterRegistry};
use clap::{value_parser, Arg, ArgAction, Command};
use std::{path::PathBuf, process::ExitCode};
use tracing::{error, info};

/// Flag for verbose output
const VERBOSE_FLAG: &str = "verbose";

fn main() -> ExitCode {
    // Parse arguments
    let matches = Command::new("analytics-publisher")
        .version(env!("CARGO_PKG_VERSION"))
        .about("publish synthetic analytics events through the pinned reporter")
        .arg(
            Arg::new(VERBOSE_FLAG)
                .short('v')
                .long(VERBOSE_FLAG)
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("Path to YAML file of reporter properties")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("property")
                .long("property")
                .action(ArgAction::Append)
                .help("Reporter property override (key=value)")
                .value_parser(value_parser!(String)),
        )
        .arg(
            Arg::new("reporter")
                .long("reporter")
                .help("Reporter identifier (defaults to the default reporter)")
                .value_parser(value_parser!(String)),
        )
        .arg(
            Arg::new("api")
                .long("api")
                .default_value("pizzashack")
                .help("API name attached to published events")
                .value_parser(value_parser!(String)),
        )
        .arg(
            Arg::new("events")
                .long("events")
                .default_value("10")
                .help("Number of events to publish")
                .value_parser(value_parser!(u64)),
        )
        .get_matches();

    // Create logger
    let level = if matches.get_flag(VERBOSE_FLAG) {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    // Collect properties (overrides win over the file)
    let mut properties = match matches.get_one::<PathBuf>("config") {
        Some(path) => match load_properties(path) {
            Ok(properties) => properties,
            Err(e) => {
                error!(error = %e, path = %path.display(), "failed to load properties");
                return ExitCode::FAILURE;
            }
        },
        None => ConfigBag::new(),
    };
    for property in matches.get_many::<String>("property").unwrap_or_default() {
        match parse_property(property) {
            Ok((key, value)) => {
                properties.insert(key, value);
            }
            Err(e) => {
                error!(error = %e, "failed to parse property");
                return ExitCode::FAILURE;
            }
        }
    }

    // Resolve the reporter
    let registry = ReporterRegistry::global();
    let identifier = matches.get_one::<String>("reporter").map(String::as_str);
    let reporter = match registry.resolve(identifier, &properties) {
        Ok(reporter) => reporter,
        Err(e) => {
            error!(error = %e, ?identifier, "failed to resolve reporter");
            return ExitCode::FAILURE;
        }
    };
    info!(kind = %reporter.kind(), "resolved reporter");

    // Publish
    let api = matches
        .get_one::<String>("api")
        .expect("api has a default value");
    let events = *matches
        .get_one::<u64>("events")
        .expect("events has a default value");
    if let Err(e) = publish(reporter.as_ref(), api, events) {
        error!(error = %e, "failed to publish events");
        return ExitCode::FAILURE;
    }

    // Any other component resolving later receives the same reporter
    match registry.resolve(None, &ConfigBag::new()) {
        Ok(pinned) => info!(
            same_instance = std::sync::Arc::ptr_eq(&reporter, &pinned),
            "resolved reporter again"
        ),
        Err(e) => error!(error = %e, "pinned reporter unavailable"),
    }

    print!("{}", reporter.encode());
    ExitCode::SUCCESS
}
