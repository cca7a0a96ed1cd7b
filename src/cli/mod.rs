//! CLI argument parsing module
//!
//! This module handles command-line argument parsing and application entry
//! point. Environment fallbacks are resolved here, at parse time, into the
//! explicit configuration structs the pipeline components receive.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Arg, ArgMatches, Command};

use crate::config::{
    CookieSource, ExtractConfig, InjectConfig, StorePaths, StoreVariant, DEFAULT_BACKEND_URL,
    DEFAULT_GATEWAY,
};
use crate::error::{RelayError, Result};
use crate::pipeline;
use crate::utils::FileUtils;

/// Main entry point for the CLI application
pub fn run() {
    crate::logging::init();

    let app = create_app();
    let matches = app.get_matches();

    match run_with_args(&matches) {
        Ok(()) => {}
        Err(e) => {
            log::error!("{}", e);
            eprintln!("cookierelay: error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Run cookierelay with parsed command line arguments
fn run_with_args(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("extract", sub)) => {
            let config = build_extract_config(sub)?;
            let rt = tokio::runtime::Runtime::new()
                .map_err(|e| RelayError::Config(format!("Failed to create async runtime: {}", e)))?;
            rt.block_on(pipeline::run_extraction(&config))
        }
        Some(("inject", sub)) => {
            let config = build_inject_config(sub)?;
            pipeline::run_injection(&config).map(|_| ())
        }
        _ => Err(RelayError::Input(
            "No subcommand given; see --help".to_string(),
        )),
    }
}

/// Create the CLI application structure
fn create_app() -> Command {
    Command::new("cookierelay")
        .version(crate::VERSION)
        .about("Moves browser session cookies between cookie stores and a session backend")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("extract")
                .about("Poll a cookie store and deliver encrypted cookies to the backend")
                .arg(
                    Arg::new("target-domain")
                        .long("target-domain")
                        .value_name("DOMAIN")
                        .help("Domain whose cookies are captured")
                        .required(true),
                )
                .arg(
                    Arg::new("session-id")
                        .long("session-id")
                        .value_name("ID")
                        .help("Backend session identifier")
                        .required(true),
                )
                .arg(
                    Arg::new("api-url")
                        .long("api-url")
                        .visible_alias("backend-url")
                        .value_name("URL")
                        .help("Session backend base URL")
                        .default_value(DEFAULT_BACKEND_URL),
                )
                .arg(
                    Arg::new("secret")
                        .long("secret")
                        .visible_alias("script-secret")
                        .value_name("SECRET")
                        .help("Shared authentication secret")
                        .env("PYTHON_SCRIPT_SECRET")
                        .required(true),
                )
                .arg(
                    Arg::new("encryption-key")
                        .long("encryption-key")
                        .value_name("KEY")
                        .help("Symmetric secret for the cookie payload")
                        .env("COOKIE_ENCRYPTION_KEY")
                        .required(true),
                )
                .arg(
                    Arg::new("store")
                        .long("store")
                        .value_name("VARIANT")
                        .help("Cookie store variant: chromium or gecko")
                        .default_value("chromium"),
                )
                .arg(
                    Arg::new("profile-path")
                        .long("profile-path")
                        .value_name("PATH")
                        .help("Explicit profile directory or database file"),
                )
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .value_name("SECONDS")
                        .help("Give up after this many seconds")
                        .default_value("600"),
                )
                .arg(
                    Arg::new("poll-interval")
                        .long("poll-interval")
                        .value_name("SECONDS")
                        .help("Seconds between store polls")
                        .default_value("10"),
                )
                .arg(
                    Arg::new("gateway")
                        .long("gateway")
                        .value_name("IP")
                        .help("Fallback address when the backend host does not resolve")
                        .env("DOCKER_HOST_GATEWAY")
                        .default_value(DEFAULT_GATEWAY),
                ),
        )
        .subcommand(
            Command::new("inject")
                .about("Write a captured cookie set into a profile's cookie store")
                .arg(
                    Arg::new("cookies-file")
                        .long("cookies-file")
                        .value_name("FILE")
                        .help("Path to a cookies JSON file"),
                )
                .arg(
                    Arg::new("cookies-json")
                        .long("cookies-json")
                        .value_name("BASE64")
                        .help("Base64-encoded cookies JSON"),
                )
                .arg(
                    Arg::new("store")
                        .long("store")
                        .value_name("VARIANT")
                        .help("Cookie store variant: chromium or gecko")
                        .default_value("gecko"),
                )
                .arg(
                    Arg::new("profile-path")
                        .long("profile-path")
                        .value_name("DIR")
                        .help("Absolute profile directory (optional)"),
                ),
        )
}

/// Build extraction configuration from command line arguments
fn build_extract_config(matches: &ArgMatches) -> Result<ExtractConfig> {
    Ok(ExtractConfig {
        target_domain: required_string(matches, "target-domain")?,
        session_id: required_string(matches, "session-id")?,
        api_url: required_string(matches, "api-url")?,
        secret: required_string(matches, "secret")?,
        encryption_key: required_string(matches, "encryption-key")?,
        variant: parse_variant(matches)?,
        profile: parse_profile(matches)?,
        paths: StorePaths::default(),
        timeout: parse_seconds(matches, "timeout")?,
        poll_interval: parse_seconds(matches, "poll-interval")?,
        gateway: required_string(matches, "gateway")?,
    })
}

/// Build injection configuration from command line arguments
fn build_inject_config(matches: &ArgMatches) -> Result<InjectConfig> {
    let file = matches.get_one::<String>("cookies-file");
    let inline = matches.get_one::<String>("cookies-json");
    let source = match (file, inline) {
        (Some(path), None) => CookieSource::File(FileUtils::expand_path(path)?),
        (None, Some(encoded)) => CookieSource::InlineBase64(encoded.clone()),
        (Some(_), Some(_)) => {
            return Err(RelayError::Input(
                "--cookies-file and --cookies-json are mutually exclusive".to_string(),
            ))
        }
        (None, None) => {
            return Err(RelayError::Input(
                "Must provide either --cookies-file or --cookies-json".to_string(),
            ))
        }
    };
    Ok(InjectConfig {
        source,
        variant: parse_variant(matches)?,
        profile: parse_profile(matches)?,
        paths: StorePaths::default(),
    })
}

fn required_string(matches: &ArgMatches, name: &str) -> Result<String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .ok_or_else(|| RelayError::Input(format!("Missing required flag --{}", name)))
}

fn parse_seconds(matches: &ArgMatches, name: &str) -> Result<Duration> {
    let raw = required_string(matches, name)?;
    let secs: u64 = raw
        .parse()
        .map_err(|_| RelayError::Input(format!("Invalid --{} value: {}", name, raw)))?;
    Ok(Duration::from_secs(secs))
}

fn parse_variant(matches: &ArgMatches) -> Result<StoreVariant> {
    let raw = required_string(matches, "store")?;
    raw.parse::<StoreVariant>()
        .map_err(|_| RelayError::Input(format!("Unsupported store variant: {}", raw)))
}

fn parse_profile(matches: &ArgMatches) -> Result<Option<PathBuf>> {
    match matches.get_one::<String>("profile-path") {
        Some(path) => Ok(Some(FileUtils::expand_path(path)?)),
        None => Ok(None),
    }
}
