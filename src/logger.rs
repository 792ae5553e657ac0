//! log4rs set-up for the engine and the `appgrid` binary.
//!
//! Everything logs through the `log` facade. Query telemetry lines use the
//! `appgrid::queries` target so they can be routed to their own file.

use crate::query::telemetry::QUERY_LOG_TARGET;
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const RETENTION: u32 = 7;

/// Initializes logging from a log4rs config file (YAML or TOML).
///
/// # Errors
/// Returns an error if the file cannot be read or a logger is already installed.
pub fn init_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    log4rs::init_file(path, log4rs::config::Deserializers::default())?;
    Ok(())
}

/// Parse `error|warn|info|debug|trace`, falling back to `info`.
#[must_use]
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(dir: &Path, stem: &str, level_pattern: &str) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", dir.join(format!("{stem}.{{}}.log")).display()), RETENTION)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(level_pattern)))
        .build(dir.join(format!("{stem}.log")), Box::new(policy))?)
}

/// Builds the rolling-file config used by [`init_for_app_in`]; returns the log directory too.
///
/// # Errors
/// Returns an error if the directory cannot be created or an appender fails to build.
pub fn app_config(
    base_dir: &Path,
    name: &str,
    level: LevelFilter,
) -> Result<(Config, PathBuf), Box<dyn std::error::Error>> {
    let dir = base_dir.join(format!("{name}_logs"));
    std::fs::create_dir_all(&dir)?;
    let app = rolling(&dir, name, PATTERN)?;
    // Query lines are already structured; keep only the timestamp in front.
    let queries = rolling(&dir, &format!("{name}_queries"), "{d(%Y-%m-%d %H:%M:%S%.3f)} {m}{n}")?;
    let config = Config::builder()
        .appender(Appender::builder().build("app", Box::new(app)))
        .appender(Appender::builder().build("queries", Box::new(queries)))
        .logger(
            Logger::builder()
                .appender("queries")
                .additive(false)
                .build(QUERY_LOG_TARGET, LevelFilter::Info),
        )
        .build(Root::builder().appender("app").build(level))?;
    Ok((config, dir))
}

/// Initializes logging under `{base_dir}/{name}_logs/` with `{name}.log` and
/// `{name}_queries.log`, both rolling at 10 MiB with seven files kept.
///
/// # Errors
/// Returns an error if the directory cannot be created or the logger fails to initialize.
pub fn init_for_app_in(base_dir: &Path, name: &str, level: LevelFilter) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let (config, dir) = app_config(base_dir, name, level)?;
    log4rs::init_config(config)?;
    Ok(dir)
}

/// Console logging to stderr for the CLI. Query lines are suppressed below `debug`.
///
/// # Errors
/// Returns an error if a logger is already installed.
pub fn init_console(level: LevelFilter) -> Result<(), Box<dyn std::error::Error>> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("[{l}] {t} - {m}{n}")))
        .build();
    let query_level = if level >= LevelFilter::Debug { LevelFilter::Info } else { LevelFilter::Off };
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .logger(Logger::builder().appender("stderr").additive(false).build(QUERY_LOG_TARGET, query_level))
        .build(Root::builder().appender("stderr").build(level))?;
    log4rs::init_config(config)?;
    Ok(())
}
