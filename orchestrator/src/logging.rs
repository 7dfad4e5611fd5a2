//! Diagnostic logging for the `shipwright` binary.
//!
//! Library code logs through the `log` facade. The binary installs a
//! `tracing-subscriber` formatter on stderr, which also receives `log`
//! records. Its level follows the `-v`/`-q` flags unless `RUST_LOG` is set.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Map the CLI verbosity flags to a level filter.
///
/// Quiet shows errors only. The default shows warnings; each `-v` adds one
/// level, up to `trace`.
///
/// # Examples
///
/// ```
/// use shipwright_orchestrator::logging::level_for;
/// use tracing_subscriber::filter::LevelFilter;
///
/// assert_eq!(level_for(0, false), LevelFilter::WARN);
/// assert_eq!(level_for(2, false), LevelFilter::DEBUG);
/// assert_eq!(level_for(0, true), LevelFilter::ERROR);
/// ```
#[must_use]
pub fn level_for(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Build the event filter: `directives` when given, else `level`.
///
/// Unparseable directives are dropped.
#[must_use]
pub fn filter_for(level: LevelFilter, directives: Option<&str>) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .parse_lossy(directives.unwrap_or_default())
}

/// Install the stderr subscriber as the global default.
///
/// Calling this more than once keeps the first subscriber.
pub fn init(verbosity: u8, quiet: bool) {
    let level = level_for(verbosity, quiet);
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter_for(level, directives.as_deref()))
        .with_writer(std::io::stderr)
        .with_target(level >= LevelFilter::DEBUG)
        .without_time()
        .try_init();
    if installed.is_err() {
        // Already installed.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, false, LevelFilter::WARN)]
    #[case(1, false, LevelFilter::INFO)]
    #[case(2, false, LevelFilter::DEBUG)]
    #[case(3, false, LevelFilter::TRACE)]
    #[case(9, false, LevelFilter::TRACE)]
    #[case(0, true, LevelFilter::ERROR)]
    fn verbosity_maps_to_level(#[case] verbosity: u8, #[case] quiet: bool, #[case] expected: LevelFilter) {
        assert_eq!(level_for(verbosity, quiet), expected);
    }

    #[test]
    fn flags_decide_the_level_without_directives() {
        let filter = filter_for(LevelFilter::INFO, None);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn directives_override_the_flags() {
        let filter = filter_for(LevelFilter::WARN, Some("shipwright_orchestrator=trace"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
    }
}
