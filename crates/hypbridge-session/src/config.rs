use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Path of the pipe the client writes commands to.
pub const COMMANDS_PIPE_ENV: &str = "COMMANDS_PIPE_PATH";
/// Path of the pipe the client reads results from.
pub const RESULTS_PIPE_ENV: &str = "RESULTS_PIPE_PATH";
/// Older name for [`COMMANDS_PIPE_ENV`], still exported by some generators.
pub const LEGACY_COMMANDS_PIPE_ENV: &str = "HYPOTHESISFIFOCOMMANDS";
/// Older name for [`RESULTS_PIPE_ENV`].
pub const LEGACY_RESULTS_PIPE_ENV: &str = "HYPOTHESISFIFORESULTS";
/// Optional per-result read timeout in milliseconds.
pub const READ_TIMEOUT_ENV: &str = "HYPBRIDGE_READ_TIMEOUT_MS";

/// Where the session's pipes live and how long to wait for results.
///
/// Resolved once; a missing path is only reported when that pipe is first
/// needed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Command pipe, opened write-only.
    pub commands_path: Option<PathBuf>,
    /// Result pipe, opened read-only.
    pub results_path: Option<PathBuf>,
    /// Bound on opening each pipe and on each result read. `None` blocks
    /// indefinitely.
    pub read_timeout: Option<Duration>,
}

impl SessionConfig {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    /// Resolve configuration through an arbitrary variable lookup.
    ///
    /// Empty values count as unset. The current variable names win over the
    /// legacy ones. An unparsable or zero timeout is ignored with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let commands_path = get(COMMANDS_PIPE_ENV)
            .or_else(|| get(LEGACY_COMMANDS_PIPE_ENV))
            .map(PathBuf::from);
        let results_path = get(RESULTS_PIPE_ENV)
            .or_else(|| get(LEGACY_RESULTS_PIPE_ENV))
            .map(PathBuf::from);
        let read_timeout = get(READ_TIMEOUT_ENV).and_then(|raw| parse_timeout_millis(&raw));

        Self {
            commands_path,
            results_path,
            read_timeout,
        }
    }

    /// Override the command pipe path.
    pub fn with_commands_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.commands_path = Some(path.into());
        self
    }

    /// Override the result pipe path.
    pub fn with_results_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.results_path = Some(path.into());
        self
    }

    /// Override the result read timeout.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }
}

fn parse_timeout_millis(raw: &OsString) -> Option<Duration> {
    match raw.to_str().map(str::trim).map(str::parse::<u64>) {
        Some(Ok(0)) => {
            warn!(var = READ_TIMEOUT_ENV, "zero timeout ignored; reads will block");
            None
        }
        Some(Ok(millis)) => Some(Duration::from_millis(millis)),
        _ => {
            warn!(var = READ_TIMEOUT_ENV, value = ?raw, "invalid timeout ignored; reads will block");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let map: HashMap<String, OsString> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), OsString::from(v)))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn reads_current_variable_names() {
        let config = SessionConfig::from_lookup(lookup(&[
            (COMMANDS_PIPE_ENV, "/tmp/c"),
            (RESULTS_PIPE_ENV, "/tmp/r"),
            (READ_TIMEOUT_ENV, "250"),
        ]));

        assert_eq!(config.commands_path, Some(PathBuf::from("/tmp/c")));
        assert_eq!(config.results_path, Some(PathBuf::from("/tmp/r")));
        assert_eq!(config.read_timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn falls_back_to_legacy_names() {
        let config = SessionConfig::from_lookup(lookup(&[
            (LEGACY_COMMANDS_PIPE_ENV, "/tmp/legacy-c"),
            (RESULTS_PIPE_ENV, "/tmp/r"),
            (LEGACY_RESULTS_PIPE_ENV, "/tmp/legacy-r"),
        ]));

        assert_eq!(config.commands_path, Some(PathBuf::from("/tmp/legacy-c")));
        assert_eq!(config.results_path, Some(PathBuf::from("/tmp/r")));
        assert_eq!(config.read_timeout, None);
    }

    #[test]
    fn empty_values_count_as_unset() {
        let config = SessionConfig::from_lookup(lookup(&[
            (COMMANDS_PIPE_ENV, ""),
            (RESULTS_PIPE_ENV, ""),
        ]));
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn bad_timeouts_are_ignored() {
        for raw in ["0", "soon", "-5"] {
            let config = SessionConfig::from_lookup(lookup(&[(READ_TIMEOUT_ENV, raw)]));
            assert_eq!(config.read_timeout, None, "timeout {raw:?} should be ignored");
        }
    }

    #[test]
    fn builder_overrides() {
        let config = SessionConfig::default()
            .with_commands_path("/a")
            .with_results_path("/b")
            .with_read_timeout(Some(Duration::from_secs(1)));

        assert_eq!(config.commands_path, Some(PathBuf::from("/a")));
        assert_eq!(config.results_path, Some(PathBuf::from("/b")));
        assert_eq!(config.read_timeout, Some(Duration::from_secs(1)));
    }
}
