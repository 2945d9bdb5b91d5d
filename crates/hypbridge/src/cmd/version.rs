use std::path::Path;

use hypbridge_frame::{MAX_COMMAND_LEN, RESULT_SIZE};
use hypbridge_session::{
    SessionConfig, COMMANDS_PIPE_ENV, LEGACY_COMMANDS_PIPE_ENV, LEGACY_RESULTS_PIPE_ENV,
    READ_TIMEOUT_ENV, RESULTS_PIPE_ENV,
};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("hypbridge {}", env!("CARGO_PKG_VERSION"));
    if args.extended {
        for line in extended_lines(&SessionConfig::from_env()) {
            println!("{line}");
        }
    }
    Ok(SUCCESS)
}

/// Build provenance, wire limits and the session settings `config` resolves to.
fn extended_lines(config: &SessionConfig) -> Vec<String> {
    vec![
        format!("target: {}", super::envinfo::target_triple()),
        format!(
            "rustc: {}",
            option_env!("RUSTC_VERSION").unwrap_or("unknown")
        ),
        format!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown")),
        format!("max_command_bytes: {MAX_COMMAND_LEN}"),
        format!("result_bytes: {RESULT_SIZE} (big-endian)"),
        format!(
            "commands_pipe: {} (env {COMMANDS_PIPE_ENV}, legacy {LEGACY_COMMANDS_PIPE_ENV})",
            describe_path(config.commands_path.as_deref())
        ),
        format!(
            "results_pipe: {} (env {RESULTS_PIPE_ENV}, legacy {LEGACY_RESULTS_PIPE_ENV})",
            describe_path(config.results_path.as_deref())
        ),
        format!(
            "read_timeout: {} (env {READ_TIMEOUT_ENV})",
            match config.read_timeout {
                Some(timeout) => format!("{}ms", timeout.as_millis()),
                None => "none, blocks until the generator answers".to_string(),
            }
        ),
    ]
}

fn describe_path(path: Option<&Path>) -> String {
    path.map_or_else(|| "(not set)".to_string(), |p| p.display().to_string())
}
