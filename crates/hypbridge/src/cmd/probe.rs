use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use hypbridge_session::{connect, SessionConfig};
use tracing::debug;

use crate::cmd::ProbeArgs;
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_step, OutputFormat};

/// One action of a probe run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Rand,
    Start(String),
    End,
}

impl FromStr for Step {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "rand" => Ok(Step::Rand),
            "end" => Ok(Step::End),
            _ => match raw.strip_prefix("start:") {
                Some("") => Err("start step needs a label (start:LABEL)".to_string()),
                Some(label) => Ok(Step::Start(label.to_string())),
                None => Err(format!(
                    "unknown step `{raw}` (expected rand, start:LABEL or end)"
                )),
            },
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Rand => f.write_str("RAND"),
            Step::Start(label) => write!(f, "START {label}"),
            Step::End => f.write_str("END"),
        }
    }
}

pub fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = SessionConfig::from_env();
    if let Some(path) = args.commands {
        config = config.with_commands_path(path);
    }
    if let Some(path) = args.results {
        config = config.with_results_path(path);
    }
    if let Some(millis) = args.timeout_ms {
        config = config.with_read_timeout(Some(Duration::from_millis(millis)));
    }
    debug!(?config, "probing generator");

    let mut session = connect(config);
    session
        .init()
        .map_err(|err| session_error("init failed", err))?;

    for step in &args.steps {
        let label = step.to_string();
        let result = match step {
            Step::Rand => session.request_random(),
            Step::Start(name) => session.start_example(name).map(|()| 0),
            Step::End => session.end_example().map(|()| 0),
        }
        .map_err(|err| session_error(&format!("{label} failed"), err))?;
        print_step(&label, result, format);
    }

    session
        .terminate()
        .map_err(|err| session_error("TERMINATE failed", err))?;
    print_step("TERMINATE", 0, format);

    Ok(SUCCESS)
}
