use std::ffi::OsString;
use std::process::{Child, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use hypbridge_session::{
    ReplayGenerator, Responder, SessionError, Transcript, COMMANDS_PIPE_ENV,
    LEGACY_COMMANDS_PIPE_ENV, LEGACY_RESULTS_PIPE_ENV, RESULTS_PIPE_ENV,
};
use hypbridge_transport::FifoPair;
use tracing::{debug, info, warn};

use crate::cmd::RunArgs;
use crate::exit::{
    io_error, session_error, transport_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS,
    USAGE,
};
use crate::output::{print_transcript, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let (program, program_args) = args
        .program
        .split_first()
        .ok_or_else(|| CliError::new(USAGE, "no program given"))?;
    let program_name = program.to_string_lossy().into_owned();

    let pair = FifoPair::temp().map_err(|err| transport_error("fifo setup failed", err))?;
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut child = spawn_program(program, program_args, &pair)?;
    info!(program = %program_name, pid = child.id(), "program started");

    let commands = pair.commands_path().to_path_buf();
    let results = pair.results_path().to_path_buf();
    let mut generator = ReplayGenerator::new(args.values).with_fallback(args.fallback);
    let server = thread::spawn(move || -> (Transcript, Result<(), SessionError>) {
        let mut responder = match Responder::open(&commands, &results) {
            Ok(responder) => responder,
            Err(err) => return (Transcript::default(), Err(err)),
        };
        let outcome = responder.serve(&mut generator);
        (responder.into_transcript(), outcome)
    });

    let status = wait_for_program(&mut child, &running)?;
    debug!(%status, "program exited");

    // The program may exit without ever opening its ends.
    while !server.is_finished() {
        pair.release_waiters();
        thread::sleep(POLL_INTERVAL);
    }
    let (transcript, outcome) = server
        .join()
        .map_err(|_| CliError::new(INTERNAL, "generator thread panicked"))?;

    print_transcript(&transcript, &program_name, status.code(), format);

    if !running.load(Ordering::SeqCst) {
        return Err(CliError::new(FAILURE, "interrupted"));
    }
    match outcome {
        Ok(()) => {}
        Err(SessionError::Disconnected(reason)) => {
            warn!(%reason, "program did not terminate the session");
        }
        Err(err) => return Err(session_error("generator failed", err)),
    }
    if !status.success() {
        return Err(CliError::new(
            FAILURE,
            format!("{program_name} exited abnormally ({status})"),
        ));
    }
    if !transcript.terminated() {
        return Err(CliError::new(
            FAILURE,
            format!("{program_name} exited before TERMINATE"),
        ));
    }

    Ok(SUCCESS)
}

/// Parse a RAND value as decimal or `0x` hexadecimal.
pub fn parse_value(raw: &str) -> Result<u32, String> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => raw.parse::<u32>(),
    };
    parsed.map_err(|err| format!("invalid value `{raw}`: {err}"))
}

fn spawn_program(program: &OsString, args: &[OsString], pair: &FifoPair) -> CliResult<Child> {
    std::process::Command::new(program)
        .args(args)
        .env(COMMANDS_PIPE_ENV, pair.commands_path())
        .env(RESULTS_PIPE_ENV, pair.results_path())
        .env(LEGACY_COMMANDS_PIPE_ENV, pair.commands_path())
        .env(LEGACY_RESULTS_PIPE_ENV, pair.results_path())
        .spawn()
        .map_err(|err| io_error(&format!("failed to start {}", program.to_string_lossy()), err))
}

fn wait_for_program(child: &mut Child, running: &AtomicBool) -> CliResult<ExitStatus> {
    loop {
        if let Some(status) = child
            .try_wait()
            .map_err(|err| io_error("wait failed", err))?
        {
            return Ok(status);
        }
        if !running.load(Ordering::SeqCst) {
            warn!("interrupted; stopping program");
            let _ = child.kill();
            return child.wait().map_err(|err| io_error("wait failed", err));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
