use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use hypbridge_session::Transcript;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ExchangeOutput {
    command: String,
    result: u32,
}

#[derive(Serialize)]
struct TranscriptOutput<'a> {
    program: &'a str,
    exit_code: Option<i32>,
    terminated: bool,
    draws: Vec<u32>,
    exchanges: Vec<ExchangeOutput>,
}

fn transcript_output<'a>(
    transcript: &Transcript,
    program: &'a str,
    exit_code: Option<i32>,
) -> TranscriptOutput<'a> {
    TranscriptOutput {
        program,
        exit_code,
        terminated: transcript.terminated(),
        draws: transcript.draws(),
        exchanges: transcript
            .exchanges()
            .iter()
            .map(|e| ExchangeOutput {
                command: e.command.to_string(),
                result: e.result,
            })
            .collect(),
    }
}

/// Print everything a `run` served, in the requested format.
pub fn print_transcript(
    transcript: &Transcript,
    program: &str,
    exit_code: Option<i32>,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let out = transcript_output(transcript, program, exit_code);
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "COMMAND", "RESULT"]);
            for (index, exchange) in transcript.exchanges().iter().enumerate() {
                table.add_row(vec![
                    (index + 1).to_string(),
                    exchange.command.to_string(),
                    exchange.result.to_string(),
                ]);
            }
            println!("{table}");
            println!("{}", summary_line(transcript, program, exit_code));
        }
        OutputFormat::Pretty => {
            for exchange in transcript.exchanges() {
                println!("{} -> {}", exchange.command, exchange.result);
            }
            println!("{}", summary_line(transcript, program, exit_code));
        }
        OutputFormat::Raw => {
            let mut data = Vec::with_capacity(transcript.len() * 4);
            for exchange in transcript.exchanges() {
                data.extend_from_slice(&exchange.result.to_be_bytes());
            }
            print_raw(&data);
        }
    }
}

#[derive(Serialize)]
struct StepOutput<'a> {
    command: &'a str,
    result: u32,
}

/// Print the result of one `probe` step.
pub fn print_step(command: &str, result: u32, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = StepOutput { command, result };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "RESULT"])
                .add_row(vec![command.to_string(), result.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{command} -> {result}"),
        OutputFormat::Raw => print_raw(&result.to_be_bytes()),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn summary_line(transcript: &Transcript, program: &str, exit_code: Option<i32>) -> String {
    let exit = exit_code.map_or_else(|| "signal".to_string(), |code| code.to_string());
    format!(
        "{program}: {} exchanges, terminated={}, exit={exit}",
        transcript.len(),
        transcript.terminated()
    )
}
