mod error;
mod replay_transport;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;

use sip_capture_core::{CallSummary, CaptureConfiguration, CaptureDiagnostics, CaptureStatus, SipDebugFacade};

use crate::error::ReplayError;
use crate::replay_transport::ReplayTransport;

/// Feed recorded `pjsip show history` output through the capture pipeline
/// and print what the SIP debug API would return.
#[derive(Parser, Debug)]
#[command(name = "sip-capture-replay")]
struct Args {
    /// JSON recording: {"connected": bool, "responses": {"<command>": <reply>}}
    recording: PathBuf,

    /// Number of poll cycles to run
    #[arg(long, default_value_t = 3)]
    cycles: u32,

    /// Entries fetched per cycle
    #[arg(long, default_value_t = 50)]
    batch_limit: usize,

    /// Retained message cap
    #[arg(long, default_value_t = 10_000)]
    max_messages: usize,

    /// Age cap in seconds. Recordings are usually older than the live
    /// two-hour window, so nothing expires by default.
    #[arg(long, default_value_t = u64::from(u32::MAX))]
    max_age_secs: u64,

    /// Print the messages of this Call-ID instead of the call list
    #[arg(long)]
    call: Option<String>,
}

#[derive(Serialize)]
struct Report {
    status: CaptureStatus,
    calls: Vec<CallSummary>,
    diagnostics: CaptureDiagnostics,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), ReplayError> {
    let transport = Arc::new(ReplayTransport::load(&args.recording)?);
    let config = CaptureConfiguration {
        batch_limit: args.batch_limit,
        max_messages: args.max_messages,
        max_age: Duration::from_secs(args.max_age_secs),
        ..Default::default()
    };
    let facade = SipDebugFacade::new(transport, config)?;

    for cycle in 1..=args.cycles {
        let outcome = facade.controller().poll_once()?;
        log::info!(
            "cycle {}: {} new, {} processed, {} stored, cursor {}",
            cycle,
            outcome.discovered,
            outcome.processed,
            outcome.added,
            outcome.cursor
        );
        if outcome.processed == 0 {
            break;
        }
    }

    let json = match args.call {
        Some(call_id) => serde_json::to_string_pretty(&facade.call_messages(&call_id)?),
        None => serde_json::to_string_pretty(&Report {
            status: facade.status(),
            calls: facade.list_calls(),
            diagnostics: facade.diagnostics(),
        }),
    }
    .map_err(|e| ReplayError::Output(e.to_string()))?;

    println!("{}", json);
    Ok(())
}
