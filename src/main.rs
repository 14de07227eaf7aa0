//! FallSentry CLI
//!
//! Usage:
//!   fallsentry --simulate                        # Built-in fall scenario, real time
//!   fallsentry --simulate --cancel-after-ms 3000 # ...and cancel mid-countdown
//!   fallsentry --replay readings.jsonl           # Feed JSON-lines {t,x,y,z}
//!   cat readings.jsonl | fallsentry --replay -   # ...from stdin
//!   fallsentry --serve                           # HTTP API server
//!   fallsentry --simulate --json                 # JSON output

use clap::Parser;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fallsentry::core::{
    run_server, AppState, BroadcastNarrator, ConfigStore, ContactBook, ContactStore, FallMonitor,
    LogTransport, Transport, WebhookTransport,
};
use fallsentry::types::{AccelReading, AlertReport, ConfigUpdate, Contact, FallState, Sample, StateOutput};
use fallsentry::{STANDARD_GRAVITY, VERSION};

#[derive(Parser, Debug)]
#[command(
    name = "fallsentry",
    version = VERSION,
    about = "FallSentry - Detect falls from accelerometer data and alert emergency contacts",
    long_about = "FallSentry watches acceleration magnitude for a free-fall followed by an\n\
                  impact. A confirmed fall starts a cancellable countdown; if nobody\n\
                  cancels, every emergency contact receives a text with the last known\n\
                  location.\n\n\
                  Modes:\n  \
                  --simulate     Built-in 50 Hz fall scenario\n  \
                  --replay PATH  JSON-lines readings from a file or '-' for stdin\n  \
                  --serve        HTTP API server mode\n\n\
                  States:\n  \
                  IDLE            - Watching for free-fall\n  \
                  IN_FREE_FALL    - Low acceleration, waiting for an impact\n  \
                  ALERT_COUNTDOWN - Fall confirmed, alert pending"
)]
struct Args {
    /// Run as HTTP API server
    #[arg(short, long)]
    serve: bool,

    /// Server address (default: 127.0.0.1:3000)
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: String,

    /// Feed a built-in fall scenario in real time
    #[arg(long)]
    simulate: bool,

    /// Cancel this long after the countdown starts (simulate/replay)
    #[arg(long)]
    cancel_after_ms: Option<u64>,

    /// Replay JSON-lines readings from a file ('-' for stdin)
    #[arg(long)]
    replay: Option<String>,

    /// Detection config JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emergency contacts JSON file (created on first save)
    #[arg(long)]
    contacts: Option<PathBuf>,

    /// Override the countdown before alerting (ms)
    #[arg(long)]
    countdown_ms: Option<u64>,

    /// Override sensitivity (0.0 - 1.0)
    #[arg(long)]
    sensitivity: Option<f64>,

    /// Send alerts through this SMS gateway webhook instead of the log
    #[arg(long)]
    webhook_url: Option<String>,

    /// Bearer token for the webhook
    #[arg(long)]
    webhook_token: Option<String>,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,

    /// Print every sample and debug logs
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(&args);

    let config = match load_config(&args) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Config error: {}", e);
            std::process::exit(2);
        }
    };

    let contacts = match &args.contacts {
        Some(path) => match ContactBook::open(path) {
            Ok(book) => Arc::new(book),
            Err(e) => {
                eprintln!("Contacts error: {}", e);
                std::process::exit(2);
            }
        },
        None => Arc::new(ContactBook::new()),
    };

    let transport: Arc<dyn Transport> = match &args.webhook_url {
        Some(url) => {
            let mut webhook = WebhookTransport::new(url.clone());
            if let Some(token) = &args.webhook_token {
                webhook = webhook.bearer_token(token.clone());
            }
            Arc::new(webhook)
        }
        None => Arc::new(LogTransport),
    };

    let narrator = BroadcastNarrator::default();
    let monitor = FallMonitor::new(config, contacts.clone(), transport, Arc::new(narrator.clone()));

    if args.serve {
        run_serve(&args, AppState { monitor, contacts, narrator }).await;
    } else if let Some(ref source) = args.replay {
        run_replay(source, &args, monitor, narrator).await;
    } else {
        if !args.simulate {
            println!("No mode given, running the simulation (see --help).");
        }
        if args.contacts.is_none() && contacts.snapshot().is_empty() {
            // Something to send to when simulating without a contacts file
            if let Err(err) = contacts.set_slot(1, Contact::new("Demo contact", "+1 555 0100")) {
                warn!(%err, "demo contact not added");
            }
        }
        run_simulate(&args, monitor, narrator).await;
    }
}

/// RUST_LOG wins; otherwise warn, or debug with --verbose (info when serving)
fn init_tracing(args: &Args) {
    let default = if args.verbose {
        "fallsentry=debug"
    } else if args.serve {
        "fallsentry=info"
    } else {
        "fallsentry=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(!args.no_color)
        .init();
}

/// File (or defaults), then command-line overrides
fn load_config(args: &Args) -> Result<ConfigStore, Box<dyn std::error::Error>> {
    let store = match &args.config {
        Some(path) => ConfigStore::load(path)?,
        None => ConfigStore::default(),
    };
    let overrides = ConfigUpdate {
        sensitivity: args.sensitivity,
        countdown_ms: args.countdown_ms,
        ..Default::default()
    };
    if overrides != ConfigUpdate::default() {
        store.set(&overrides)?;
    }
    Ok(store)
}

// =============================================================================
// MODES
// =============================================================================

/// Run the built-in scenario in real time (50 Hz)
async fn run_simulate(args: &Args, monitor: FallMonitor, narrator: BroadcastNarrator) {
    let countdown_ms = monitor.config().get().countdown_ms;
    let readings = simulated_fall(countdown_ms);

    print_header("Simulation", args.no_color);
    println!("Standing 1s, free-fall 300ms, impact, then lying still.");
    match args.cancel_after_ms {
        Some(ms) => println!("Will cancel {}ms into the countdown.", ms),
        None => println!("No cancel: the alert will be sent after {}ms.", countdown_ms),
    }
    println!();

    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(SAMPLE_PERIOD_MS));
        for reading in readings {
            ticker.tick().await;
            if tx.send(reading.to_sample()).await.is_err() {
                break;
            }
        }
    });

    feed_and_report(args, monitor, narrator, rx).await;
}

/// Replay JSON-lines readings as fast as they can be read
async fn run_replay(source: &str, args: &Args, monitor: FallMonitor, narrator: BroadcastNarrator) {
    let reader: Box<dyn BufRead + Send> = if source == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        match std::fs::File::open(source) {
            Ok(file) => Box::new(BufReader::new(file)),
            Err(e) => {
                eprintln!("Cannot open {}: {}", source, e);
                std::process::exit(1);
            }
        }
    };

    let (tx, rx) = mpsc::channel(256);
    tokio::task::spawn_blocking(move || {
        for (n, line) in reader.lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(%e, "read failed, stopping replay");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AccelReading>(&line) {
                Ok(reading) => {
                    if tx.blocking_send(reading.to_sample()).is_err() {
                        break;
                    }
                }
                Err(e) => warn!(line = n + 1, %e, "skipping malformed reading"),
            }
        }
    });

    feed_and_report(args, monitor, narrator, rx).await;
}

/// Run HTTP API server
async fn run_serve(args: &Args, state: AppState) {
    println!();
    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║  🛡  FallSentry API Server                                ║");
    println!("║  Version: {}                                          ║", VERSION);
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();

    if let Err(e) = run_server(&args.addr, Arc::new(state)).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Drive samples through the monitor, print as we go, then wait for any
/// pending alert cycle and print its report
async fn feed_and_report(
    args: &Args,
    monitor: FallMonitor,
    narrator: BroadcastNarrator,
    rx: mpsc::Receiver<Sample>,
) {
    spawn_notice_printer(&narrator, args.no_color);
    if let Some(ms) = args.cancel_after_ms {
        spawn_canceller(monitor.clone(), ms, args.no_color);
    }

    let verbose = args.verbose;
    let json = args.json;
    let no_color = args.no_color;
    let mut last_state = FallState::Idle;
    monitor
        .run_intake(rx, |output| {
            let changed = output.state.name() != last_state.name() || output.event.is_some();
            last_state = output.state;
            if verbose || json || changed {
                print_output(output, json, no_color);
            }
        })
        .await;

    let mut states = monitor.watch_state();
    if states.borrow().is_alerting() {
        info!("waiting for the pending alert cycle");
        let _ = states.wait_for(|s| !s.is_alerting()).await;
    }
    // Let the notice printer drain
    tokio::time::sleep(Duration::from_millis(50)).await;

    let stats = monitor.stats();
    println!();
    println!(
        "Session ended. Samples: {} accepted, {} dropped | Falls: {}",
        stats.samples_accepted, stats.samples_dropped, stats.falls_confirmed
    );
    match monitor.last_report() {
        Some(report) if json => println!("{}", serde_json::to_string(&report).unwrap_or_default()),
        Some(report) => print_report(&report, no_color),
        None => println!("No alert was sent."),
    }
}

fn spawn_notice_printer(narrator: &BroadcastNarrator, no_color: bool) {
    let mut notices = narrator.subscribe();
    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            if no_color {
                println!("  >> {}", notice);
            } else {
                println!("\x1b[33m  🔊 {}\x1b[0m", notice);
            }
        }
    });
}

fn spawn_canceller(monitor: FallMonitor, after_ms: u64, no_color: bool) {
    tokio::spawn(async move {
        let mut states = monitor.watch_state();
        let armed = states.wait_for(|s| s.is_alerting()).await.is_ok();
        if !armed {
            return;
        }
        tokio::time::sleep(Duration::from_millis(after_ms)).await;
        let cancelled = monitor.cancel_by_voice("cancel");
        let (color, reset) = if no_color { ("", "") } else { ("\x1b[36m", "\x1b[0m") };
        if cancelled {
            println!("{}  🗣  \"cancel\" - countdown stopped{}", color, reset);
        } else {
            println!("{}  🗣  \"cancel\" - too late, alert already sent{}", color, reset);
        }
    });
}

// =============================================================================
// SCENARIO
// =============================================================================

/// 50 Hz
const SAMPLE_PERIOD_MS: u64 = 20;

/// Standing, free-fall, impact, lying still long enough for the countdown
fn simulated_fall(countdown_ms: u64) -> Vec<AccelReading> {
    let end_ms = 1_400 + countdown_ms + 1_000;
    (0..=end_ms / SAMPLE_PERIOD_MS)
        .map(|i| {
            let t = i * SAMPLE_PERIOD_MS;
            // Small deterministic sway so the trace is not a flat line
            let sway = ((t as f64) / 170.0).sin() * 0.3;
            match t {
                0..=999 => AccelReading::new(t, sway, 0.2, STANDARD_GRAVITY + sway),
                1_000..=1_299 => AccelReading::new(t, 0.3, 0.2, 0.5 + sway.abs()),
                1_300..=1_339 => AccelReading::new(t, 14.0, 9.0, 19.0),
                _ => AccelReading::new(t, STANDARD_GRAVITY, 0.4, sway),
            }
        })
        .collect()
}

// =============================================================================
// PRINTING
// =============================================================================

fn print_header(mode: &str, no_color: bool) {
    if no_color {
        println!("========================================");
        println!("  FallSentry v{} - {}", VERSION, mode);
        println!("========================================");
    } else {
        println!("\x1b[1m╔══════════════════════════════════════════════════════════╗\x1b[0m");
        println!("\x1b[1m║           FallSentry v{} - {}                    ║\x1b[0m", VERSION, mode);
        println!("\x1b[1m╚══════════════════════════════════════════════════════════╝\x1b[0m");
    }
    println!();
}

fn print_output(output: &StateOutput, json: bool, no_color: bool) {
    if json {
        println!("{}", serde_json::to_string(output).unwrap_or_default());
    } else if no_color {
        println!("{}", output.to_parseable_string());
    } else {
        println!("{}", output.to_terminal_string());
        if output.fall_confirmed() {
            println!("\x1b[31m  ⚠ FALL CONFIRMED - say 'cancel' to stop the alert\x1b[0m");
        }
    }
}

fn print_report(report: &AlertReport, no_color: bool) {
    let (green, red, dim, reset) = if no_color {
        ("", "", "", "")
    } else {
        ("\x1b[32m", "\x1b[31m", "\x1b[90m", "\x1b[0m")
    };

    println!("┌──────────────────────────────────────────┐");
    println!("│ Alert: {:?} at {}", report.kind, report.dispatched_at.format("%H:%M:%S"));
    println!("│ {}{}{}", dim, report.message, reset);
    println!("├──────────────────────────────────────────┤");
    if report.is_empty() {
        println!("│ {}No emergency contacts configured{}", red, reset);
    }
    for outcome in &report.outcomes {
        match &outcome.error {
            None => println!("│ {}✓ {} ({}){}", green, outcome.contact.label(), outcome.contact.phone_number, reset),
            Some(err) => println!("│ {}✗ {} ({}): {}{}", red, outcome.contact.label(), outcome.contact.phone_number, err, reset),
        }
    }
    println!(
        "│ Delivered {}/{}",
        report.delivered_count(),
        report.outcomes.len()
    );
    println!("└──────────────────────────────────────────┘");
}
