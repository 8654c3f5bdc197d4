use std::io::{self, Write};

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use timepiece::{upcoming, FixedClock, Registry, TimeSpecGrammar};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "timepiece")]
#[command(version)]
#[command(about = "Evaluate timepiece time specifications", long_about = None)]
struct Cli {
    /// The time spec, e.g. "now() & interval(every:amount(num:5,size:minute))"
    #[arg(required_unless_present = "list_sections")]
    spec: Option<String>,

    /// Evaluate as if it were this instant (RFC 3339). Defaults to the system clock.
    #[arg(long, value_parser = parse_instant)]
    at: Option<DateTime<Utc>>,

    /// How many upcoming occurrences to list
    #[arg(short = 'n', long, default_value_t = 5)]
    count: usize,

    /// IANA timezone for the local rendering
    #[arg(short, long, default_value = "UTC")]
    timezone: String,

    /// Seed for range(...) picks
    #[arg(long)]
    seed: Option<u64>,

    /// Print occurrences as JSON
    #[arg(long)]
    json: bool,

    /// Report whether this instant (RFC 3339) passes the spec's filters instead of listing
    #[arg(long, value_parser = parse_instant)]
    check: Option<DateTime<Utc>>,

    /// Accept specs that cannot name a start, e.g. a bare filter(...)
    #[arg(long)]
    no_validate: bool,

    /// List the known section kinds and exit
    #[arg(long)]
    list_sections: bool,
}

fn parse_instant(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 instant: {e}"))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let mut out = io::stdout().lock();

    if cli.list_sections {
        for name in Registry::shared().names() {
            writeln!(out, "{name}")?;
        }
        return Ok(());
    }

    let text = cli.spec.as_deref().unwrap_or_default();
    let now = cli.at.unwrap_or_else(Utc::now);
    let mut grammar = TimeSpecGrammar::new().with_clock(FixedClock(now));
    if let Some(seed) = cli.seed {
        grammar = grammar.with_seed(seed);
    }

    let spec = if cli.no_validate {
        grammar.parse_unvalidated(text)
    } else {
        grammar.parse(text)
    }
    .with_context(|| format!("Failed to parse time spec '{text}'"))?;
    tracing::info!(spec = %spec, "parsed");

    if let Some(instant) = cli.check {
        let accepted = spec.is_filtered(instant);
        if cli.json {
            let report = serde_json::json!({
                "instant": instant.to_rfc3339(),
                "filtered": accepted,
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        } else {
            writeln!(out, "{accepted}")?;
        }
        return Ok(());
    }

    let occurrences = upcoming(&spec, now, cli.count, &cli.timezone)
        .with_context(|| format!("Failed to list occurrences of '{text}'"))?;

    if cli.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&occurrences)?)?;
    } else {
        for occurrence in &occurrences {
            if cli.timezone == "UTC" {
                writeln!(out, "{}", occurrence.utc)?;
            } else {
                writeln!(
                    out,
                    "{} ({} {})",
                    occurrence.local, occurrence.timezone, occurrence.utc_offset
                )?;
            }
        }
    }
    Ok(())
}
