//! logeye-worker: runs the detection and reporting pipeline over
//! newline-delimited JSON log records read from stdin.
//!
//! Stops on EOF, SIGINT or SIGTERM. Detections are logged and, when
//! `NOTIFY_WEBHOOK_URL` is set, posted to the webhook.

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use logeye_core::config::{load_dotenv, Config};
use logeye_core::LogRecord;
use logeye_engine::Engine;

// ── CLI ─────────────────────────────────────────────────────────────

/// Log threat-detection and analytics worker.
#[derive(Parser, Debug)]
#[command(name = "logeye-worker", version, about)]
struct Cli {
    /// Config profile (`{PROFILE}_{KEY}` env vars override `{KEY}`).
    #[arg(long, env = "LOGEYE_PROFILE")]
    profile: Option<String>,

    /// Rules directory (overrides RULES_DIR from the profile).
    #[arg(long)]
    rules_dir: Option<String>,

    /// Reload rules when files under the rules directory change.
    #[arg(long)]
    watch: bool,

    /// Validate the rule corpus and exit.
    #[arg(long)]
    check: bool,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let mut config = match &cli.profile {
        Some(profile) => Config::for_profile(profile),
        None => Config::from_env(),
    };
    if let Some(dir) = cli.rules_dir {
        config.rules.dir = dir.into();
    }
    config.rules.watch |= cli.watch;
    config.log_summary();

    if cli.check {
        let repo = logeye_rules::loader::DirectoryRepository::new(config.rules.dir.clone())
            .with_field_config(config.rules.field_config.clone());
        let corpus = logeye_rules::load_corpus(&repo)?;
        for rule in corpus.rule_list() {
            println!("{}\t{}\t{}", rule.id, rule.level, rule.title);
        }
        info!(rules = corpus.len(), "rule corpus is valid");
        return Ok(());
    }

    let engine = Engine::builder(config).start()?;

    tokio::select! {
        result = read_stdin(&engine) => {
            match result {
                Ok(records) => info!(records, "stdin closed"),
                Err(e) => warn!(error = %e, "stdin read failed"),
            }
        }
        _ = os_signal() => info!("shutdown signal received"),
    }

    engine.shutdown().await?;
    info!("logeye-worker exited cleanly");
    Ok(())
}

/// Submit one record per line until EOF. Malformed lines are skipped.
async fn read_stdin(engine: &Engine) -> anyhow::Result<u64> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut submitted = 0u64;
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let record: LogRecord = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "skipping malformed record");
                continue;
            }
        };
        engine.submit(record).await?;
        submitted += 1;
    }
    Ok(submitted)
}

/// Wait for SIGINT or SIGTERM (Unix) or Ctrl+C elsewhere.
async fn os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => {}
                    _ = sigterm.recv() => {}
                }
            }
            _ => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
