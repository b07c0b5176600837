use std::fs;
use std::io::Read;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::*;

mod cli;
mod cline;
mod crypto;
mod hadu;
mod handshake;
mod runner;
mod stats;
mod validator;

#[cfg(test)]
mod testsupport;

use crate::cline::Credential;
use crate::runner::{BatchRunner, RunnerConfig};
use crate::stats::BatchStats;
use crate::validator::ValidationStatus;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let text = match &args.input {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
        }
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            buf
        }
    };

    let parsed = cline::parse_text(&text);
    if parsed.credentials.is_empty() {
        bail!("no C-lines found in input");
    }
    println!(
        "{}",
        format!(
            "[*] Found {} C-line(s), skipped {} line(s)",
            parsed.credentials.len(),
            parsed.skipped
        )
        .cyan()
    );

    let credentials = cline::order_credentials(parsed.credentials, args.shuffle);

    let config = RunnerConfig {
        concurrency: args.concurrency,
        io_timeout: Duration::from_secs(args.timeout),
    };
    println!(
        "{}",
        format!(
            "[*] Testing {} line(s) with {} worker(s), {}s timeout",
            credentials.len(),
            config.concurrency,
            args.timeout
        )
        .cyan()
    );

    let stats = BatchStats::new(credentials.len());
    let verbose = args.verbose;
    let batch = BatchRunner::new(config)
        .run(credentials, |outcome, _completed, _total| {
            stats.record(outcome);
            if verbose {
                let line = format!(
                    "\r[{}] {} ({})",
                    outcome.status, outcome.credential, outcome.detail
                );
                match outcome.status {
                    ValidationStatus::Success => println!("{}", line.green().bold()),
                    ValidationStatus::AuthFailed => println!("{}", line.yellow()),
                    _ => println!("{}", line.red()),
                }
            }
            stats.print_progress();
        })
        .await;
    stats.print_final();

    println!();
    for outcome in batch.outcomes() {
        if outcome.status.is_success() {
            println!("{}", format!("[+] {}", outcome.credential).green().bold());
        } else {
            println!(
                "{}",
                format!(
                    "[-] {}  ({}: {})",
                    outcome.credential, outcome.status, outcome.detail
                )
                .dimmed()
            );
        }
    }
    if stats.successes() == 0 {
        println!("{}", "[-] No working C-lines found".yellow());
    }

    let entries: Vec<(&Credential, bool)> = batch
        .outcomes()
        .filter(|outcome| !args.omit_failed || outcome.status.is_success())
        .map(|outcome| (&outcome.credential, outcome.status.is_success()))
        .collect();
    let rendered = hadu::render(entries);

    match &args.output {
        Some(path) => {
            fs::write(path, &rendered).with_context(|| format!("writing {}", path.display()))?;
            println!(
                "{}",
                format!("[*] Hadu entries written to {}", path.display()).cyan()
            );
        }
        None => {
            println!("\n{}", "=== Hadu entries ===".bold());
            print!("{}", rendered);
        }
    }

    Ok(())
}
