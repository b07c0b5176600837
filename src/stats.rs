//! Live console statistics for one batch run.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use colored::*;

use crate::validator::{ValidationOutcome, ValidationStatus};

/// Counter block in the shape of the bruteforce-module statistics: atomic
/// per-class counters plus a map of recurring error details. `record` is
/// invoked once per completed outcome from the batch aggregation loop.
pub struct BatchStats {
    total: u64,
    tested: AtomicU64,
    working: AtomicU64,
    auth_failed: AtomicU64,
    protocol_errors: AtomicU64,
    connection_errors: AtomicU64,
    invalid: AtomicU64,
    start_time: Instant,
    error_details: Mutex<HashMap<String, usize>>,
}

impl BatchStats {
    pub fn new(total: usize) -> Self {
        Self {
            total: total as u64,
            tested: AtomicU64::new(0),
            working: AtomicU64::new(0),
            auth_failed: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            invalid: AtomicU64::new(0),
            start_time: Instant::now(),
            error_details: Mutex::new(HashMap::new()),
        }
    }

    pub fn record(&self, outcome: &ValidationOutcome) {
        self.tested.fetch_add(1, Ordering::Relaxed);
        match outcome.status {
            ValidationStatus::Success => {
                self.working.fetch_add(1, Ordering::Relaxed);
            }
            ValidationStatus::AuthFailed => {
                self.auth_failed.fetch_add(1, Ordering::Relaxed);
            }
            ValidationStatus::ProtocolError => {
                self.protocol_errors.fetch_add(1, Ordering::Relaxed);
                self.record_error_detail(&outcome.detail);
            }
            ValidationStatus::ConnectionError => {
                self.connection_errors.fetch_add(1, Ordering::Relaxed);
                self.record_error_detail(&outcome.detail);
            }
            ValidationStatus::InvalidFormat => {
                self.invalid.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn record_error_detail(&self, msg: &str) {
        if let Ok(mut guard) = self.error_details.lock() {
            *guard.entry(msg.to_string()).or_insert(0) += 1;
        }
    }

    pub fn successes(&self) -> u64 {
        self.working.load(Ordering::Relaxed)
    }

    pub fn print_progress(&self) {
        let tested = self.tested.load(Ordering::Relaxed);
        let working = self.working.load(Ordering::Relaxed);
        let auth = self.auth_failed.load(Ordering::Relaxed);
        let conn = self.connection_errors.load(Ordering::Relaxed);
        let proto = self.protocol_errors.load(Ordering::Relaxed);
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            tested as f64 / elapsed
        } else {
            0.0
        };

        print!(
            "\r{} {}/{} tested | {} OK | {} auth | {} conn | {} proto | {:.1}/s    ",
            "[Progress]".cyan(),
            tested.to_string().bold(),
            self.total,
            working.to_string().green(),
            auth,
            conn,
            proto.to_string().red(),
            rate
        );
        let _ = std::io::stdout().flush();
    }

    pub fn print_final(&self) {
        println!();
        let tested = self.tested.load(Ordering::Relaxed);
        let working = self.working.load(Ordering::Relaxed);
        let auth = self.auth_failed.load(Ordering::Relaxed);
        let conn = self.connection_errors.load(Ordering::Relaxed);
        let proto = self.protocol_errors.load(Ordering::Relaxed);
        let invalid = self.invalid.load(Ordering::Relaxed);
        let elapsed = self.start_time.elapsed().as_secs_f64();

        println!("{}", "=== Statistics ===".bold());
        println!("  Lines tested:      {}", tested);
        println!("  Working:           {}", working.to_string().green().bold());
        println!("  Bad credentials:   {}", auth);
        println!("  Connection errors: {}", conn.to_string().red());
        println!("  Protocol errors:   {}", proto);
        if invalid > 0 {
            println!("  Invalid lines:     {}", invalid);
        }
        println!("  Elapsed time:      {:.2}s", elapsed);
        if elapsed > 0.0 {
            println!("  Average rate:      {:.1} lines/s", tested as f64 / elapsed);
        }

        if let Ok(details) = self.error_details.lock() {
            if !details.is_empty() {
                println!("\n{}", "Top errors:".bold());
                let mut sorted: Vec<_> = details.iter().collect();
                sorted.sort_by(|a, b| b.1.cmp(a.1));
                for (msg, count) in sorted.into_iter().take(5) {
                    println!("  - {}: {}", msg.yellow(), count);
                }
            }
        }
    }
}
