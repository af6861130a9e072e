//! Concurrency stress check: many threads hit one client of a fresh limiter

use colored::Colorize;
use std::sync::Barrier;
use std::thread;
use std::time::{Duration, Instant};
use tabled::{Table, Tabled};
use tokengate_core::Limiter;
use tracing::info;

#[derive(Debug, Tabled)]
pub struct BurstReport {
    pub threads: usize,
    pub allowed: usize,
    pub denied: usize,
    #[tabled(display_with = "display_wall_time")]
    pub wall_time: Duration,
    pub bound: usize,
}

impl BurstReport {
    /// `allowed <= C + ceil(R * wall_time)`
    pub fn within_bound(&self) -> bool {
        self.allowed <= self.bound
    }
}

fn display_wall_time(wall_time: &Duration) -> String {
    format!("{:.3} ms", wall_time.as_secs_f64() * 1000.0)
}

/// Fire `threads` simultaneous decisions for `client`
pub fn run(limiter: &Limiter, client: &str, threads: usize) -> BurstReport {
    let barrier = Barrier::new(threads);

    let start = Instant::now();
    let allowed = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    limiter.check(client)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or(false))
            .filter(|allowed| *allowed)
            .count()
    });
    // Spawn and join included, so the slack is generous rather than tight
    let wall_time = start.elapsed();

    let policy = limiter.policy();
    // Refill earned while the burst was in flight
    let refill_slack = (policy.rate() * wall_time.as_secs_f64()).ceil() as usize;
    let report = BurstReport {
        threads,
        allowed,
        denied: threads - allowed,
        wall_time,
        bound: policy.capacity() as usize + refill_slack,
    };

    info!(
        threads = report.threads,
        allowed = report.allowed,
        bound = report.bound,
        "Burst finished"
    );
    report
}

pub fn print(report: &BurstReport) {
    println!("{}", Table::new([report]));
    if report.within_bound() {
        println!("{}", "✓ Token-bucket bound held".green().bold());
    } else {
        println!("{}", "✗ Token-bucket bound violated".red().bold());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_respects_bound() {
        let limiter = Limiter::new(100);
        let report = run(&limiter, "burst-client", 200);

        assert_eq!(report.allowed + report.denied, 200);
        assert!(report.allowed >= 100, "full bucket should admit 100, got {}", report.allowed);
        assert!(report.within_bound(), "{report:?}");
    }
}
