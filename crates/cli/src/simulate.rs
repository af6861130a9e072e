//! Demonstration driver: prints allowed/denied decisions for a few clients

use colored::{ColoredString, Colorize};
use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;
use tabled::{Table, Tabled};
use tokengate_core::{Decision, Limiter};

/// Simulation plan
pub struct SimulateArgs {
    pub clients: Vec<String>,
    pub requests: usize,
    pub gap: Duration,
    pub wait: Duration,
}

#[derive(Tabled, Default)]
struct ClientSummary {
    client: String,
    allowed: usize,
    denied: usize,
}

/// Run the scripted demo
///
/// The first client sends `requests` spaced `gap` apart, waits `wait`,
/// then sends one more. Every other client then sends capacity + 1
/// back-to-back requests, showing its quota is untouched by the first.
pub fn run(limiter: &Limiter, args: &SimulateArgs) {
    let capacity = limiter.policy().capacity() as usize;
    let mut tally: BTreeMap<String, ClientSummary> = BTreeMap::new();

    let mut record = |client: &str, label: String, decision: Decision| {
        println!("{} for {}: {}", label, client, paint(decision));
        let row = tally
            .entry(client.to_string())
            .or_insert_with(|| ClientSummary {
                client: client.to_string(),
                ..Default::default()
            });
        if decision.is_allowed() {
            row.allowed += 1;
        } else {
            row.denied += 1;
        }
    };

    let Some((first, rest)) = args.clients.split_first() else {
        println!("{}", "No clients to simulate".yellow());
        return;
    };

    println!(
        "{}",
        format!("Simulating requests for {} (N={}):", first, capacity)
            .cyan()
            .bold()
    );
    for i in 0..args.requests {
        record(first, format!("Request {}", i + 1), limiter.decide(first.as_str()));
        thread::sleep(args.gap);
    }

    println!();
    println!("Waiting {:?} for tokens to refill for {}...", args.wait, first);
    thread::sleep(args.wait);
    record(
        first,
        format!("Request after {:?} wait", args.wait),
        limiter.decide(first.as_str()),
    );

    for client in rest {
        println!();
        println!(
            "{}",
            format!("Simulating requests for {} (N={}):", client, capacity)
                .cyan()
                .bold()
        );
        for i in 0..=capacity {
            record(client, format!("Request {}", i + 1), limiter.decide(client.as_str()));
        }
    }

    println!();
    let rows: Vec<ClientSummary> = tally.into_values().collect();
    println!("{}", Table::new(rows));
}

fn paint(decision: Decision) -> ColoredString {
    match decision {
        Decision::Allowed => decision.as_str().green(),
        Decision::Denied => decision.as_str().red(),
    }
}
