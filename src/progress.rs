//! Progress display for a graph walk.
//!
//! The walker never blocks on progress: events go through a bounded
//! channel and a reporter thread drains it into an `indicatif` bar.

use colored::Colorize;
use converge::{Message, Phase};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

/// Buffered events before the walker starts dropping them
const CHANNEL_CAPACITY: usize = 256;

/// Progress bar for `len` nodes
pub fn bar(len: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb.set_message(message.to_string());
    pb
}

/// Thread rendering progress events
pub struct Reporter {
    handle: JoinHandle<Tally>,
}

/// Outcomes seen on the progress stream
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Reporter {
    /// Start the reporter; the walk must drop every sender for it to finish
    pub fn spawn(total: usize, quiet: bool) -> (SyncSender<Message>, Self) {
        let (tx, rx) = mpsc::sync_channel(CHANNEL_CAPACITY);
        let pb = if quiet {
            ProgressBar::hidden()
        } else {
            bar(total as u64, "Starting")
        };
        let handle = thread::spawn(move || drain(&rx, &pb));
        (tx, Self { handle })
    }

    /// Wait for the stream to close
    pub fn finish(self) -> Tally {
        self.handle.join().unwrap_or_else(|_| {
            log::warn!("progress reporter panicked");
            Tally::default()
        })
    }
}

fn drain(rx: &Receiver<Message>, pb: &ProgressBar) -> Tally {
    let mut tally = Tally::default();
    for message in rx {
        match message.phase {
            Phase::Started => pb.set_message(format!("{}", message.node_id)),
            Phase::Succeeded => {
                tally.succeeded += 1;
                pb.inc(1);
                pb.set_message(format!("{} {}", "✓".green(), message.node_id));
            }
            Phase::Skipped => {
                tally.skipped += 1;
                pb.inc(1);
            }
            Phase::Failed => {
                tally.failed += 1;
                pb.inc(1);
                let detail = message
                    .status
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                pb.suspend(|| {
                    println!("  {} {} ({})", "✗".red(), message.node_id, detail);
                });
            }
        }
    }
    pb.finish_and_clear();
    tally
}
