//! Progress reporting from live session events

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;

/// Receives live session events in publication order.
pub trait SessionProgress: Send + Sync {
    fn on_event(&self, event_type: &str, payload: &Value);
}

fn text<'a>(payload: &'a Value, key: &str) -> &'a str {
    payload.get(key).and_then(Value::as_str).unwrap_or("?")
}

fn phase_label(payload: &Value) -> String {
    let index = payload
        .get("phase_index")
        .and_then(Value::as_u64)
        .map(|i| i + 1)
        .unwrap_or(0);
    format!("Phase {}: {}", index, text(payload, "phase"))
}

/// Reports progress with one spinner per phase
pub struct ProgressReporter {
    multi: MultiProgress,
    phase_bar: Mutex<Option<ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            phase_bar: Mutex::new(None),
        }
    }

    fn phase_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold.cyan} [{pos} turns] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionProgress for ProgressReporter {
    fn on_event(&self, event_type: &str, payload: &Value) {
        let mut bar = self.phase_bar.lock().unwrap_or_else(|p| p.into_inner());
        match event_type {
            "phase_started" => {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(Self::phase_style());
                pb.set_prefix(phase_label(payload));
                pb.set_message(format!(
                    "{}, gate {}",
                    text(payload, "topology"),
                    text(payload, "gate")
                ));
                pb.enable_steady_tick(Duration::from_millis(120));
                *bar = Some(pb);
            }
            "message" => {
                if let Some(pb) = bar.as_ref() {
                    pb.inc(1);
                    pb.set_message(format!(
                        "{} {}",
                        text(payload, "sender"),
                        text(payload, "message_type")
                    ));
                }
            }
            "negotiation" => {
                if let Some(pb) = bar.as_ref() {
                    pb.set_message(format!("negotiation {}", text(payload, "outcome")));
                }
            }
            "phase_completed" => {
                if let Some(pb) = bar.take() {
                    let status = match text(payload, "status") {
                        "passed" => "passed".green(),
                        "partial" => "partial".yellow(),
                        other => other.red(),
                    };
                    pb.finish_with_message(format!("{}", status));
                }
            }
            "session_finished" => {
                if let Some(pb) = bar.take() {
                    pb.abandon_with_message(format!("{}", text(payload, "status").red()));
                }
            }
            _ => {}
        }
    }
}

/// Simple text-based progress (no fancy UI)
pub struct SimpleProgress;

impl SessionProgress for SimpleProgress {
    fn on_event(&self, event_type: &str, payload: &Value) {
        match event_type {
            "phase_started" => {
                println!(
                    "{} {} ({})",
                    "->".cyan(),
                    phase_label(payload).bold(),
                    text(payload, "topology")
                );
            }
            "message" => {
                println!(
                    "  {} {} {}",
                    "v".green(),
                    text(payload, "sender"),
                    text(payload, "message_type")
                );
            }
            "gate_decision" => {
                let decision = payload
                    .pointer("/decision/decision")
                    .and_then(Value::as_str)
                    .unwrap_or("?");
                println!("  gate {}", decision);
            }
            "phase_completed" => println!(),
            _ => {}
        }
    }
}
