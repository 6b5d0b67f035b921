//! Console reporting of training progress.
//!
//! Milestones are printed as `[HH:MM:SS.mmm +delta] message`, where the
//! stamp is the time since the run started and delta the time since the
//! previous line, and a progress bar counts finished restarts.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::TimeDelta;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use qcc_ml::{DiagnosticSink, LoggingConfig, TrainingEvent};

/// Prints timestamped training events and drives a restart progress bar.
#[derive(Clone)]
pub struct ConsoleSink {
    bar: ProgressBar,
    start: Instant,
    last: Arc<Mutex<Instant>>,
    timestamps: bool,
    report_interval: usize,
}

impl ConsoleSink {
    /// Create a sink for a run with `restarts` seeds.
    pub fn new(restarts: usize, logging: &LoggingConfig) -> Result<Self> {
        let bar = ProgressBar::new(restarts as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} restarts {msg}")?
                .progress_chars("=> "),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        let start = Instant::now();
        Ok(Self {
            bar,
            start,
            last: Arc::new(Mutex::new(start)),
            timestamps: logging.timestamps,
            report_interval: logging.report_interval,
        })
    }

    /// Clear the bar after a completed run.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    /// Leave the bar in place with a failure marker.
    pub fn abandon(&self) {
        self.bar.abandon_with_message(style("timed out").red().to_string());
    }

    fn should_print(&self, event: &TrainingEvent) -> bool {
        if !self.timestamps {
            return false;
        }
        match event {
            TrainingEvent::Iteration { iteration, .. } => {
                self.report_interval > 0 && (iteration + 1) % self.report_interval == 0
            }
            _ => true,
        }
    }

    fn print(&self, message: &str) {
        let now = Instant::now();
        let delta = {
            let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
            let delta = now.duration_since(*last);
            *last = now;
            delta
        };
        let line = format!(
            "{} {message}",
            style(format!(
                "[{} +{:.3}s]",
                format_elapsed(now.duration_since(self.start)),
                delta.as_secs_f64()
            ))
            .dim()
        );
        self.bar.suspend(|| println!("{line}"));
    }
}

/// Render a run duration as `HH:MM:SS.mmm`.
fn format_elapsed(elapsed: Duration) -> String {
    let elapsed = TimeDelta::from_std(elapsed).unwrap_or_else(|_| TimeDelta::zero());
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        elapsed.num_hours(),
        elapsed.num_minutes() % 60,
        elapsed.num_seconds() % 60,
        elapsed.num_milliseconds() % 1000
    )
}

impl DiagnosticSink for ConsoleSink {
    fn on_event(&self, event: &TrainingEvent) {
        if let TrainingEvent::RestartFinished { .. } = event {
            self.bar.inc(1);
        }
        if self.should_print(event) {
            self.print(&event.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iteration(iteration: usize) -> TrainingEvent {
        TrainingEvent::Iteration {
            restart: 0,
            iteration,
            loss: 0.5,
            learning_rate: 0.1,
        }
    }

    #[test]
    fn test_report_interval_filters_iterations() {
        let logging = LoggingConfig {
            report_interval: 5,
            ..LoggingConfig::default()
        };
        let sink = ConsoleSink::new(1, &logging).unwrap();
        assert!(!sink.should_print(&iteration(0)));
        assert!(sink.should_print(&iteration(4)));
        assert!(sink.should_print(&TrainingEvent::RestartStarted {
            restart: 0,
            initial_loss: 1.0
        }));
        sink.finish();
    }

    #[test]
    fn test_quiet_without_timestamps() {
        let logging = LoggingConfig {
            timestamps: false,
            ..LoggingConfig::default()
        };
        let sink = ConsoleSink::new(1, &logging).unwrap();
        assert!(!sink.should_print(&iteration(9)));
        sink.finish();
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::ZERO), "00:00:00.000");
        assert_eq!(format_elapsed(Duration::from_millis(3_723_045)), "01:02:03.045");
        assert_eq!(format_elapsed(Duration::from_micros(59_999_999)), "00:00:59.999");
    }

    #[test]
    fn test_stamps_measure_from_run_start() {
        let sink = ConsoleSink::new(1, &LoggingConfig::default()).unwrap();
        let before = *sink.last.lock().unwrap();
        assert_eq!(before, sink.start);
        sink.print("restart 0 started");
        assert!(*sink.last.lock().unwrap() >= sink.start);
        sink.finish();
    }

    #[test]
    fn test_restart_finished_advances_bar() {
        let sink = ConsoleSink::new(2, &LoggingConfig::default()).unwrap();
        sink.on_event(&TrainingEvent::RestartFinished {
            restart: 0,
            loss: 0.1,
            training_misses: 0,
            iterations: 3,
            converged: true,
        });
        assert_eq!(sink.bar.position(), 1);
        sink.finish();
    }
}
