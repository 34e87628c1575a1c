//! Simulation export
//!
//! Appends simulated steps and correlation records as JSON Lines so repeated
//! runs accumulate in one file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::Local;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::simulation::{CorrelationRecord, CorrelationTracker, SimulationHistory, SimulationStep};

#[derive(Debug, Serialize)]
pub struct StepEvent<'a> {
    pub timestamp: String,
    pub session: &'a str,
    pub kind: &'static str,
    pub slippage_pct: Decimal,
    pub x_factor: Decimal,
    #[serde(flatten)]
    pub step: &'a SimulationStep,
}

#[derive(Debug, Serialize)]
pub struct CorrelationEvent<'a> {
    pub timestamp: String,
    pub session: &'a str,
    pub kind: &'static str,
    pub change_pct: Decimal,
    #[serde(flatten)]
    pub record: &'a CorrelationRecord,
}

/// JSON Lines writer for simulation output
pub struct HistoryExporter<W: Write> {
    writer: W,
}

impl HistoryExporter<BufWriter<File>> {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> HistoryExporter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    fn write_line<T: Serialize>(&mut self, event: &T) -> std::io::Result<()> {
        let json = serde_json::to_string(event).map_err(std::io::Error::other)?;
        writeln!(self.writer, "{}", json)
    }

    /// One line per step, in history order
    pub fn export_history(&mut self, session: &str, history: &SimulationHistory) -> std::io::Result<usize> {
        let timestamp = Local::now().to_rfc3339();
        let mut written = 0;
        for step in history.all_records() {
            self.write_line(&StepEvent {
                timestamp: timestamp.clone(),
                session,
                kind: "step",
                slippage_pct: step.slippage_pct().map_err(std::io::Error::other)?,
                x_factor: step.x_factor().map_err(std::io::Error::other)?,
                step,
            })?;
            written += 1;
        }
        self.writer.flush()?;
        Ok(written)
    }

    pub fn export_correlation(&mut self, session: &str, tracker: &CorrelationTracker) -> std::io::Result<usize> {
        let timestamp = Local::now().to_rfc3339();
        let mut written = 0;
        for record in tracker.records() {
            self.write_line(&CorrelationEvent {
                timestamp: timestamp.clone(),
                session,
                kind: "correlation",
                change_pct: record.change_pct().map_err(std::io::Error::other)?,
                record,
            })?;
            written += 1;
        }
        self.writer.flush()?;
        Ok(written)
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
