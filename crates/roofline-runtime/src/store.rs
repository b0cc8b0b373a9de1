//! Append-only result store.
//!
//! Two tables, each a JSON-lines file in the store directory:
//!
//! | table            | primary key                   |
//! |------------------|-------------------------------|
//! | `event_averages` | `(run_id, subject, metric)`   |
//! | `event_counts`   | `(sample_id, metric)`         |
//!
//! Inserting a row whose key already exists fails with
//! [`Error::DuplicateRow`]. Rows are never updated or deleted.

use roofline_analysis::MetricTable;
use roofline_core::{AggregateRecord, Error, Result, RunId, SubjectId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

pub const EVENT_AVERAGES: &str = "event_averages";
pub const EVENT_COUNTS: &str = "event_counts";

/// Aggregate of one metric for one subject in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventAverageRow {
    pub run_id: RunId,
    pub repetitions: usize,
    pub subject: SubjectId,
    pub preset: String,
    pub metric: String,
    #[serde(deserialize_with = "roofline_core::nan::deserialize")]
    pub average: f64,
    #[serde(deserialize_with = "roofline_core::nan::deserialize")]
    pub median: f64,
    #[serde(deserialize_with = "roofline_core::nan::deserialize")]
    pub variance: f64,
    #[serde(deserialize_with = "roofline_core::nan::deserialize")]
    pub stddev: f64,
    pub stddev_pct: f64,
    #[serde(default)]
    pub time: Option<f64>,
}

impl EventAverageRow {
    pub fn from_record(
        run_id: RunId,
        repetitions: usize,
        preset: &str,
        record: &AggregateRecord,
    ) -> Self {
        Self {
            run_id,
            repetitions,
            subject: record.subject.clone(),
            preset: preset.to_string(),
            metric: record.metric.clone(),
            average: record.mean,
            median: record.median,
            variance: record.variance,
            stddev: record.stddev,
            stddev_pct: record.stddev_pct,
            time: record.time,
        }
    }

    fn key(&self) -> String {
        format!("{}/{}/{}", self.run_id, self.subject, self.metric)
    }
}

/// One raw counter total of one trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCountRow {
    /// Report name, or a run/subject/trial derived id for inline reports.
    pub sample_id: String,
    /// Report file, empty when the report arrived inline.
    pub sample_path: String,
    pub run_id: RunId,
    pub subject: SubjectId,
    pub preset: String,
    pub metric: String,
    #[serde(deserialize_with = "roofline_core::nan::deserialize")]
    pub raw_value: f64,
    #[serde(default)]
    pub time: Option<f64>,
}

impl EventCountRow {
    fn key(&self) -> String {
        format!("{}/{}", self.sample_id, self.metric)
    }
}

/// JSON-lines tables in one directory.
#[derive(Debug)]
pub struct ResultStore {
    dir: PathBuf,
    average_keys: BTreeSet<String>,
    count_keys: BTreeSet<String>,
}

impl ResultStore {
    /// Open (creating if needed) the store in `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let average_keys = read_rows::<EventAverageRow>(&table_path(&dir, EVENT_AVERAGES))?
            .iter()
            .map(EventAverageRow::key)
            .collect();
        let count_keys = read_rows::<EventCountRow>(&table_path(&dir, EVENT_COUNTS))?
            .iter()
            .map(EventCountRow::key)
            .collect();

        Ok(Self {
            dir,
            average_keys,
            count_keys,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn insert_average(&mut self, row: &EventAverageRow) -> Result<()> {
        self.insert_batch(std::slice::from_ref(row), &[])
    }

    pub fn insert_count(&mut self, row: &EventCountRow) -> Result<()> {
        self.insert_batch(&[], std::slice::from_ref(row))
    }

    /// Insert rows all-or-nothing. Every key is checked against the store
    /// and within the batch before anything is appended.
    pub fn insert_batch(
        &mut self,
        averages: &[EventAverageRow],
        counts: &[EventCountRow],
    ) -> Result<()> {
        let average_keys = fresh_keys(
            EVENT_AVERAGES,
            &self.average_keys,
            averages.iter().map(EventAverageRow::key),
        )?;
        let count_keys = fresh_keys(
            EVENT_COUNTS,
            &self.count_keys,
            counts.iter().map(EventCountRow::key),
        )?;

        append_rows(&table_path(&self.dir, EVENT_AVERAGES), averages)?;
        append_rows(&table_path(&self.dir, EVENT_COUNTS), counts)?;

        self.average_keys.extend(average_keys);
        self.count_keys.extend(count_keys);
        Ok(())
    }

    /// Average rows, optionally restricted to one run.
    pub fn averages(&self, run_id: Option<RunId>) -> Result<Vec<EventAverageRow>> {
        let rows = read_rows::<EventAverageRow>(&table_path(&self.dir, EVENT_AVERAGES))?;
        Ok(rows
            .into_iter()
            .filter(|row| run_id.map_or(true, |id| row.run_id == id))
            .collect())
    }

    /// Count rows, optionally restricted to one run.
    pub fn counts(&self, run_id: Option<RunId>) -> Result<Vec<EventCountRow>> {
        let rows = read_rows::<EventCountRow>(&table_path(&self.dir, EVENT_COUNTS))?;
        Ok(rows
            .into_iter()
            .filter(|row| run_id.map_or(true, |id| row.run_id == id))
            .collect())
    }

    /// Most recent run with stored averages.
    pub fn latest_run(&self) -> Result<Option<RunId>> {
        Ok(self.averages(None)?.iter().map(|row| row.run_id).max())
    }

    /// Subject × metric averages of one run, plus a `time` column holding
    /// each subject's mean trial time.
    pub fn metric_table(&self, run_id: RunId) -> Result<MetricTable> {
        let rows = self.averages(Some(run_id))?;

        let mut table = MetricTable::new();
        let mut times: BTreeMap<SubjectId, Vec<f64>> = BTreeMap::new();
        for row in &rows {
            table.insert(row.subject.clone(), row.metric.as_str(), row.average);
            if let Some(time) = row.time {
                times.entry(row.subject.clone()).or_default().push(time);
            }
        }
        for (subject, values) in times {
            table.insert(subject, "time", roofline_analysis::aggregate::finite_mean(&values));
        }

        Ok(table)
    }
}

fn table_path(dir: &Path, table: &str) -> PathBuf {
    dir.join(format!("{}.jsonl", table))
}

fn fresh_keys(
    table: &'static str,
    existing: &BTreeSet<String>,
    keys: impl Iterator<Item = String>,
) -> Result<BTreeSet<String>> {
    let mut fresh = BTreeSet::new();
    for key in keys {
        if existing.contains(&key) || fresh.contains(&key) {
            return Err(Error::DuplicateRow { table, key });
        }
        fresh.insert(key);
    }
    Ok(fresh)
}

/// Serialize every row first so a bad row appends nothing.
fn append_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }

    let mut lines = String::new();
    for row in rows {
        lines.push_str(&serde_json::to_string(row)?);
        lines.push('\n');
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(lines.as_bytes())?;
    Ok(())
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let mut rows = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        rows.push(serde_json::from_str(&line)?);
    }
    Ok(rows)
}
