//! Subject × metric tables.

use crate::correlate::SubjectValues;
use roofline_core::{AggregateRecord, Error, Result, SubjectId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Name of the subject column in CSV tables.
pub const SUBJECT_COLUMN: &str = "benchmark";

/// Numeric metric values per subject.
///
/// Columns keep their first-seen order; subjects are kept sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricTable {
    columns: Vec<String>,
    rows: BTreeMap<SubjectId, BTreeMap<String, f64>>,
}

impl MetricTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(subject, metric, value)` triples.
    pub fn from_rows<S, M, I>(rows: I) -> Self
    where
        S: Into<SubjectId>,
        M: Into<String>,
        I: IntoIterator<Item = (S, M, f64)>,
    {
        let mut table = Self::new();
        for (subject, metric, value) in rows {
            table.insert(subject, metric, value);
        }
        table
    }

    /// Table of the mean of each aggregate record.
    pub fn from_averages<'a>(records: impl IntoIterator<Item = &'a AggregateRecord>) -> Self {
        Self::from_rows(
            records
                .into_iter()
                .map(|r| (r.subject.clone(), r.metric.clone(), r.mean)),
        )
    }

    /// Parse CSV text whose first column is `benchmark`.
    ///
    /// Empty and `NaN` cells become NaN. Columns with any other non-numeric
    /// cell are dropped.
    pub fn from_csv_str(text: &str) -> Result<Self> {
        let mut lines = text.lines().filter(|line| !line.trim().is_empty());

        let header = lines
            .next()
            .ok_or_else(|| Error::InvalidSeries("CSV table has no header".into()))?;
        let names: Vec<String> = split_csv_line(header);

        match names.first() {
            Some(first) if first == SUBJECT_COLUMN => {}
            _ => {
                return Err(Error::InvalidSeries(format!(
                    "first CSV column must be '{}'",
                    SUBJECT_COLUMN
                )))
            }
        }

        let mut cells: Vec<(String, Vec<String>)> = Vec::new();
        for line in lines {
            let mut fields = split_csv_line(line).into_iter();
            let subject = fields.next().unwrap_or_default();
            cells.push((subject, fields.collect()));
        }

        let mut table = Self::new();
        for (col, name) in names.iter().enumerate().skip(1) {
            let parsed: Option<Vec<f64>> = cells
                .iter()
                .map(|(_, fields)| parse_cell(fields.get(col - 1).map(String::as_str)))
                .collect();

            let Some(values) = parsed else {
                log::debug!("dropping non-numeric column '{}'", name);
                continue;
            };

            table.add_column(name);
            for ((subject, _), value) in cells.iter().zip(values) {
                table.insert(subject.as_str(), name.as_str(), value);
            }
        }

        Ok(table)
    }

    pub fn load_csv(path: &Path) -> Result<Self> {
        Self::from_csv_str(&fs::read_to_string(path)?)
    }

    /// Write the table as CSV with `benchmark` as the first column.
    /// Names holding a comma or quote are quoted.
    pub fn write_csv(&self, out: &mut dyn Write) -> Result<()> {
        let header: Vec<String> = self.columns.iter().map(|c| quote_field(c)).collect();
        writeln!(out, "{},{}", SUBJECT_COLUMN, header.join(","))?;
        for (subject, row) in &self.rows {
            let cells: Vec<String> = self
                .columns
                .iter()
                .map(|c| row.get(c).map_or_else(String::new, |v| format_value(*v)))
                .collect();
            writeln!(out, "{},{}", quote_field(subject.as_str()), cells.join(","))?;
        }
        Ok(())
    }

    pub fn insert(&mut self, subject: impl Into<SubjectId>, metric: impl Into<String>, value: f64) {
        let metric = metric.into();
        self.add_column(&metric);
        self.rows
            .entry(subject.into())
            .or_default()
            .insert(metric, value);
    }

    fn add_column(&mut self, name: &str) {
        if !self.columns.iter().any(|c| c == name) {
            self.columns.push(name.to_string());
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn subjects(&self) -> impl Iterator<Item = &SubjectId> {
        self.rows.keys()
    }

    pub fn get(&self, subject: &SubjectId, metric: &str) -> Option<f64> {
        self.rows.get(subject)?.get(metric).copied()
    }

    /// One column as subject → value, for subjects that have it.
    pub fn column(&self, metric: &str) -> SubjectValues {
        self.rows
            .iter()
            .filter_map(|(subject, row)| row.get(metric).map(|v| (subject.clone(), *v)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keep only the listed subjects.
    pub fn retain_subjects<S: AsRef<str>>(&mut self, subjects: &[S]) {
        let keep: BTreeSet<&str> = subjects.iter().map(AsRef::as_ref).collect();
        self.rows.retain(|subject, _| keep.contains(subject.as_str()));
    }

    /// Remove the listed subjects.
    pub fn remove_subjects<S: AsRef<str>>(&mut self, subjects: &[S]) {
        let drop: BTreeSet<&str> = subjects.iter().map(AsRef::as_ref).collect();
        self.rows.retain(|subject, _| !drop.contains(subject.as_str()));
    }

    /// Drop the listed columns.
    pub fn exclude_columns<S: AsRef<str>>(&mut self, columns: &[S]) {
        let drop: BTreeSet<&str> = columns.iter().map(AsRef::as_ref).collect();
        self.columns.retain(|c| !drop.contains(c.as_str()));
        for row in self.rows.values_mut() {
            row.retain(|metric, _| !drop.contains(metric.as_str()));
        }
    }

    /// Merge another table by subject. Values in `other` win on conflict.
    pub fn merge(&mut self, other: &MetricTable) {
        for name in &other.columns {
            self.add_column(name);
        }
        for (subject, row) in &other.rows {
            let target = self.rows.entry(subject.clone()).or_default();
            for (metric, value) in row {
                target.insert(metric.clone(), *value);
            }
        }
    }
}

/// Split one CSV record. Quoted cells keep commas and `""` escapes;
/// unquoted cells are trimmed.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut quoted = false;
    let mut was_quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    cell.push('"');
                } else {
                    quoted = false;
                }
            }
            '"' if cell.trim().is_empty() => {
                cell.clear();
                quoted = true;
                was_quoted = true;
            }
            ',' if !quoted => {
                cells.push(finish_cell(&mut cell, was_quoted));
                was_quoted = false;
            }
            _ => cell.push(c),
        }
    }
    cells.push(finish_cell(&mut cell, was_quoted));
    cells
}

fn finish_cell(cell: &mut String, was_quoted: bool) -> String {
    let text = std::mem::take(cell);
    if was_quoted {
        // keep the quoted text, drop padding after the closing quote
        text.trim_end().to_string()
    } else {
        text.trim().to_string()
    }
}

/// Quote a CSV field if it holds a comma or a quote.
pub fn quote_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn parse_cell(cell: Option<&str>) -> Option<f64> {
    match cell {
        None | Some("") => Some(f64::NAN),
        Some(text) if text.eq_ignore_ascii_case("nan") => Some(f64::NAN),
        Some(text) => text.parse().ok(),
    }
}

/// Format a value for CSV output; NaN is written as `NaN`.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
benchmark, work ,Symbolic Bytes,L2 DMisses,note
gemm,100,800,90,fast
atax,50,,40,slow
adi,10,NaN,12,x
";

    #[test]
    fn test_from_csv_trims_headers_and_drops_text_columns() {
        let table = MetricTable::from_csv_str(CSV).unwrap();

        assert_eq!(table.columns(), &["work", "Symbolic Bytes", "L2 DMisses"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(&"gemm".into(), "work"), Some(100.0));
        assert!(table.get(&"atax".into(), "Symbolic Bytes").unwrap().is_nan());
        assert!(table.get(&"adi".into(), "Symbolic Bytes").unwrap().is_nan());
    }

    #[test]
    fn test_csv_requires_benchmark_column() {
        assert!(MetricTable::from_csv_str("name,work\ngemm,1\n").is_err());
        assert!(MetricTable::from_csv_str("").is_err());
    }

    #[test]
    fn test_filters_and_exclusion() {
        let mut table = MetricTable::from_csv_str(CSV).unwrap();
        table.retain_subjects(&["gemm", "adi", "unknown"]);
        table.exclude_columns(&["L2 DMisses"]);
        table.remove_subjects(&["adi"]);

        assert_eq!(table.subjects().map(|s| s.as_str()).collect::<Vec<_>>(), vec!["gemm"]);
        assert!(!table.has_column("L2 DMisses"));
        assert_eq!(table.column("work").len(), 1);
    }

    #[test]
    fn test_merge_by_subject() {
        let mut measured = MetricTable::from_rows([("gemm", "PAPI_L2_TCM", 9.0), ("atax", "PAPI_L2_TCM", 4.0)]);
        let symbolic = MetricTable::from_rows([("gemm", "bytes", 8.0), ("lu", "bytes", 2.0)]);
        measured.merge(&symbolic);

        assert_eq!(measured.columns(), &["PAPI_L2_TCM", "bytes"]);
        assert_eq!(measured.len(), 3);
        assert_eq!(measured.get(&"gemm".into(), "bytes"), Some(8.0));
        assert_eq!(measured.get(&"atax".into(), "bytes"), None);
    }

    #[test]
    fn test_write_csv() {
        let table = MetricTable::from_rows([("gemm", "a", 1.5), ("gemm", "b", f64::NAN), ("adi", "a", 2.0)]);
        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "benchmark,a,b\nadi,2,\ngemm,1.5,NaN\n");
        assert_eq!(MetricTable::from_csv_str(&text).unwrap().len(), 2);
    }

    #[test]
    fn test_names_with_commas_survive_csv() {
        let table = MetricTable::from_rows([
            ("gemm, tiled", "L2 misses, total", 7.0),
            ("gemm, tiled", "work", 3.0),
            ("say \"hi\"", "work", 1.0),
        ]);
        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("benchmark,\"L2 misses, total\",work\n"));

        let parsed = MetricTable::from_csv_str(&text).unwrap();
        assert_eq!(parsed.columns(), &["L2 misses, total", "work"]);
        assert_eq!(parsed.get(&"gemm, tiled".into(), "L2 misses, total"), Some(7.0));
        assert_eq!(parsed.get(&"say \"hi\"".into(), "work"), Some(1.0));
    }
}
