use crate::analyzer::Analysis;
use crate::metrics::{format_value, quote_field};
use roofline_core::Result;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const CORRELATION_SUMMARY: &str = "correlation_summary.csv";
pub const CORRELATION_OVERVIEW: &str = "correlation_overview.csv";
pub const FIT_SUMMARY: &str = "fit_summary.csv";
pub const FIT_OVERVIEW: &str = "fit_overview.csv";
pub const ANALYSIS_JSON: &str = "analysis.json";

/// Generates human-readable and machine-readable reports.
pub struct Report<'a> {
    analysis: &'a Analysis,
}

impl<'a> Report<'a> {
    pub fn new(analysis: &'a Analysis) -> Self {
        Self { analysis }
    }

    pub fn write_correlation_summary(&self, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "symbolic_metric,measured_metric,points,pearson,spearman,kendall,pearson_loglog")?;
        for r in &self.analysis.correlations {
            writeln!(
                out,
                "{},{},{},{},{},{},{}",
                quote_field(&r.predictor),
                quote_field(&r.measured),
                r.points,
                format_value(r.pearson),
                format_value(r.spearman),
                format_value(r.kendall),
                format_value(r.pearson_loglog)
            )?;
        }
        Ok(())
    }

    pub fn write_correlation_overview(&self, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "symbolic_metric,pairs,pearson,spearman,kendall,pearson_loglog")?;
        for r in &self.analysis.correlation_overview {
            writeln!(
                out,
                "{},{},{},{},{},{}",
                quote_field(&r.predictor),
                r.pairs,
                format_value(r.pearson),
                format_value(r.spearman),
                format_value(r.kendall),
                format_value(r.pearson_loglog)
            )?;
        }
        Ok(())
    }

    pub fn write_fit_summary(&self, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "symbolic_metric,measured_metric,points,RMSE,RMAE,R2")?;
        for r in &self.analysis.fits {
            writeln!(
                out,
                "{},{},{},{},{},{}",
                quote_field(&r.predictor),
                quote_field(&r.measured),
                r.points,
                format_value(r.rmse),
                format_value(r.rmae),
                format_value(r.r2)
            )?;
        }
        Ok(())
    }

    pub fn write_fit_overview(&self, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "symbolic_metric,pairs,RMSE,RMAE,R2")?;
        for r in &self.analysis.fit_overview {
            writeln!(
                out,
                "{},{},{},{},{}",
                quote_field(&r.predictor),
                r.pairs,
                format_value(r.rmse),
                format_value(r.rmae),
                format_value(r.r2)
            )?;
        }
        Ok(())
    }

    /// Write every CSV table plus the JSON dump into `dir`.
    pub fn write_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;

        let tables: [(&str, fn(&Self, &mut dyn Write) -> Result<()>); 4] = [
            (CORRELATION_SUMMARY, Self::write_correlation_summary),
            (CORRELATION_OVERVIEW, Self::write_correlation_overview),
            (FIT_SUMMARY, Self::write_fit_summary),
            (FIT_OVERVIEW, Self::write_fit_overview),
        ];

        let mut written = Vec::new();
        for (name, write) in tables {
            let path = dir.join(name);
            let mut out = BufWriter::new(File::create(&path)?);
            write(self, &mut out)?;
            out.flush()?;
            written.push(path);
        }

        let path = dir.join(ANALYSIS_JSON);
        fs::write(&path, self.to_json()?)?;
        written.push(path);

        Ok(written)
    }

    /// Generate a JSON report.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self.analysis)?)
    }

    /// Generate a human-readable text report.
    pub fn to_text(&self) -> String {
        let a = self.analysis;
        let mut text = String::new();

        let _ = writeln!(
            text,
            "{} subjects, {} correlation pairs, {} fits",
            a.subjects,
            a.correlations.len(),
            a.fits.len()
        );

        let _ = writeln!(text, "\nCorrelation overview");
        for r in &a.correlation_overview {
            let _ = writeln!(
                text,
                "  {:<32} pearson {:>7.3}  spearman {:>7.3}  kendall {:>7.3}  loglog {:>7.3}",
                r.predictor, r.pearson, r.spearman, r.kendall, r.pearson_loglog
            );
        }

        let _ = writeln!(text, "\nFit overview");
        for r in &a.fit_overview {
            let _ = writeln!(
                text,
                "  {:<32} RMSE {:>12.4e}  RMAE {:>8.3}  R2 {:>8.3}",
                r.predictor, r.rmse, r.rmae, r.r2
            );
        }

        for (predictor, top) in &a.ranking {
            let _ = writeln!(text, "\nTop {} by log-log Pearson: {}", top.len(), predictor);
            for r in top {
                let _ = writeln!(text, "  {:<32} {:>7.3}", r.measured, r.pearson_loglog);
            }
        }

        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use crate::metrics::MetricTable;

    fn analysis() -> Analysis {
        let table = MetricTable::from_rows([
            ("a", "bytes", 1.0),
            ("b", "bytes", 2.0),
            ("c", "bytes", 4.0),
            ("a", "PAPI_L2_TCM", 1.0),
            ("b", "PAPI_L2_TCM", 2.0),
            ("c", "PAPI_L2_TCM", 4.0),
            ("a", "flat", 3.0),
            ("b", "flat", 3.0),
            ("c", "flat", 3.0),
        ]);
        Analyzer::new(["bytes"]).analyze(&table)
    }

    #[test]
    fn test_csv_writes_nan() {
        let analysis = analysis();
        let mut out = Vec::new();
        Report::new(&analysis).write_correlation_summary(&mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("bytes,PAPI_L2_TCM,3,"));
        assert_eq!(lines[2], "bytes,flat,3,NaN,NaN,NaN,NaN");
    }

    #[test]
    fn test_write_dir() {
        let dir = tempfile::tempdir().unwrap();
        let analysis = analysis();
        let written = Report::new(&analysis).write_dir(dir.path()).unwrap();

        assert_eq!(written.len(), 5);
        let fit = fs::read_to_string(dir.path().join(FIT_OVERVIEW)).unwrap();
        assert!(fit.starts_with("symbolic_metric,pairs,RMSE,RMAE,R2\nbytes,2,"));

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(ANALYSIS_JSON)).unwrap())
                .unwrap();
        assert_eq!(json["subjects"], 3);
    }

    #[test]
    fn test_text_report_lists_ranking() {
        let analysis = analysis();
        let text = Report::new(&analysis).to_text();
        assert!(text.starts_with("3 subjects, 2 correlation pairs, 2 fits"));
        assert!(text.contains("Top 2 by log-log Pearson: bytes"));
    }
}
