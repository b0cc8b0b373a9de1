use crate::correlate::{correlate, correlation_overview};
use crate::fit::{evaluate_fit, fit_overview};
use crate::metrics::MetricTable;
use itertools::Itertools;
use log::{debug, warn};
use roofline_core::{CorrelationOverview, CorrelationRecord, FitOverview, FitRecord};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Number of measured metrics kept per predictor in the ranking.
pub const DEFAULT_TOP_N: usize = 6;

/// Correlates static predictor columns against measured columns.
#[derive(Debug, Clone)]
pub struct Analyzer {
    predictors: Vec<String>,
    excluded: Vec<String>,
    top_n: usize,
}

/// Everything computed for one metric table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Analysis {
    pub subjects: usize,
    pub correlations: Vec<CorrelationRecord>,
    pub correlation_overview: Vec<CorrelationOverview>,
    pub fits: Vec<FitRecord>,
    pub fit_overview: Vec<FitOverview>,
    /// Per predictor, the best measured metrics by log-log Pearson.
    pub ranking: Vec<(String, Vec<CorrelationRecord>)>,
}

impl Analyzer {
    pub fn new<S: Into<String>>(predictors: impl IntoIterator<Item = S>) -> Self {
        Self {
            predictors: predictors.into_iter().map(Into::into).collect(),
            excluded: Vec::new(),
            top_n: DEFAULT_TOP_N,
        }
    }

    /// Columns that are neither predictors nor measured metrics.
    pub fn exclude<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.excluded.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn top_n(mut self, n: usize) -> Self {
        self.top_n = n;
        self
    }

    pub fn predictors(&self) -> &[String] {
        &self.predictors
    }

    /// Every column that is not a predictor and not excluded.
    pub fn measured_columns(&self, table: &MetricTable) -> Vec<String> {
        table
            .columns()
            .iter()
            .filter(|c| !self.predictors.contains(c) && !self.excluded.contains(c))
            .cloned()
            .collect()
    }

    /// Run correlation and fit analysis over all predictor × measured pairs.
    ///
    /// Pairs where either side has no finite value are skipped; predictors
    /// missing from the table are skipped with a warning.
    pub fn analyze(&self, table: &MetricTable) -> Analysis {
        let measured = self.measured_columns(table);

        let predictors: Vec<&String> = self
            .predictors
            .iter()
            .filter(|p| {
                let present = table.has_column(p);
                if !present {
                    warn!("predictor '{}' not in table, skipping", p);
                }
                present
            })
            .collect();

        let mut analysis = Analysis {
            subjects: table.len(),
            ..Analysis::default()
        };

        for (predictor, meas) in predictors.iter().cartesian_product(measured.iter()) {
            let x = table.column(predictor);
            let y = table.column(meas);

            if !x.values().any(|v| v.is_finite()) || !y.values().any(|v| v.is_finite()) {
                debug!("{} vs {}: no finite values, skipping", predictor, meas);
                continue;
            }

            analysis.correlations.push(correlate(predictor, meas, &x, &y));

            match evaluate_fit(predictor, meas, &x, &y) {
                Some(fit) => analysis.fits.push(fit),
                None => debug!("{} vs {}: fewer than two joined points, no fit", predictor, meas),
            }
        }

        analysis.correlation_overview = correlation_overview(&analysis.correlations);
        analysis.fit_overview = fit_overview(&analysis.fits);
        analysis.ranking = predictors
            .iter()
            .map(|p| (p.to_string(), top_by_loglog(&analysis.correlations, p, self.top_n)))
            .collect();

        analysis
    }
}

/// The `n` records of one predictor with the highest log-log Pearson,
/// undefined coefficients last.
pub fn top_by_loglog(records: &[CorrelationRecord], predictor: &str, n: usize) -> Vec<CorrelationRecord> {
    records
        .iter()
        .filter(|r| r.predictor == predictor)
        .sorted_by(|a, b| descending_nan_last(a.pearson_loglog, b.pearson_loglog))
        .take(n)
        .cloned()
        .collect()
}

fn descending_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> MetricTable {
        MetricTable::from_csv_str(
            "\
benchmark,work,Symbolic Bytes,PAPI_L2_TCM,PAPI_L3_TCM,flat,empty
a,1,1,1,10,5,
b,2,2,2,30,5,
c,3,4,4,20,5,
d,4,8,8,40,5,
",
        )
        .unwrap()
    }

    #[test]
    fn test_measured_columns_exclude_predictors() {
        let analyzer = Analyzer::new(["Symbolic Bytes"]).exclude(["work"]);
        assert_eq!(
            analyzer.measured_columns(&table()),
            vec!["PAPI_L2_TCM", "PAPI_L3_TCM", "flat", "empty"]
        );
    }

    #[test]
    fn test_analyze_pairs_and_overviews() {
        let analysis = Analyzer::new(["Symbolic Bytes"])
            .exclude(["work"])
            .analyze(&table());

        assert_eq!(analysis.subjects, 4);
        // "empty" has no finite values and is skipped
        assert_eq!(analysis.correlations.len(), 3);
        assert_eq!(analysis.fits.len(), 3);

        let exact = &analysis.correlations[0];
        assert_eq!(exact.measured, "PAPI_L2_TCM");
        assert!((exact.pearson - 1.0).abs() < 1e-12);
        assert_eq!(analysis.fits[0].rmse, 0.0);

        // constant measured column: undefined correlation, undefined R²
        assert!(analysis.correlations[2].is_undefined());
        assert!(analysis.fits[2].r2.is_nan());

        assert_eq!(analysis.correlation_overview.len(), 1);
        assert_eq!(analysis.correlation_overview[0].pairs, 3);
        assert_eq!(analysis.fit_overview[0].pairs, 3);
    }

    #[test]
    fn test_ranking_puts_nan_last() {
        let analysis = Analyzer::new(["Symbolic Bytes"])
            .exclude(["work"])
            .top_n(2)
            .analyze(&table());

        let (predictor, top) = &analysis.ranking[0];
        assert_eq!(predictor, "Symbolic Bytes");
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].measured, "PAPI_L2_TCM");
        assert_eq!(top[1].measured, "PAPI_L3_TCM");

        let all = top_by_loglog(&analysis.correlations, "Symbolic Bytes", 10);
        assert!(all[2].pearson_loglog.is_nan());
    }

    #[test]
    fn test_missing_predictor_is_skipped() {
        let analysis = Analyzer::new(["depth"]).analyze(&table());
        assert!(analysis.correlations.is_empty());
        assert!(analysis.ranking.is_empty());
    }
}
