//! Line protocol between the toolchain and external collaborators.
//!
//! Collaborator programs (compilers, instrumented kernels, cost models)
//! print prefixed lines on stdout; everything else is ordinary program
//! output.

use crate::nan::Float;
use crate::report::{InstrumentationReport, OptimizationOutcome};
use crate::{Error, Result};
use std::collections::BTreeMap;

/// Prefix for a JSON-encoded instrumentation report.
pub const REPORT_PREFIX: &str = "ROOFLINE_REPORT:";

/// Prefix for the measured time of one invocation, in seconds.
pub const TIME_PREFIX: &str = "ROOFLINE_TIME:";

/// Prefix for a JSON object of static cost-model metric values.
pub const COST_PREFIX: &str = "ROOFLINE_COST:";

/// Prefix for the optimization outcome: `applied` or `skipped:<reason>`.
pub const OPTIMIZE_PREFIX: &str = "ROOFLINE_OPTIMIZE:";

/// A parsed protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum IpcMessage<'a> {
    Report(InstrumentationReport),
    Time(f64),
    Cost(BTreeMap<String, f64>),
    Optimize(OptimizationOutcome),
    /// Regular program output.
    Unknown(&'a str),
}

/// Parse one line of collaborator output.
///
/// A line carrying a known prefix but a malformed payload is an error, so
/// broken collaborators are noticed instead of silently losing data.
pub fn parse_line(line: &str) -> Result<IpcMessage<'_>> {
    if let Some(json) = line.strip_prefix(REPORT_PREFIX) {
        let report = serde_json::from_str(json)
            .map_err(|e| Error::Protocol(format!("{}: {}", line, e)))?;
        return Ok(IpcMessage::Report(report));
    }

    if let Some(seconds) = line.strip_prefix(TIME_PREFIX) {
        let seconds: f64 = seconds
            .trim()
            .parse()
            .map_err(|e| Error::Protocol(format!("{}: {}", line, e)))?;
        return Ok(IpcMessage::Time(seconds));
    }

    if let Some(json) = line.strip_prefix(COST_PREFIX) {
        let costs: BTreeMap<String, Float> = serde_json::from_str(json)
            .map_err(|e| Error::Protocol(format!("{}: {}", line, e)))?;
        return Ok(IpcMessage::Cost(
            costs.into_iter().map(|(k, v)| (k, v.0)).collect(),
        ));
    }

    if let Some(status) = line.strip_prefix(OPTIMIZE_PREFIX) {
        let status = status.trim();
        if status == "applied" {
            return Ok(IpcMessage::Optimize(OptimizationOutcome::Applied));
        }
        if let Some(reason) = status.strip_prefix("skipped") {
            let reason = reason.trim_start_matches(':').trim();
            return Ok(IpcMessage::Optimize(OptimizationOutcome::skipped(reason)));
        }
        return Err(Error::Protocol(line.to_string()));
    }

    Ok(IpcMessage::Unknown(line))
}

impl IpcMessage<'_> {
    /// Render the message as one protocol line, the inverse of
    /// [`parse_line`]. Instrumented kernels written in Rust print these.
    pub fn to_line(&self) -> Result<String> {
        let line = match self {
            IpcMessage::Report(report) => {
                format!("{}{}", REPORT_PREFIX, serde_json::to_string(report)?)
            }
            IpcMessage::Time(seconds) => format!("{}{}", TIME_PREFIX, seconds),
            IpcMessage::Cost(costs) => format!("{}{}", COST_PREFIX, serde_json::to_string(costs)?),
            IpcMessage::Optimize(OptimizationOutcome::Applied) => {
                format!("{}applied", OPTIMIZE_PREFIX)
            }
            IpcMessage::Optimize(OptimizationOutcome::Skipped { reason }) => {
                format!("{}skipped:{}", OPTIMIZE_PREFIX, reason)
            }
            IpcMessage::Optimize(OptimizationOutcome::Unknown) => {
                return Err(Error::Protocol("optimization outcome unknown".into()))
            }
            IpcMessage::Unknown(text) => text.to_string(),
        };
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time() {
        assert_eq!(
            parse_line("ROOFLINE_TIME: 0.125").unwrap(),
            IpcMessage::Time(0.125)
        );
        assert!(parse_line("ROOFLINE_TIME:fast").is_err());
    }

    #[test]
    fn test_parse_cost() {
        match parse_line(r#"ROOFLINE_COST:{"work": 2000000, "bytes": 16000}"#).unwrap() {
            IpcMessage::Cost(costs) => {
                assert_eq!(costs["work"], 2_000_000.0);
                assert_eq!(costs["bytes"], 16_000.0);
            }
            other => panic!("Expected Cost, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_report() {
        let line = r#"ROOFLINE_REPORT:{"name":"17","counters":{"s":{"PAPI_DP_OPS":{"0":[4],"1":[6]}}}}"#;
        match parse_line(line).unwrap() {
            IpcMessage::Report(report) => {
                assert_eq!(report.name, "17");
                assert_eq!(report.event_totals()["PAPI_DP_OPS"], 10.0);
            }
            other => panic!("Expected Report, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_optimize() {
        assert_eq!(
            parse_line("ROOFLINE_OPTIMIZE:applied").unwrap(),
            IpcMessage::Optimize(OptimizationOutcome::Applied)
        );
        assert_eq!(
            parse_line("ROOFLINE_OPTIMIZE:skipped:no transformation matched").unwrap(),
            IpcMessage::Optimize(OptimizationOutcome::skipped("no transformation matched"))
        );
        assert!(parse_line("ROOFLINE_OPTIMIZE:maybe").is_err());
    }

    #[test]
    fn test_report_line_keeps_nan_counts() {
        let mut report = InstrumentationReport::new("1700000000002");
        report.record("s", "PAPI_L1_DCM", "0", vec![f64::NAN]);
        report.record("s", "PAPI_L1_DCM", "1", vec![3.0]);

        let line = IpcMessage::Report(report).to_line().unwrap();
        assert!(line.starts_with(REPORT_PREFIX));

        match parse_line(&line).unwrap() {
            IpcMessage::Report(back) => {
                assert_eq!(back.name, "1700000000002");
                assert!(back.counters["s"]["PAPI_L1_DCM"]["0"][0].is_nan());
                assert!(back.event_totals()["PAPI_L1_DCM"].is_nan());
            }
            other => panic!("Expected Report, got {:?}", other),
        }
    }

    #[test]
    fn test_lines_parse_back() {
        let mut costs = BTreeMap::new();
        costs.insert("work".to_string(), 12.0);
        costs.insert("depth".to_string(), f64::NAN);

        let messages = [
            IpcMessage::Time(0.5),
            IpcMessage::Optimize(OptimizationOutcome::Applied),
            IpcMessage::Optimize(OptimizationOutcome::skipped("no GPU")),
        ];
        for message in messages {
            let line = message.to_line().unwrap();
            assert_eq!(parse_line(&line).unwrap(), message);
        }

        match parse_line(&IpcMessage::Cost(costs).to_line().unwrap()).unwrap() {
            IpcMessage::Cost(back) => {
                assert_eq!(back["work"], 12.0);
                assert!(back["depth"].is_nan());
            }
            other => panic!("Expected Cost, got {:?}", other),
        }

        assert!(IpcMessage::Optimize(OptimizationOutcome::Unknown).to_line().is_err());
    }

    #[test]
    fn test_parse_line_unknown() {
        let line = "Regular program output";
        assert_eq!(parse_line(line).unwrap(), IpcMessage::Unknown(line));
    }
}
