//! Adapters for the PAPI command line utilities.
//!
//! - `papi_avail` lists preset events and whether this machine has them
//! - `papi_native_avail` lists native events with their modifiers
//! - `papi_event_chooser PRESET <events…>` lists presets that can still be
//!   added to a set of events

use crate::backend::CompatibilityOracle;
use log::debug;
use regex::Regex;
use roofline_core::{Error, EventSet, Result};
use std::collections::BTreeMap;
use std::process::{Command, Output};

fn pattern(re: &str) -> Result<Regex> {
    Regex::new(re).map_err(|e| Error::Other(format!("Invalid pattern {}: {}", re, e)))
}

/// Preset events marked available (`Avail == Yes`) in `papi_avail` output,
/// in listing order.
pub fn parse_available_presets(output: &str) -> Result<Vec<String>> {
    let re = pattern(r"^(PAPI_[A-Z0-9_]+)\s+0x[0-9a-fA-F]+\s+(Yes|No)\b")?;
    Ok(output
        .lines()
        .filter_map(|line| re.captures(line.trim()))
        .filter(|caps| &caps[2] == "Yes")
        .map(|caps| caps[1].to_string())
        .collect())
}

/// Native events and their modifiers from `papi_native_avail` output.
pub fn parse_native_events(output: &str) -> Result<BTreeMap<String, Vec<String>>> {
    let header = pattern(r"^\|\s*([A-Za-z0-9_:.\-]+)\s*\|$")?;
    let modifier = pattern(r"^\|\s*:([A-Za-z0-9_]+)")?;

    let mut events: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut current: Option<String> = None;

    for line in output.lines() {
        let line = line.trim_end();

        if let Some(caps) = header.captures(line) {
            let name = caps[1].to_string();
            events.insert(name.clone(), Vec::new());
            current = Some(name);
            continue;
        }

        if let Some(name) = &current {
            if let Some(caps) = modifier.captures(line) {
                if let Some(modifiers) = events.get_mut(name) {
                    modifiers.push(caps[1].to_string());
                }
            }
        }
    }

    Ok(events)
}

/// Preset events listed as addable in `papi_event_chooser` output.
pub fn parse_addable_events(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("PAPI_"))
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

/// Locations of the PAPI utilities.
#[derive(Debug, Clone)]
pub struct PapiTools {
    pub avail: String,
    pub native_avail: String,
    pub event_chooser: String,
}

impl Default for PapiTools {
    fn default() -> Self {
        Self {
            avail: "papi_avail".to_string(),
            native_avail: "papi_native_avail".to_string(),
            event_chooser: "papi_event_chooser".to_string(),
        }
    }
}

impl PapiTools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset events available on this machine.
    pub fn available_presets(&self) -> Result<Vec<String>> {
        let output = run_tool(&self.avail, &[])?;
        parse_available_presets(&String::from_utf8_lossy(&output.stdout))
    }

    /// Native events and their modifiers.
    pub fn native_events(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let output = run_tool(&self.native_avail, &[])?;
        parse_native_events(&String::from_utf8_lossy(&output.stdout))
    }

    /// Compatibility oracle backed by `papi_event_chooser`.
    pub fn event_chooser(&self) -> PapiEventChooser {
        PapiEventChooser {
            program: self.event_chooser.clone(),
        }
    }
}

fn run_tool(program: &str, args: &[&str]) -> Result<Output> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| Error::Collaborator(format!("Failed to run {}: {}", program, e)))?;

    if !output.status.success() {
        return Err(Error::Collaborator(format!(
            "{} exited with code {}: {}",
            program,
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(output)
}

/// Compatibility oracle running `papi_event_chooser PRESET <events…>`.
///
/// The chooser exits non-zero for some legitimate "nothing fits" answers,
/// so a non-zero exit only counts as a failure when it produced no event
/// listing at all.
#[derive(Debug, Clone)]
pub struct PapiEventChooser {
    program: String,
}

impl CompatibilityOracle for PapiEventChooser {
    fn addable(&mut self, current: &EventSet) -> Result<Vec<String>> {
        let seed = current.iter().next().unwrap_or_default().to_string();

        let output = Command::new(&self.program)
            .arg("PRESET")
            .args(current.iter())
            .output()
            .map_err(|e| Error::Oracle {
                event: seed.clone(),
                reason: format!("failed to run {}: {}", self.program, e),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let addable = parse_addable_events(&stdout);

        if !output.status.success() && addable.is_empty() && !stdout.contains("Total events") {
            return Err(Error::Oracle {
                event: seed,
                reason: format!(
                    "{} exited with code {}: {}",
                    self.program,
                    output.status.code().unwrap_or(-1),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        debug!("{} addable to [{}]", addable.len(), current);
        Ok(addable)
    }
}
