//! Greedy grouping of counters into jointly measurable event sets.

use log::{debug, info};
use roofline_backend::CompatibilityOracle;
use roofline_core::{Error, EventSet, Result};

/// Partition `events` into groups the oracle considers jointly measurable.
///
/// Each group is seeded with the first unassigned event (insertion order)
/// and grown with the first unassigned event the oracle reports as
/// addable, until nothing more fits. Every event ends up in exactly one
/// group; the number of groups is not minimized.
///
/// An oracle failure aborts with [`Error::Oracle`] naming the seed of the
/// group being grown.
pub fn partition<O>(events: &[String], oracle: &mut O) -> Result<Vec<EventSet>>
where
    O: CompatibilityOracle + ?Sized,
{
    let mut remaining: Vec<&str> = Vec::new();
    for event in events {
        if !remaining.contains(&event.as_str()) {
            remaining.push(event);
        }
    }

    let mut groups = Vec::new();

    while let Some(&seed) = remaining.first() {
        let mut current = EventSet::single(seed);

        loop {
            let addable = oracle.addable(&current).map_err(|e| match e {
                Error::Oracle { .. } => e,
                other => Error::Oracle {
                    event: seed.to_string(),
                    reason: other.to_string(),
                },
            })?;

            let next = remaining
                .iter()
                .find(|e| !current.contains(e) && addable.iter().any(|a| a == **e));

            match next {
                Some(event) => {
                    current.insert(*event);
                }
                None => break,
            }
        }

        remaining.retain(|e| !current.contains(e));
        debug!("event set [{}]", current);
        groups.push(current);
    }

    Ok(groups)
}

/// Plan the event sets for a collection run.
///
/// The first available floating point event forms its own set. Available
/// cache events follow, partitioned through the oracle when `build_sets`
/// is true and one per set otherwise.
pub fn plan_event_sets<O>(
    available: &[String],
    fp_events: &[String],
    cache_events: &[String],
    build_sets: bool,
    oracle: &mut O,
) -> Result<Vec<EventSet>>
where
    O: CompatibilityOracle + ?Sized,
{
    let is_available = |e: &&String| available.contains(e);

    let mut sets = Vec::new();
    match fp_events.iter().find(is_available) {
        Some(fp) => sets.push(EventSet::single(fp.as_str())),
        None => info!("no floating point event available"),
    }

    let cache: Vec<String> = cache_events.iter().filter(is_available).cloned().collect();
    if build_sets {
        sets.extend(partition(&cache, oracle)?);
    } else {
        sets.extend(cache.iter().map(|e| EventSet::single(e.as_str())));
    }

    info!(
        "{} event sets for {} cache events",
        sets.len(),
        cache.len()
    );
    Ok(sets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn names(events: &[&str]) -> Vec<String> {
        events.iter().map(|e| e.to_string()).collect()
    }

    fn groups(sets: &[EventSet]) -> Vec<Vec<&str>> {
        sets.iter().map(|s| s.iter().collect()).collect()
    }

    fn assert_partition(events: &[String], sets: &[EventSet]) {
        let mut seen = BTreeSet::new();
        for set in sets {
            for e in set.iter() {
                assert!(seen.insert(e.to_string()), "{} appears twice", e);
            }
        }
        let expected: BTreeSet<String> = events.iter().cloned().collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_nothing_addable_gives_singletons() {
        let events = names(&["A", "B", "C", "D"]);
        let mut oracle = |_: &EventSet| -> Result<Vec<String>> { Ok(Vec::new()) };
        let sets = partition(&events, &mut oracle).unwrap();

        assert_eq!(sets.len(), 4);
        assert!(sets.iter().all(|s| s.len() == 1));
        assert_partition(&events, &sets);
    }

    #[test]
    fn test_everything_addable_gives_one_group() {
        let events = names(&["A", "B", "C", "D"]);
        let all = events.clone();
        let mut oracle = move |current: &EventSet| -> Result<Vec<String>> {
            Ok(all.iter().filter(|e| !current.contains(e)).cloned().collect())
        };
        let sets = partition(&events, &mut oracle).unwrap();

        assert_eq!(groups(&sets), vec![vec!["A", "B", "C", "D"]]);
    }

    #[test]
    fn test_scripted_oracle() {
        let events = names(&["A", "B", "C"]);
        let mut oracle = |current: &EventSet| -> Result<Vec<String>> {
            let addable = match current.events() {
                [a] if a == "A" => vec!["B".to_string()],
                _ => vec![],
            };
            Ok(addable)
        };
        let sets = partition(&events, &mut oracle).unwrap();

        assert_eq!(groups(&sets), vec![vec!["A", "B"], vec!["C"]]);
    }

    #[test]
    fn test_assigned_and_unknown_events_are_ignored() {
        let events = names(&["A", "B", "C", "A"]);
        // claims B and C fit with anything, and offers an event nobody asked for
        let mut oracle = |current: &EventSet| -> Result<Vec<String>> {
            let offered = if current.len() < 2 {
                vec!["Z".to_string(), "C".to_string(), "B".to_string()]
            } else {
                vec!["Z".to_string()]
            };
            Ok(offered)
        };
        let sets = partition(&events, &mut oracle).unwrap();

        // B comes before C in insertion order
        assert_eq!(groups(&sets), vec![vec!["A", "B"], vec!["C"]]);
        assert_partition(&names(&["A", "B", "C"]), &sets);
    }

    #[test]
    fn test_oracle_failure_names_the_event() {
        let events = names(&["A", "B", "C"]);
        let mut oracle = |current: &EventSet| -> Result<Vec<String>> {
            if current.contains("B") {
                Err(Error::Collaborator("papi_event_chooser timed out".into()))
            } else {
                Ok(Vec::new())
            }
        };

        match partition(&events, &mut oracle) {
            Err(Error::Oracle { event, reason }) => {
                assert_eq!(event, "B");
                assert!(reason.contains("timed out"));
            }
            other => panic!("Expected Oracle error, got {:?}", other),
        }
    }

    #[test]
    fn test_plan_event_sets() {
        let available = names(&["PAPI_DP_OPS", "PAPI_L1_DCM", "PAPI_L2_DCM", "PAPI_L3_TCM"]);
        let fp = names(&["PAPI_FP_OPS", "PAPI_DP_OPS"]);
        let cache = names(&["PAPI_L1_DCM", "PAPI_L1_ICM", "PAPI_L2_DCM", "PAPI_L3_TCM"]);

        let mut pairs = |current: &EventSet| -> Result<Vec<String>> {
            let addable = if current.len() == 1 && current.contains("PAPI_L1_DCM") {
                vec!["PAPI_L2_DCM".to_string()]
            } else {
                vec![]
            };
            Ok(addable)
        };
        let sets = plan_event_sets(&available, &fp, &cache, true, &mut pairs).unwrap();
        assert_eq!(
            groups(&sets),
            vec![
                vec!["PAPI_DP_OPS"],
                vec!["PAPI_L1_DCM", "PAPI_L2_DCM"],
                vec!["PAPI_L3_TCM"],
            ]
        );

        let mut unused = |_: &EventSet| -> Result<Vec<String>> { panic!("oracle must not be called") };
        let singles = plan_event_sets(&available, &fp, &cache, false, &mut unused).unwrap();
        assert_eq!(singles.len(), 4);
    }
}
