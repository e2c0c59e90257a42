//! Event timeline resolution.
//!
//! Every decision that depends on "which fault has already happened at time
//! `t`" goes through [`active_event`]: the expected-value series and the node
//! exclusions applied during aggregation.

use super::types::*;

/// The most recent event strictly before `timestamp`.
///
/// An event stamped exactly at `timestamp` is not active yet. When several
/// events share the latest qualifying timestamp the first one in stored
/// order wins. Events need not be sorted.
pub fn active_event(timestamp: Timestamp, events: &[Event]) -> Option<&Event> {
    let mut active: Option<&Event> = None;
    for event in events {
        if event.timestamp < timestamp && active.map_or(true, |a| event.timestamp > a.timestamp) {
            active = Some(event);
        }
    }
    active
}

/// Expected converged value at `timestamp`, falling back to the job's static value
pub fn expected_value_at(timestamp: Timestamp, metadata: &RunMetadata) -> f64 {
    active_event(timestamp, &metadata.events)
        .map(|event| event.expected_value)
        .unwrap_or(metadata.job.expected_value)
}

/// Whether `node`'s sample at `timestamp` must be ignored
pub fn is_excluded(timestamp: Timestamp, node: &str, events: &[Event]) -> bool {
    active_event(timestamp, events).is_some_and(|event| event.excludes(node))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(timestamp: Timestamp, expected_value: f64, excluded: &[&str]) -> Event {
        Event {
            timestamp,
            expected_value,
            excluded_nodes: excluded.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn metadata(expected_value: f64, events: Vec<Event>) -> RunMetadata {
        RunMetadata {
            job: JobInfo {
                expected_value,
                ..Default::default()
            },
            repetition: 1,
            start_experiment_ts: 0,
            start_events_ts: 0,
            stop_events_ts: 0,
            stop_experiment_ts: 100,
            events,
        }
    }

    #[test]
    fn test_strictly_before() {
        let events = vec![event(10, 1.0, &["A"]), event(20, 2.0, &["B"])];

        assert!(active_event(10, &events).is_none());
        assert_eq!(active_event(11, &events).unwrap().timestamp, 10);
        assert_eq!(active_event(20, &events).unwrap().timestamp, 10);
        assert_eq!(active_event(21, &events).unwrap().timestamp, 20);
    }

    #[test]
    fn test_unsorted_events() {
        let events = vec![event(30, 3.0, &[]), event(10, 1.0, &[]), event(20, 2.0, &[])];

        assert_eq!(active_event(25, &events).unwrap().timestamp, 20);
        assert_eq!(active_event(100, &events).unwrap().timestamp, 30);
        assert!(active_event(5, &events).is_none());
    }

    #[test]
    fn test_tie_keeps_first_stored() {
        let events = vec![event(10, 1.0, &["A"]), event(10, 2.0, &["B"])];

        let active = active_event(15, &events).unwrap();
        assert_eq!(active.expected_value, 1.0);
        assert!(active.excludes("A"));
    }

    #[test]
    fn test_no_events() {
        assert!(active_event(50, &[]).is_none());
    }

    #[test]
    fn test_expected_value_fallback() {
        let metadata = metadata(5.5, vec![event(10, 7.0, &[])]);

        assert_eq!(expected_value_at(10, &metadata), 5.5);
        assert_eq!(expected_value_at(11, &metadata), 7.0);
    }

    #[test]
    fn test_exclusion_follows_active_event() {
        let events = vec![event(10, 1.0, &["A"]), event(20, 2.0, &["B"])];

        assert!(!is_excluded(10, "A", &events));
        assert!(is_excluded(15, "A", &events));
        assert!(!is_excluded(15, "B", &events));
        // A is back once the later event takes over
        assert!(!is_excluded(25, "A", &events));
        assert!(is_excluded(25, "B", &events));
    }
}
