//! Message rate derivation from cumulative counters.

use std::collections::BTreeMap;

use super::types::*;

/// Rates of one protocol. A series is absent when its counter input had
/// fewer than two samples.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RateSeries {
    pub per_node: BTreeMap<NodeId, Vec<RateSample>>,
    pub averaged: Option<Vec<RateSample>>,
}

/// Per-second send/receive rates between consecutive counter samples.
///
/// Produces nothing for fewer than two samples. Pairs whose timestamps do not
/// increase are skipped, so duplicate or out-of-order samples never divide by
/// zero.
pub fn derive_rates(series: &[MessageCountSample]) -> Vec<RateSample> {
    series
        .windows(2)
        .filter_map(|pair| {
            let (prev, curr) = (&pair[0], &pair[1]);
            let dt = curr.timestamp - prev.timestamp;
            if dt <= 0 {
                return None;
            }
            Some(RateSample {
                timestamp: curr.timestamp,
                sent_rate: (curr.sent - prev.sent) as f64 / dt as f64,
                received_rate: (curr.received - prev.received) as f64 / dt as f64,
            })
        })
        .collect()
}

/// Rates for every aggregated counter series of a protocol
pub fn derive_protocol_rates(counts: &ProtocolSeries<MessageCountSample>) -> RateSeries {
    let rates_of = |series: &Vec<MessageCountSample>| (series.len() >= 2).then(|| derive_rates(series));

    let per_node = counts
        .per_node
        .iter()
        .filter_map(|(node, series)| rates_of(series).map(|rates| (node.clone(), rates)))
        .collect();

    RateSeries {
        per_node,
        averaged: rates_of(&counts.averaged),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(timestamp: Timestamp, sent: i64, received: i64) -> MessageCountSample {
        MessageCountSample { timestamp, sent, received }
    }

    #[test]
    fn test_basic_rate() {
        let rates = derive_rates(&[sample(0, 0, 0), sample(10, 100, 50)]);
        assert_eq!(
            rates,
            vec![RateSample { timestamp: 10, sent_rate: 10.0, received_rate: 5.0 }]
        );
    }

    #[test]
    fn test_too_few_points() {
        assert!(derive_rates(&[]).is_empty());
        assert!(derive_rates(&[sample(5, 10, 10)]).is_empty());
    }

    #[test]
    fn test_non_increasing_timestamps_skipped() {
        let rates = derive_rates(&[
            sample(0, 0, 0),
            sample(0, 5, 5),
            sample(4, 13, 9),
            sample(2, 20, 20),
            sample(6, 28, 24),
        ]);

        let timestamps: Vec<_> = rates.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![4, 6]);
        assert_eq!(rates[0].sent_rate, 2.0);
        assert_eq!(rates[0].received_rate, 1.0);
        assert_eq!(rates[1].sent_rate, 2.0);
    }

    #[test]
    fn test_fractional_and_negative_rates() {
        let rates = derive_rates(&[sample(0, 10, 10), sample(3, 11, 4)]);
        assert!((rates[0].sent_rate - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(rates[0].received_rate, -2.0);
    }

    #[test]
    fn test_protocol_rates_skip_short_series() {
        let mut counts = ProtocolSeries::default();
        counts.per_node.insert("node_1".to_string(), vec![sample(0, 0, 0), sample(2, 4, 2)]);
        counts.per_node.insert("node_2".to_string(), vec![sample(0, 0, 0)]);
        counts.per_node.insert("node_3".to_string(), Vec::new());
        counts.averaged = vec![sample(1, 1, 1)];

        let rates = derive_protocol_rates(&counts);
        assert_eq!(rates.per_node.keys().collect::<Vec<_>>(), vec!["node_1"]);
        assert_eq!(rates.per_node["node_1"][0].sent_rate, 2.0);
        assert!(rates.averaged.is_none());
    }

    #[test]
    fn test_protocol_rates_same_timestamps_only() {
        // two points at one timestamp: enough input, but no usable pair
        let mut counts = ProtocolSeries::default();
        counts.averaged = vec![sample(3, 0, 0), sample(3, 1, 1)];

        let rates = derive_protocol_rates(&counts);
        assert_eq!(rates.averaged, Some(Vec::new()));
    }
}
