//! Time-aligned portfolio chart of every instance in a session.

use crate::registry::TradingInstance;
use chrono::{DateTime, Utc};
use orchestrator_protocol::{ChartPayload, ChartRow};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

/// One column of the chart.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    /// Value reported before the first sample.
    pub seed: f64,
    pub points: BTreeMap<DateTime<Utc>, f64>,
}

impl Series {
    /// Exact sample at `at`, else the latest sample before it, else the seed.
    fn value_at(&self, at: DateTime<Utc>) -> f64 {
        self.points
            .range(..=at)
            .next_back()
            .map(|(_, v)| *v)
            .unwrap_or(self.seed)
    }
}

/// Forward-fills every series onto the union of their timestamps.
///
/// One row per distinct timestamp, ascending, with a value for every
/// series in every row.
pub fn align(series: &[Series]) -> Vec<ChartRow> {
    let timestamps: BTreeSet<DateTime<Utc>> = series
        .iter()
        .flat_map(|s| s.points.keys().copied())
        .collect();

    timestamps
        .into_iter()
        .map(|ts| ChartRow {
            timestamp: ts,
            values: series.iter().map(|s| s.value_at(ts)).collect(),
        })
        .collect()
}

pub fn chart_title(session_id: &str) -> String {
    let short: String = session_id.chars().take(8).collect();
    format!("Portfolio Value History - Session {}", short)
}

/// Returns `None` when no instance has a portfolio snapshot yet.
///
/// Columns are named by model, or by instance id when several instances
/// of the session share a model.
pub fn build_chart(session_id: &str, instances: &[Arc<TradingInstance>]) -> Option<ChartPayload> {
    let mut seen = HashSet::new();
    let shared_model = instances.iter().any(|i| !seen.insert(i.model_id()));

    let series: Vec<Series> = instances
        .iter()
        .map(|instance| {
            let points: BTreeMap<_, _> = instance.with_executor(|ex| {
                ex.portfolio_history()
                    .iter()
                    .map(|s| (s.timestamp, s.total_value))
                    .collect()
            });
            let name = if shared_model {
                instance.id().to_string()
            } else {
                instance.model_id().to_string()
            };
            Series {
                name,
                seed: instance.config().initial_capital,
                points,
            }
        })
        .collect();

    let rows = align(&series);
    if rows.is_empty() {
        return None;
    }

    Some(ChartPayload {
        title: chart_title(session_id),
        series: series.into_iter().map(|s| s.name).collect(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 21, 10, min, 0).unwrap()
    }

    fn series(name: &str, seed: f64, points: &[(u32, f64)]) -> Series {
        Series {
            name: name.into(),
            seed,
            points: points.iter().map(|(m, v)| (t(*m), *v)).collect(),
        }
    }

    #[test]
    fn test_forward_fill_interleaved_samples() {
        let a = series("A", 100.0, &[(1, 100.0), (3, 120.0)]);
        let b = series("B", 50.0, &[(2, 50.0), (4, 55.0)]);

        let rows = align(&[a, b]);

        let times: Vec<_> = rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(times, vec![t(1), t(2), t(3), t(4)]);

        let col = |i: usize| rows.iter().map(|r| r.values[i]).collect::<Vec<_>>();
        assert_eq!(col(0), vec![100.0, 100.0, 120.0, 120.0]);
        assert_eq!(col(1), vec![50.0, 50.0, 50.0, 55.0]);
    }

    #[test]
    fn test_shared_timestamps_collapse_to_one_row() {
        let a = series("A", 10.0, &[(1, 11.0), (2, 12.0)]);
        let b = series("B", 20.0, &[(1, 21.0), (2, 22.0)]);

        let rows = align(&[a, b]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].values, vec![12.0, 22.0]);
    }

    #[test]
    fn test_no_samples_no_rows() {
        assert!(align(&[series("A", 10.0, &[])]).is_empty());
        assert_eq!(
            chart_title("0123456789abcdef"),
            "Portfolio Value History - Session 01234567"
        );
    }
}
