//! Stats aggregation
//!
//! Read-side projection over the call session store for the monitoring
//! dashboard. Never mutates session state; works from a point-in-time
//! store snapshot, so a session mid-update is seen either before or
//! after its transition, never halfway. The dashboard polls this view,
//! so brief staleness is expected and fine.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;

use please_hold_config::StatsSettings;
use please_hold_core::{CallOutcome, CallSession};
use please_hold_store::SessionStore;

/// Dashboard-facing rollup snapshot
///
/// Field names serialize to the camelCase contract the dashboard client
/// expects. Closed-call totals never include live calls; those appear
/// only in the active view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStats {
    /// Completed calls
    pub total_calls: u64,
    /// Summed duration of completed calls
    pub total_duration_ms: i64,
    /// Human-readable form of `total_duration_ms`
    pub total_duration_formatted: String,
    /// Summed turns of completed calls
    pub total_turns: u64,
    /// Mean completed-call duration; 0 when no calls have completed
    pub avg_duration_ms: i64,
    /// Mean turns per completed call; 0 when no calls have completed
    pub avg_turns_per_call: f64,
    /// Calls currently in progress
    pub active_calls: u64,
    /// Elapsed-so-far time across calls in progress
    pub active_duration_ms: i64,
    /// Terminal outcome histogram; `in_progress` never appears
    pub outcomes: BTreeMap<String, u64>,
    /// Most recently started calls, newest first
    pub recent_calls: Vec<RecentCall>,
    /// Per-day activity in the reporting timezone, oldest first
    pub daily_stats: Vec<DailyStat>,
}

/// One row of the recent-calls table
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentCall {
    pub call_id: String,
    pub caller_id: String,
    pub start_time: DateTime<Utc>,
    /// Formatted duration; elapsed-so-far for a live call
    pub duration: String,
    pub duration_ms: i64,
    pub turn_count: u32,
    pub outcome: CallOutcome,
}

/// One calendar-day activity bucket
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStat {
    pub date: NaiveDate,
    /// Calls started this day, live or completed
    pub calls: u64,
    /// Summed duration of this day's completed calls
    pub duration_ms: i64,
    /// Summed turns across this day's calls
    pub turns: u64,
}

/// Read-only aggregator over the session store
pub struct StatsAggregator {
    store: Arc<SessionStore>,
    config: StatsSettings,
}

impl StatsAggregator {
    /// Create an aggregator over a store
    pub fn new(store: Arc<SessionStore>, config: StatsSettings) -> Self {
        Self { store, config }
    }

    /// Current rollup snapshot
    pub fn collect(&self) -> CallStats {
        self.collect_at(Utc::now())
    }

    fn collect_at(&self, now: DateTime<Utc>) -> CallStats {
        let sessions = self.store.snapshot();

        let mut total_calls = 0u64;
        let mut total_duration_ms = 0i64;
        let mut total_turns = 0u64;
        let mut active_calls = 0u64;
        let mut active_duration_ms = 0i64;
        let mut outcomes: BTreeMap<String, u64> = BTreeMap::new();

        for session in &sessions {
            if let Some(duration) = session.duration_ms() {
                total_calls += 1;
                total_duration_ms += duration;
                total_turns += u64::from(session.turn_count);
                *outcomes
                    .entry(session.outcome.as_str().to_string())
                    .or_insert(0) += 1;
            } else {
                active_calls += 1;
                active_duration_ms += session.elapsed_ms(now);
            }
        }

        let avg_duration_ms = if total_calls > 0 {
            total_duration_ms / total_calls as i64
        } else {
            0
        };
        let avg_turns_per_call = if total_calls > 0 {
            total_turns as f64 / total_calls as f64
        } else {
            0.0
        };

        CallStats {
            total_calls,
            total_duration_ms,
            total_duration_formatted: format_duration_ms(total_duration_ms),
            total_turns,
            avg_duration_ms,
            avg_turns_per_call,
            active_calls,
            active_duration_ms,
            outcomes,
            recent_calls: self.recent_calls(&sessions, now),
            daily_stats: self.daily_stats(&sessions),
        }
    }

    fn recent_calls(&self, sessions: &[CallSession], now: DateTime<Utc>) -> Vec<RecentCall> {
        let mut ordered: Vec<&CallSession> = sessions.iter().collect();
        ordered.sort_by(|a, b| b.start_time.cmp(&a.start_time));

        ordered
            .into_iter()
            .take(self.config.recent_calls_limit)
            .map(|session| {
                let duration_ms = session
                    .duration_ms()
                    .unwrap_or_else(|| session.elapsed_ms(now));
                RecentCall {
                    call_id: session.session_id.clone(),
                    caller_id: session.caller_id.clone(),
                    start_time: session.start_time,
                    duration: format_duration_ms(duration_ms),
                    duration_ms,
                    turn_count: session.turn_count,
                    outcome: session.outcome,
                }
            })
            .collect()
    }

    fn daily_stats(&self, sessions: &[CallSession]) -> Vec<DailyStat> {
        let offset = self.reporting_offset();
        let mut buckets: BTreeMap<NaiveDate, (u64, i64, u64)> = BTreeMap::new();

        for session in sessions {
            let date = session.start_time.with_timezone(&offset).date_naive();
            let bucket = buckets.entry(date).or_insert((0, 0, 0));
            bucket.0 += 1;
            bucket.1 += session.duration_ms().unwrap_or(0);
            bucket.2 += u64::from(session.turn_count);
        }

        buckets
            .into_iter()
            .map(|(date, (calls, duration_ms, turns))| DailyStat {
                date,
                calls,
                duration_ms,
                turns,
            })
            .collect()
    }

    /// Fixed reporting timezone, applied uniformly to every bucket
    fn reporting_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.config.reporting_utc_offset_minutes * 60)
            .unwrap_or_else(|| {
                tracing::warn!(
                    "Invalid reporting offset {} minutes, falling back to UTC",
                    self.config.reporting_utc_offset_minutes
                );
                FixedOffset::east_opt(0).expect("zero offset is always valid")
            })
    }
}

/// Render a millisecond duration the way the dashboard does
///
/// "42s", "3m 12s", "1h 5m".
pub fn format_duration_ms(ms: i64) -> String {
    let seconds = (ms / 1000).max(0);
    let minutes = seconds / 60;
    if minutes >= 60 {
        format!("{}h {}m", minutes / 60, minutes % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn store_with(config: StatsSettings) -> (Arc<SessionStore>, StatsAggregator) {
        let store = Arc::new(SessionStore::new());
        let aggregator = StatsAggregator::new(Arc::clone(&store), config);
        (store, aggregator)
    }

    fn add_closed(
        store: &SessionStore,
        id: &str,
        start: DateTime<Utc>,
        duration_ms: i64,
        turns: u32,
        outcome: CallOutcome,
    ) {
        store.get_or_create(id, Some("+15550100"));
        store
            .update(id, |s| {
                s.start_time = start;
                s.turn_count = turns;
                s.mark_terminated(outcome, "Bye.", start + Duration::milliseconds(duration_ms));
            })
            .unwrap();
    }

    fn add_active(store: &SessionStore, id: &str, start: DateTime<Utc>, turns: u32) {
        store.get_or_create(id, None);
        store
            .update(id, |s| {
                s.start_time = start;
                s.turn_count = turns;
            })
            .unwrap();
    }

    #[test]
    fn test_totals_over_two_closed_calls() {
        let (store, aggregator) = store_with(StatsSettings::default());
        let start = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();

        add_closed(&store, "CA1", start, 30_000, 4, CallOutcome::CallerHangup);
        add_closed(&store, "CA2", start, 90_000, 8, CallOutcome::MaxTurns);

        let stats = aggregator.collect();
        assert_eq!(stats.total_calls, 2);
        assert_eq!(stats.total_duration_ms, 120_000);
        assert_eq!(stats.avg_duration_ms, 60_000);
        assert_eq!(stats.total_turns, 12);
        assert!((stats.avg_turns_per_call - 6.0).abs() < f64::EPSILON);
        assert_eq!(stats.total_duration_formatted, "2m 0s");
    }

    #[test]
    fn test_empty_store_yields_zeroes_not_faults() {
        let (_store, aggregator) = store_with(StatsSettings::default());
        let stats = aggregator.collect();
        assert_eq!(stats.total_calls, 0);
        assert_eq!(stats.avg_duration_ms, 0);
        assert_eq!(stats.avg_turns_per_call, 0.0);
        assert!(stats.outcomes.is_empty());
        assert!(stats.recent_calls.is_empty());
        assert!(stats.daily_stats.is_empty());
    }

    #[test]
    fn test_outcome_histogram_excludes_in_progress() {
        let (store, aggregator) = store_with(StatsSettings::default());
        let start = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();

        for i in 0..3 {
            add_closed(
                &store,
                &format!("CAH{}", i),
                start,
                10_000,
                2,
                CallOutcome::CallerHangup,
            );
        }
        add_closed(&store, "CAM", start, 10_000, 2, CallOutcome::MaxTurns);
        add_active(&store, "CAA", start, 1);

        let stats = aggregator.collect();
        assert_eq!(stats.outcomes.get("caller_hangup"), Some(&3));
        assert_eq!(stats.outcomes.get("max_turns"), Some(&1));
        assert!(!stats.outcomes.contains_key("in_progress"));
        assert_eq!(stats.outcomes.len(), 2);
    }

    #[test]
    fn test_active_calls_kept_out_of_closed_totals() {
        let (store, aggregator) = store_with(StatsSettings::default());
        let now = Utc::now();

        add_closed(&store, "CA1", now - Duration::minutes(10), 30_000, 3, CallOutcome::Error);
        add_active(&store, "CA2", now - Duration::seconds(45), 2);

        let stats = aggregator.collect();
        assert_eq!(stats.total_calls, 1);
        assert_eq!(stats.total_duration_ms, 30_000);
        assert_eq!(stats.active_calls, 1);
        assert!(stats.active_duration_ms >= 45_000);
    }

    #[test]
    fn test_recent_calls_newest_first_and_windowed() {
        let config = StatsSettings {
            recent_calls_limit: 2,
            ..StatsSettings::default()
        };
        let (store, aggregator) = store_with(config);
        let base = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();

        add_closed(&store, "CA1", base, 5_000, 1, CallOutcome::CallerHangup);
        add_closed(&store, "CA2", base + Duration::minutes(1), 5_000, 1, CallOutcome::CallerHangup);
        add_closed(&store, "CA3", base + Duration::minutes(2), 5_000, 1, CallOutcome::CallerHangup);

        let stats = aggregator.collect();
        assert_eq!(stats.recent_calls.len(), 2);
        assert_eq!(stats.recent_calls[0].call_id, "CA3");
        assert_eq!(stats.recent_calls[1].call_id, "CA2");
        assert_eq!(stats.recent_calls[0].duration, "5s");
    }

    #[test]
    fn test_daily_buckets_are_chronological() {
        let (store, aggregator) = store_with(StatsSettings::default());

        let day1 = Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2026, 8, 2, 9, 0, 0).unwrap();
        add_closed(&store, "CA1", day2, 10_000, 2, CallOutcome::MaxTurns);
        add_closed(&store, "CA2", day1, 20_000, 3, CallOutcome::CallerHangup);
        add_closed(&store, "CA3", day1, 30_000, 4, CallOutcome::CallerHangup);

        let stats = aggregator.collect();
        assert_eq!(stats.daily_stats.len(), 2);
        assert_eq!(stats.daily_stats[0].date.to_string(), "2026-08-01");
        assert_eq!(stats.daily_stats[0].calls, 2);
        assert_eq!(stats.daily_stats[0].duration_ms, 50_000);
        assert_eq!(stats.daily_stats[0].turns, 7);
        assert_eq!(stats.daily_stats[1].date.to_string(), "2026-08-02");
        assert_eq!(stats.daily_stats[1].calls, 1);
    }

    #[test]
    fn test_daily_buckets_honor_reporting_offset() {
        let config = StatsSettings {
            reporting_utc_offset_minutes: 60,
            ..StatsSettings::default()
        };
        let (store, aggregator) = store_with(config);

        // 23:30 UTC lands on the next day at +01:00
        let late = Utc.with_ymd_and_hms(2026, 8, 1, 23, 30, 0).unwrap();
        add_closed(&store, "CA1", late, 10_000, 1, CallOutcome::CallerHangup);

        let stats = aggregator.collect();
        assert_eq!(stats.daily_stats.len(), 1);
        assert_eq!(stats.daily_stats[0].date.to_string(), "2026-08-02");
    }

    #[test]
    fn test_serializes_to_dashboard_contract() {
        let (store, aggregator) = store_with(StatsSettings::default());
        let start = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        add_closed(&store, "CA1", start, 30_000, 4, CallOutcome::SilenceTimeout);

        let json = serde_json::to_value(aggregator.collect()).unwrap();
        assert_eq!(json["totalCalls"], 1);
        assert_eq!(json["totalDurationMs"], 30_000);
        assert_eq!(json["avgDurationMs"], 30_000);
        assert_eq!(json["outcomes"]["silence_timeout"], 1);
        assert_eq!(json["recentCalls"][0]["callId"], "CA1");
        assert_eq!(json["recentCalls"][0]["turnCount"], 4);
        assert_eq!(json["recentCalls"][0]["outcome"], "silence_timeout");
        assert!(json["dailyStats"][0]["date"].is_string());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration_ms(0), "0s");
        assert_eq!(format_duration_ms(42_000), "42s");
        assert_eq!(format_duration_ms(90_000), "1m 30s");
        assert_eq!(format_duration_ms(3_660_000), "1h 1m");
        assert_eq!(format_duration_ms(-5), "0s");
    }
}
