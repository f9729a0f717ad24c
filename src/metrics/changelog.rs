//! Per-issue ordering of status changes: occurrence rank and status end time.

use std::collections::{BTreeMap, HashMap};

use super::types::{RawStatusEvent, StatusEvent};

/// Place every event in its issue's timeline.
///
/// Each issue's events are ordered by timestamp (stable, unknown timestamps
/// last). `rank` counts events per (issue, source status) with ties sharing a
/// rank; `status_ended` is the next event's timestamp within the same issue.
/// Output is ordered by issue key, then time.
pub fn annotate(raw: Vec<RawStatusEvent>) -> Vec<StatusEvent> {
    let mut by_issue: BTreeMap<String, Vec<RawStatusEvent>> = BTreeMap::new();
    for event in raw {
        by_issue.entry(event.key.clone()).or_default().push(event);
    }

    let mut annotated = Vec::new();
    for (_, mut events) in by_issue {
        events.sort_by_key(|e| (e.created.is_none(), e.created));

        let ranks = occurrence_ranks(&events);
        let ended: Vec<_> = events
            .iter()
            .skip(1)
            .map(|e| e.created)
            .chain(std::iter::once(None))
            .collect();

        for ((event, rank), status_ended) in events.into_iter().zip(ranks).zip(ended) {
            annotated.push(StatusEvent {
                key: event.key,
                from_status: event.from_status,
                to_status: event.to_status,
                created: event.created,
                rank,
                status_ended,
            });
        }
    }
    annotated
}

/// SQL `rank()` over one issue's time-ordered events, partitioned by source status.
fn occurrence_ranks(events: &[RawStatusEvent]) -> Vec<u32> {
    // source status -> (events seen, last timestamp, last rank)
    let mut seen: HashMap<Option<&str>, (u32, Option<_>, u32)> = HashMap::new();
    events
        .iter()
        .map(|e| {
            let (count, last_ts, last_rank) = seen
                .entry(e.from_status.as_deref())
                .or_insert((0, None, 0));
            *count += 1;
            let rank = if *count > 1 && *last_ts == e.created {
                *last_rank
            } else {
                *count
            };
            *last_ts = e.created;
            *last_rank = rank;
            rank
        })
        .collect()
}
