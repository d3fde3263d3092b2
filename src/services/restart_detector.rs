//! Detection of drivers who restarted an event between two snapshots.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};

use crate::dao::models::{Entry, EventSnapshot};

/// A driver as seen on the leaderboard: display name plus `PlayerId`.
type Driver<'a> = (&'a str, u64);

/// Recorded time per stage index for each driver.
type StageTimes<'a> = HashMap<Driver<'a>, HashMap<usize, &'a str>>;

fn driver(entry: &Entry) -> Driver<'_> {
    (entry.name.as_str(), entry.player_id)
}

fn recorded_times(snapshot: &EventSnapshot) -> StageTimes<'_> {
    let mut times: StageTimes<'_> = HashMap::new();
    for (stage, data) in snapshot.stage_data.iter().enumerate() {
        for entry in &data.entries {
            let driver = times.entry(driver(entry)).or_default();
            if !entry.time.is_empty() {
                driver.insert(stage, entry.time.as_str());
            }
        }
    }
    times
}

/// Compute the restart counters of `current` from the `previous` snapshot.
///
/// A driver is flagged when any stage time recorded before is now missing or
/// different. Drivers are told apart by name and `PlayerId`, counters are kept
/// by name and bumped at most once per call; everyone else keeps the previous counter.
pub fn detect_restarts(previous: &EventSnapshot, current: &EventSnapshot) -> IndexMap<String, u32> {
    let before = recorded_times(previous);
    let after = recorded_times(current);
    let empty = HashMap::new();

    let roster = previous
        .stage_data
        .iter()
        .chain(&current.stage_data)
        .flat_map(|stage| stage.entries.iter().map(driver))
        .collect::<IndexSet<_>>();

    let flagged = roster
        .into_iter()
        .filter(|driver| {
            let old = before.get(driver).unwrap_or(&empty);
            let new = after.get(driver).unwrap_or(&empty);
            old.iter().any(|(stage, time)| new.get(stage) != Some(time))
        })
        .map(|(name, _)| name)
        .collect::<IndexSet<_>>();

    let mut restarters = previous.restarters.clone();
    for name in flagged {
        *restarters.entry(name.to_string()).or_default() += 1;
    }
    restarters
}
