//! Fixtures shared by the in-crate unit tests.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::time::sleep;

use crate::dao::{
    leaderboard::{FetchError, FetchResult, LeaderboardSource, OVERVIEW_STAGE, RawPage},
    models::{Entry, EventId, EventSnapshot, StageSnapshot},
    snapshot_store::FileSnapshotStore,
};

/// Build a leaderboard entry for `name` with the given recorded time.
pub fn entry(position: u32, name: &str, time: &str) -> Entry {
    Entry {
        position,
        player_id: u64::from(position) * 1_000 + name.len() as u64,
        name: name.to_string(),
        vehicle_name: "Mitsubishi Lancer Evo VI".to_string(),
        time: time.to_string(),
        diff_first: String::new(),
    }
}

/// Generate `count` distinct drivers starting at `first_position`.
pub fn drivers(first_position: u32, count: u32) -> Vec<Entry> {
    (first_position..first_position + count)
        .map(|position| Entry {
            position,
            player_id: u64::from(position),
            name: format!("driver-{position}"),
            vehicle_name: "Subaru Impreza".to_string(),
            time: format!("04:{:02}.000", position % 60),
            diff_first: String::new(),
        })
        .collect()
}

/// Player id derived from the name only, so a driver keeps it across stages.
fn stable_player_id(name: &str) -> u64 {
    name.bytes()
        .fold(7_u64, |id, byte| id.wrapping_mul(31).wrapping_add(u64::from(byte)))
}

/// Snapshot whose stages hold the given `(driver, time)` pairs.
pub fn snapshot_with_times(id: EventId, stages: &[&[(&str, &str)]]) -> EventSnapshot {
    let stage_data = stages
        .iter()
        .map(|rows| {
            let entries = rows
                .iter()
                .enumerate()
                .map(|(index, (name, time))| Entry {
                    player_id: stable_player_id(name),
                    ..entry(index as u32 + 1, name, time)
                })
                .collect::<Vec<_>>();
            StageSnapshot {
                total: entries.len() as u32,
                entries,
                times: vec![10],
            }
        })
        .collect::<Vec<_>>();

    EventSnapshot {
        id,
        stage_count: stage_data.len() as u32,
        stage_data,
        request_count: stages.len() as u32,
        total_time: 10 * stages.len() as u64,
        actual_time: 0,
        cache_time: String::new(),
        finished: false,
        finishing_strikes: 0,
        restarters: IndexMap::new(),
        last_error: None,
    }
}

/// Open a file store rooted in a fresh temporary directory.
pub async fn temp_store() -> (tempfile::TempDir, FileSnapshotStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSnapshotStore::open(dir.path().join("cache"))
        .await
        .unwrap();
    (dir, store)
}

#[derive(Debug, Clone)]
enum Scripted {
    Page {
        pages: u32,
        total_stages: u32,
        total: u32,
        entries: Vec<Entry>,
        delay: Duration,
    },
    Malformed,
}

/// Leaderboard source answering from a fixed script of pages.
///
/// Pages missing from the script answer with a parse error.
#[derive(Clone, Default)]
pub struct ScriptedLeaderboard {
    script: HashMap<(u32, u32), Scripted>,
    requests: Arc<AtomicU32>,
}

impl ScriptedLeaderboard {
    /// Empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overview page announcing `total_stages` stages.
    pub fn overview(mut self, total_stages: u32) -> Self {
        self.script.insert(
            (OVERVIEW_STAGE, 1),
            Scripted::Page {
                pages: 1,
                total_stages,
                total: 0,
                entries: Vec::new(),
                delay: Duration::ZERO,
            },
        );
        self
    }

    /// Single page with explicit page count and declared total.
    pub fn page(mut self, stage: u32, page: u32, pages: u32, total: u32, entries: Vec<Entry>) -> Self {
        self.script.insert(
            (stage, page),
            Scripted::Page {
                pages,
                total_stages: 0,
                total,
                entries,
                delay: Duration::ZERO,
            },
        );
        self
    }

    /// Stage declaring `total` entries, split across pages of the given rows.
    pub fn stage(self, stage: u32, total: u32, pages: Vec<Vec<Entry>>) -> Self {
        let page_count = pages.len() as u32;
        pages
            .into_iter()
            .enumerate()
            .fold(self, |script, (index, entries)| {
                script.page(stage, index as u32 + 1, page_count, total, entries)
            })
    }

    /// Stage whose pages hold `sizes[i]` generated drivers each, declaring their sum.
    pub fn generated_stage(self, stage: u32, sizes: &[u32]) -> Self {
        let total = sizes.iter().sum();
        let mut next = 1;
        let pages = sizes
            .iter()
            .map(|size| {
                let rows = drivers(next, *size);
                next += size;
                rows
            })
            .collect();
        self.stage(stage, total, pages)
    }

    /// Page reporting that no leaderboard exists.
    pub fn empty(mut self, stage: u32, page: u32) -> Self {
        self.script.insert(
            (stage, page),
            Scripted::Page {
                pages: 0,
                total_stages: 0,
                total: 0,
                entries: Vec::new(),
                delay: Duration::ZERO,
            },
        );
        self
    }

    /// Page answering with a body that is not JSON.
    pub fn malformed(mut self, stage: u32, page: u32) -> Self {
        self.script.insert((stage, page), Scripted::Malformed);
        self
    }

    /// Delay the answer of an already scripted page.
    pub fn delayed(mut self, stage: u32, page: u32, by: Duration) -> Self {
        if let Some(Scripted::Page { delay, .. }) = self.script.get_mut(&(stage, page)) {
            *delay = by;
        }
        self
    }

    /// Requests served so far.
    pub fn requests(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }

    /// Share the script as a trait object while keeping access to counters.
    pub fn shared(self) -> (Arc<dyn LeaderboardSource>, Self) {
        let handle = self.clone();
        (Arc::new(self), handle)
    }
}

impl LeaderboardSource for ScriptedLeaderboard {
    fn fetch_page(
        &self,
        event: EventId,
        stage: u32,
        page: u32,
    ) -> BoxFuture<'static, FetchResult<RawPage>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.get(&(stage, page)).cloned();
        Box::pin(async move {
            match scripted {
                Some(Scripted::Page {
                    pages,
                    total_stages,
                    total,
                    entries,
                    delay,
                }) => {
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                    Ok(RawPage {
                        event,
                        stage,
                        page,
                        pages,
                        total_stages,
                        total,
                        entries,
                        elapsed: Duration::from_millis(5),
                    })
                }
                Some(Scripted::Malformed) | None => Err(FetchError::Parse {
                    event,
                    stage,
                    page,
                    source: serde_json::from_str::<serde_json::Value>("<html>").unwrap_err(),
                }),
            }
        })
    }
}
