pub mod leaderboard;
pub mod models;
pub mod snapshot_store;
pub mod storage;
