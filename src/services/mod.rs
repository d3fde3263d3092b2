/// Multi-stage leaderboard aggregation and validation.
pub mod aggregator;
/// OpenAPI documentation generation.
pub mod documentation;
/// Cached event lookups for the HTTP layer.
pub mod event_service;
/// Health check service.
pub mod health_service;
/// Update cycles with in-flight exclusion, retries and commits.
pub mod orchestrator;
/// Restart detection between two snapshots.
pub mod restart_detector;
/// Periodic refresh of live events.
pub mod sweep;
/// Finishing-strike bookkeeping.
pub mod termination;
