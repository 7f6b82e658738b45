//! OpenHealth metrics sync service.
//!
//! Pulls per-repository metric files from the OpenDigger static host, bounds each snapshot
//! to the storage budget and keeps exactly one snapshot per repository in PostgreSQL.
//! A daily sweep refreshes every known repository; reads of unknown repositories sync on
//! demand. Health scores come from `health_engine`, narratives from an LLM endpoint.

pub mod bound;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod narrative;
pub mod orchestrator;
pub mod scheduler;
pub mod service;
pub mod store;

pub use config::{BoundConfig, NarrativeConfig, ScheduleConfig, SourceConfig};
pub use error::{GenerationUnavailable, ScheduleError, ServiceError, StoreError, SyncError, UpstreamUnavailable};
pub use fetcher::{HttpMetricSource, MetricSource};
pub use narrative::{parse_narrative, ChatCompletionsNarrator, Narrative, NarrativeGenerator};
pub use orchestrator::{Orchestrator, SweepFailure, SweepReport, SyncPhase};
pub use scheduler::Scheduler;
pub use service::{HealthReport, MetricsService};
pub use store::{MemoryStore, MetricsStore, PgMetricsStore};
