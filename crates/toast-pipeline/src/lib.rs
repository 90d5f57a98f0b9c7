//! Toast delivery pipeline.
//!
//! Absorbs notifications from any task, releases them to a single stage loop
//! at a bounded rate, archives overflow into one live archive group, and
//! manages the render elements behind each notification through a tiered
//! cache with simulated reclamation.

pub mod archive;
pub mod cache;
pub mod config;
pub mod element;
pub mod error;
pub mod geometry;
pub mod incident;
pub mod pipeline;
pub mod placement;
pub mod presenter;
pub mod scheduler;
pub mod stage;
mod timers;

// Re-exports for convenience
pub use cache::{CacheCounts, EntryKind, Reclaimer};
pub use config::{PipelineConfig, ReclaimPolicy};
pub use element::{ElementFactory, FactoryRegistry, RenderElement};
pub use error::{ElementError, PipelineError, Result};
pub use geometry::{Bounds, Point, Size};
pub use incident::{Incident, IncidentKind};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use placement::{Corner, Layout, Placement, StackPlacement};
pub use presenter::{PresenterId, PresenterState, PresenterView};
pub use stage::{ShutdownReport, StageSnapshot, VisibleEntry};
