//! calopix-core: Core containers and types for calorimeter and flow analyses.
//!
//! This crate provides the detector data model (tracks, calorimeter cells
//! and clusters, events), the [`Container`] abstraction over detector
//! object lists, and [`FilteredView`], a read-only view that iterates over
//! all or only the accepted objects of a container.
//!

pub mod calo;
pub mod container;
pub mod error;
pub mod event;
pub mod iterable;
pub mod selection;
pub mod track;

pub use calo::{CaloCell, CaloCluster, ClusterKind};
pub use container::{Acceptance, Container, RejectionMask};
pub use error::{Error, Result};
pub use event::{Event, EventFormat, EventPlaneInfo, QVector, TriggerMask, Vertex};
pub use iterable::{Cursor, Direction, FilteredView, Iter, Mode};
pub use selection::{ClusterContainer, ClusterCuts, TrackContainer, TrackCuts};
pub use track::{Track, TrackStatus};
