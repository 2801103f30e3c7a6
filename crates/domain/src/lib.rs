//! bjj-bot domain crate
//!
//! This crate contains the core domain logic following hexagonal architecture:
//! - `model`: Domain entities and value objects
//! - `ports`: Trait definitions for external dependencies (adapters)
//! - `store`: The used-item store and its persistence tiers
//! - `topic`: Weekly topic rotation
//! - `policy`: Per-slot category fallback and publishing
//! - `usecases`: Source resolution, rendering and the scheduling loop

pub mod model;
pub mod policy;
pub mod ports;
pub mod store;
pub mod topic;
pub mod usecases;

pub use model::*;
pub use policy::SelectionPolicy;
pub use ports::*;
pub use store::{Backing, Committed, StoreError, UsedItemStore};
pub use topic::{topic_for_date, topic_index};
