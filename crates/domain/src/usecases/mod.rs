//! Application use cases / business logic

pub mod render;
pub mod resolve;
pub mod run_loop;

pub use render::{RenderConfig, Renderer};
pub use resolve::{ResolverConfig, SourceResolver};
pub use run_loop::{Firing, RunLoop, RunLoopConfig, RunLoopError};
