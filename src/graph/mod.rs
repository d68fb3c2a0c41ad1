//! The core data structures for the calculation graph: an immutable
//! [`state::GraphState`] produced by a copy-on-write [`builder::Builder`],
//! plus the pure [`topology`] functions used to inspect a committed
//! state.

pub mod builder;
pub mod node;
pub mod state;
pub mod topology;

pub use builder::Builder;
pub use node::{Node, NodeKind};
pub use state::GraphState;
