//! Record shapes and linked-list primitives over a document store.

pub mod node;
pub mod queue;

pub use node::{Direction, NodeDoc, NodeList, NodePayload, NODES};
pub use queue::{all_queues, find_queue, QueueDoc, QUEUES};
