//! Conversation engine: the session store, reply turns and background upkeep.

pub mod background;
pub mod store;
pub mod turn;

pub use background::BackgroundTasks;
pub use store::ChatStore;
pub use turn::{PendingTurn, TurnOutcome};
