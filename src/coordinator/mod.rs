mod machine;
mod record;
mod state;

pub use machine::Coordinator;
pub use record::{ApplicationRecord, RunSummary, StopReason};
pub use state::{CoordinatorState, Item, Outcome, Page, Phase};
