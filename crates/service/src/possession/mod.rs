//! Possession: copy a random member's display name onto the bot's own group card.
//! - `policy`: which groups are eligible.
//! - `service`: one select → act → record pass, also used for on-demand requests.
//! - `scheduler`: the cancellable background loop with jittered sleeps.

pub mod policy;
pub mod scheduler;
pub mod service;

pub use policy::GroupFilter;
pub use scheduler::Scheduler;
pub use service::{CycleOutcome, PossessOutcome, Possession, PossessionService};
