//! Service layer for name possession.
//! - `store` / `file`: durable possession records behind an async trait.
//! - `directory` / `onebot`: the chat-platform capability and its OneBot client.
//! - `possession`: selection policy, possession cycle and background scheduler.

pub mod errors;
pub mod runtime;
pub mod metrics;
pub mod storage;
pub mod store;
pub mod file;
pub mod directory;
pub mod onebot;
pub mod possession;
#[cfg(test)]
pub mod test_support;
