//! OneBot v11 HTTP implementation of [`GroupDirectory`](crate::directory::GroupDirectory).

pub mod client;

pub use client::OneBotClient;
