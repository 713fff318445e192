//! Host integrations.
//!
//! - [`http`] - `reqwest`-backed [`Fetcher`](crate::Fetcher)

pub mod http;
