//! HTTP surface for one causal-consistent KV store node (spec.md §6):
//! the eight endpoints, their error/rejection mapping, and the request
//! handler logic that ties them to [`cluster`] and [`store`].

mod context;
mod error;
mod handlers;
pub mod http;

pub use context::AppContext;
pub use http::{Builder, Service};
