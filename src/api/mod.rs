//! Remote data client for the board API
//!
//! [`RemoteClient`] is the seam the stores talk to. [`HttpClient`] speaks to a
//! real server, [`MockRemote`] keeps everything in memory.

pub mod client;
pub mod envelope;
pub mod error;
pub mod mock;
pub mod query;
pub mod traits;

pub use client::HttpClient;
pub use error::{ApiError, ApiResult, FieldErrors, NETWORK_ERROR_MESSAGE};
pub use mock::{MockRemote, RemoteOp};
pub use query::{ProjectQuery, SortDirection, SortSpec, TaskQuery};
pub use traits::RemoteClient;
