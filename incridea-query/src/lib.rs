//! Query execution for the Incridea client.
//!
//! A [`QueryDescriptor`] names a data requirement, declares the shape of its
//! result and carries a [`FetchPolicy`]:
//!
//! - `CacheFirst`: serve from the store when complete and unexpired
//! - `NetworkOnly`: always fetch, then merge
//! - `PrefetchAtBuild`: data shipped via hydration, refreshed per [`Revalidate`]
//!
//! Results are normalized into the shared store via
//! [`incridea_cache::normalize`], so every query sees the same entities.
//!
//! # Example
//!
//! ```
//! use incridea_cache::Selection;
//! use incridea_query::{FetchPolicy, QueryDescriptor};
//!
//! let users = QueryDescriptor::new(
//!     "GetAllUsers",
//!     "query GetAllUsers { users { id name } }",
//!     Selection::new().object("users", Selection::new().scalar("id").scalar("name")),
//! )
//! .with_policy(FetchPolicy::NetworkOnly);
//!
//! assert_eq!(users.id().to_string(), "GetAllUsers");
//! ```

mod descriptor;
mod error;
mod executor;
mod http;
mod scope;
pub mod transport;

pub use descriptor::{FetchPolicy, QueryDescriptor, QueryId, Revalidate};
pub use error::{QueryError, QueryResult};
pub use executor::{ExecutorConfig, QueryExecutor, QueryState, QueryStatus};
pub use http::HttpTransport;
pub use scope::ViewScope;
pub use transport::{GraphQlError, GraphQlResponse, QueryRequest, QueryTransport};
