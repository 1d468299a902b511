//! Normalized entity cache for the Incridea client.
//!
//! # Architecture
//!
//! - **Store**: flat table of [`NormalizedRecord`](incridea_types::NormalizedRecord)s
//!   keyed by [`EntityKey`](incridea_types::EntityKey), merged field-wise
//! - **Handle**: shared, lockable access to one store plus its hydration state
//! - **Snapshot**: transport form of a store, embedded in the initial page payload
//! - **Normalize**: flattening query results into records and reading them back
//! - **Manager**: one store per server request, one per client session
//!
//! # Example
//!
//! ```
//! use incridea_cache::{CacheInstanceManager, ExecutionContext};
//! use incridea_types::{EntityKey, FieldValue, NormalizedRecord};
//!
//! let manager = CacheInstanceManager::new();
//! let server = manager.resolve(ExecutionContext::Server);
//! server
//!     .merge(
//!         EntityKey::new("User", "1"),
//!         NormalizedRecord::new().with_field("name", FieldValue::scalar("Ada")),
//!     )
//!     .unwrap();
//!
//! let client = manager.resolve(ExecutionContext::Client);
//! manager.hydrate(&client, &server.extract()).unwrap();
//! assert!(client.is_hydrated());
//! ```

mod error;
mod handle;
mod manager;
pub mod normalize;
mod selection;
mod snapshot;
mod store;

pub use error::{CacheError, CacheResult};
pub use handle::{HydrationState, StoreHandle};
pub use manager::{CacheInstanceManager, ExecutionContext, HydrationReport};
pub use selection::{ArgValue, Selection, SelectionField, Variables};
pub use snapshot::{CacheSnapshot, PagePayload, PageProps};
pub use store::{MergeOutcome, NormalizedStore, StoreChange, CHANGE_CHANNEL_CAPACITY};
