//! Client for the external booking store.
//!
//! The store exposes four stored procedures for bookings plus plain tables
//! for call sessions and conversation logs (PostgREST conventions:
//! `/rest/v1/rpc/<name>` for procedures, `/rest/v1/<table>` for rows).
//! [`StoreProvider`] is the seam the gateway depends on;
//! [`RestStoreClient`] is the production implementation.

mod provider;
mod rest;
mod types;

pub use provider::StoreProvider;
pub use rest::RestStoreClient;
pub use types::*;
