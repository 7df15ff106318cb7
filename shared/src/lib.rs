pub mod auth;
pub mod models;
pub mod store;

// Test helpers (mock store, request builders, logging) are only compiled
// when the consuming crate opts in via the `test_utils` feature.
#[cfg(feature = "test_utils")]
pub mod test_utils;
