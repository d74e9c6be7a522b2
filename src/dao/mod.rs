/// Typed access to the collections of the document and their validators.
pub mod collections;
/// Verified key/value persistence of the shared document.
pub mod local_store;
/// Raw key/value media the local store writes to.
pub mod medium;
/// Persisted record and document definitions.
pub mod models;
/// Profile keys of the local medium.
pub mod profile_cache;
/// Remote authoritative service clients.
pub mod remote;
/// Storage error types.
pub mod storage;
