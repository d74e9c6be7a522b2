/// Organiser operations on collections and requests.
pub mod admin_service;
/// Community chat rooms over the realtime channel or the local cache.
pub mod chat_sync;
/// Health check service.
pub mod health_service;
/// Profile, request and chat operations of the device user.
pub mod member_service;
/// Transactional read-merge-write of document collections.
pub mod mutator;
/// Projection of cached profiles into players.
pub mod profile_projector;
/// Read-only projections of the local document.
pub mod public_service;
/// Remote-to-local refresh of collections.
pub mod reconciler;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events streaming service.
pub mod sse_service;
/// Community join and tournament registration workflows.
pub mod workflow_tracker;
