//! Client-side realtime synchronization store.
//!
//! Holds the working copy of channels, messages, and the current user;
//! keeps it consistent with the remote source of truth by merging pushed
//! change events idempotently; reconciles the client's own optimistic
//! writes against their remote echoes; and exposes the authorization
//! predicates the presentation layer gates destructive actions on.

pub mod auth;
pub mod identity;
pub mod profile;
pub mod store;

pub use identity::IdentityContext;
pub use store::RealtimeStore;
