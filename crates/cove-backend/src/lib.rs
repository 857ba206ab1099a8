//! Reference implementations of the collaborator contracts: a SQLite-backed
//! remote store with a change-event broadcast, a local identity provider,
//! and a directory-backed object store. These stand in for the hosted
//! services the client core is written against.

pub mod dispatcher;
pub mod identity;
pub mod local;
pub mod storage;

pub use dispatcher::Dispatcher;
pub use identity::LocalIdentity;
pub use local::LocalBackend;
pub use storage::DirStorage;
