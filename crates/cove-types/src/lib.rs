pub mod api;
pub mod error;
pub mod events;
pub mod models;
pub mod remote;
pub mod slug;

pub use error::{StoreError, StoreResult};
