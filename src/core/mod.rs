pub mod config;
pub mod error;
pub mod pagination;
pub mod slug;
pub mod store;
