pub mod articles;
pub mod auth;
pub mod categories;
pub mod system;
pub mod tags;
pub mod users;
