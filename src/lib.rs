// Library exports for blogsync
// The binary and the integration tests both build on these modules

pub mod api;
pub mod categories;
pub mod config;
pub mod error;
pub mod gateway;
pub mod likes;
pub mod listing;
pub mod models;
pub mod optimistic;
pub mod ownership;
pub mod search;
pub mod session;
pub mod state;
