pub mod approval;
pub mod config;
pub mod conversation;
pub mod errors;
pub mod export;
pub mod extract;
pub mod model;
pub mod server;
pub mod store;
pub mod util;
pub mod workflow;
