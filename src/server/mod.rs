mod apps;
pub mod auth;
mod bundles;
pub mod dto;
pub mod response;
mod router;

pub use router::{AppState, create_router};
