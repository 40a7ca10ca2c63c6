//! # Armory
//!
//! A release bundle server, usable both as a standalone binary and as a library.
//!
//! Armory stores versioned build artifacts ("bundles") for applications shared
//! among teams with differing access levels. Bundle content is stored
//! content-addressed by SHA-256, and every identifier that crosses the API
//! boundary is an opaque reversible token rather than a database key.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use armory::codec::IdCodec;
//! use armory::config::ServerConfig;
//! use armory::server::{AppState, create_router};
//! use armory::store::{SqliteStore, Store};
//!
//! let config = ServerConfig::default();
//! let store = SqliteStore::new(config.db_path()).unwrap();
//! store.initialize().unwrap();
//!
//! let codec = IdCodec::new(&config.secret_key).unwrap();
//! let state = Arc::new(AppState::new(Arc::new(store), codec, &config));
//! let router = create_router(state);
//! // Serve with axum...
//! ```

pub mod bundle;
pub mod codec;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod types;
