//! The HTTP boundary library: configuration, auth, the user store and
//! the route handlers. The `signd` binary (`src/main.rs`) wires these
//! together; `signd-admin` reuses `config` and `db` directly.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod routes;
