// HTTP middleware
pub mod edge_auth;

pub use edge_auth::edge_auth_middleware;
