/// Middleware modules for the API server
///
/// - `session`: Session authentication and global role gates
/// - `security`: Security response headers

pub mod security;
pub mod session;
