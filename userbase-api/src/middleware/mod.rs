/// Middleware modules for the API server
///
/// This module contains custom middleware for:
/// - Request activity recording
///
/// Bearer authentication lives next to the router in `app`, since it only
/// wraps the protected route groups.

pub mod activity;
