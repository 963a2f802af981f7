/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Authentication endpoints (login, register, me)
/// - `resource`: Generic CRUD handlers shared by every exposed entity
/// - `users`: User payloads and their resource binding

pub mod auth;
pub mod health;
pub mod resource;
pub mod users;
