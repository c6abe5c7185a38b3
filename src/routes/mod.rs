/// Router Module Index
///
/// Routing split by access tier. Access control is applied per module (route
/// layers and extractors), so an endpoint's tier is visible from where it lives.

/// Routes open to anonymous clients: health, login, registration.
pub mod public;

/// Routes requiring a valid session.
pub mod authenticated;

/// Routes restricted to the admin role.
pub mod admin;
