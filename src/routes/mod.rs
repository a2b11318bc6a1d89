/// Router Module Index
///
/// Routes are split by the access level they require. Authentication is applied as a
/// layer on the `authenticated` and `admin` routers; role gates (staff or admin) are
/// checked inside the handlers through `AuthUser`.

/// Routes open to anonymous clients: the public catalog, health and login/registration.
pub mod public;

/// Routes behind the `AuthUser` middleware: account management and villa writes.
pub mod authenticated;

/// Routes mounted under `/api/admin`, for editors and admins.
pub mod admin;
