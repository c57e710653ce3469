/// Router Module Index
///
/// Routes are grouped by the access they require; the gate for each group is
/// attached as a route layer in `create_router`, so a handler can never be
/// mounted without it.

/// Anonymous, read-only access to published content, plus login.
pub mod public;

/// Any caller holding a valid, current token.
pub mod authenticated;

/// Managers and admins only.
pub mod manager;
