/// Database access for accounts and roles
///
/// Every function takes the request's `&mut PgConnection`; none of them
/// acquire or hold connections on their own.
pub mod roles;
pub mod users;
