pub mod accounts;
pub mod session;

pub use accounts::AccountService;
pub use session::SessionService;
