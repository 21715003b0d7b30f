//! Command handlers for the fake server, one module per command
//! family: LOGIN/LOGOUT, SELECT/EXAMINE, CLOSE, UID SEARCH, UID FETCH.

mod auth;
mod uid_search;

pub use auth::{handle_login, handle_logout};
pub use close::handle_close;
pub use open::{OpenMode, handle_open};
pub use uid_fetch::handle_uid_fetch;
pub use uid_search::handle_uid_search;
