pub mod current_user;
pub mod session;

pub use current_user::{AdminUser, CurrentUser, OptionalUser, ADMIN_SIGNIN_PATH, SIGNIN_PATH};
pub use session::{clear_session, read_session, store_session};
