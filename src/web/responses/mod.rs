pub mod error;
pub mod flash;

pub use error::{AppError, FormReply, FormResultExt};
pub use flash::{set_flash, take_flash, Flash, FlashKind};
