pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod responses;
pub mod router;
pub mod templates;

#[cfg(test)]
mod tests;

pub use extractors::{AdminUser, CurrentUser};
pub use responses::{AppError, FormReply};
pub use router::create_router;
