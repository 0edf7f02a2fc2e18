pub mod http;
pub mod validation;

pub use http::*;
pub use validation::*;
