pub mod logging;
pub mod metrics;
pub mod request_id;

pub use logging::logging_middleware;
pub use metrics::metrics_middleware;
pub use request_id::{request_id_middleware, CorrelationId};
