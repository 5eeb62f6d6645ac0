mod handlers;
mod response;
mod server;

pub use response::{ApiError, ErrorBody};
pub use server::{GatewayConfig, GatewayServer, HealthResponse, REQUEST_ID_HEADER};
