pub mod config;
mod http_layers;
pub mod metrics;
mod photo_routes;
mod queue_routes;
mod search_routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use http_layers::*;
pub use search_routes::redirect_location;
pub use server::{make_app, run_server};
pub use state::ServerState;
