//! The render server and the shared service bundle it runs on.

pub mod render_server;
pub mod services;

pub use render_server::{RenderConfig, RenderServer};
pub use services::RenderServices;
