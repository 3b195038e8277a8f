pub mod application;
pub mod backends;
pub mod errors;
pub mod ipc;
pub mod models;
pub mod ports;
pub mod services;

pub use application::*;
pub use errors::*;
pub use models::*;
pub use ports::*;
pub use services::*;
