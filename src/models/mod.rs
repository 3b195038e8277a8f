pub mod config;
pub mod events;
pub mod filter;
pub mod package;
pub mod repository;
pub mod transaction;

pub use config::*;
pub use events::*;
pub use filter::*;
pub use package::*;
pub use repository::*;
pub use transaction::*;
