pub use session::Session;

pub mod session;
