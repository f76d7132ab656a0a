//! Database models and queries

pub mod battles;
pub mod beats;
pub mod init;
pub mod models;

pub use battles::*;
pub use beats::*;
pub use init::*;
pub use models::*;
