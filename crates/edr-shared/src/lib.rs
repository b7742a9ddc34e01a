pub mod errors;
pub mod models;
pub mod wire;

pub use errors::*;
pub use models::*;
pub use wire::*;
