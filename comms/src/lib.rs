mod error;
mod registry;
pub mod wire;

pub use error::{CommsErr, Result};
pub use registry::{HttpRegistry, RegistryConfig, RemoteRegistry, RemoteRegistryTemplate};
pub use wire::WORST_RATING;
