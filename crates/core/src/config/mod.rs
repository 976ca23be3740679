pub mod sources;
pub mod storage_config;
pub mod validation;

pub use sources::*;
pub use storage_config::*;
pub use validation::*;
