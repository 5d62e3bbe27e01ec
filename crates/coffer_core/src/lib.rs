//! Storage, configuration and logging shared by the coffer crates.
//!
//! The library never installs a global subscriber on its own. Binaries
//! embedding coffer call [`init_logging`] once at startup with the loaded
//! [`CofferConfig`] and keep the returned guard alive.

pub mod config;
pub mod logging;
pub mod store;

pub use config::CofferConfig;
pub use logging::init_logging;
pub use store::{KvWrite, Store};
