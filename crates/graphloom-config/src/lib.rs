//! # graphloom configuration
//!
//! Typed configuration for the graphloom translator: default and maximum
//! page sizes, optional filter operators, statement formatting and
//! subscription support.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use graphloom_config::ConfigLoader;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::load_from_file("graphloom.toml")?;
//!     println!("indent = {}", config.emit.indent);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod loader;

pub use config::*;
pub use loader::*;
