//! Splitpack library
//!
//! Partitions a module graph into loadable chunks and resolves the final
//! locations of binary assets at runtime.

pub mod cli;
pub mod config;
pub mod bundler;
pub mod resolver;
pub mod utils;

pub use cli::Cli;
pub use config::Config;
pub use bundler::{partition, Bundler, Partition};
pub use resolver::{AssetLoader, AssetTable};
