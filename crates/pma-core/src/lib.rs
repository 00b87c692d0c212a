pub mod change;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod hmap;
pub mod impact;
pub mod io;
pub mod milestone;
pub mod paths;
pub mod project;
pub mod prompts;
pub mod roles;
pub mod table;
pub mod task;
pub mod tracking;
pub mod types;
pub mod workflow;

pub use error::{PmaError, Result};
