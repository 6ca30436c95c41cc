pub mod commands;
pub mod config;
pub mod diff;
pub mod error;
pub mod logger;
pub mod path;
pub mod queue;
pub mod reducer;
pub mod state;
pub mod value;

pub use commands::*;
pub use config::*;
pub use diff::diff;
pub use diff::equal;
pub use diff::Difference;
pub use error::SyncError;
pub use logger::*;
pub use queue::*;
pub use reducer::*;
pub use state::*;
pub use value::Scalar;
pub use value::Value;
