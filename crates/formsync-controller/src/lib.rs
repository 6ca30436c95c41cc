pub mod controller;
pub mod field_tree;
pub mod store;

pub use controller::*;
pub use field_tree::*;
pub use store::*;
