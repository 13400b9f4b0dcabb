pub mod record;
pub mod tree;

pub use record::*;
pub use tree::*;
