pub mod analyze;
pub mod evaluate;
pub mod tools;

pub use analyze::*;
pub use evaluate::*;
pub use tools::*;
