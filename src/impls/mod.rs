pub mod option;
pub mod result;

pub use option::*;
pub use result::*;
