pub mod builders;
pub mod strategies;

#[allow(unused_imports)]
pub use builders::*;
