pub mod digest;
pub mod signing;
