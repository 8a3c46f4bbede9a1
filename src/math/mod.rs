pub mod apportion;
pub mod matrix;
