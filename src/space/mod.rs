pub mod environment;
pub mod geo;
