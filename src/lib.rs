pub mod collect;
pub mod io;
pub mod logging;
pub mod math;
pub mod model;
pub mod optimize;
pub mod space;
pub mod viz;

pub use model::epidemic::EpidemicModel;
pub use space::environment::{GeoEnvironment, GeoEnvironmentConfig};
