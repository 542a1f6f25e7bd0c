pub mod error;
pub mod geom;
pub mod io;
pub mod sim;
pub mod uid;
pub mod units;

// Prelude
pub use error::DetectorError;
pub use geom::point::Point;
pub use geom::vector::Vector;
pub use geom::volume::VolumeTree;
pub use sim::config::RunConfig;
pub use sim::framework::{RunManager, RunOutcome};
pub use uid::UID;
