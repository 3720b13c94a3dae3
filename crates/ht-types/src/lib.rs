pub mod advisor;
pub mod errors;
pub mod incumbent;
pub mod observation;
pub mod options;
pub mod space;

pub use advisor::*;
pub use errors::*;
pub use incumbent::*;
pub use observation::*;
pub use options::*;
pub use space::*;
