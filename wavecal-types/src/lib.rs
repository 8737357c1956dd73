pub mod descriptor;
pub mod diagnostic;
pub mod error;
pub mod scale;
pub mod steady;
pub mod trace;

pub use descriptor::*;
pub use diagnostic::*;
pub use error::*;
pub use scale::*;
pub use steady::*;
pub use trace::*;
