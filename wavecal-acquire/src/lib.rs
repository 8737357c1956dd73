//! Захват осциллограмм с прибора и проверка калибровки.
//!
//! Сессия с прибором ([`ScopeSession`]) → приём ответа ([`FrameReceiver`]) →
//! обработка (`wavecal_core::analyze`) → вердикт ([`calibration::check`]).

pub mod calibration;
pub mod config;
pub mod error;
pub mod frame;
pub mod metrics;
pub mod pipeline;
pub mod session;

pub use calibration::*;
pub use config::*;
pub use error::*;
pub use frame::*;
pub use metrics::*;
pub use pipeline::*;
pub use session::*;
