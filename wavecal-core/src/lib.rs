//! Обработка осциллограмм в формате WAVEDESC
//!
//! Разбор бинарного дескриптора, перевод сырых выборок в физические
//! единицы, нуль-фазовая фильтрация и поиск установившегося участка.
//!
//! # Быстрый старт
//!
//! ```no_run
//! use wavecal_core::{analyze, AnalysisOptions, ScaleOverrides};
//!
//! let payload = std::fs::read("capture.bin")?;
//! let m = analyze(&payload, &AnalysisOptions::default(), ScaleOverrides::default())?;
//! println!("mean = {:.6}, std = {:.6}", m.mean, m.stddev);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod analysis;
pub mod binary;
pub mod convert;
pub mod filter;
pub mod format;
pub mod numeric;
pub mod steady;

pub use analysis::*;
pub use binary::*;
pub use convert::*;
pub use filter::{filter, sampling_rate, FilteredTrace};
pub use format::{find_marker, parse, WAVEDESC_SIZE, WAVEDESC_TAG};
pub use numeric::*;
pub use steady::{default_window, locate, mean_std};

/// Версия библиотеки.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
