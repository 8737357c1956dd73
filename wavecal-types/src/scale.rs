use serde::Serialize;

/// Откуда взято значение масштаба.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    /// Запрошено у прибора непосредственно перед захватом
    Live,
    /// Встроено в дескриптор осциллограммы
    Descriptor,
}

/// Эффективные усиление и смещение, применяемые при конвертации.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VerticalScale {
    pub gain: f64,
    pub offset: f64,
    pub gain_source: ValueSource,
    pub offset_source: ValueSource,
}

impl VerticalScale {
    /// Оба значения получены от прибора.
    pub fn is_live(&self) -> bool {
        self.gain_source == ValueSource::Live && self.offset_source == ValueSource::Live
    }
}

impl std::fmt::Display for ValueSource {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            ValueSource::Live => write!(f, "live"),
            ValueSource::Descriptor => write!(f, "descriptor"),
        }
    }
}
