use thiserror::Error;

/// Результат для операций разбора и обработки осциллограмм.
pub type WaveResult<T> = std::result::Result<T, WaveError>;

/// Типы ошибок разбора дескриптора и обработки сигнала.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WaveError {
    /// Буфер короче фиксированного дескриптора
    #[error("Payload too short: need {needed} bytes, got {got}")]
    TooShort { needed: usize, got: usize },

    /// Смещение массива выборок указывает за конец буфера
    #[error("Sample offset {offset} out of range (payload is {len} bytes)")]
    OffsetOutOfRange { offset: usize, len: usize },

    /// Неизвестный код ширины выборки
    #[error("Unsupported sample encoding: {0}")]
    UnsupportedEncoding(u16),

    /// Слишком мало выборок для операции
    #[error("Insufficient samples: need at least {needed}, got {got}")]
    InsufficientSamples { needed: usize, got: usize },

    /// Временная ось не возрастает (нельзя вычислить частоту дискретизации)
    #[error("Invalid timebase: {0}")]
    InvalidTimebase(String),

    /// Некорректный параметр вызова
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl WaveError {
    /// Удобные конструкторы
    pub fn insufficient(
        needed: usize,
        got: usize,
    ) -> Self {
        Self::InsufficientSamples { needed, got }
    }

    pub fn invalid_parameter<S: Into<String>>(s: S) -> Self {
        Self::InvalidParameter(s.into())
    }

    pub fn invalid_timebase<S: Into<String>>(s: S) -> Self {
        Self::InvalidTimebase(s.into())
    }
}
