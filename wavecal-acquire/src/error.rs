use thiserror::Error;
use wavecal_types::WaveError;

pub type AcquireResult<T> = std::result::Result<T, AcquireError>;

#[derive(Debug, Error)]
pub enum AcquireError {
    /// Прибор не прислал ни одного байта
    #[error("Timed out waiting for instrument reply")]
    Timeout,

    /// Передача оборвалась раньше заявленной длины
    #[error("Truncated transfer: received {received} of {expected} bytes")]
    Truncated { received: usize, expected: usize },

    /// Некорректный заголовок двоичного блока `#<n><len>`
    #[error("Malformed block header: {0}")]
    MalformedHeader(String),

    /// Ошибка транспорта
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка разбора или обработки осциллограммы
    #[error("Waveform error: {0}")]
    Wave(#[from] WaveError),

    /// Ошибка сессии с прибором
    #[error("Session error: {0}")]
    Session(String),

    /// Некорректная конфигурация
    #[error("Config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ошибка пакетной обработки (inter-thread)
    #[error("Batch error: {0}")]
    Batch(String),
}

impl AcquireError {
    /// Ошибка относится к обмену с прибором, а не к данным.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AcquireError::Timeout
                | AcquireError::Truncated { .. }
                | AcquireError::MalformedHeader(_)
                | AcquireError::Io(_)
                | AcquireError::Session(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors() {
        assert!(AcquireError::Timeout.is_transport());
        assert!(AcquireError::Truncated {
            received: 1,
            expected: 2
        }
        .is_transport());
        assert!(AcquireError::MalformedHeader("#x".into()).is_transport());
        assert!(AcquireError::Session("closed".into()).is_transport());

        assert!(!AcquireError::Wave(WaveError::TooShort { needed: 346, got: 10 }).is_transport());
        assert!(!AcquireError::Config("bad".into()).is_transport());
    }
}
