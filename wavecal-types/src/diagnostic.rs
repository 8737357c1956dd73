use serde::Serialize;

/// Восстанавливаемое отклонение, исправленное документированной политикой.
///
/// Такие события не прерывают измерение, но попадают в результат и в
/// метрики, чтобы систематически разъюстированный прибор был заметен.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Заявленная длина массива выборок не совпала с доступными байтами
    LengthMismatch {
        declared_count: u32,
        declared_block_len: u32,
        available_bytes: usize,
        used_count: u32,
    },
    /// Частота среза не ниже Найквиста и была ограничена
    CutoffClamped { requested_hz: f64, applied_hz: f64 },
    /// Фильтр Баттерворта недоступен, применено скользящее среднее
    FilterFallback { reason: String },
    /// Ни одно окно не уложилось в порог CV
    ThresholdNotMet { best_cv_pct: f64, threshold_pct: f64 },
    /// Ответ прибора на запрос масштаба не распознан
    ScaleFallback { field: String, reply: String },
}

/// Фактически применённый метод фильтрации.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum FilterMethod {
    /// Нуль-фазовый фильтр Баттерворта (прямой и обратный проход)
    Butterworth { order: usize },
    /// Центрированное скользящее среднее с укорачивающимися краями
    MovingAverage { window: usize },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Diagnostic::LengthMismatch {
                declared_count,
                available_bytes,
                used_count,
                ..
            } => write!(
                f,
                "sample count {declared_count} declared, {available_bytes} bytes available, using {used_count}"
            ),
            Diagnostic::CutoffClamped {
                requested_hz,
                applied_hz,
            } => write!(
                f,
                "cutoff {requested_hz:.3} Hz clamped to {applied_hz:.3} Hz"
            ),
            Diagnostic::FilterFallback { reason } => {
                write!(f, "moving-average fallback: {reason}")
            }
            Diagnostic::ThresholdNotMet {
                best_cv_pct,
                threshold_pct,
            } => write!(
                f,
                "no window met CV {threshold_pct:.3}%, best was {best_cv_pct:.3}%"
            ),
            Diagnostic::ScaleFallback { field, reply } => {
                write!(f, "unparsable {field} reply {reply:?}, using descriptor value")
            }
        }
    }
}

impl std::fmt::Display for FilterMethod {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            FilterMethod::Butterworth { order } => write!(f, "butterworth(order={order})"),
            FilterMethod::MovingAverage { window } => write!(f, "moving-average(window={window})"),
        }
    }
}
