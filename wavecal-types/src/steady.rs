use serde::{Deserialize, Serialize};

/// Найденный установившийся участок `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SteadyState {
    pub start: usize,
    /// Исключительная граница
    pub end: usize,
    pub mean: f64,
    /// Стандартное отклонение (популяционное)
    pub stddev: f64,
    /// Удовлетворило ли опорное окно порогу CV
    pub met_threshold: bool,
    /// CV опорного окна грубого поиска, %
    pub reference_cv_pct: f64,
}

/// Параметры поиска установившегося участка.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteadyParams {
    /// Размер окна; `None` — автоматически `clamp(len / 100, 10, 2000)`
    pub window: Option<usize>,
    /// Порог коэффициента вариации, %
    pub cv_threshold_pct: f64,
    /// Доля начала записи, исключаемая из грубого поиска, %
    pub skip_initial_pct: f64,
    /// Пороги расширения границ
    pub extension: ExtensionLimits,
}

/// Пороги, при которых граница участка ещё расширяется.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionLimits {
    /// Множитель к `cv_threshold_pct`
    pub cv_factor: f64,
    /// Максимальный средний модуль первой разности, % от среднего на выборку
    pub max_trend_pct: f64,
    /// Максимальное отклонение среднего от опорного, %
    pub max_mean_dev_pct: f64,
}

impl SteadyState {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl Default for SteadyParams {
    fn default() -> Self {
        Self {
            window: None,
            cv_threshold_pct: 1.0,
            skip_initial_pct: 10.0,
            extension: ExtensionLimits::default(),
        }
    }
}

impl Default for ExtensionLimits {
    fn default() -> Self {
        Self {
            cv_factor: 1.5,
            max_trend_pct: 0.5,
            max_mean_dev_pct: 2.0,
        }
    }
}
