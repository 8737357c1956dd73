//! Поиск установившегося участка осциллограммы.
//!
//! Два этапа: грубый поиск окна с минимальным разбросом и расширение его
//! границ по одной выборке, пока соседнее окно остаётся стабильным, без
//! тренда и близким по среднему к опорному окну.

use log::{debug, warn};
use wavecal_types::{ExtensionLimits, SteadyParams, SteadyState, WaveError, WaveResult};

/// Минимальная длина последовательности.
pub const MIN_SAMPLES: usize = 10;

const MIN_WINDOW: usize = 10;
const MAX_WINDOW: usize = 2_000;
const NEAR_ZERO: f64 = 1e-10;

/// Префиксные суммы для статистик окна за O(1).
struct WindowStats {
    shift: f64,
    sum: Vec<f64>,
    sq: Vec<f64>,
    abs_diff: Vec<f64>,
}

/// Статистика одного окна.
#[derive(Debug, Clone, Copy)]
struct Window {
    mean: f64,
    std: f64,
    cv_pct: f64,
    trend_pct: f64,
}

impl WindowStats {
    fn new(values: &[f64]) -> Self {
        let n = values.len();
        // Сдвиг уменьшает потерю точности в sq - sum^2
        let shift = values.iter().sum::<f64>() / n as f64;

        let mut sum = Vec::with_capacity(n + 1);
        let mut sq = Vec::with_capacity(n + 1);
        let mut abs_diff = Vec::with_capacity(n + 1);
        sum.push(0.0);
        sq.push(0.0);
        abs_diff.push(0.0);

        let (mut s, mut q, mut d) = (0.0, 0.0, 0.0);
        for (i, &v) in values.iter().enumerate() {
            let y = v - shift;
            s += y;
            q += y * y;
            if i > 0 {
                d += (v - values[i - 1]).abs();
            }
            sum.push(s);
            sq.push(q);
            // abs_diff[k] = сумма |x[i] - x[i-1]| для 1 <= i < k
            abs_diff.push(d);
        }

        Self {
            shift,
            sum,
            sq,
            abs_diff,
        }
    }

    fn window(
        &self,
        lo: usize,
        hi: usize,
    ) -> Window {
        let n = (hi - lo) as f64;
        let m = (self.sum[hi] - self.sum[lo]) / n;
        let var = ((self.sq[hi] - self.sq[lo]) / n - m * m).max(0.0);

        let mean = m + self.shift;
        let std = var.sqrt();

        let diffs = hi - lo - 1;
        let avg_diff = if diffs > 0 {
            (self.abs_diff[hi] - self.abs_diff[lo + 1]) / diffs as f64
        } else {
            0.0
        };

        Window {
            mean,
            std,
            cv_pct: relative_pct(std, mean),
            trend_pct: relative_pct(avg_diff, mean),
        }
    }
}

/// `|x / mean| * 100`, либо `|x| * 100` для среднего около нуля.
fn relative_pct(
    x: f64,
    mean: f64,
) -> f64 {
    if mean.abs() < NEAR_ZERO {
        x.abs() * 100.0
    } else {
        (x / mean).abs() * 100.0
    }
}

/// Среднее и популяционное стандартное отклонение.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    (mean, var.sqrt())
}

/// Размер окна по умолчанию: `clamp(len / 100, 10, 2000)`.
pub fn default_window(len: usize) -> usize {
    (len / 100).clamp(MIN_WINDOW, MAX_WINDOW)
}

/// Находит самый длинный установившийся участок.
pub fn locate(
    values: &[f64],
    params: &SteadyParams,
) -> WaveResult<SteadyState> {
    let len = values.len();
    if len < MIN_SAMPLES {
        return Err(WaveError::insufficient(MIN_SAMPLES, len));
    }

    if !(params.cv_threshold_pct.is_finite() && params.cv_threshold_pct >= 0.0) {
        return Err(WaveError::invalid_parameter(format!(
            "cv threshold must be non-negative, got {}",
            params.cv_threshold_pct
        )));
    }

    let w = params.window.unwrap_or_else(|| default_window(len)).clamp(1, len);
    let stats = WindowStats::new(values);
    let (lo, hi) = search_range(len, w, params.skip_initial_pct);

    // Грубый поиск: минимальный std среди окон, прошедших порог CV
    let mut qualified: Option<(usize, Window)> = None;
    let mut overall: Option<(usize, Window)> = None;

    for start in lo..hi {
        let win = stats.window(start, start + w);

        if overall.is_none_or(|(_, best)| win.std < best.std) {
            overall = Some((start, win));
        }

        if win.cv_pct <= params.cv_threshold_pct
            && qualified.is_none_or(|(_, best)| win.std < best.std)
        {
            qualified = Some((start, win));
        }
    }

    let met_threshold = qualified.is_some();
    let (seed, reference) = match qualified.or(overall) {
        Some(found) => found,
        None => (0, stats.window(0, w)),
    };

    if !met_threshold {
        warn!(
            "No window met CV {:.3}%, using lowest-std window (CV {:.3}%)",
            params.cv_threshold_pct, reference.cv_pct
        );
    }

    let (start, end) = extend(
        &stats,
        len,
        w,
        seed,
        reference.mean,
        params.cv_threshold_pct,
        &params.extension,
    );

    let (mean, stddev) = mean_std(&values[start..end]);

    debug!(
        "Steady region [{start}, {end}) of {len}, window {w}, seed {seed}, mean {mean:.6}, std {stddev:.6}"
    );

    Ok(SteadyState {
        start,
        end,
        mean,
        stddev,
        met_threshold,
        reference_cv_pct: reference.cv_pct,
    })
}

/// Диапазон начальных индексов окна для грубого поиска.
fn search_range(
    len: usize,
    w: usize,
    skip_initial_pct: f64,
) -> (usize, usize) {
    let skip = (len as f64 * skip_initial_pct.max(0.0) / 100.0) as usize;
    let upper = len.saturating_sub(w);

    let lo = skip.max(w);
    if lo < upper {
        return (lo, upper);
    }

    if w < upper {
        return (w, upper);
    }

    (0, upper + 1)
}

/// Расширяет `[seed, seed + w)` в обе стороны.
///
/// Кандидат принимается, если окно из `w` выборок, заканчивающееся на нём
/// (со стороны расширения), проходит все три проверки.
fn extend(
    stats: &WindowStats,
    len: usize,
    w: usize,
    seed: usize,
    reference_mean: f64,
    cv_threshold_pct: f64,
    limits: &ExtensionLimits,
) -> (usize, usize) {
    let cv_limit = limits.cv_factor * cv_threshold_pct;

    let accepts = |win: Window| {
        win.cv_pct <= cv_limit
            && win.trend_pct < limits.max_trend_pct
            && relative_pct(win.mean - reference_mean, reference_mean) <= limits.max_mean_dev_pct
    };

    let mut start = seed;
    while start > 0 {
        let win = stats.window(start.saturating_sub(w), start);
        if !accepts(win) {
            break;
        }
        start -= 1;
    }

    let mut end = (seed + w).min(len);
    while end < len {
        let win = stats.window(end, (end + w).min(len));
        if !accepts(win) {
            break;
        }
        end += 1;
    }

    (start, end)
}
