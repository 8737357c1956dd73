//! Фильтрация осциллограммы нижних частот.
//!
//! Основной режим — нуль-фазовый Баттерворт (feature `butterworth`).
//! Деградированный режим — центрированное скользящее среднее.

#[cfg(feature = "butterworth")]
pub mod butterworth;
pub mod moving_average;

use log::warn;
use wavecal_types::{FilterMethod, WaveError, WaveResult};

pub use moving_average::{moving_average, window_for_cutoff};

/// Порядок фильтра по умолчанию.
pub const DEFAULT_ORDER: usize = 4;

/// Доля частоты Найквиста, до которой ограничивается слишком высокий срез.
pub const NYQUIST_CLAMP: f64 = 0.9;

/// Результат фильтрации.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredTrace {
    /// Отфильтрованные значения, та же длина, что и на входе
    pub values: Vec<f64>,
    /// Фактически применённый метод
    pub method: FilterMethod,
    /// Запрошенная частота среза, Гц
    pub requested_cutoff_hz: f64,
    /// Применённая частота среза, Гц
    pub cutoff_hz: f64,
    /// Оценённая частота дискретизации, Гц
    pub sample_rate: f64,
    /// Почему не удалось применить Баттерворт
    pub fallback_reason: Option<String>,
}

impl FilteredTrace {
    /// Был ли срез ограничен из-за Найквиста.
    pub fn clamped(&self) -> bool {
        self.cutoff_hz != self.requested_cutoff_hz
    }
}

/// Частота дискретизации по временной оси.
pub fn sampling_rate(times: &[f64]) -> WaveResult<f64> {
    if times.len() < 2 {
        return Err(WaveError::insufficient(2, times.len()));
    }

    let span = times[times.len() - 1] - times[0];
    if !(span.is_finite() && span > 0.0) {
        return Err(WaveError::invalid_timebase(format!(
            "time span {span} over {} samples",
            times.len()
        )));
    }

    Ok((times.len() - 1) as f64 / span)
}

/// Фильтрует `values`, отсчитанные в моменты `times`.
pub fn filter(
    times: &[f64],
    values: &[f64],
    cutoff_hz: f64,
    order: usize,
) -> WaveResult<FilteredTrace> {
    if times.len() != values.len() {
        return Err(WaveError::invalid_parameter(format!(
            "{} timestamps for {} values",
            times.len(),
            values.len()
        )));
    }

    if !(cutoff_hz.is_finite() && cutoff_hz > 0.0) {
        return Err(WaveError::invalid_parameter(format!(
            "cutoff must be positive, got {cutoff_hz}"
        )));
    }

    if order == 0 {
        return Err(WaveError::invalid_parameter("filter order must be >= 1"));
    }

    let fs = sampling_rate(times)?;
    let nyquist = fs / 2.0;

    let applied = if cutoff_hz >= nyquist {
        let clamped = NYQUIST_CLAMP * nyquist;
        warn!(
            "Cutoff {cutoff_hz:.3} Hz >= Nyquist {nyquist:.3} Hz, clamping to {clamped:.3} Hz"
        );
        clamped
    } else {
        cutoff_hz
    };

    let (filtered, reason) = match lowpass(values, applied, fs, order) {
        Ok(y) => (Some(y), None),
        Err(reason) => (None, Some(reason)),
    };

    let result = match filtered {
        Some(values) => FilteredTrace {
            values,
            method: FilterMethod::Butterworth { order },
            requested_cutoff_hz: cutoff_hz,
            cutoff_hz: applied,
            sample_rate: fs,
            fallback_reason: None,
        },
        None => {
            let reason = reason.unwrap_or_default();
            let window = window_for_cutoff(fs, applied, values.len());
            warn!("Falling back to moving average (window {window}): {reason}");

            FilteredTrace {
                values: moving_average(values, window),
                method: FilterMethod::MovingAverage { window },
                requested_cutoff_hz: cutoff_hz,
                cutoff_hz: applied,
                sample_rate: fs,
                fallback_reason: Some(reason),
            }
        }
    };

    Ok(result)
}

#[cfg(feature = "butterworth")]
fn lowpass(
    values: &[f64],
    cutoff_hz: f64,
    sample_rate: f64,
    order: usize,
) -> Result<Vec<f64>, String> {
    let sos = butterworth::design_lowpass(cutoff_hz, sample_rate, order);
    let pad = butterworth::pad_len(&sos);

    if values.len() <= pad {
        return Err(format!(
            "{} samples is too short for zero-phase padding of {pad}",
            values.len()
        ));
    }

    butterworth::filtfilt(&sos, values).ok_or_else(|| "IIR output is not finite".to_string())
}

#[cfg(not(feature = "butterworth"))]
fn lowpass(
    _values: &[f64],
    _cutoff_hz: f64,
    _sample_rate: f64,
    _order: usize,
) -> Result<Vec<f64>, String> {
    Err("compiled without the butterworth feature".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timebase(
        n: usize,
        fs: f64,
    ) -> Vec<f64> {
        (0..n).map(|i| i as f64 / fs).collect()
    }

    #[test]
    fn test_sampling_rate() {
        let t = timebase(101, 1_000.0);
        assert!((sampling_rate(&t).unwrap() - 1_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_insufficient_timestamps() {
        assert_eq!(
            filter(&[0.0], &[1.0], 10.0, 4).unwrap_err(),
            WaveError::InsufficientSamples { needed: 2, got: 1 }
        );
    }

    #[test]
    fn test_non_increasing_timebase() {
        let err = filter(&[1.0, 1.0, 1.0], &[0.0; 3], 10.0, 4).unwrap_err();
        assert!(matches!(err, WaveError::InvalidTimebase(_)));
    }

    #[test]
    fn test_invalid_parameters() {
        let t = timebase(100, 1_000.0);
        let v = vec![0.0; 100];

        assert!(filter(&t, &v, 0.0, 4).is_err());
        assert!(filter(&t, &v, f64::NAN, 4).is_err());
        assert!(filter(&t, &v, 10.0, 0).is_err());
        assert!(filter(&t, &v[..50], 10.0, 4).is_err());
    }

    #[test]
    fn test_cutoff_clamped_to_nyquist() {
        let t = timebase(500, 1_000.0);
        let v = vec![1.0; 500];

        let out = filter(&t, &v, 800.0, 4).unwrap();

        assert!(out.clamped());
        assert!((out.cutoff_hz - 450.0).abs() < 1e-6);
        assert_eq!(out.requested_cutoff_hz, 800.0);
        assert_eq!(out.values.len(), 500);
    }

    #[test]
    fn test_same_length_and_constant_preserved() {
        let t = timebase(1_000, 10_000.0);
        let v = vec![-2.5; 1_000];

        let out = filter(&t, &v, 100.0, DEFAULT_ORDER).unwrap();

        assert!(!out.clamped());
        assert_eq!(out.values.len(), v.len());
        assert!(out.values.iter().all(|x| (x + 2.5).abs() < 1e-9));
    }

    #[cfg(feature = "butterworth")]
    #[test]
    fn test_butterworth_used_by_default() {
        let t = timebase(1_000, 10_000.0);
        let out = filter(&t, &vec![0.0; 1_000], 100.0, 4).unwrap();

        assert_eq!(out.method, FilterMethod::Butterworth { order: 4 });
        assert!(out.fallback_reason.is_none());
    }

    #[test]
    fn test_short_signal_falls_back() {
        let t = timebase(10, 1_000.0);
        let v: Vec<f64> = (0..10).map(|i| i as f64).collect();

        let out = filter(&t, &v, 250.0, 4).unwrap();

        assert_eq!(out.method, FilterMethod::MovingAverage { window: 5 });
        assert!(out.fallback_reason.is_some());
        assert_eq!(out.values.len(), 10);
        // край усреднён по укороченному окну [0, 1, 2]
        assert!((out.values[0] - 1.0).abs() < 1e-12);
    }
}
