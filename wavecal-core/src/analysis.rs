//! Чистый конвейер обработки одного ответа прибора: разбор дескриптора,
//! конвертация, фильтрация и поиск установившегося участка.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use wavecal_types::{
    Diagnostic, FilterMethod, SteadyParams, SteadyState, Trace, VerticalScale, WaveResult,
    WaveformDescriptor,
};

use crate::{convert, filter, format, steady};

/// Параметры обработки.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Частота среза ФНЧ, Гц
    pub cutoff_hz: f64,
    /// Порядок фильтра Баттерворта
    pub order: usize,
    pub steady: SteadyParams,
    /// Сохранять отфильтрованную осциллограмму в результате
    pub keep_trace: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            cutoff_hz: 1_000.0,
            order: filter::DEFAULT_ORDER,
            steady: SteadyParams::default(),
            keep_trace: false,
        }
    }
}

/// Значения масштаба, запрошенные у прибора.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScaleOverrides {
    pub gain: Option<f64>,
    pub offset: Option<f64>,
}

/// Результат одного измерения.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    /// Среднее установившегося участка
    pub mean: f64,
    pub stddev: f64,
    pub steady: SteadyState,
    pub scale: VerticalScale,
    pub filter: FilterMethod,
    /// Применённая частота среза, Гц
    pub cutoff_hz: f64,
    pub sample_count: usize,
    /// Оценённая частота дискретизации, Гц
    pub sample_rate: f64,
    pub descriptor: WaveformDescriptor,
    pub diagnostics: Vec<Diagnostic>,
    /// Отфильтрованная осциллограмма, если запрошена
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Trace>,
}

impl Measurement {
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Обрабатывает полный ответ прибора (дескриптор и массив выборок).
pub fn analyze(
    payload: &[u8],
    options: &AnalysisOptions,
    overrides: ScaleOverrides,
) -> WaveResult<Measurement> {
    let mut diagnostics = Vec::new();

    let (descriptor, sample_offset) = format::parse(payload)?;

    let available = payload.len() - sample_offset;
    if let Some(diag) = format::length_mismatch(&descriptor, available) {
        diagnostics.push(diag);
    }

    let scale = convert::resolve_scale(&descriptor, overrides.gain, overrides.offset);
    debug!(
        "Scale: gain {} ({}), offset {} ({})",
        scale.gain, scale.gain_source, scale.offset, scale.offset_source
    );

    let trace = convert::convert(
        payload,
        sample_offset,
        descriptor.sample_count as usize,
        descriptor.sample_width,
        &descriptor,
        &scale,
    )?;

    let filtered = filter::filter(&trace.times, &trace.values, options.cutoff_hz, options.order)?;

    if filtered.clamped() {
        diagnostics.push(Diagnostic::CutoffClamped {
            requested_hz: filtered.requested_cutoff_hz,
            applied_hz: filtered.cutoff_hz,
        });
    }

    if let Some(reason) = &filtered.fallback_reason {
        diagnostics.push(Diagnostic::FilterFallback {
            reason: reason.clone(),
        });
    }

    let region = steady::locate(&filtered.values, &options.steady)?;

    if !region.met_threshold {
        diagnostics.push(Diagnostic::ThresholdNotMet {
            best_cv_pct: region.reference_cv_pct,
            threshold_pct: options.steady.cv_threshold_pct,
        });
    }

    if !diagnostics.is_empty() {
        warn!("Measurement completed with {} diagnostic(s)", diagnostics.len());
    }

    let sample_count = trace.len();
    let trace = options.keep_trace.then(|| Trace {
        times: trace.times,
        values: filtered.values,
    });

    Ok(Measurement {
        mean: region.mean,
        stddev: region.stddev,
        steady: region,
        scale,
        filter: filtered.method,
        cutoff_hz: filtered.cutoff_hz,
        sample_count,
        sample_rate: filtered.sample_rate,
        descriptor,
        diagnostics,
        trace,
    })
}
