use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

use wavecal_core::Measurement;
use wavecal_types::Diagnostic;

/// Метрики захватов, обновляемые lock-free из нескольких потоков.
#[derive(Debug, Default)]
pub struct AcquisitionMetrics {
    pub acquisitions_ok: AtomicU64,
    pub acquisitions_failed: AtomicU64,
    pub reads: AtomicU64,
    pub bytes_received: AtomicU64,
    pub length_mismatches: AtomicU64,
    pub cutoff_clamps: AtomicU64,
    pub filter_fallbacks: AtomicU64,
    pub threshold_fallbacks: AtomicU64,
    pub scale_fallbacks: AtomicU64,
}

/// Snapshot метрик для отображения / тестирования.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSummary {
    pub duration_secs: f64,
    pub acquisitions_ok: u64,
    pub acquisitions_failed: u64,
    pub reads: u64,
    pub bytes_received: u64,
    pub length_mismatches: u64,
    pub cutoff_clamps: u64,
    pub filter_fallbacks: u64,
    pub threshold_fallbacks: u64,
    pub scale_fallbacks: u64,
}

impl AcquisitionMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Учитывает успешное измерение и его диагностики.
    pub fn record(
        &self,
        m: &Measurement,
    ) {
        self.acquisitions_ok.fetch_add(1, Ordering::Relaxed);

        for d in &m.diagnostics {
            let counter = match d {
                Diagnostic::LengthMismatch { .. } => &self.length_mismatches,
                Diagnostic::CutoffClamped { .. } => &self.cutoff_clamps,
                Diagnostic::FilterFallback { .. } => &self.filter_fallbacks,
                Diagnostic::ThresholdNotMet { .. } => &self.threshold_fallbacks,
                Diagnostic::ScaleFallback { .. } => &self.scale_fallbacks,
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_failure(&self) {
        self.acquisitions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transfer(
        &self,
        reads: usize,
        bytes: usize,
    ) {
        self.reads.fetch_add(reads as u64, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Сумма всех восстановимых отклонений.
    pub fn diagnostics_total(&self) -> u64 {
        [
            &self.length_mismatches,
            &self.cutoff_clamps,
            &self.filter_fallbacks,
            &self.threshold_fallbacks,
            &self.scale_fallbacks,
        ]
        .iter()
        .map(|c| c.load(Ordering::Relaxed))
        .sum()
    }

    /// Итоговая сводка для вывода в конце сессии.
    pub fn summary(
        &self,
        elapsed: &Instant,
    ) -> MetricsSummary {
        MetricsSummary {
            duration_secs: elapsed.elapsed().as_secs_f64(),
            acquisitions_ok: self.acquisitions_ok.load(Ordering::Relaxed),
            acquisitions_failed: self.acquisitions_failed.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            length_mismatches: self.length_mismatches.load(Ordering::Relaxed),
            cutoff_clamps: self.cutoff_clamps.load(Ordering::Relaxed),
            filter_fallbacks: self.filter_fallbacks.load(Ordering::Relaxed),
            threshold_fallbacks: self.threshold_fallbacks.load(Ordering::Relaxed),
            scale_fallbacks: self.scale_fallbacks.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(f, "  Duration      : {:.2}s", self.duration_secs)?;
        writeln!(
            f,
            "  Acquisitions  : {} ok, {} failed",
            self.acquisitions_ok, self.acquisitions_failed
        )?;
        writeln!(f, "  Reads         : {}", self.reads)?;
        writeln!(
            f,
            "  Received      : {:.1} KB",
            self.bytes_received as f64 / 1e3
        )?;
        writeln!(f, "  Len mismatch  : {}", self.length_mismatches)?;
        writeln!(f, "  Cutoff clamp  : {}", self.cutoff_clamps)?;
        writeln!(f, "  Filter fallbk : {}", self.filter_fallbacks)?;
        writeln!(f, "  CV not met    : {}", self.threshold_fallbacks)?;
        writeln!(f, "  Scale fallbk  : {}", self.scale_fallbacks)?;
        write!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")
    }
}
