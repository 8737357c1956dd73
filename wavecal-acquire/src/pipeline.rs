use std::{sync::Arc, thread};

use log::{debug, info, warn};
use wavecal_core::{analyze, parse_numeric_reply, AnalysisOptions, Measurement, ScaleOverrides};
use wavecal_types::Diagnostic;

use crate::{
    metrics::AcquisitionMetrics, AcquireConfig, AcquireError, AcquireResult, FrameReceiver,
    ScopeSession,
};

/// Оркестрирует один захват: настройка, масштаб, приём и обработка.
pub struct Acquisition {
    config: AcquireConfig,
    metrics: Arc<AcquisitionMetrics>,
}

/// Результат обработки одного канала в пакете.
pub type BatchResult = (String, AcquireResult<Measurement>);

impl Acquisition {
    /// Создаёт захват. Возвращает также shared-ссылку на метрики.
    pub fn new(config: AcquireConfig) -> (Self, Arc<AcquisitionMetrics>) {
        let metrics = AcquisitionMetrics::new();
        (Self::with_metrics(config, metrics.clone()), metrics)
    }

    /// Захват, пишущий в существующие метрики.
    pub fn with_metrics(
        config: AcquireConfig,
        metrics: Arc<AcquisitionMetrics>,
    ) -> Self {
        Self { config, metrics }
    }

    /// Выполняет захват. Блокируется до конца передачи.
    pub fn run<S: ScopeSession + ?Sized>(
        &self,
        session: &mut S,
    ) -> AcquireResult<Measurement> {
        match self.acquire(session) {
            Ok(m) => {
                self.metrics.record(&m);
                Ok(m)
            }
            Err(e) => {
                self.metrics.record_failure();
                warn!("Acquisition on {} failed: {e}", self.config.channel);
                Err(e)
            }
        }
    }

    fn acquire<S: ScopeSession + ?Sized>(
        &self,
        session: &mut S,
    ) -> AcquireResult<Measurement> {
        let cfg = &self.config;
        cfg.validate()?;

        for command in cfg.setup() {
            session.write(&command)?;
        }

        let mut diagnostics = Vec::new();
        let overrides = if cfg.live_scale {
            ScaleOverrides {
                gain: self.query_scale(session, &cfg.gain_query, "gain", &mut diagnostics),
                offset: self.query_scale(session, &cfg.offset_query, "offset", &mut diagnostics),
            }
        } else {
            ScaleOverrides::default()
        };

        let frame = FrameReceiver::new(cfg.receiver()).receive(session)?;
        self.metrics
            .record_transfer(frame.reads, frame.bytes_received);

        info!(
            "Received {} bytes from {} in {} reads",
            frame.payload.len(),
            cfg.channel,
            frame.reads
        );

        let mut m = analyze(&frame.payload, &cfg.analysis, overrides)?;

        diagnostics.append(&mut m.diagnostics);
        m.diagnostics = diagnostics;

        if m.has_diagnostics() {
            let list: Vec<String> = m.diagnostics.iter().map(ToString::to_string).collect();
            warn!("{}: {}", cfg.channel, list.join("; "));
        }

        info!(
            "{}: mean {:.6}, std {:.6} over [{}, {}) of {}",
            cfg.channel, m.mean, m.stddev, m.steady.start, m.steady.end, m.sample_count
        );

        Ok(m)
    }

    /// Запрашивает одно значение масштаба. Нераспознанный ответ или ошибка
    /// запроса — откат к значению из дескриптора с диагностикой.
    fn query_scale<S: ScopeSession + ?Sized>(
        &self,
        session: &mut S,
        template: &str,
        field: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<f64> {
        let command = self.config.command(template);

        let reply = match session.query(&command) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("{command} failed ({e}), using descriptor {field}");
                diagnostics.push(Diagnostic::ScaleFallback {
                    field: field.to_string(),
                    reply: e.to_string(),
                });
                return None;
            }
        };

        match parse_numeric_reply(&reply) {
            Some(v) => {
                debug!("Live {field}: {v} ({reply:?})");
                Some(v)
            }
            None => {
                warn!("Unparsable {command} reply {reply:?}, using descriptor {field}");
                diagnostics.push(Diagnostic::ScaleFallback {
                    field: field.to_string(),
                    reply,
                });
                None
            }
        }
    }
}

/// Параллельно обрабатывает уже принятые ответы нескольких каналов.
///
/// Результаты возвращаются в порядке входа.
pub fn analyze_batch(
    payloads: Vec<(String, Vec<u8>)>,
    options: &AnalysisOptions,
) -> Vec<BatchResult> {
    let total = payloads.len();
    if total == 0 {
        return Vec::new();
    }

    let workers = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(total);

    let (job_tx, job_rx) = crossbeam_channel::unbounded::<(usize, String, Vec<u8>)>();
    let (res_tx, res_rx) = crossbeam_channel::unbounded::<(usize, BatchResult)>();

    let mut names = Vec::with_capacity(total);
    for (idx, (name, payload)) in payloads.into_iter().enumerate() {
        names.push(name.clone());
        // получатель жив до конца функции
        let _ = job_tx.send((idx, name, payload));
    }
    drop(job_tx);

    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let jobs = job_rx.clone();
            let results = res_tx.clone();
            let options = *options;

            thread::spawn(move || {
                for (idx, name, payload) in jobs.iter() {
                    let result =
                        analyze(&payload, &options, ScaleOverrides::default()).map_err(Into::into);
                    if results.send((idx, (name, result))).is_err() {
                        break;
                    }
                }
            })
        })
        .collect();
    drop(res_tx);

    let mut slots: Vec<Option<BatchResult>> = (0..total).map(|_| None).collect();
    for (idx, result) in res_rx.iter() {
        slots[idx] = Some(result);
    }

    for h in handles {
        if h.join().is_err() {
            warn!("Batch worker panicked");
        }
    }

    slots
        .into_iter()
        .zip(names)
        .map(|(slot, name)| {
            slot.unwrap_or_else(|| {
                (
                    name,
                    Err(AcquireError::Batch("worker exited without result".to_string())),
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimulatedScope;
    use wavecal_core::format::{descriptor_template, encode_waveform};
    use wavecal_types::{SampleWidth, ValueSource};

    fn flat_reply(raw: i16) -> Vec<u8> {
        let mut desc = descriptor_template(SampleWidth::Word, 500);
        desc.vertical_gain = 25.0;
        desc.horiz_interval = 1e-4;
        encode_waveform(&desc, &vec![raw; 500]).unwrap()
    }

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut out = format!("#9{:09}", payload.len()).into_bytes();
        out.extend_from_slice(payload);
        out.push(b'\n');
        out
    }

    #[test]
    fn test_run_with_live_scale() {
        let mut scope = SimulatedScope::new(framed(&flat_reply(10)))
            .with_chunks(vec![333])
            .with_answer("C1:VDIV?", "C1:VDIV 5.00E+00V")
            .with_answer("C1:OFST?", "C1:OFST 1.0E+00V");

        let (acq, metrics) = Acquisition::new(AcquireConfig::default());
        let m = acq.run(&mut scope).unwrap();

        // 5 * 10 / 25 - 1
        assert!((m.mean - 1.0).abs() < 1e-9);
        assert!(m.scale.is_live());
        assert!(!m.has_diagnostics());
        assert_eq!(
            scope.written(),
            &[
                "COMM_HEADER OFF",
                "COMM_FORMAT DEF9,WORD,BIN",
                "COMM_ORDER LO",
                "C1:VDIV?",
                "C1:OFST?",
                "C1:WF? ALL"
            ]
        );

        let summary = metrics.summary(&std::time::Instant::now());
        assert_eq!(summary.acquisitions_ok, 1);
        assert_eq!(summary.bytes_received, 11 + 346 + 1_000 + 1);
        assert_eq!(summary.scale_fallbacks, 0);
    }

    #[test]
    fn test_unparsable_scale_falls_back() {
        let mut scope = SimulatedScope::new(framed(&flat_reply(4)))
            .with_answer("C1:VDIV?", "C1:VDIV OFF")
            .with_answer("C1:OFST?", "0.5");

        let (acq, metrics) = Acquisition::new(AcquireConfig::default());
        let m = acq.run(&mut scope).unwrap();

        assert_eq!(m.scale.gain_source, ValueSource::Descriptor);
        assert_eq!(m.scale.offset_source, ValueSource::Live);
        assert!((m.mean - 3.5).abs() < 1e-9);
        assert!(m.has_diagnostics());
        assert_eq!(
            m.diagnostics[0],
            Diagnostic::ScaleFallback {
                field: "gain".to_string(),
                reply: "C1:VDIV OFF".to_string()
            }
        );
        assert_eq!(metrics.scale_fallbacks.load(std::sync::atomic::Ordering::Relaxed), 1);
    }

    #[test]
    fn test_failure_counted() {
        let mut scope = SimulatedScope::new(Vec::new());
        let config = AcquireConfig {
            live_scale: false,
            ..AcquireConfig::default()
        };

        let (acq, metrics) = Acquisition::new(config);
        let err = acq.run(&mut scope).unwrap_err();

        assert!(matches!(err, AcquireError::Timeout));
        assert_eq!(metrics.summary(&std::time::Instant::now()).acquisitions_failed, 1);
    }

    #[test]
    fn test_batch_keeps_input_order() {
        let payloads: Vec<(String, Vec<u8>)> = (1..=6)
            .map(|i| (format!("C{i}"), flat_reply(i as i16)))
            .chain(std::iter::once(("bad".to_string(), vec![0u8; 10])))
            .collect();

        let results = analyze_batch(payloads, &AnalysisOptions::default());

        assert_eq!(results.len(), 7);
        for (i, (name, result)) in results.iter().take(6).enumerate() {
            assert_eq!(name, &format!("C{}", i + 1));
            let m = result.as_ref().unwrap();
            assert!((m.mean - (i + 1) as f64).abs() < 1e-9);
        }
        assert_eq!(results[6].0, "bad");
        assert!(matches!(results[6].1, Err(AcquireError::Wave(_))));
    }

    #[test]
    fn test_empty_batch() {
        assert!(analyze_batch(Vec::new(), &AnalysisOptions::default()).is_empty());
    }
}
