//! Сравнение аналогового измерения с цифровым значением, которое сообщает
//! проверяемое устройство.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use wavecal_core::Measurement;

use crate::AcquireResult;

/// Точка калибровки: ожидаемое значение и допуск.
///
/// Допуск — большее из абсолютного и относительного.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub name: String,
    pub expected: f64,
    #[serde(default)]
    pub tolerance_abs: f64,
    /// Относительный допуск, % от `expected`
    #[serde(default)]
    pub tolerance_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
    /// Измерение не состоялось; повторить захват
    Inconclusive(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationOutcome {
    pub point: CalibrationPoint,
    pub measured: Option<f64>,
    pub stddev: Option<f64>,
    /// `measured - expected`
    pub deviation: Option<f64>,
    pub allowed: f64,
    pub verdict: Verdict,
}

impl CalibrationPoint {
    pub fn new(
        name: &str,
        expected: f64,
    ) -> Self {
        Self {
            name: name.to_string(),
            expected,
            tolerance_abs: 0.0,
            tolerance_pct: 0.0,
        }
    }

    pub fn with_abs(
        mut self,
        tolerance: f64,
    ) -> Self {
        self.tolerance_abs = tolerance;
        self
    }

    pub fn with_pct(
        mut self,
        tolerance_pct: f64,
    ) -> Self {
        self.tolerance_pct = tolerance_pct;
        self
    }

    /// Допустимое отклонение в единицах измерения.
    pub fn allowed_deviation(&self) -> f64 {
        self.tolerance_abs
            .abs()
            .max(self.expected.abs() * self.tolerance_pct.abs() / 100.0)
    }
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
            Verdict::Inconclusive(reason) => write!(f, "INCONCLUSIVE ({reason})"),
        }
    }
}

/// Выносит вердикт по результату захвата. Ошибка захвата даёт
/// `Inconclusive`, а не панику.
pub fn check(
    point: &CalibrationPoint,
    result: &AcquireResult<Measurement>,
) -> CalibrationOutcome {
    let allowed = point.allowed_deviation();

    let m = match result {
        Ok(m) => m,
        Err(e) => {
            warn!("{}: no measurement ({e})", point.name);
            return CalibrationOutcome {
                point: point.clone(),
                measured: None,
                stddev: None,
                deviation: None,
                allowed,
                verdict: Verdict::Inconclusive(e.to_string()),
            };
        }
    };

    let deviation = m.mean - point.expected;
    let verdict = if !deviation.is_finite() {
        Verdict::Inconclusive(format!("non-finite mean {}", m.mean))
    } else if deviation.abs() <= allowed {
        Verdict::Pass
    } else {
        Verdict::Fail
    };

    info!(
        "{}: measured {:.6}, expected {:.6}, deviation {:+.6} (allowed ±{:.6}) → {verdict}",
        point.name, m.mean, point.expected, deviation, allowed
    );

    CalibrationOutcome {
        point: point.clone(),
        measured: Some(m.mean),
        stddev: Some(m.stddev),
        deviation: Some(deviation),
        allowed,
        verdict,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AcquireError;
    use wavecal_core::{
        analyze,
        format::{descriptor_template, encode_waveform},
        AnalysisOptions, ScaleOverrides,
    };
    use wavecal_types::SampleWidth;

    fn measurement(raw: i16) -> Measurement {
        let mut desc = descriptor_template(SampleWidth::Word, 200);
        desc.vertical_gain = 2.5;
        desc.horiz_interval = 1e-4;
        let bytes = encode_waveform(&desc, &vec![raw; 200]).unwrap();

        analyze(&bytes, &AnalysisOptions::default(), ScaleOverrides::default()).unwrap()
    }

    #[test]
    fn test_allowed_is_larger_tolerance() {
        let p = CalibrationPoint::new("vbat", 12.0).with_abs(0.05).with_pct(1.0);
        assert!((p.allowed_deviation() - 0.12).abs() < 1e-12);

        let p = CalibrationPoint::new("vref", 1.0).with_abs(0.05).with_pct(1.0);
        assert!((p.allowed_deviation() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_pass_and_fail() {
        // 2.5 * 120 / 25 = 12.0
        let m = Ok(measurement(120));

        let pass = check(&CalibrationPoint::new("vbat", 12.02).with_abs(0.05), &m);
        assert_eq!(pass.verdict, Verdict::Pass);
        assert!((pass.deviation.unwrap() + 0.02).abs() < 1e-6);

        let fail = check(&CalibrationPoint::new("vbat", 12.2).with_abs(0.05), &m);
        assert_eq!(fail.verdict, Verdict::Fail);
    }

    #[test]
    fn test_error_is_inconclusive() {
        let result: AcquireResult<Measurement> = Err(AcquireError::Truncated {
            received: 500,
            expected: 1024,
        });

        let outcome = check(&CalibrationPoint::new("vbat", 12.0), &result);

        assert!(matches!(outcome.verdict, Verdict::Inconclusive(_)));
        assert_eq!(outcome.measured, None);
        assert!(!outcome.verdict.is_pass());
    }

    #[test]
    fn test_outcome_json_shape() {
        let outcome = check(
            &CalibrationPoint::new("vbat", 12.0).with_abs(0.1),
            &Ok(measurement(120)),
        );
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["verdict"], "pass");
        assert_eq!(json["point"]["name"], "vbat");
    }
}
