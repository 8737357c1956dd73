//! Фильтр Баттерворта нижних частот в виде каскада биквадов (SOS) и его
//! нуль-фазовое применение (прямой и обратный проход).

use std::f64::consts::PI;

/// Коэффициенты одной секции второго порядка:
/// `H(z) = (b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

/// Секция с состоянием (Direct Form II Transposed).
#[derive(Debug, Clone, Copy)]
struct Biquad {
    c: BiquadCoeffs,
    z1: f64,
    z2: f64,
}

impl BiquadCoeffs {
    /// Коэффициент передачи на нулевой частоте.
    pub fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }

    fn is_first_order(&self) -> bool {
        self.b2 == 0.0 && self.a2 == 0.0
    }
}

impl Biquad {
    /// Секция в установившемся режиме для постоянного входа `x`.
    fn settled(
        c: BiquadCoeffs,
        x: f64,
    ) -> Self {
        let y = c.dc_gain() * x;

        Self {
            c,
            z1: y - c.b0 * x,
            z2: c.b2 * x - c.a2 * y,
        }
    }

    #[inline]
    fn process(
        &mut self,
        x: f64,
    ) -> f64 {
        let y = self.c.b0 * x + self.z1;
        self.z1 = self.c.b1 * x - self.c.a1 * y + self.z2;
        self.z2 = self.c.b2 * x - self.c.a2 * y;
        y
    }
}

/// Проектирует ФНЧ Баттерворта порядка `order` билинейным преобразованием
/// с предыскажением частоты.
pub fn design_lowpass(
    cutoff_hz: f64,
    sample_rate: f64,
    order: usize,
) -> Vec<BiquadCoeffs> {
    let k = (PI * cutoff_hz / sample_rate).tan();
    let k2 = k * k;
    let pairs = order / 2;
    let mut sections = Vec::with_capacity(order.div_ceil(2));

    for i in 0..pairs {
        // Пара полюсов аналогового прототипа: s^2 + 2 sin(theta) s + 1
        let theta = PI * (2 * i + 1) as f64 / (2 * order) as f64;
        let damping = 2.0 * theta.sin();
        let norm = 1.0 / (1.0 + damping * k + k2);

        let b0 = k2 * norm;
        sections.push(BiquadCoeffs {
            b0,
            b1: 2.0 * b0,
            b2: b0,
            a1: 2.0 * (k2 - 1.0) * norm,
            a2: (1.0 - damping * k + k2) * norm,
        });
    }

    if order % 2 == 1 {
        let b0 = k / (1.0 + k);
        sections.push(BiquadCoeffs {
            b0,
            b1: b0,
            b2: 0.0,
            a1: (k - 1.0) / (k + 1.0),
            a2: 0.0,
        });
    }

    sections
}

/// Длина нечётного продолжения сигнала на каждом краю.
pub fn pad_len(sections: &[BiquadCoeffs]) -> usize {
    let first_order = sections.iter().filter(|s| s.is_first_order()).count();
    3 * (2 * sections.len() + 1 - first_order)
}

/// Один проход каскада с начальными условиями установившегося режима для
/// первого отсчёта.
fn sosfilt(
    sections: &[BiquadCoeffs],
    x: &[f64],
) -> Vec<f64> {
    let Some(&x0) = x.first() else {
        return Vec::new();
    };

    let mut stages = Vec::with_capacity(sections.len());
    let mut level = x0;
    for &c in sections {
        stages.push(Biquad::settled(c, level));
        level *= c.dc_gain();
    }

    x.iter()
        .map(|&v| stages.iter_mut().fold(v, |acc, s| s.process(acc)))
        .collect()
}

/// Нуль-фазовая фильтрация.
///
/// Возвращает `None`, если сигнал короче нечётного продолжения или
/// результат содержит нечисловые значения.
pub fn filtfilt(
    sections: &[BiquadCoeffs],
    x: &[f64],
) -> Option<Vec<f64>> {
    let n = x.len();
    let pad = pad_len(sections);

    if n <= pad {
        return None;
    }

    let first = x[0];
    let last = x[n - 1];

    let mut ext = Vec::with_capacity(n + 2 * pad);
    ext.extend((1..=pad).rev().map(|i| 2.0 * first - x[i]));
    ext.extend_from_slice(x);
    ext.extend((1..=pad).map(|i| 2.0 * last - x[n - 1 - i]));

    let mut y = sosfilt(sections, &ext);
    y.reverse();
    let mut y = sosfilt(sections, &y);
    y.reverse();

    let out = y[pad..pad + n].to_vec();

    out.iter().all(|v| v.is_finite()).then_some(out)
}
