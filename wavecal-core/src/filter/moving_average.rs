/// Центрированное скользящее среднее.
///
/// На краях окно укорачивается (без заворачивания и без нулевого
/// дополнения), поэтому длина выхода равна длине входа. Чётное окно
/// увеличивается до ближайшего нечётного.
pub fn moving_average(
    values: &[f64],
    window: usize,
) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }

    let half = window.max(1) / 2;

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    let mut acc = 0.0;
    for &v in values {
        acc += v;
        prefix.push(acc);
    }

    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(n);
            (prefix[hi] - prefix[lo]) / (hi - lo) as f64
        })
        .collect()
}

/// Размер окна, соответствующий частоте среза: `≈ fs / cutoff`, нечётный,
/// не больше длины сигнала.
pub fn window_for_cutoff(
    sample_rate: f64,
    cutoff_hz: f64,
    len: usize,
) -> usize {
    let raw = (sample_rate / cutoff_hz).round();
    let mut w = if raw.is_finite() && raw >= 1.0 {
        raw as usize
    } else {
        1
    };

    w = w.min(len.max(1));
    if w % 2 == 0 {
        w = if w < len { w + 1 } else { w - 1 };
    }

    w.max(1)
}
