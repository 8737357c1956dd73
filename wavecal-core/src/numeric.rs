/// Извлекает число из текстового ответа прибора.
///
/// Если весь ответ является числом, возвращается оно. Иначе — последний
/// числовой литерал в тексте: `"C1:VDIV 5.00E-01V"` → `0.5`. Приклеенная
/// к числу приставка СИ учитывается: `"VDIV 200mV"` → `0.2`.
pub fn parse_numeric_reply(reply: &str) -> Option<f64> {
    let text = reply.trim();

    if let Ok(v) = text.parse::<f64>() {
        return v.is_finite().then_some(v);
    }

    trailing_literal(text)
}

fn is_numeric_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')
}

/// Последняя подстрока, которая разбирается как конечное число.
/// Цифры внутри идентификатора ("C1", "DEF9") числом не считаются.
fn trailing_literal(text: &str) -> Option<f64> {
    let mut found = None;
    let mut pos = 0;

    while let Some(rel) = text[pos..].find(is_numeric_char) {
        let start = pos + rel;
        let tail = &text[start..];
        let run_len = tail.find(|c| !is_numeric_char(c)).unwrap_or(tail.len());
        let run = &tail[..run_len];

        let glued = text[..start]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric() || c == '_');

        if !glued {
            if let Some(v) = longest_prefix_number(run) {
                let prefix = tail[run_len..].chars().next().and_then(si_exponent);
                found = Some(match prefix {
                    Some(exp) => apply_exponent(v, exp),
                    None => v,
                });
            }
        }

        pos = start + run_len;
    }

    found
}

/// Десятичный порядок приставки СИ, приклеенной к числу ("200mV").
fn si_exponent(c: char) -> Option<i32> {
    match c {
        'G' => Some(9),
        'M' => Some(6),
        'k' => Some(3),
        'm' => Some(-3),
        'u' | 'µ' => Some(-6),
        'n' => Some(-9),
        'p' => Some(-12),
        _ => None,
    }
}

fn apply_exponent(
    v: f64,
    exp: i32,
) -> f64 {
    // делим на точную степень, чтобы 200m давало ровно 0.2
    let scale = 10f64.powi(exp.abs());
    if exp < 0 {
        v / scale
    } else {
        v * scale
    }
}

/// Самый длинный префикс серии символов, являющийся числом ("1.5E" → 1.5).
fn longest_prefix_number(run: &str) -> Option<f64> {
    // пропускаем одиночные знаки и буквы экспоненты в начале ("E-01" из "VDIV")
    let trimmed = run.trim_start_matches(['e', 'E']);

    (1..=trimmed.len())
        .rev()
        .filter_map(|n| trimmed[..n].parse::<f64>().ok())
        .find(|v| v.is_finite())
}
