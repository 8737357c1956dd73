use serde::Serialize;

/// Одна выборка: момент времени (с) и физическое значение.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub time: f64,
    pub value: f64,
}

/// Осциллограмма в физических единицах с восстановленной временной осью.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Trace {
    /// Время каждой выборки, строго возрастает
    pub times: Vec<f64>,
    /// Значения в физических единицах
    pub values: Vec<f64>,
}

impl Trace {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            times: Vec::with_capacity(n),
            values: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn push(
        &mut self,
        time: f64,
        value: f64,
    ) {
        self.times.push(time);
        self.values.push(value);
    }

    /// Итератор по парам (время, значение).
    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.times
            .iter()
            .zip(self.values.iter())
            .map(|(&time, &value)| Sample { time, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_pair_time_and_value() {
        let mut trace = Trace::with_capacity(2);
        trace.push(0.0, 1.5);
        trace.push(1e-3, 2.5);

        let samples: Vec<Sample> = trace.samples().collect();

        assert_eq!(trace.len(), 2);
        assert_eq!(
            samples,
            vec![
                Sample {
                    time: 0.0,
                    value: 1.5
                },
                Sample {
                    time: 1e-3,
                    value: 2.5
                }
            ]
        );
    }
}
