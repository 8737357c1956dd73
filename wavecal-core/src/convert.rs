use byteorder::{ByteOrder, LittleEndian};
use log::debug;
use wavecal_types::{
    SampleWidth, Trace, ValueSource, VerticalScale, WaveError, WaveResult, WaveformDescriptor,
};

/// Делитель в формуле `value = gain * raw / 25 - offset`.
///
/// Происхождение константы не задокументировано; она сохраняется точно,
/// чтобы результаты совпадали с историческими калибровочными данными.
pub const RAW_DIVISOR: f64 = 25.0;

/// Выбирает усиление и смещение: значение, запрошенное у прибора, если оно
/// есть, иначе значение из дескриптора.
pub fn resolve_scale(
    desc: &WaveformDescriptor,
    gain_override: Option<f64>,
    offset_override: Option<f64>,
) -> VerticalScale {
    let (gain, gain_source) = resolve(gain_override, desc.vertical_gain as f64);
    let (offset, offset_source) = resolve(offset_override, desc.vertical_offset as f64);

    VerticalScale {
        gain,
        offset,
        gain_source,
        offset_source,
    }
}

fn resolve(
    live: Option<f64>,
    embedded: f64,
) -> (f64, ValueSource) {
    match live {
        Some(v) => (v, ValueSource::Live),
        None => (embedded, ValueSource::Descriptor),
    }
}

/// Переводит сырые выборки в физические единицы и восстанавливает время.
///
/// Читается не больше выборок, чем реально есть в `payload` после
/// `sample_offset`.
pub fn convert(
    payload: &[u8],
    sample_offset: usize,
    count: usize,
    width: SampleWidth,
    desc: &WaveformDescriptor,
    scale: &VerticalScale,
) -> WaveResult<Trace> {
    let region = payload
        .get(sample_offset..)
        .ok_or(WaveError::OffsetOutOfRange {
            offset: sample_offset,
            len: payload.len(),
        })?;

    let w = width.bytes();
    let n = count.min(region.len() / w);

    if n < count {
        debug!("Only {n} of {count} samples present, converting what is available");
    }

    let interval = desc.horiz_interval as f64;
    let mut trace = Trace::with_capacity(n);

    for (i, chunk) in region.chunks_exact(w).take(n).enumerate() {
        let raw = match width {
            SampleWidth::Byte => chunk[0] as i8 as f64,
            SampleWidth::Word => LittleEndian::read_i16(chunk) as f64,
        };

        let value = (scale.gain * raw) / RAW_DIVISOR - scale.offset;
        let time = i as f64 * interval + desc.horiz_offset;

        trace.push(time, value);
    }

    Ok(trace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{descriptor_template, encode_waveform, parse};

    fn scale(
        gain: f64,
        offset: f64,
    ) -> VerticalScale {
        VerticalScale {
            gain,
            offset,
            gain_source: ValueSource::Live,
            offset_source: ValueSource::Live,
        }
    }

    #[test]
    fn test_resolve_prefers_live_values() {
        let mut desc = descriptor_template(SampleWidth::Word, 1);
        desc.vertical_gain = 0.5;
        desc.vertical_offset = 0.25;

        let s = resolve_scale(&desc, Some(2.0), None);

        assert_eq!(s.gain, 2.0);
        assert_eq!(s.gain_source, ValueSource::Live);
        assert_eq!(s.offset, 0.25);
        assert_eq!(s.offset_source, ValueSource::Descriptor);
        assert!(!s.is_live());

        let s = resolve_scale(&desc, None, None);
        assert_eq!(s.gain, 0.5);
        assert_eq!(s.gain_source, ValueSource::Descriptor);
    }

    #[test]
    fn test_convert_formula_word() {
        let mut desc = descriptor_template(SampleWidth::Word, 3);
        desc.horiz_interval = 0.5;
        desc.horiz_offset = -1.0;
        let bytes = encode_waveform(&desc, &[0, 25, -50]).unwrap();
        let (desc, off) = parse(&bytes).unwrap();

        let trace = convert(&bytes, off, 3, SampleWidth::Word, &desc, &scale(2.0, 1.0)).unwrap();

        assert_eq!(trace.values, vec![-1.0, 1.0, -5.0]);
        assert_eq!(trace.times, vec![-1.0, -0.5, 0.0]);
    }

    #[test]
    fn test_convert_byte_is_signed() {
        let desc = descriptor_template(SampleWidth::Byte, 2);
        let bytes = encode_waveform(&desc, &[-1, 127]).unwrap();
        let (desc, off) = parse(&bytes).unwrap();

        let trace = convert(&bytes, off, 2, SampleWidth::Byte, &desc, &scale(25.0, 0.0)).unwrap();

        assert_eq!(trace.values, vec![-1.0, 127.0]);
    }

    #[test]
    fn test_zero_raw_gives_negative_offset() {
        let desc = descriptor_template(SampleWidth::Word, 4);
        let bytes = encode_waveform(&desc, &[0; 4]).unwrap();
        let (desc, off) = parse(&bytes).unwrap();

        let trace = convert(&bytes, off, 4, SampleWidth::Word, &desc, &scale(3.7, 0.42)).unwrap();

        assert!(trace.values.iter().all(|&v| v == -0.42));
    }

    #[test]
    fn test_gain_linearity() {
        let desc = descriptor_template(SampleWidth::Word, 4);
        let bytes = encode_waveform(&desc, &[100, -200, 300, 1]).unwrap();
        let (desc, off) = parse(&bytes).unwrap();

        let g1 = convert(&bytes, off, 4, SampleWidth::Word, &desc, &scale(0.5, 0.0)).unwrap();
        let g2 = convert(&bytes, off, 4, SampleWidth::Word, &desc, &scale(1.5, 0.0)).unwrap();

        for (a, b) in g1.values.iter().zip(&g2.values) {
            assert!((b / a - 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_convert_clamps_to_available_bytes() {
        let desc = descriptor_template(SampleWidth::Word, 10);
        let bytes = encode_waveform(&desc, &[1, 2, 3]).unwrap();

        let trace = convert(&bytes, 346, 10, SampleWidth::Word, &desc, &scale(25.0, 0.0)).unwrap();

        assert_eq!(trace.len(), 3);
        assert_eq!(trace.values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_convert_offset_out_of_range() {
        let desc = descriptor_template(SampleWidth::Word, 1);

        let err = convert(&[0u8; 4], 8, 1, SampleWidth::Word, &desc, &scale(1.0, 0.0)).unwrap_err();
        assert!(matches!(err, WaveError::OffsetOutOfRange { .. }));
    }
}
