//! Формат бинарного дескриптора осциллограммы WAVEDESC.
//!
//! Все многобайтовые поля хранятся в порядке little-endian. Смещения
//! отсчитываются от начала метки `WAVEDESC` и собраны в одну таблицу
//! [`FIELDS`], которую читает единый [`FieldReader`].
//!
//! ```text
//! [0..8]     TAG               "WAVEDESC"
//! [16..32]   TEMPLATE_NAME     ASCII
//! [32..34]   COMM_TYPE         u16  0 = byte, 1 = word
//! [34..36]   COMM_ORDER        u16  0 = HIFIRST, 1 = LOFIRST
//! [36..40]   WAVE_DESCRIPTOR   u32  длина дескриптора
//! [40..44]   USER_TEXT         u32  длина пользовательского текста
//! [60..64]   WAVE_ARRAY_1      u32  длина массива выборок в байтах
//! [116..120] WAVE_ARRAY_COUNT  u32  количество выборок
//! [156..160] VERTICAL_GAIN     f32
//! [160..164] VERTICAL_OFFSET   f32
//! [176..180] HORIZ_INTERVAL    f32  шаг дискретизации, с
//! [180..188] HORIZ_OFFSET      f64  время первой выборки, с
//! ```

use log::{debug, warn};
use wavecal_types::{
    ByteOrder, Diagnostic, SampleWidth, WaveError, WaveResult, WaveformDescriptor,
};

use crate::binary::{write_field, Field, FieldKind, FieldReader, FieldValue};

/// Метка начала дескриптора.
pub const WAVEDESC_TAG: &[u8; 8] = b"WAVEDESC";

/// Полный размер дескриптора (шаблон LECROY_2_3).
pub const WAVEDESC_SIZE: usize = 346;

pub const TAG: Field = Field::new("DESCRIPTOR_NAME", 0, FieldKind::Ascii(8));
pub const TEMPLATE_NAME: Field = Field::new("TEMPLATE_NAME", 16, FieldKind::Ascii(16));
pub const COMM_TYPE: Field = Field::new("COMM_TYPE", 32, FieldKind::U16);
pub const COMM_ORDER: Field = Field::new("COMM_ORDER", 34, FieldKind::U16);
pub const WAVE_DESCRIPTOR: Field = Field::new("WAVE_DESCRIPTOR", 36, FieldKind::U32);
pub const USER_TEXT: Field = Field::new("USER_TEXT", 40, FieldKind::U32);
pub const WAVE_ARRAY_1: Field = Field::new("WAVE_ARRAY_1", 60, FieldKind::U32);
pub const INSTRUMENT_NAME: Field = Field::new("INSTRUMENT_NAME", 76, FieldKind::Ascii(16));
pub const INSTRUMENT_NUMBER: Field = Field::new("INSTRUMENT_NUMBER", 92, FieldKind::U32);
pub const TRACE_LABEL: Field = Field::new("TRACE_LABEL", 96, FieldKind::Ascii(16));
pub const WAVE_ARRAY_COUNT: Field = Field::new("WAVE_ARRAY_COUNT", 116, FieldKind::U32);
pub const VERTICAL_GAIN: Field = Field::new("VERTICAL_GAIN", 156, FieldKind::F32);
pub const VERTICAL_OFFSET: Field = Field::new("VERTICAL_OFFSET", 160, FieldKind::F32);
pub const NOMINAL_BITS: Field = Field::new("NOMINAL_BITS", 172, FieldKind::U16);
pub const HORIZ_INTERVAL: Field = Field::new("HORIZ_INTERVAL", 176, FieldKind::F32);
pub const HORIZ_OFFSET: Field = Field::new("HORIZ_OFFSET", 180, FieldKind::F64);
pub const VERTUNIT: Field = Field::new("VERTUNIT", 196, FieldKind::Ascii(48));
pub const HORUNIT: Field = Field::new("HORUNIT", 244, FieldKind::Ascii(48));
pub const WAVE_SOURCE: Field = Field::new("WAVE_SOURCE", 344, FieldKind::U16);

/// Таблица всех используемых полей дескриптора.
pub const FIELDS: &[Field] = &[
    TAG,
    TEMPLATE_NAME,
    COMM_TYPE,
    COMM_ORDER,
    WAVE_DESCRIPTOR,
    USER_TEXT,
    WAVE_ARRAY_1,
    INSTRUMENT_NAME,
    INSTRUMENT_NUMBER,
    TRACE_LABEL,
    WAVE_ARRAY_COUNT,
    VERTICAL_GAIN,
    VERTICAL_OFFSET,
    NOMINAL_BITS,
    HORIZ_INTERVAL,
    HORIZ_OFFSET,
    VERTUNIT,
    HORUNIT,
    WAVE_SOURCE,
];

/// Позиция метки `WAVEDESC` в буфере.
pub fn find_marker(buf: &[u8]) -> Option<usize> {
    buf.windows(WAVEDESC_TAG.len())
        .position(|w| w == WAVEDESC_TAG)
}

/// Ожидаемая длина ответа от метки до конца массива выборок.
///
/// `None`, пока в буфере нет трёх полей длины.
pub fn declared_total_len(
    buf: &[u8],
    base: usize,
) -> Option<usize> {
    let r = FieldReader::new(buf, base);

    let desc = r.u32(&WAVE_DESCRIPTOR).ok()? as usize;
    let user = r.u32(&USER_TEXT).ok()? as usize;
    let array = r.u32(&WAVE_ARRAY_1).ok()? as usize;

    desc.checked_add(user)?.checked_add(array)
}

/// Разбирает дескриптор и возвращает его вместе со смещением массива
/// выборок.
///
/// Несовпадение заявленных длин с доступными байтами не является ошибкой:
/// используется `min(WAVE_ARRAY_1, count * width, available)`.
pub fn parse(payload: &[u8]) -> WaveResult<(WaveformDescriptor, usize)> {
    let base = match find_marker(payload) {
        Some(pos) => pos,
        None => {
            warn!("WAVEDESC tag not found, assuming descriptor at offset 0");
            0
        }
    };

    if payload.len() < base + WAVEDESC_SIZE {
        return Err(WaveError::TooShort {
            needed: base + WAVEDESC_SIZE,
            got: payload.len(),
        });
    }

    let r = FieldReader::new(payload, base);

    let sample_width = SampleWidth::from_u16(r.u16(&COMM_TYPE)?)?;
    let byte_order = ByteOrder::from_u16(r.u16(&COMM_ORDER)?);
    let descriptor_length = r.u32(&WAVE_DESCRIPTOR)?;
    let user_text_length = r.u32(&USER_TEXT)?;
    let sample_block_length = r.u32(&WAVE_ARRAY_1)?;
    let declared_sample_count = r.u32(&WAVE_ARRAY_COUNT)?;

    if byte_order == ByteOrder::HighFirst {
        warn!("Descriptor declares HIFIRST byte order, samples are decoded as little-endian");
    }

    let sample_offset = base
        .checked_add(descriptor_length as usize)
        .and_then(|v| v.checked_add(user_text_length as usize))
        .unwrap_or(usize::MAX);

    if sample_offset > payload.len() {
        return Err(WaveError::OffsetOutOfRange {
            offset: sample_offset,
            len: payload.len(),
        });
    }

    let available = payload.len() - sample_offset;
    let sample_count = effective_sample_count(
        sample_block_length,
        declared_sample_count,
        sample_width,
        available,
    );

    let descriptor = WaveformDescriptor {
        tag: r.text(&TAG)?,
        template_name: r.text(&TEMPLATE_NAME)?,
        sample_width,
        byte_order,
        descriptor_length,
        user_text_length,
        sample_block_length,
        sample_count,
        declared_sample_count,
        vertical_gain: r.f32(&VERTICAL_GAIN)?,
        vertical_offset: r.f32(&VERTICAL_OFFSET)?,
        horiz_interval: r.f32(&HORIZ_INTERVAL)?,
        horiz_offset: r.f64(&HORIZ_OFFSET)?,
        nominal_bits: r.u16(&NOMINAL_BITS)?,
        instrument_name: r.text(&INSTRUMENT_NAME)?,
        instrument_number: r.u32(&INSTRUMENT_NUMBER)?,
        trace_label: r.text(&TRACE_LABEL)?,
        vertical_unit: r.text(&VERTUNIT)?,
        horizontal_unit: r.text(&HORUNIT)?,
        wave_source: r.u16(&WAVE_SOURCE)?,
    };

    if let Some(diag) = length_mismatch(&descriptor, available) {
        warn!("Sample length mismatch: {diag}");
    }

    debug!(
        "Parsed WAVEDESC at {base}: {} samples × {} B, offset {sample_offset}",
        descriptor.sample_count,
        sample_width.bytes()
    );

    Ok((descriptor, sample_offset))
}

/// Количество выборок, которые действительно можно прочитать.
pub fn effective_sample_count(
    block_len: u32,
    declared_count: u32,
    width: SampleWidth,
    available: usize,
) -> u32 {
    let w = width.bytes();
    let by_count = declared_count as usize * w;
    let used = (block_len as usize).min(by_count).min(available);

    (used / w) as u32
}

/// Диагностика несовпадения длин, если оно есть.
pub fn length_mismatch(
    desc: &WaveformDescriptor,
    available: usize,
) -> Option<Diagnostic> {
    let by_count = desc.declared_sample_count as usize * desc.sample_width.bytes();
    let used = desc.effective_block_len();

    if used == by_count && used == desc.sample_block_length as usize {
        return None;
    }

    Some(Diagnostic::LengthMismatch {
        declared_count: desc.declared_sample_count,
        declared_block_len: desc.sample_block_length,
        available_bytes: available,
        used_count: desc.sample_count,
    })
}

/// Сериализует дескриптор в `WAVEDESC_SIZE` байт по той же таблице полей.
///
/// Записываются заявленные значения (`declared_sample_count`), а не
/// скорректированные.
pub fn encode_descriptor(desc: &WaveformDescriptor) -> WaveResult<Vec<u8>> {
    let mut buf = vec![0u8; WAVEDESC_SIZE];

    let values = [
        (TAG, FieldValue::Text(desc.tag.clone())),
        (TEMPLATE_NAME, FieldValue::Text(desc.template_name.clone())),
        (COMM_TYPE, FieldValue::U16(desc.sample_width as u16)),
        (COMM_ORDER, FieldValue::U16(desc.byte_order as u16)),
        (WAVE_DESCRIPTOR, FieldValue::U32(desc.descriptor_length)),
        (USER_TEXT, FieldValue::U32(desc.user_text_length)),
        (WAVE_ARRAY_1, FieldValue::U32(desc.sample_block_length)),
        (INSTRUMENT_NAME, FieldValue::Text(desc.instrument_name.clone())),
        (INSTRUMENT_NUMBER, FieldValue::U32(desc.instrument_number)),
        (TRACE_LABEL, FieldValue::Text(desc.trace_label.clone())),
        (WAVE_ARRAY_COUNT, FieldValue::U32(desc.declared_sample_count)),
        (VERTICAL_GAIN, FieldValue::F32(desc.vertical_gain)),
        (VERTICAL_OFFSET, FieldValue::F32(desc.vertical_offset)),
        (NOMINAL_BITS, FieldValue::U16(desc.nominal_bits)),
        (HORIZ_INTERVAL, FieldValue::F32(desc.horiz_interval)),
        (HORIZ_OFFSET, FieldValue::F64(desc.horiz_offset)),
        (VERTUNIT, FieldValue::Text(desc.vertical_unit.clone())),
        (HORUNIT, FieldValue::Text(desc.horizontal_unit.clone())),
        (WAVE_SOURCE, FieldValue::U16(desc.wave_source)),
    ];

    for (field, value) in &values {
        write_field(&mut buf, field, value)?;
    }

    Ok(buf)
}

/// Собирает полный ответ прибора: дескриптор, пользовательский текст и
/// массив выборок.
///
/// Выборки пишутся в ширине дескриптора (для `Byte` — младший байт).
/// Длины в дескрипторе не пересчитываются, что позволяет собирать ответы
/// с заведомо несовпадающими длинами.
pub fn encode_waveform(
    desc: &WaveformDescriptor,
    raw: &[i16],
) -> WaveResult<Vec<u8>> {
    let mut out = encode_descriptor(desc)?;

    out.resize((desc.descriptor_length as usize).max(WAVEDESC_SIZE), 0);
    out.resize(out.len() + desc.user_text_length as usize, 0);

    for &r in raw {
        match desc.sample_width {
            SampleWidth::Byte => out.push(r as i8 as u8),
            SampleWidth::Word => out.extend_from_slice(&r.to_le_bytes()),
        }
    }

    Ok(out)
}

/// Дескриптор с разумными значениями по умолчанию для `count` выборок.
pub fn descriptor_template(
    sample_width: SampleWidth,
    count: u32,
) -> WaveformDescriptor {
    WaveformDescriptor {
        tag: "WAVEDESC".to_string(),
        template_name: "LECROY_2_3".to_string(),
        sample_width,
        byte_order: ByteOrder::LowFirst,
        descriptor_length: WAVEDESC_SIZE as u32,
        user_text_length: 0,
        sample_block_length: count * sample_width.bytes() as u32,
        sample_count: count,
        declared_sample_count: count,
        vertical_gain: 1.0,
        vertical_offset: 0.0,
        horiz_interval: 1e-6,
        horiz_offset: 0.0,
        nominal_bits: 8,
        instrument_name: "LECROYWR104MXi".to_string(),
        instrument_number: 0,
        trace_label: String::new(),
        vertical_unit: "V".to_string(),
        horizontal_unit: "S".to_string(),
        wave_source: 0,
    }
}
