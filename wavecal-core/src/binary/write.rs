use byteorder::{ByteOrder, LittleEndian};
use wavecal_types::{WaveError, WaveResult};

use super::{Field, FieldKind, FieldValue};

/// Записывает значение поля в little-endian заголовок.
///
/// Строки усекаются до ширины поля и дополняются нулями.
pub fn write_field(
    buf: &mut [u8],
    field: &Field,
    value: &FieldValue,
) -> WaveResult<()> {
    let got = buf.len();
    let dst = buf
        .get_mut(field.offset..field.end())
        .ok_or(WaveError::TooShort {
            needed: field.end(),
            got,
        })?;

    match (field.kind, value) {
        (FieldKind::Ascii(n), FieldValue::Text(s)) => {
            dst.fill(0);
            let bytes = s.as_bytes();
            let len = bytes.len().min(n);
            dst[..len].copy_from_slice(&bytes[..len]);
        }
        (FieldKind::U16, FieldValue::U16(v)) => LittleEndian::write_u16(dst, *v),
        (FieldKind::U32, FieldValue::U32(v)) => LittleEndian::write_u32(dst, *v),
        (FieldKind::F32, FieldValue::F32(v)) => LittleEndian::write_f32(dst, *v),
        (FieldKind::F64, FieldValue::F64(v)) => LittleEndian::write_f64(dst, *v),
        (kind, value) => {
            return Err(WaveError::invalid_parameter(format!(
                "field {} declared as {kind:?}, got {value:?}",
                field.name
            )))
        }
    }

    Ok(())
}
