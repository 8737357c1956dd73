use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use wavecal_types::{WaveError, WaveResult};

use super::{Field, FieldKind, FieldValue};

/// Читатель полей little-endian заголовка, начинающегося с `base`.
#[derive(Debug, Clone, Copy)]
pub struct FieldReader<'a> {
    buf: &'a [u8],
    base: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(
        buf: &'a [u8],
        base: usize,
    ) -> Self {
        Self { buf, base }
    }

    /// Единая точка чтения любого поля таблицы.
    pub fn value(
        &self,
        field: &Field,
    ) -> WaveResult<FieldValue> {
        let start = self.base + field.offset;
        let end = self.base + field.end();

        let bytes = self.buf.get(start..end).ok_or(WaveError::TooShort {
            needed: end,
            got: self.buf.len(),
        })?;

        let mut cur = Cursor::new(bytes);

        // Ширина уже проверена срезом выше, ошибки чтения здесь невозможны
        let value = match field.kind {
            FieldKind::Ascii(_) => FieldValue::Text(decode_ascii(bytes)),
            FieldKind::U16 => FieldValue::U16(cur.read_u16::<LittleEndian>().unwrap_or_default()),
            FieldKind::U32 => FieldValue::U32(cur.read_u32::<LittleEndian>().unwrap_or_default()),
            FieldKind::F32 => FieldValue::F32(cur.read_f32::<LittleEndian>().unwrap_or_default()),
            FieldKind::F64 => FieldValue::F64(cur.read_f64::<LittleEndian>().unwrap_or_default()),
        };

        Ok(value)
    }

    pub fn u16(
        &self,
        field: &Field,
    ) -> WaveResult<u16> {
        match self.value(field)? {
            FieldValue::U16(v) => Ok(v),
            other => Err(kind_mismatch(field, &other)),
        }
    }

    pub fn u32(
        &self,
        field: &Field,
    ) -> WaveResult<u32> {
        match self.value(field)? {
            FieldValue::U32(v) => Ok(v),
            other => Err(kind_mismatch(field, &other)),
        }
    }

    pub fn f32(
        &self,
        field: &Field,
    ) -> WaveResult<f32> {
        match self.value(field)? {
            FieldValue::F32(v) => Ok(v),
            other => Err(kind_mismatch(field, &other)),
        }
    }

    pub fn f64(
        &self,
        field: &Field,
    ) -> WaveResult<f64> {
        match self.value(field)? {
            FieldValue::F64(v) => Ok(v),
            other => Err(kind_mismatch(field, &other)),
        }
    }

    pub fn text(
        &self,
        field: &Field,
    ) -> WaveResult<String> {
        match self.value(field)? {
            FieldValue::Text(v) => Ok(v),
            other => Err(kind_mismatch(field, &other)),
        }
    }
}

/// Разбирает строку до первого нуля; непечатаемые байты заменяются на `?`.
pub fn decode_ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '?'
            }
        })
        .collect::<String>()
        .trim_end()
        .to_string()
}

fn kind_mismatch(
    field: &Field,
    got: &FieldValue,
) -> WaveError {
    WaveError::invalid_parameter(format!(
        "field {} declared as {:?}, read {:?}",
        field.name, field.kind, got
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ascii_stops_at_nul() {
        assert_eq!(decode_ascii(b"WAVEDESC\0\0junk"), "WAVEDESC");
        assert_eq!(decode_ascii(b"V   \0"), "V");
        assert_eq!(decode_ascii(&[b'A', 0xFF, b'B']), "A?B");
    }

    #[test]
    fn test_reader_little_endian() {
        let mut buf = vec![0u8; 16];
        buf[4..8].copy_from_slice(&346u32.to_le_bytes());
        buf[8..12].copy_from_slice(&0.5f32.to_le_bytes());

        let r = FieldReader::new(&buf, 0);

        assert_eq!(r.u32(&Field::new("len", 4, FieldKind::U32)).unwrap(), 346);
        assert_eq!(r.f32(&Field::new("gain", 8, FieldKind::F32)).unwrap(), 0.5);
    }

    #[test]
    fn test_reader_respects_base() {
        let mut buf = vec![0u8; 12];
        buf[10..12].copy_from_slice(&7u16.to_le_bytes());

        let r = FieldReader::new(&buf, 8);
        assert_eq!(r.u16(&Field::new("w", 2, FieldKind::U16)).unwrap(), 7);
    }

    #[test]
    fn test_reader_out_of_bounds() {
        let buf = [0u8; 6];
        let r = FieldReader::new(&buf, 0);

        let err = r.f64(&Field::new("f", 0, FieldKind::F64)).unwrap_err();
        assert_eq!(err, WaveError::TooShort { needed: 8, got: 6 });
    }

    #[test]
    fn test_reader_kind_mismatch() {
        let buf = [0u8; 8];
        let r = FieldReader::new(&buf, 0);

        assert!(r.u32(&Field::new("f", 0, FieldKind::F64)).is_err());
    }
}
