//! Табличное чтение и запись полей фиксированного бинарного заголовка.

pub mod read;
pub mod write;

pub use read::*;
pub use write::*;

/// Тип и ширина поля заголовка.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// ASCII строка фиксированной длины, дополненная нулями
    Ascii(usize),
    U16,
    U32,
    F32,
    F64,
}

/// Описание одного поля: имя, смещение от начала дескриптора и тип.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub offset: usize,
    pub kind: FieldKind,
}

/// Прочитанное значение поля.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    U16(u16),
    U32(u32),
    F32(f32),
    F64(f64),
}

impl FieldKind {
    /// Ширина поля в байтах
    pub fn width(&self) -> usize {
        match self {
            FieldKind::Ascii(n) => *n,
            FieldKind::U16 => 2,
            FieldKind::U32 | FieldKind::F32 => 4,
            FieldKind::F64 => 8,
        }
    }
}

impl Field {
    pub const fn new(
        name: &'static str,
        offset: usize,
        kind: FieldKind,
    ) -> Self {
        Self { name, offset, kind }
    }

    /// Первый байт за концом поля.
    pub fn end(&self) -> usize {
        self.offset + self.kind.width()
    }
}
