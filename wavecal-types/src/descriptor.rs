use serde::Serialize;

use crate::{WaveError, WaveResult};

/// Ширина одного элемента массива выборок.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u16)]
pub enum SampleWidth {
    /// 8-битные знаковые выборки (COMM_TYPE = BYTE)
    Byte = 0,
    /// 16-битные знаковые выборки (COMM_TYPE = WORD)
    Word = 1,
}

/// Порядок байт, заявленный прибором в дескрипторе.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u16)]
pub enum ByteOrder {
    /// Старший байт первым (HIFIRST)
    HighFirst = 0,
    /// Младший байт первым (LOFIRST)
    LowFirst = 1,
}

/// Разобранный дескриптор осциллограммы (WAVEDESC).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaveformDescriptor {
    /// Метка дескриптора, обычно "WAVEDESC"
    pub tag: String,
    /// Имя шаблона, например "LECROY_2_3"
    pub template_name: String,
    /// Ширина выборки
    pub sample_width: SampleWidth,
    /// Порядок байт
    pub byte_order: ByteOrder,
    /// Длина блока дескриптора в байтах
    pub descriptor_length: u32,
    /// Длина блока пользовательского текста в байтах
    pub user_text_length: u32,
    /// Заявленная длина массива выборок в байтах
    pub sample_block_length: u32,
    /// Количество выборок после коррекции по фактически доступным байтам
    pub sample_count: u32,
    /// Количество выборок, заявленное прибором
    pub declared_sample_count: u32,
    /// Вертикальное усиление (единиц на отсчёт АЦП)
    pub vertical_gain: f32,
    /// Вертикальное смещение
    pub vertical_offset: f32,
    /// Шаг дискретизации в секундах
    pub horiz_interval: f32,
    /// Время первой выборки относительно триггера в секундах
    pub horiz_offset: f64,
    /// Номинальная разрядность АЦП
    pub nominal_bits: u16,
    /// Название прибора
    pub instrument_name: String,
    /// Серийный номер прибора
    pub instrument_number: u32,
    /// Метка трассы
    pub trace_label: String,
    /// Единица вертикальной оси
    pub vertical_unit: String,
    /// Единица горизонтальной оси
    pub horizontal_unit: String,
    /// Источник сигнала (код канала)
    pub wave_source: u16,
}

impl SampleWidth {
    pub fn from_u16(v: u16) -> WaveResult<Self> {
        match v {
            0 => Ok(SampleWidth::Byte),
            1 => Ok(SampleWidth::Word),
            _ => Err(WaveError::UnsupportedEncoding(v)),
        }
    }

    /// Размер одной выборки в байтах
    pub fn bytes(&self) -> usize {
        match self {
            SampleWidth::Byte => 1,
            SampleWidth::Word => 2,
        }
    }
}

impl ByteOrder {
    pub fn from_u16(v: u16) -> Self {
        match v {
            0 => ByteOrder::HighFirst,
            _ => ByteOrder::LowFirst,
        }
    }
}

impl WaveformDescriptor {
    /// Были ли заявленные длины скорректированы при разборе.
    pub fn length_corrected(&self) -> bool {
        self.sample_count != self.declared_sample_count
    }

    /// Размер массива выборок, который реально будет прочитан.
    pub fn effective_block_len(&self) -> usize {
        self.sample_count as usize * self.sample_width.bytes()
    }
}
