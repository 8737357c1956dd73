use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use wavecal_core::AnalysisOptions;

use crate::{AcquireError, AcquireResult, ReceiverConfig};

/// Подстановка имени канала в шаблонах команд.
pub const CHANNEL_PLACEHOLDER: &str = "{ch}";

/// Полная конфигурация одного захвата.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquireConfig {
    /// Канал осциллографа (C1..C4)
    pub channel: String,
    /// Шаблон запроса осциллограммы
    pub waveform_command: String,
    /// Команды, отправляемые перед захватом как есть (после подстановки канала)
    pub setup_commands: Vec<String>,
    /// Таймаут чтения на время передачи (мс)
    pub transfer_timeout_ms: u64,
    /// Предельное число чтений за одну передачу
    pub max_reads: usize,
    /// Запрашивать усиление и смещение у прибора перед захватом
    pub live_scale: bool,
    pub gain_query: String,
    pub offset_query: String,
    /// Параметры обработки
    pub analysis: AnalysisOptions,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl AcquireConfig {
    /// Загружает конфигурацию из JSON. Отсутствующие поля берутся по умолчанию.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> AcquireResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Подставляет канал в шаблон команды.
    pub fn command(
        &self,
        template: &str,
    ) -> String {
        template.replace(CHANNEL_PLACEHOLDER, &self.channel)
    }

    pub fn setup(&self) -> Vec<String> {
        self.setup_commands.iter().map(|c| self.command(c)).collect()
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer_timeout_ms)
    }

    pub fn receiver(&self) -> ReceiverConfig {
        ReceiverConfig {
            command: self.command(&self.waveform_command),
            transfer_timeout: self.transfer_timeout(),
            max_reads: self.max_reads,
        }
    }

    pub fn validate(&self) -> AcquireResult<()> {
        if self.channel.trim().is_empty() {
            return Err(AcquireError::Config("channel must not be empty".to_string()));
        }

        if self.waveform_command.trim().is_empty() {
            return Err(AcquireError::Config(
                "waveform command must not be empty".to_string(),
            ));
        }

        if self.max_reads == 0 {
            return Err(AcquireError::Config("max_reads must be >= 1".to_string()));
        }

        if self.transfer_timeout_ms == 0 {
            return Err(AcquireError::Config(
                "transfer timeout must be positive".to_string(),
            ));
        }

        let a = &self.analysis;
        if !(a.cutoff_hz.is_finite() && a.cutoff_hz > 0.0) {
            return Err(AcquireError::Config(format!(
                "cutoff must be positive, got {}",
                a.cutoff_hz
            )));
        }

        if a.order == 0 {
            return Err(AcquireError::Config("filter order must be >= 1".to_string()));
        }

        Ok(())
    }
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            channel: "C1".to_string(),
            waveform_command: "{ch}:WF? ALL".to_string(),
            setup_commands: vec![
                "COMM_HEADER OFF".to_string(),
                "COMM_FORMAT DEF9,WORD,BIN".to_string(),
                "COMM_ORDER LO".to_string(),
            ],
            transfer_timeout_ms: 10_000,
            max_reads: 1_000,
            live_scale: true,
            gain_query: "{ch}:VDIV?".to_string(),
            offset_query: "{ch}:OFST?".to_string(),
            analysis: AnalysisOptions::default(),
        }
    }
}

/// Парсит строку частоты в герцы.
///
/// Поддерживает суффиксы: `GHz`, `MHz`, `kHz`, `Hz` (регистронезависимо).
///
/// # Примеры
/// ```
/// use wavecal_acquire::config::parse_freq_hz;
/// assert_eq!(parse_freq_hz("1kHz").unwrap(), 1_000.0);
/// assert_eq!(parse_freq_hz("2.5MHz").unwrap(), 2_500_000.0);
/// assert_eq!(parse_freq_hz("150").unwrap(), 150.0);
/// ```
pub fn parse_freq_hz(s: &str) -> Result<f64, String> {
    let s = s.trim();
    let lower = s.to_lowercase();

    let (num_str, mult) = if let Some(v) = lower.strip_suffix("ghz") {
        (v.trim(), 1e9)
    } else if let Some(v) = lower.strip_suffix("mhz") {
        (v.trim(), 1e6)
    } else if let Some(v) = lower.strip_suffix("khz") {
        (v.trim(), 1e3)
    } else if let Some(v) = lower.strip_suffix("hz") {
        (v.trim(), 1.0)
    } else {
        (lower.as_str(), 1.0)
    };

    let n: f64 = num_str
        .parse()
        .map_err(|e| format!("Invalid frequency value '{s}': {e}"))?;

    if !(n.is_finite() && n > 0.0) {
        return Err(format!("Frequency must be positive, got '{s}'"));
    }

    Ok(n * mult)
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
