//! Приём ответа на запрос осциллограммы.
//!
//! Прибор отдаёт ответ порциями произвольной длины в одном из двух видов:
//!
//! ```text
//! #<n><len, n цифр><len байт>[\n]      двоичный блок SCPI
//! [текстовый префикс]WAVEDESC...       сырой ответ с меткой дескриптора
//! ```
//!
//! Вид определяется один раз по первым байтам, после чего единый цикл
//! дочитывает ответ до заявленной длины или до лимита чтений.

use std::time::Duration;

use log::{debug, warn};
use wavecal_core::format::{declared_total_len, find_marker, WAVEDESC_SIZE};

use crate::{AcquireError, AcquireResult, ScopeSession};

/// Способ кадрирования ответа.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `#<n><len>`: заголовок длиной `header_len`, за ним `declared_len` байт
    LengthPrefixed {
        header_len: usize,
        declared_len: usize,
    },
    /// Без заголовка; дескриптор начинается с `marker_offset`
    RawWithMarker { marker_offset: usize },
}

/// Параметры приёма.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Запрос осциллограммы, например `C1:WF? ALL`
    pub command: String,
    /// Таймаут одного чтения на время передачи
    pub transfer_timeout: Duration,
    /// Предельное число вызовов `read_raw`
    pub max_reads: usize,
}

/// Принятый ответ без кадрирования.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Дескриптор и массив выборок
    pub payload: Vec<u8>,
    /// `None`, если метка так и не найдена (ответ возвращён как есть)
    pub framing: Option<Framing>,
    /// Сколько раз вызывался `read_raw`
    pub reads: usize,
    /// Сколько байт получено всего, включая заголовок и хвост
    pub bytes_received: usize,
}

/// Причина выхода из цикла чтения.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Complete,
    ReadLimit,
    Stalled,
}

pub struct FrameReceiver {
    config: ReceiverConfig,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            command: "C1:WF? ALL".to_string(),
            transfer_timeout: Duration::from_secs(10),
            max_reads: 1_000,
        }
    }
}

impl FrameReceiver {
    pub fn new(config: ReceiverConfig) -> Self {
        Self { config }
    }

    /// Запрашивает осциллограмму и принимает ответ целиком.
    ///
    /// Таймаут сессии на время передачи заменяется на `transfer_timeout` и
    /// восстанавливается при любом исходе.
    pub fn receive<S: ScopeSession + ?Sized>(
        &self,
        session: &mut S,
    ) -> AcquireResult<Frame> {
        let previous = session.timeout();
        session.set_timeout(self.config.transfer_timeout)?;

        let result = self.transfer(session);

        if let Err(e) = session.set_timeout(previous) {
            warn!("Failed to restore session timeout {previous:?}: {e}");
        }

        result
    }

    fn transfer<S: ScopeSession + ?Sized>(
        &self,
        session: &mut S,
    ) -> AcquireResult<Frame> {
        session.write(&self.config.command)?;

        let mut buf: Vec<u8> = Vec::new();
        let mut framing: Option<Framing> = None;
        let mut reads = 0usize;

        let stop = loop {
            if framing.is_some_and(|f| expected_len(f, &buf).is_some_and(|n| buf.len() >= n)) {
                break Stop::Complete;
            }

            if reads >= self.config.max_reads {
                break Stop::ReadLimit;
            }

            match session.read_raw() {
                Ok(chunk) => {
                    reads += 1;
                    buf.extend_from_slice(&chunk);
                }
                Err(AcquireError::Timeout) => {
                    reads += 1;
                    break Stop::Stalled;
                }
                Err(e) => return Err(e),
            }

            if framing.is_none() {
                framing = classify(&buf)?;
                if let Some(f) = framing {
                    debug!("Framing {f:?} after {} bytes", buf.len());
                }
            }
        };

        debug!("Transfer stopped ({stop:?}) after {reads} reads, {} bytes", buf.len());

        let bytes_received = buf.len();
        let lead = leading_terminators(&buf);

        if lead == bytes_received {
            return Err(AcquireError::Timeout);
        }

        let payload = match framing {
            Some(f) => strip(f, buf)?,
            None if buf[lead] == b'#' => {
                return Err(AcquireError::MalformedHeader(format!(
                    "block header incomplete after {bytes_received} bytes"
                )));
            }
            None => {
                warn!("WAVEDESC marker not found in {bytes_received} bytes, returning reply as is");
                buf
            }
        };

        Ok(Frame {
            payload,
            framing,
            reads,
            bytes_received,
        })
    }
}

/// Определяет кадрирование по накопленным байтам.
///
/// Ведущие `\r`/`\n` (терминатор предыдущего блока, оставшийся в
/// транспорте) пропускаются и входят в `header_len`.
///
/// `Ok(None)` — байт пока недостаточно для решения.
pub fn classify(buf: &[u8]) -> AcquireResult<Option<Framing>> {
    let lead = leading_terminators(buf);

    match buf.get(lead) {
        None => Ok(None),
        Some(b'#') => Ok(parse_block_header(&buf[lead..])?.map(|(header_len, declared_len)| {
            Framing::LengthPrefixed {
                header_len: lead + header_len,
                declared_len,
            }
        })),
        Some(_) => Ok(find_marker(buf).map(|marker_offset| Framing::RawWithMarker { marker_offset })),
    }
}

fn leading_terminators(buf: &[u8]) -> usize {
    buf.iter().take_while(|&&b| matches!(b, b'\r' | b'\n')).count()
}

/// Разбирает `#<n><len>`; возвращает длину заголовка и заявленную длину.
fn parse_block_header(buf: &[u8]) -> AcquireResult<Option<(usize, usize)>> {
    let Some(&n) = buf.get(1) else {
        return Ok(None);
    };

    if !n.is_ascii_digit() {
        return Err(AcquireError::MalformedHeader(format!(
            "expected digit count after '#', got {:?}",
            n as char
        )));
    }

    let digits = (n - b'0') as usize;
    if digits == 0 {
        return Err(AcquireError::MalformedHeader(
            "indefinite-length block (#0) is not supported".to_string(),
        ));
    }

    let header_len = 2 + digits;
    let Some(len_field) = buf.get(2..header_len) else {
        // проверяем то, что уже пришло
        if let Some(bad) = buf[2..].iter().find(|b| !b.is_ascii_digit()) {
            return Err(AcquireError::MalformedHeader(format!(
                "non-digit {:?} in block length",
                *bad as char
            )));
        }
        return Ok(None);
    };

    let mut declared = 0usize;
    for &b in len_field {
        if !b.is_ascii_digit() {
            return Err(AcquireError::MalformedHeader(format!(
                "non-digit {:?} in block length",
                b as char
            )));
        }
        declared = declared
            .checked_mul(10)
            .and_then(|v| v.checked_add((b - b'0') as usize))
            .ok_or_else(|| AcquireError::MalformedHeader("block length overflows".to_string()))?;
    }

    Ok(Some((header_len, declared)))
}

/// Полная ожидаемая длина буфера, если она уже известна.
fn expected_len(
    framing: Framing,
    buf: &[u8],
) -> Option<usize> {
    match framing {
        Framing::LengthPrefixed {
            header_len,
            declared_len,
        } => header_len.checked_add(declared_len),
        Framing::RawWithMarker { marker_offset } => {
            declared_total_len(buf, marker_offset).and_then(|n| n.checked_add(marker_offset))
        }
    }
}

/// Отрезает кадрирование: заголовок блока, текстовый префикс и хвост.
fn strip(
    framing: Framing,
    mut buf: Vec<u8>,
) -> AcquireResult<Vec<u8>> {
    let (start, expected) = match framing {
        Framing::LengthPrefixed {
            header_len,
            declared_len,
        } => (header_len, declared_len),
        Framing::RawWithMarker { marker_offset } => (
            marker_offset,
            declared_total_len(&buf, marker_offset).unwrap_or(WAVEDESC_SIZE),
        ),
    };

    let received = buf.len().saturating_sub(start);
    if received < expected {
        return Err(AcquireError::Truncated { received, expected });
    }

    // хвост (обычно '\n') и всё после блока отбрасываются
    buf.truncate(start + expected);
    buf.drain(..start);

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimulatedScope;

    fn block(payload: &[u8]) -> Vec<u8> {
        let len = payload.len().to_string();
        let mut out = format!("#{}{}", len.len(), len).into_bytes();
        out.extend_from_slice(payload);
        out.push(b'\n');
        out
    }

    fn receiver() -> FrameReceiver {
        FrameReceiver::new(ReceiverConfig {
            transfer_timeout: Duration::from_millis(1_500),
            ..ReceiverConfig::default()
        })
    }

    #[test]
    fn test_block_header_parsing() {
        assert_eq!(parse_block_header(b"#41024").unwrap(), Some((6, 1024)));
        assert_eq!(parse_block_header(b"#3").unwrap(), None);
        assert_eq!(parse_block_header(b"#31").unwrap(), None);
        assert!(parse_block_header(b"#x").is_err());
        assert!(parse_block_header(b"#0").is_err());
        assert!(parse_block_header(b"#31a").is_err());
        assert!(parse_block_header(b"#41a2").is_err());
    }

    #[test]
    fn test_classify_needs_more_bytes() {
        assert_eq!(classify(b"").unwrap(), None);
        assert_eq!(classify(b"#").unwrap(), None);
        assert_eq!(classify(b"C1:WF ALL,WAVE").unwrap(), None);
        assert_eq!(
            classify(b"C1:WF ALL,WAVEDESC").unwrap(),
            Some(Framing::RawWithMarker { marker_offset: 10 })
        );
    }

    #[test]
    fn test_block_received_and_newline_stripped() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(1024).collect();
        let mut scope = SimulatedScope::new(block(&payload)).with_chunks(vec![100]);

        let frame = receiver().receive(&mut scope).unwrap();

        assert_eq!(frame.payload, payload);
        assert_eq!(
            frame.framing,
            Some(Framing::LengthPrefixed {
                header_len: 6,
                declared_len: 1024
            })
        );
        assert_eq!(frame.bytes_received, 6 + 1024 + 1);
        assert_eq!(scope.written(), &["C1:WF? ALL"]);
    }

    #[test]
    fn test_truncated_block() {
        let payload = vec![7u8; 1024];
        let mut reply = block(&payload);
        reply.truncate(6 + 500);
        let mut scope = SimulatedScope::new(reply).with_chunks(vec![64]);

        let err = receiver().receive(&mut scope).unwrap_err();

        assert!(matches!(
            err,
            AcquireError::Truncated {
                received: 500,
                expected: 1024
            }
        ));
    }

    #[test]
    fn test_read_limit_is_truncation() {
        let payload = vec![1u8; 1024];
        let mut scope = SimulatedScope::new(block(&payload)).with_chunks(vec![10]);
        let receiver = FrameReceiver::new(ReceiverConfig {
            max_reads: 5,
            ..ReceiverConfig::default()
        });

        let err = receiver.receive(&mut scope).unwrap_err();

        assert!(matches!(
            err,
            AcquireError::Truncated {
                received: 44,
                expected: 1024
            }
        ));
        assert_eq!(scope.reads(), 5);
    }

    #[test]
    fn test_malformed_header() {
        let mut scope = SimulatedScope::new(b"#A123".to_vec());
        let err = receiver().receive(&mut scope).unwrap_err();
        assert!(matches!(err, AcquireError::MalformedHeader(_)));

        let mut scope = SimulatedScope::new(b"#4".to_vec());
        let err = receiver().receive(&mut scope).unwrap_err();
        assert!(matches!(err, AcquireError::MalformedHeader(_)));
    }

    #[test]
    fn test_no_bytes_is_timeout() {
        let mut scope = SimulatedScope::new(Vec::new());
        let err = receiver().receive(&mut scope).unwrap_err();

        assert!(matches!(err, AcquireError::Timeout));
    }

    #[test]
    fn test_timeout_restored_on_success_and_failure() {
        let mut ok = SimulatedScope::new(block(&[1, 2, 3]));
        ok.set_timeout(Duration::from_millis(300)).unwrap();
        receiver().receive(&mut ok).unwrap();

        assert_eq!(ok.timeout(), Duration::from_millis(300));
        assert_eq!(
            ok.timeout_history(),
            &[
                Duration::from_millis(300),
                Duration::from_millis(1_500),
                Duration::from_millis(300)
            ]
        );

        let mut failing = SimulatedScope::new(b"#9".to_vec());
        failing.set_timeout(Duration::from_millis(700)).unwrap();
        assert!(receiver().receive(&mut failing).is_err());

        assert_eq!(failing.timeout(), Duration::from_millis(700));
        assert_eq!(failing.timeout_history().len(), 3);
    }

    /// Поток без перезапуска ответа: всё, что не прочитано, остаётся
    /// в транспорте до следующего запроса.
    struct Stream {
        inner: SimulatedScope,
    }

    impl ScopeSession for Stream {
        fn write(
            &mut self,
            _command: &str,
        ) -> AcquireResult<()> {
            Ok(())
        }

        fn read_raw(&mut self) -> AcquireResult<Vec<u8>> {
            self.inner.read_raw()
        }

        fn query(
            &mut self,
            command: &str,
        ) -> AcquireResult<String> {
            self.inner.query(command)
        }

        fn timeout(&self) -> Duration {
            self.inner.timeout()
        }

        fn set_timeout(
            &mut self,
            timeout: Duration,
        ) -> AcquireResult<()> {
            self.inner.set_timeout(timeout)
        }
    }

    #[test]
    fn test_back_to_back_blocks_on_one_stream() {
        let first: Vec<u8> = (0..1024u32).map(|i| (i % 251) as u8).collect();
        let second: Vec<u8> = (0..1024u32).map(|i| (i % 13) as u8).collect();

        let mut bytes = block(&first);
        bytes.extend_from_slice(&block(&second));

        // 1030 = заголовок + данные, терминатор уходит в следующее чтение
        let mut stream = Stream {
            inner: SimulatedScope::new(bytes).with_chunks(vec![1030]),
        };

        let a = receiver().receive(&mut stream).unwrap();
        assert_eq!(a.payload, first);

        let b = receiver().receive(&mut stream).unwrap();
        assert_eq!(b.payload, second);
        assert_eq!(
            b.framing,
            Some(Framing::LengthPrefixed {
                header_len: 7,
                declared_len: 1024
            })
        );
    }

    #[test]
    fn test_classify_skips_stale_terminator() {
        assert_eq!(classify(b"\r\n").unwrap(), None);
        assert_eq!(
            classify(b"\n#41024").unwrap(),
            Some(Framing::LengthPrefixed {
                header_len: 7,
                declared_len: 1024
            })
        );
        assert!(classify(b"\n#x").is_err());
    }

    #[test]
    fn test_only_terminator_is_timeout() {
        let mut scope = SimulatedScope::new(b"\n".to_vec());
        let err = receiver().receive(&mut scope).unwrap_err();

        assert!(matches!(err, AcquireError::Timeout));
    }

    #[test]
    fn test_unframed_reply_without_marker() {
        let mut scope = SimulatedScope::new(b"garbage reply".to_vec());
        let frame = receiver().receive(&mut scope).unwrap();

        assert_eq!(frame.payload, b"garbage reply");
        assert_eq!(frame.framing, None);
    }
}
