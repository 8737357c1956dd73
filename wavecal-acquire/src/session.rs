//! Транспорт до осциллографа.
//!
//! Приёмник и конвейер видят прибор только через [`ScopeSession`]:
//! запись команды, чтение очередной порции байт, текстовый запрос и таймаут.

use std::{
    collections::HashMap,
    io::{BufRead, BufReader, ErrorKind, Write},
    net::{TcpStream, ToSocketAddrs},
    time::Duration,
};

use log::{debug, info};

use crate::{AcquireError, AcquireResult};

/// Таймаут по умолчанию для коротких запросов.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Абстракция сессии с прибором.
// Реализации: [`TcpSession`] (raw-socket SCPI) и [`SimulatedScope`].
pub trait ScopeSession {
    /// Отправляет команду без ожидания ответа.
    fn write(
        &mut self,
        command: &str,
    ) -> AcquireResult<()>;

    /// Читает очередную порцию ответа. Порция может быть любой длины,
    /// в том числе пустой. Истечение таймаута — [`AcquireError::Timeout`].
    fn read_raw(&mut self) -> AcquireResult<Vec<u8>>;

    /// Отправляет запрос и возвращает одну строку текстового ответа.
    fn query(
        &mut self,
        command: &str,
    ) -> AcquireResult<String>;

    fn timeout(&self) -> Duration;

    fn set_timeout(
        &mut self,
        timeout: Duration,
    ) -> AcquireResult<()>;
}

////////////////////////////////////////////////////////////////////////////////
// TcpSession
////////////////////////////////////////////////////////////////////////////////

/// SCPI поверх TCP сокета (порт 1861 у LeCroy в режиме raw, 5025 у
/// большинства остальных).
pub struct TcpSession {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    timeout: Duration,
}

impl TcpSession {
    pub fn connect<A: ToSocketAddrs + std::fmt::Debug>(addr: A) -> AcquireResult<Self> {
        let stream = TcpStream::connect(&addr)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(DEFAULT_TIMEOUT))?;

        let writer = stream.try_clone()?;
        info!("Connected to instrument at {addr:?}");

        Ok(Self {
            reader: BufReader::with_capacity(64 * 1024, stream),
            writer,
            timeout: DEFAULT_TIMEOUT,
        })
    }
}

fn map_io(e: std::io::Error) -> AcquireError {
    match e.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => AcquireError::Timeout,
        _ => AcquireError::Io(e),
    }
}

impl ScopeSession for TcpSession {
    fn write(
        &mut self,
        command: &str,
    ) -> AcquireResult<()> {
        debug!("> {command}");
        self.writer.write_all(command.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    fn read_raw(&mut self) -> AcquireResult<Vec<u8>> {
        let chunk = self.reader.fill_buf().map_err(map_io)?.to_vec();

        if chunk.is_empty() {
            return Err(AcquireError::Session(
                "connection closed by instrument".to_string(),
            ));
        }

        self.reader.consume(chunk.len());
        Ok(chunk)
    }

    fn query(
        &mut self,
        command: &str,
    ) -> AcquireResult<String> {
        self.write(command)?;

        // Пустые строки — хвост предыдущего двоичного блока
        loop {
            let mut line = String::new();
            let n = self.reader.read_line(&mut line).map_err(map_io)?;

            if n == 0 {
                return Err(AcquireError::Session(
                    "connection closed by instrument".to_string(),
                ));
            }

            let line = line.trim();
            if !line.is_empty() {
                debug!("< {line}");
                return Ok(line.to_string());
            }
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(
        &mut self,
        timeout: Duration,
    ) -> AcquireResult<()> {
        // Нулевой таймаут у сокета запрещён
        let t = timeout.max(Duration::from_millis(1));
        self.reader.get_ref().set_read_timeout(Some(t))?;
        self.timeout = timeout;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// SimulatedScope
////////////////////////////////////////////////////////////////////////////////

/// Имитация прибора: отдаёт заранее подготовленный ответ порциями заданного
/// размера и отвечает на текстовые запросы из таблицы.
#[derive(Debug, Clone)]
pub struct SimulatedScope {
    reply: Vec<u8>,
    cursor: usize,
    /// Размеры порций, используются по кругу
    chunk_sizes: Vec<usize>,
    chunk_index: usize,
    /// Сколько пустых чтений вернуть перед данными
    empty_reads: usize,
    answers: HashMap<String, String>,
    written: Vec<String>,
    timeout: Duration,
    timeout_history: Vec<Duration>,
    reads: usize,
}

impl SimulatedScope {
    pub fn new(reply: Vec<u8>) -> Self {
        Self {
            reply,
            cursor: 0,
            chunk_sizes: vec![4_096],
            chunk_index: 0,
            empty_reads: 0,
            answers: HashMap::new(),
            written: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            timeout_history: Vec::new(),
            reads: 0,
        }
    }

    /// Размеры порций; нулевые размеры игнорируются.
    pub fn with_chunks(
        mut self,
        sizes: Vec<usize>,
    ) -> Self {
        let sizes: Vec<usize> = sizes.into_iter().filter(|&s| s > 0).collect();
        if !sizes.is_empty() {
            self.chunk_sizes = sizes;
        }
        self
    }

    pub fn with_empty_reads(
        mut self,
        n: usize,
    ) -> Self {
        self.empty_reads = n;
        self
    }

    pub fn with_answer(
        mut self,
        query: &str,
        reply: &str,
    ) -> Self {
        self.answers.insert(query.to_string(), reply.to_string());
        self
    }

    /// Все отправленные команды и запросы по порядку.
    pub fn written(&self) -> &[String] {
        &self.written
    }

    /// Все значения, передававшиеся в `set_timeout`.
    pub fn timeout_history(&self) -> &[Duration] {
        &self.timeout_history
    }

    /// Количество вызовов `read_raw`.
    pub fn reads(&self) -> usize {
        self.reads
    }

    fn next_chunk_len(&mut self) -> usize {
        let len = self.chunk_sizes[self.chunk_index % self.chunk_sizes.len()];
        self.chunk_index += 1;
        len
    }
}

impl ScopeSession for SimulatedScope {
    fn write(
        &mut self,
        command: &str,
    ) -> AcquireResult<()> {
        // запрос осциллограммы "взводит" ответ заново
        if command.contains("WF?") {
            self.cursor = 0;
            self.chunk_index = 0;
        }
        self.written.push(command.to_string());
        Ok(())
    }

    fn read_raw(&mut self) -> AcquireResult<Vec<u8>> {
        self.reads += 1;

        if self.empty_reads > 0 {
            self.empty_reads -= 1;
            return Ok(Vec::new());
        }

        if self.cursor >= self.reply.len() {
            return Err(AcquireError::Timeout);
        }

        let len = self.next_chunk_len();
        let end = (self.cursor + len).min(self.reply.len());
        let chunk = self.reply[self.cursor..end].to_vec();
        self.cursor = end;

        Ok(chunk)
    }

    fn query(
        &mut self,
        command: &str,
    ) -> AcquireResult<String> {
        self.written.push(command.to_string());
        self.answers
            .get(command)
            .cloned()
            .ok_or(AcquireError::Timeout)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(
        &mut self,
        timeout: Duration,
    ) -> AcquireResult<()> {
        self.timeout_history.push(timeout);
        self.timeout = timeout;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_chunks_cycle() {
        let mut s = SimulatedScope::new((0u8..10).collect()).with_chunks(vec![3, 1]);

        assert_eq!(s.read_raw().unwrap(), vec![0, 1, 2]);
        assert_eq!(s.read_raw().unwrap(), vec![3]);
        assert_eq!(s.read_raw().unwrap(), vec![4, 5, 6]);
        assert_eq!(s.read_raw().unwrap(), vec![7]);
        assert_eq!(s.read_raw().unwrap(), vec![8, 9]);
        assert!(matches!(s.read_raw(), Err(AcquireError::Timeout)));
        assert_eq!(s.reads(), 6);
    }

    #[test]
    fn test_simulated_rearm_on_waveform_query() {
        let mut s = SimulatedScope::new(vec![1, 2]);

        assert_eq!(s.read_raw().unwrap(), vec![1, 2]);
        s.write("C1:WF? ALL").unwrap();
        assert_eq!(s.read_raw().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_simulated_empty_reads_and_queries() {
        let mut s = SimulatedScope::new(vec![9])
            .with_empty_reads(2)
            .with_answer("C1:VDIV?", "C1:VDIV 5.00E-01V");

        assert!(s.read_raw().unwrap().is_empty());
        assert!(s.read_raw().unwrap().is_empty());
        assert_eq!(s.read_raw().unwrap(), vec![9]);

        assert_eq!(s.query("C1:VDIV?").unwrap(), "C1:VDIV 5.00E-01V");
        assert!(matches!(s.query("C1:OFST?"), Err(AcquireError::Timeout)));
        assert_eq!(s.written(), &["C1:VDIV?", "C1:OFST?"]);
    }

    #[test]
    fn test_simulated_timeout_history() {
        let mut s = SimulatedScope::new(Vec::new());
        s.set_timeout(Duration::from_millis(250)).unwrap();

        assert_eq!(s.timeout(), Duration::from_millis(250));
        assert_eq!(s.timeout_history(), &[Duration::from_millis(250)]);
    }
}
