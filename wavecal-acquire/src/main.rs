use std::{path::PathBuf, process::ExitCode, time::Instant};

use clap::{ArgGroup, Parser};
use log::{error, info, warn};
use serde::Serialize;
use wavecal_acquire::{
    check, parse_freq_hz, AcquireConfig, AcquireError, AcquireResult, Acquisition,
    CalibrationOutcome, CalibrationPoint, ScopeSession, SimulatedScope, TcpSession, Verdict,
};
use wavecal_core::Measurement;

#[derive(Parser, Debug)]
#[command(
    name = "wavecal",
    version = env!("CARGO_PKG_VERSION"),
    about = "Acquire an oscilloscope waveform and measure its steady-state level",
    long_about = None,
)]
#[command(group(ArgGroup::new("source").required(true).args(["addr", "input"])))]
struct Cli {
    /// Адрес прибора host:port (raw SCPI socket)
    #[arg(short, long)]
    addr: Option<String>,
    /// Файл с сохранённым ответом прибора (`#9...` или `...WAVEDESC...`)
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// JSON конфигурация; флаги ниже её переопределяют
    #[arg(long)]
    config: Option<PathBuf>,
    /// Канал: C1..C4
    #[arg(short, long)]
    channel: Option<String>,
    /// Частота среза ФНЧ (1kHz, 250Hz, 1000)
    #[arg(long)]
    cutoff: Option<String>,
    /// Порядок фильтра Баттерворта
    #[arg(long)]
    order: Option<usize>,
    /// Окно поиска установившегося участка (выборок)
    #[arg(short, long)]
    window: Option<usize>,
    /// Порог коэффициента вариации, %
    #[arg(long)]
    cv_threshold: Option<f64>,
    /// Доля начала записи, исключаемая из поиска, %
    #[arg(long)]
    skip_initial: Option<f64>,
    /// Не запрашивать VDIV/OFST, брать масштаб из дескриптора
    #[arg(long)]
    no_live_scale: bool,
    /// Таймаут чтения на время передачи, мс
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Размер порции при воспроизведении файла, байт
    #[arg(long, default_value = "4096")]
    chunk: usize,
    /// Ожидаемое значение (цифровое значение устройства)
    #[arg(short, long)]
    expected: Option<f64>,
    /// Абсолютный допуск
    #[arg(short, long, default_value = "0.0")]
    tolerance: f64,
    /// Относительный допуск, %
    #[arg(long, default_value = "0.0")]
    tolerance_pct: f64,
    /// Вывод в JSON
    #[arg(long)]
    json: bool,
    /// Включить отфильтрованную осциллограмму в результат
    #[arg(long)]
    trace: bool,
    /// Тихий режим (только ошибки)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    channel: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    measurement: Option<&'a Measurement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    calibration: Option<&'a CalibrationOutcome>,
}

fn build_config(cli: &Cli) -> AcquireResult<AcquireConfig> {
    let mut config = match &cli.config {
        Some(path) => AcquireConfig::from_json_file(path)?,
        None => AcquireConfig::default(),
    };

    if let Some(ch) = &cli.channel {
        config.channel = ch.clone();
    }

    if let Some(cutoff) = &cli.cutoff {
        config.analysis.cutoff_hz =
            parse_freq_hz(cutoff).map_err(|e| AcquireError::Config(format!("--cutoff: {e}")))?;
    }

    if let Some(order) = cli.order {
        config.analysis.order = order;
    }

    if let Some(window) = cli.window {
        config.analysis.steady.window = Some(window);
    }

    if let Some(cv) = cli.cv_threshold {
        config.analysis.steady.cv_threshold_pct = cv;
    }

    if let Some(skip) = cli.skip_initial {
        config.analysis.steady.skip_initial_pct = skip;
    }

    if let Some(ms) = cli.timeout_ms {
        config.transfer_timeout_ms = ms;
    }

    // у сохранённого ответа нет живого прибора
    if cli.no_live_scale || cli.input.is_some() {
        config.live_scale = false;
    }

    config.analysis.keep_trace = cli.trace;
    config.validate()?;

    Ok(config)
}

fn open_session(cli: &Cli) -> AcquireResult<Box<dyn ScopeSession>> {
    if let Some(path) = &cli.input {
        let bytes = std::fs::read(path)?;
        info!("Replaying {} bytes from {path:?}", bytes.len());
        return Ok(Box::new(
            SimulatedScope::new(bytes).with_chunks(vec![cli.chunk]),
        ));
    }

    match &cli.addr {
        Some(addr) => Ok(Box::new(TcpSession::connect(addr.as_str())?)),
        None => Err(AcquireError::Config("either --addr or --input is required".to_string())),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.quiet { "error" } else { "info" };

    env_logger::Builder::new()
        .parse_filters(level)
        .format_target(false)
        .format_timestamp_secs()
        .init();

    let config = match build_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(1);
        }
    };

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!(
        "  Source        : {}",
        cli.addr
            .clone()
            .or_else(|| cli.input.as_ref().map(|p| p.display().to_string()))
            .unwrap_or_default()
    );
    info!("  Channel       : {}", config.channel);
    info!("  Cutoff        : {:.1} Hz", config.analysis.cutoff_hz);
    info!("  Order         : {}", config.analysis.order);
    info!("  CV threshold  : {:.3}%", config.analysis.steady.cv_threshold_pct);
    info!("  Live scale    : {}", config.live_scale);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let started = Instant::now();
    let channel = config.channel.clone();
    let (acquisition, metrics) = Acquisition::new(config);

    let result = open_session(&cli).and_then(|mut session| acquisition.run(session.as_mut()));

    let outcome = cli.expected.map(|expected| {
        let point = CalibrationPoint::new(&channel, expected)
            .with_abs(cli.tolerance)
            .with_pct(cli.tolerance_pct);
        check(&point, &result)
    });

    if cli.json {
        let report = Report {
            channel: &channel,
            measurement: result.as_ref().ok(),
            error: result.as_ref().err().map(|e| e.to_string()),
            calibration: outcome.as_ref(),
        };

        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                error!("Failed to serialize report: {e}");
                return ExitCode::from(1);
            }
        }
    } else if let Ok(m) = &result {
        println!("channel : {channel}");
        println!("mean    : {:.6}", m.mean);
        println!("stddev  : {:.6}", m.stddev);
        println!(
            "region  : [{}, {}) of {} samples",
            m.steady.start, m.steady.end, m.sample_count
        );
        println!("filter  : {} @ {:.1} Hz", m.filter, m.cutoff_hz);
        println!(
            "scale   : gain {} ({}), offset {} ({})",
            m.scale.gain, m.scale.gain_source, m.scale.offset, m.scale.offset_source
        );
        for d in &m.diagnostics {
            println!("warning : {d}");
        }
        if let Some(o) = &outcome {
            println!("verdict : {}", o.verdict);
        }
        if let Some(trace) = &m.trace {
            println!("# time_s value");
            for s in trace.samples() {
                println!("{:.9e} {:.6}", s.time, s.value);
            }
        }
    } else if let Some(o) = &outcome {
        println!("verdict : {}", o.verdict);
    }

    if let Err(e) = &result {
        if e.is_transport() {
            warn!("Transfer from instrument failed; check the connection and repeat the capture");
        } else {
            warn!("Reply was received but could not be processed; check the instrument setup");
        }
    }

    info!("\n{}", metrics.summary(&started));

    if metrics.diagnostics_total() > 0 {
        warn!(
            "⚠ {} recoverable diagnostic(s). Check instrument setup.",
            metrics.diagnostics_total()
        );
    }

    match (&result, outcome.as_ref().map(|o| &o.verdict)) {
        (_, Some(Verdict::Pass)) => ExitCode::SUCCESS,
        (_, Some(Verdict::Fail)) => ExitCode::from(2),
        (_, Some(Verdict::Inconclusive(_))) => ExitCode::from(3),
        (Ok(_), None) => ExitCode::SUCCESS,
        (Err(e), None) => {
            error!("Acquisition failed: {e}");
            ExitCode::from(1)
        }
    }
}
