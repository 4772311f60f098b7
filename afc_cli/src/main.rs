mod cli;
mod error_fmt;
mod rt;
mod simulate;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use afc_core::runner::SchedulingMode;
use clap::Parser;
use eyre::WrapErr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::simulate::{RtArgs, SimulateArgs, SimulateReport, seconds};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let code = match run(cli) {
        Ok(()) => 0,
        Err(err) => {
            if JSON_MODE.get().copied().unwrap_or(false) {
                eprintln!("{}", format_error_json(&err));
            } else {
                eprintln!("{}", humanize(&err));
                tracing::debug!(error = ?err, "run failed");
            }
            exit_code_for_error(&err)
        }
    };
    std::process::exit(code);
}

fn load_config(path: Option<&Path>) -> eyre::Result<afc_config::Config> {
    let cfg = match path {
        Some(p) => afc_config::load_file(p)?,
        None => afc_config::Config::default(),
    };
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

/// Install the subscriber. The returned guard flushes the file writer on drop.
fn init_tracing(
    json: bool,
    level: &str,
    logging: &afc_config::Logging,
) -> eyre::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("bad log level {level:?}"))?;

    let console_json = json.then(|| fmt::layer().json().with_writer(std::io::stderr));
    let console_text = (!json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    let mut guard = None;
    let file_layer = match logging.file.as_deref() {
        Some(file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file {file:?} has no file name"))?;
            let appender = match logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                "never" => tracing_appender::rolling::never(dir, name),
                other => {
                    eyre::bail!("logging.rotation must be never, daily or hourly, got {other:?}")
                }
            };
            let (writer, g) = tracing_appender::non_blocking(appender);
            guard = Some(g);
            Some(fmt::layer().json().with_ansi(false).with_writer(writer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_json)
        .with(console_text)
        .with(file_layer)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(guard)
}

fn run(cli: Cli) -> eyre::Result<()> {
    if !cli.json {
        let _ = color_eyre::install();
    }
    let cfg = load_config(cli.config.as_deref())?;
    let level = cli
        .log_level
        .clone()
        .or_else(|| cfg.logging.level.clone())
        .unwrap_or_else(|| "warn".to_string());
    let _log_guard = init_tracing(cli.json, &level, &cfg.logging)?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        if let Err(e) = ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "could not install Ctrl-C handler");
        }
    }

    match cli.cmd {
        Commands::SelfCheck => {
            let msg = simulate::self_check(&cfg)?;
            if cli.json {
                println!("{}", serde_json::json!({ "self_check": "ok", "detail": msg }));
            } else {
                println!("{msg}");
            }
        }
        Commands::Simulate {
            duration,
            pulse_from,
            pulse_until,
            home,
            manual,
            fast_log,
            trace_every,
            realtime,
            spi_adc,
            rt,
            rt_prio,
            rt_lock,
            rt_cpu,
        } => {
            let args = SimulateArgs {
                duration: seconds(duration)?,
                pulse_from: seconds(pulse_from)?,
                pulse_until: pulse_until.map(seconds).transpose()?,
                home,
                manual,
                fast_log,
                trace_every,
                mode: if realtime {
                    SchedulingMode::Realtime
                } else {
                    SchedulingMode::Virtual
                },
                spi_adc,
                rt: RtArgs {
                    enabled: rt,
                    prio: rt_prio,
                    lock: rt_lock,
                    cpu: rt_cpu,
                },
            };
            let report = simulate::run_simulation(&cfg, &args, &stop)?;
            if cli.json {
                println!("{}", report_json(&report));
            } else {
                print_report(&report);
            }
        }
    }
    Ok(())
}

fn report_json(r: &SimulateReport) -> serde_json::Value {
    let s = &r.summary;
    let trace: Vec<_> = s
        .trace
        .iter()
        .map(|p| {
            serde_json::json!({
                "at_ms": p.at_ms,
                "mode": p.mode.to_string(),
                "current": p.current,
                "target": p.target,
                "reverse_db": p.reverse_db,
            })
        })
        .collect();
    serde_json::json!({
        "elapsed_ms": u64::try_from(s.elapsed.as_millis()).unwrap_or(u64::MAX),
        "mode": s.mode.to_string(),
        "mode_code": s.mode.code(),
        "position": s.actuator.current_position,
        "target": s.actuator.target_position,
        "home": r.home,
        "resonance": r.resonance,
        "reverse_db": s.telemetry.debug[6],
        "forward_db": s.telemetry.debug[7],
        "pulses_fired": s.pulses_fired,
        "samples": s.telemetry.samples,
        "missed_samples": s.telemetry.missed_samples,
        "unknown_commands": s.telemetry.unknown_commands,
        "dropped_log_records": s.telemetry.dropped_log_records,
        "log_records": r.log_records,
        "step_ticks": s.step_ticks,
        "status": {
            "not_ready": s.status.not_ready,
            "com_fault": s.status.com_fault,
            "not_configured": s.status.not_configured,
            "homing_in_progress": s.status.homing_in_progress,
            "manual_mode": s.status.manual_mode,
        },
        "trace": trace,
    })
}

fn print_report(r: &SimulateReport) {
    let s = &r.summary;
    for p in &s.trace {
        println!(
            "{:>8} ms  {:<10}  pos {:>5}  target {:>5}  rev {:>5}",
            p.at_ms, p.mode, p.current, p.target, p.reverse_db
        );
    }
    println!(
        "run finished after {:.3} s in {}",
        s.elapsed.as_secs_f64(),
        s.mode
    );
    println!(
        "position {} (target {}, home {}, resonance {})",
        s.actuator.current_position, s.actuator.target_position, r.home, r.resonance
    );
    println!(
        "pulses {} sampled {} missed {} | reverse {} forward {} (0.01 dB)",
        s.pulses_fired,
        s.telemetry.samples,
        s.telemetry.missed_samples,
        s.telemetry.debug[6],
        s.telemetry.debug[7]
    );
    if r.log_records > 0 {
        println!("pulse log records {}", r.log_records);
    }
}
