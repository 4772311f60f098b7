//! Simulated runs: config mapping, device assembly and run execution.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use afc_core::Afc;
use afc_core::command::{BoardCommand, Command};
use afc_core::config::AfcCfg;
use afc_core::runner::{
    Devices, RunPlan, RunSummary, ScheduledCommand, SchedulingMode, run_realtime, run_virtual,
};
use afc_core::sampling::LinearScaler;
use afc_hardware::{
    SimExternalAdc, SimInternalAdc, SimParams, SimPhases, SimPulseCounter, SimTransport,
};
use afc_traits::ExternalAdc;
use eyre::WrapErr;

use crate::cli::RtLock;
use crate::rt::setup_rt_once;

/// Pulse log records the simulated transport buffers before refusing more.
const LOG_CAPACITY: usize = 1 << 16;

/// Delay before the host sends its configuration after power-up.
const HOST_CONFIG_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct SimulateArgs {
    pub duration: Duration,
    pub pulse_from: Duration,
    pub pulse_until: Option<Duration>,
    pub home: Option<u16>,
    pub manual: Option<u16>,
    pub fast_log: bool,
    pub trace_every: Option<u32>,
    pub mode: SchedulingMode,
    pub spi_adc: bool,
    pub rt: RtArgs,
}

#[derive(Debug, Clone, Copy)]
pub struct RtArgs {
    pub enabled: bool,
    pub prio: Option<i32>,
    pub lock: Option<RtLock>,
    pub cpu: Option<usize>,
}

/// What the CLI reports after a run.
#[derive(Debug)]
pub struct SimulateReport {
    pub summary: RunSummary,
    pub home: u16,
    pub resonance: u16,
    pub log_records: usize,
}

pub fn seconds(s: f64) -> eyre::Result<Duration> {
    Duration::try_from_secs_f64(s).map_err(|e| eyre::eyre!("invalid duration {s}: {e}"))
}

fn sim_params(c: &afc_config::Simulation) -> SimParams {
    SimParams {
        resonance: c.resonance,
        width: c.width,
        off_resonance_reading: c.off_resonance_reading,
        on_resonance_reading: c.on_resonance_reading,
        noise: c.noise,
        not_responding_every: c.not_responding_every,
        forward_reading: c.forward_reading,
        seed: c.seed,
    }
}

/// The host's side of the session: configure home, optionally go manual.
fn host_script(home: u16, args: &SimulateArgs) -> Vec<ScheduledCommand> {
    let mut script = vec![ScheduledCommand {
        at: HOST_CONFIG_DELAY,
        command: Command::SetHome(home).into(),
    }];
    if let Some(target) = args.manual {
        script.push(ScheduledCommand {
            at: args.pulse_from,
            command: Command::SetManualTarget(target).into(),
        });
        script.push(ScheduledCommand {
            at: args.pulse_from,
            command: Command::SelectManual.into(),
        });
    }
    script
}

#[cfg(feature = "hardware")]
fn spi_adc() -> eyre::Result<Box<dyn ExternalAdc + Send>> {
    let adc = afc_hardware::spi_adc::SpiAdc::new(0, 0, 1_000_000).wrap_err("open spi converter")?;
    Ok(Box::new(adc))
}

#[cfg(not(feature = "hardware"))]
fn spi_adc() -> eyre::Result<Box<dyn ExternalAdc + Send>> {
    eyre::bail!("--spi-adc needs a build with the `hardware` feature")
}

pub fn run_simulation(
    cfg: &afc_config::Config,
    args: &SimulateArgs,
    stop: &Arc<AtomicBool>,
) -> eyre::Result<SimulateReport> {
    if args.rt.enabled {
        let lock = args.rt.lock.unwrap_or_else(RtLock::os_default);
        setup_rt_once(true, args.rt.prio, lock, args.rt.cpu);
    }

    let core_cfg: AfcCfg = cfg.into();
    let reverse: LinearScaler = (&cfg.analog.reverse).into();
    let forward: LinearScaler = (&cfg.analog.forward).into();
    let params = sim_params(&cfg.simulation);
    let home = args.home.unwrap_or(cfg.simulation.home);

    let transport = SimTransport::new(LOG_CAPACITY);
    transport
        .lines()
        .fast_logging
        .store(args.fast_log, Ordering::Relaxed);
    let log = transport.clone();

    let (mut afc, side) = Afc::builder()
        .with_config(core_cfg)
        .with_reverse_scaler(reverse)
        .with_forward_scaler(forward)
        .with_transport(transport)
        .build()?;

    let tap = side.position.clone();
    let external: Box<dyn ExternalAdc + Send> = if args.spi_adc {
        spi_adc()?
    } else {
        Box::new(SimExternalAdc::new(params, Arc::new(move || tap.position())))
    };
    let devices = Devices {
        external,
        internal: SimInternalAdc::new(&params),
        counter: SimPulseCounter::new(),
        phases: SimPhases::new(),
    };

    let plan = RunPlan {
        duration: args.duration,
        slow_tick: Duration::from_millis(cfg.watchdog.slow_tick_ms),
        watchdog: Duration::from_millis(cfg.watchdog.timeout_ms),
        pulse_hz: cfg.simulation.pulse_hz,
        pulse_windows: vec![args.pulse_from..args.pulse_until.unwrap_or(args.duration)],
        trace_every: args.trace_every,
    };
    let script = host_script(home, args);

    tracing::info!(
        mode = ?args.mode,
        duration_ms = u64::try_from(args.duration.as_millis()).unwrap_or(u64::MAX),
        home,
        resonance = params.resonance,
        "simulation start"
    );

    let summary = match args.mode {
        SchedulingMode::Virtual => run_virtual(&mut afc, side, devices, &plan, &script)?,
        SchedulingMode::Realtime => {
            let (tx, rx) = crossbeam_channel::unbounded::<BoardCommand>();
            let host = std::thread::spawn(move || {
                let mut elapsed = Duration::ZERO;
                for c in script {
                    std::thread::sleep(c.at.saturating_sub(elapsed));
                    elapsed = c.at;
                    if tx.send(c.command).is_err() {
                        break;
                    }
                }
            });
            let summary = run_realtime(&mut afc, side, devices, &plan, &rx, stop);
            drop(rx);
            if host.join().is_err() {
                tracing::warn!("host command thread panicked");
            }
            summary?
        }
    };

    Ok(SimulateReport {
        summary,
        home,
        resonance: params.resonance,
        log_records: log.drain().len(),
    })
}

/// Validate the config and take the controller through bring-up into
/// auto-zero on virtual time.
pub fn self_check(cfg: &afc_config::Config) -> eyre::Result<String> {
    cfg.validate().wrap_err("invalid configuration")?;
    let core_cfg: AfcCfg = cfg.into();
    let (mut afc, _side) = Afc::builder()
        .with_config(core_cfg)
        .with_reverse_scaler(LinearScaler::from(&cfg.analog.reverse))
        .with_forward_scaler(LinearScaler::from(&cfg.analog.forward))
        .with_transport(SimTransport::new(16))
        .with_bring_up(|| Ok(()))
        .build()?;
    let report = afc.poll()?;
    Ok(format!(
        "ok: bring-up complete, mode {}, travel {}..{}",
        report.mode,
        afc.cfg().travel.min_position,
        afc.cfg().travel.max_position
    ))
}
