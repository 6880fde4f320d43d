use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use cachemon::common::{self, cpuid, AffinityGuard, DevMsrAccess, CPU_ARCH};
use cachemon::config::{parse_level, parse_metric, parse_slot, WindowConfig};
use cachemon::counters::events::{self, CacheLevel, MetricKind, EVENT_TABLE};
use cachemon::counters::window::DEFAULT_TOUCH_BYTES;
use cachemon::counters::{MeasurementWindow, RecordingAccess};
use cachemon::{
    CacheMonError, CounterEngine, CounterReading, EngineOptions, MeasureConfig, ReadingExporter,
    Result,
};
use cachemon_raw::current_arch::core::{CounterSlot, CORE_PMU_COUNTERS};

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
enum WindowArg {
    /// Busy-wait for --window-us microseconds
    Spin,
    /// Write --touch-bytes bytes of a fresh buffer
    Touch,
}

#[derive(Parser, Debug)]
#[command(name = "cachemon")]
#[command(about = "Count cache events with Sandy Bridge core performance counters")]
struct Args {
    #[arg(
        long,
        default_value = "uops",
        value_parser = parse_level,
        help = "Cache level: uops, l1i, l1d, l2, l3"
    )]
    level: CacheLevel,

    #[arg(
        long,
        default_value = "retired",
        value_parser = parse_metric,
        help = "Metric: all-requests, all-hits, all-misses, load-misses, store-misses, retired"
    )]
    metric: MetricKind,

    #[arg(long, default_value = "1", value_parser = parse_slot, help = "Counter slot (0-3)")]
    slot: CounterSlot,

    #[arg(long, default_value_t = 0, help = "CPU whose counter is programmed")]
    cpu: u32,

    #[arg(long, help = "Do not pin this thread to --cpu during the measurement")]
    no_pin: bool,

    #[arg(long, value_enum, default_value = "touch", help = "Measurement window")]
    window: WindowArg,

    #[arg(long, default_value_t = 1000, help = "Spin window length in microseconds")]
    window_us: u64,

    #[arg(long, default_value_t = DEFAULT_TOUCH_BYTES, help = "Touch window buffer size")]
    touch_bytes: usize,

    #[arg(long, help = "Allow event encodings not yet confirmed on hardware")]
    allow_provisional: bool,

    #[arg(long, help = "Log the register protocol without touching any MSR")]
    dry_run: bool,

    #[arg(long, help = "Print the event table and exit")]
    list: bool,

    #[arg(long, help = "Write the reading in Prometheus text format to this file")]
    textfile: Option<PathBuf>,

    #[arg(
        short,
        long,
        help = "Enable verbose logging (shows every MSR read/write)"
    )]
    verbose: bool,
}

impl Args {
    fn to_config(&self) -> MeasureConfig {
        let window = match self.window {
            WindowArg::Spin => WindowConfig::Spin(Duration::from_micros(self.window_us)),
            WindowArg::Touch => WindowConfig::Touch {
                bytes: self.touch_bytes,
            },
        };

        MeasureConfig {
            cpu: self.cpu,
            pin: !self.no_pin,
            level: self.level,
            kind: self.metric,
            slot: self.slot,
            window,
            allow_provisional: self.allow_provisional,
            dry_run: self.dry_run,
            textfile: self.textfile.clone(),
        }
    }
}

fn print_event_table() {
    println!(
        "{:<6} {:<14} {:>5} {:>5}  {:<12} NAME",
        "LEVEL", "METRIC", "EVENT", "UMASK", "STATUS"
    );
    for entry in EVENT_TABLE {
        println!(
            "{:<6} {:<14}  0x{:02X}  0x{:02X}  {:<12} {}",
            entry.level.name(),
            entry.kind.name(),
            entry.event_code,
            entry.unit_mask,
            if entry.confirmed {
                "confirmed"
            } else {
                "provisional"
            },
            entry.name
        );
    }
}

fn run(config: &MeasureConfig) -> Result<CounterReading> {
    tracing::info!("Detected CPU architecture: {}", CPU_ARCH.name());

    let pmu = cpuid::pmu_info();
    if (pmu.gp_counters as usize) < CORE_PMU_COUNTERS {
        tracing::warn!(
            "CPUID reports {} general-purpose counters (PMU version {}), expected {}",
            pmu.gp_counters,
            pmu.version,
            CORE_PMU_COUNTERS
        );
    }

    config.validate(&MeasureConfig::detect_online_cpus())?;

    // Counters are core-local; the window workload must run where we read.
    let _affinity = if config.pin {
        Some(AffinityGuard::new(config.cpu)?)
    } else {
        tracing::warn!(
            "Not pinned: the measurement window may run on a CPU other than {}",
            config.cpu
        );
        None
    };

    let window: Box<dyn MeasurementWindow> = config.window.build();
    let options = EngineOptions {
        allow_provisional: config.allow_provisional,
    };

    let reading = if config.dry_run {
        tracing::warn!("Dry run: no MSR will be accessed");
        let engine = CounterEngine::new(RecordingAccess::new(), window).with_options(options);
        let reading = engine.measure(config.level, config.kind, config.slot)?;
        for op in engine.access().ops() {
            tracing::info!("dry run: {:?}", op);
        }
        reading
    } else {
        if let Err(hint) = common::msr::check_device(config.cpu) {
            tracing::error!("{}", hint);
        }
        let access = DevMsrAccess::new(config.cpu)?;
        let engine = CounterEngine::new(access, window).with_options(options);
        engine.measure(config.level, config.kind, config.slot)?
    };

    if let Some(path) = &config.textfile {
        let exporter = ReadingExporter::new()?;
        exporter.record(config.cpu, &reading);
        exporter.write_textfile(path)?;
    }

    Ok(reading)
}

fn report_failure(config: &MeasureConfig, err: &CacheMonError) {
    let slot = config.slot;
    if err.is_fatal() {
        tracing::error!(
            "Privileged access failed (register {}): evtsel=0x{:X}, pmc=0x{:X} on CPU {}: {}",
            err.register()
                .map(|r| format!("0x{r:X}"))
                .unwrap_or_else(|| "none".to_string()),
            slot.event_select(),
            slot.counter(),
            config.cpu,
            err
        );
    } else {
        tracing::error!(
            "Measurement of {} {} on slot {} failed: {}",
            config.level,
            config.kind,
            slot,
            err
        );
        if let CacheMonError::UnsupportedMetric { level, .. } = err {
            let kinds: Vec<&str> = events::kinds_for(*level).iter().map(|k| k.name()).collect();
            tracing::info!("Metrics defined for {}: {}", level, kinds.join(", "));
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging based on verbose flag
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if args.list {
        print_event_table();
        return Ok(());
    }

    let config = args.to_config();
    let outcome = run(&config);

    // Counters are left as programmed; nothing to undo on the hardware.
    tracing::info!("cachemon finished");

    match outcome {
        Ok(reading) => {
            println!(
                "{} {} on CPU {} slot {}: {} (0x{:016X})",
                reading.level(),
                reading.kind(),
                config.cpu,
                reading.slot(),
                reading.value(),
                reading.value()
            );
            Ok(())
        }
        Err(e) => {
            report_failure(&config, &e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args_reproduce_uops_case() {
        let args = Args::parse_from(["cachemon"]);
        let config = args.to_config();
        assert_eq!(config.level, CacheLevel::Uops);
        assert_eq!(config.kind, MetricKind::Retired);
        assert_eq!(config.slot, CounterSlot::Slot1);
        assert_eq!(
            config.window,
            WindowConfig::Touch {
                bytes: DEFAULT_TOUCH_BYTES
            }
        );
        assert!(config.pin);
    }

    #[test]
    fn test_args_select_case() {
        let args = Args::parse_from([
            "cachemon",
            "--level",
            "l3",
            "--metric",
            "all-misses",
            "--slot",
            "2",
            "--cpu",
            "3",
            "--window",
            "spin",
            "--window-us",
            "250",
            "--allow-provisional",
            "--no-pin",
        ]);
        let config = args.to_config();
        assert_eq!(config.level, CacheLevel::L3);
        assert_eq!(config.kind, MetricKind::AllMisses);
        assert_eq!(config.slot, CounterSlot::Slot2);
        assert_eq!(config.cpu, 3);
        assert_eq!(
            config.window,
            WindowConfig::Spin(Duration::from_micros(250))
        );
        assert!(config.allow_provisional);
        assert!(!config.pin);
    }

    #[test]
    fn test_bad_slot_rejected() {
        assert!(Args::try_parse_from(["cachemon", "--slot", "4"]).is_err());
    }

    #[test]
    fn test_dry_run_touches_no_hardware() {
        let config = MeasureConfig {
            level: CacheLevel::L3,
            kind: MetricKind::AllRequests,
            slot: CounterSlot::Slot2,
            window: WindowConfig::Spin(Duration::ZERO),
            pin: false,
            dry_run: true,
            cpu: MeasureConfig::detect_online_cpus()[0],
            ..Default::default()
        };
        let reading = run(&config).unwrap();
        assert_eq!(reading.value(), 0);
        assert_eq!(reading.slot(), CounterSlot::Slot2);
    }
}
