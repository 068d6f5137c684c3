use std::env;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use diagqual::{
    coordinator, notifier, DebounceConfig, DebounceEngine, DiagResult, DtcId, DtcRegistry, EngineConfig,
    MonitorAction, OperationCycleRegistry,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const OIL_DTC: DtcId = DtcId(0x00_05_21);

fn main() {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let config = match args.get(1) {
        Some(path) => load_config(path).unwrap_or_else(|err| {
            eprintln!("diagqual-sim: {err}");
            std::process::exit(2);
        }),
        None => EngineConfig::default(),
    };

    if let Err(err) = run(config) {
        eprintln!("diagqual-sim failed: {err}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("diagqual=debug"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_thread_names(true))
        .init();
}

fn load_config(path: &str) -> Result<EngineConfig, String> {
    let raw = fs::read_to_string(path).map_err(|e| format!("cannot read {path}: {e}"))?;
    EngineConfig::from_json(&raw).map_err(|e| format!("{path}: {e}"))
}

fn run(config: EngineConfig) -> DiagResult<()> {
    let engine = DebounceEngine::new(config)?;
    let dtcs = Arc::new(DtcRegistry::new());
    let cycles = OperationCycleRegistry::new();

    cycles.register_operation_cycle("ignition", None)?;
    cycles.set_operation_cycle_state("ignition", true)?;

    dtcs.register_dtc(OIL_DTC, None)?;
    engine.register_monitor(
        "oil_pressure",
        DebounceConfig::counter(3, 3, 1, 1),
        Some(coordinator::dtc_binding(Arc::clone(&dtcs), OIL_DTC)),
    )?;

    let (notify, events) = notifier::channel();
    engine.register_monitor("coolant_temp", DebounceConfig::time(100), Some(notify))?;

    // Noisy start, then a persistent fault.
    for pre_failed in [true, false, true, true, true] {
        engine.report_pre_event("oil_pressure", pre_failed)?;
    }
    println!("oil_pressure: {:?}", engine.qualified_state("oil_pressure"));
    println!("{OIL_DTC}: status {:?}", dtcs.current_status(OIL_DTC));

    // A single report starts a run; the ticker qualifies it.
    engine.report_monitor_action("coolant_temp", MonitorAction::Prepassed)?;
    let event = events.recv_timeout(Duration::from_secs(2))?;
    println!("coolant_temp: {} at {}", event.state, event.at.to_rfc3339());

    // Recovery.
    for _ in 0..6 {
        engine.report_monitor_action("oil_pressure", MonitorAction::Prepassed)?;
    }
    println!("oil_pressure: {:?}", engine.qualified_state("oil_pressure"));
    println!("{OIL_DTC}: status {:?}", dtcs.current_status(OIL_DTC));

    cycles.set_operation_cycle_state("ignition", false)?;
    engine.shutdown();

    let stats = engine.dispatcher_stats();
    println!(
        "monitors={} delivered={} notifier_panics={}",
        engine.monitor_count()?,
        stats.delivered,
        stats.notifier_panics
    );
    Ok(())
}
