//! Tether Runtime
//!
//! Boots logging and services, runs a script that hands a listener to the
//! native side, and drains events raised by a worker thread once per tick.
//!
//! Usage: `tether [settings.json] [script.js]`

mod tick;

use anyhow::{Context as _, Result};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::thread;
use std::time::Duration;
use tether_core::{
    check_arg_count, ArgCount, Event, EventDispatcher, Kind, NativeValue, Scheme, TableParser,
    TableValue, Value,
};
use tether_script::ScriptRuntime;
use tether_services::{dir_pointers, logging, PathResolver, Settings};
use tick::TickClock;

const APP_NAME: &str = "tether";

const DEMO_SCRIPT: &str = r#"
var options = {
    filename: "take.wav",
    baseDir: TemporaryDirectory,
    detector: { on: 0.2, off: 0.05 },
    sampleRate: "22050",
    listener: function (event) {
        if (event.isError) {
            print(event.name + " failed: " + event.errorMessage);
        } else if (event.phase === "volume") {
            print(event.name + " volume " + event.volume.toFixed(2));
        } else {
            print(event.name + " " + event.phase);
        }
    }
};
init(options);
"#;

fn options_scheme() -> tether_core::Result<Scheme> {
    Scheme::builder()
        .required("filename", Kind::String)
        .lightuserdata("baseDir")
        .table("detector")
        .number("detector.on")
        .number("detector.off")
        .numeric("sampleRate")
        .listener_named("listener", "microphone")
        .build()
}

/// Stand-in for a native producer (audio callback, I/O completion).
fn spawn_worker(
    dispatcher: EventDispatcher,
    listener: tether_core::CallbackHandle,
    samples: u32,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for i in 0..samples {
            let mut event = dispatcher.new_event("");
            event
                .set_phase("volume")
                .put("volume", (i as f64 / samples as f64).sin().abs());
            if let Err(err) = dispatcher.dispatch_event(listener, event, false) {
                tracing::error!("volume event rejected: {err}");
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }

        let mut done = dispatcher.new_event("");
        done.set_phase("recorded").set_ok();
        if let Ok(json) = serde_json::to_string(&done) {
            tracing::debug!(event = %json, "worker finished");
        }
        // Last event: the listener reference goes with it
        if let Err(err) = dispatcher.dispatch_event(listener, done, true) {
            tracing::error!("final event rejected: {err}");
        }
    })
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    tracing::info!("Tether v{}", tether_core::VERSION);

    let mut args = std::env::args().skip(1);
    let settings_path = args.next().unwrap_or_else(|| "tether.json".to_string());
    let settings = Settings::load(Path::new(&settings_path))
        .with_context(|| format!("loading {settings_path}"))?;

    tracing::info!("Initializing services...");
    let paths = tether_services::init_services(APP_NAME, &settings);

    let mut runtime = ScriptRuntime::with_max_depth(settings.script.max_depth)?;
    for (name, pointer) in dir_pointers() {
        runtime.set_global(&name, &runtime.bridge().push_value(&pointer)?)?;
    }

    // init(options): validated here, used once the script returns
    let received: Rc<RefCell<Option<TableValue>>> = Rc::default();
    let slot = Rc::clone(&received);
    let scheme = options_scheme()?;
    runtime.set_function("init", move |args| {
        check_arg_count(args.len(), ArgCount::Exact(1))?;
        *slot.borrow_mut() = Some(TableParser::parse(&args[0], &scheme)?);
        Ok(Value::Nil)
    })?;

    match args.next() {
        Some(script) => runtime.execute_file(Path::new(&script))?,
        None => runtime.execute(DEMO_SCRIPT)?,
    }

    let Some(options) = received.borrow_mut().take() else {
        logging::log("script never called init, nothing to do");
        return Ok(());
    };
    let filename = options.get_string_not_null("filename")?;
    let base_dir = options.get_lightuserdata_or(
        "baseDir",
        tether_services::BaseDir::Documents.pointer(),
    )?;
    let sample_rate = options.get_integer_or("sampleRate", 44100)?;
    let detector_on = options.get_double_or("detector.on", 0.0)?;
    let output = paths.path_for_pointer(filename, base_dir)?;
    logging::debug_log(&format!(
        "recording to {} at {sample_rate} Hz, detector on at {detector_on}",
        output.display()
    ));

    let Some(listener) = runtime.register_listener(&options, "listener")? else {
        logging::log("no listener given, nothing to do");
        return Ok(());
    };

    let mut ready = Event::new("");
    ready.set_phase("init").put("sampleRate", NativeValue::from(sample_rate));
    runtime.dispatch_event(listener, ready, false)?;

    let worker = spawn_worker(runtime.dispatcher(), listener, settings.script.ticks / 2);

    let mut clock = TickClock::from_rate(settings.script.tick_rate);
    while clock.tick_count() < u64::from(settings.script.ticks) {
        clock.wait();
        let report = runtime.execute_tasks()?;
        if !report.is_clean() {
            for (seq, err) in &report.errors {
                tracing::warn!(seq, "task failed: {err}");
            }
        }
        if worker.is_finished() && runtime.bridge().pending() == 0 {
            break;
        }
    }

    if worker.join().is_err() {
        anyhow::bail!("worker thread panicked");
    }
    // Anything the worker queued after the last tick
    runtime.execute_tasks()?;

    let bridge = runtime.bridge();
    for (name, count) in bridge.counter().iter() {
        tracing::info!(name, count, "bridge counter");
    }
    if bridge.counter().get("failed") > 0 {
        tracing::warn!(failed = bridge.counter().get("failed"), "some listeners failed");
    }
    let timer = bridge.drain_timer();
    tracing::info!(
        ticks = clock.tick_count(),
        avg_drain_ms = timer.drain_time_ms(),
        worst_drain_ms = timer.worst_drain_ms(),
        tasks_per_drain = timer.tasks_per_drain(),
        live_refs = bridge.registry().len(),
        "Runtime finished"
    );

    Ok(())
}
