use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use color_eyre::eyre::WrapErr;
use tracing::{debug, info};

use dubsiren::control::ControlSurface;
use dubsiren::engine::{EngineControls, SirenEngine};
use dubsiren::output::{CpalSink, OutputDriver, OutputSelect, SimulatedSink, Sink, SinkError};
use dubsiren::sampler::SamplePlayer;
use dubsiren::{EngineConfig, MAX_BLOCK_SIZE};

use crate::Cli;

/// Conventional location of the hidden one-shot. Absence is fine; the
/// secret mode then plays silence.
const SAMPLE_PATH: &str = "assets/audio/custom.mp3";

pub fn run(cli: Cli) -> color_eyre::Result<()> {
    let config = EngineConfig {
        sample_rate: cli.sample_rate,
        block_size: cli.buffer_size.clamp(32, MAX_BLOCK_SIZE),
    };

    info!(
        "dubsiren starting: {} Hz, {}-frame periods",
        config.sample_rate, config.block_size
    );

    let engine = SirenEngine::new(config);
    let controls = engine.controls();

    let sampler = match SamplePlayer::load(Path::new(SAMPLE_PATH), config.sample_rate) {
        Ok(player) => Arc::new(player),
        Err(err) => {
            debug!("no custom sample loaded ({err}); secret mode will be silent");
            Arc::new(SamplePlayer::empty(config.sample_rate))
        }
    };
    let select = Arc::new(OutputSelect::new());

    let running = Arc::new(AtomicBool::new(true));

    let simulate = cli.simulate;
    let device = cli.device.clone();
    let (sample_rate, block_size) = (config.sample_rate, config.block_size);
    let sink_factory = move || -> Result<Box<dyn Sink>, SinkError> {
        if simulate {
            Ok(Box::new(SimulatedSink::new(sample_rate)))
        } else {
            Ok(Box::new(CpalSink::open(
                device.as_deref(),
                sample_rate,
                block_size,
            )?))
        }
    };

    let mut driver = OutputDriver::start(
        engine,
        Arc::clone(&sampler),
        Arc::clone(&select),
        config.block_size,
        sink_factory,
    )
    .wrap_err("failed to start audio output")?;

    let shutdown_flag = Arc::clone(&running);
    let mut surface = ControlSurface::new(
        controls.clone(),
        Arc::clone(&sampler),
        Arc::clone(&select),
        Some(Box::new(move || {
            shutdown_flag.store(false, Ordering::Relaxed);
        })),
    );
    surface.apply_initial();

    // This build carries no GPIO backend; a hardware deployment provides a
    // PinReader and calls surface.attach(pins). The engine runs with its
    // defaults either way.
    info!("GPIO backend not present; hardware controls disabled");

    if cli.interactive || cli.simulate {
        run_interactive(&surface, &controls, &driver, &running)?;
    } else {
        info!("running; press the shutdown button (or terminate) to stop");
        while running.load(Ordering::Relaxed) {
            thread::sleep(Duration::from_millis(200));
        }
    }

    surface.stop();
    driver.stop();
    info!("dubsiren stopped");
    Ok(())
}

fn run_interactive(
    surface: &ControlSurface,
    controls: &EngineControls,
    driver: &OutputDriver,
    running: &AtomicBool,
) -> color_eyre::Result<()> {
    print_help();

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    while running.load(Ordering::Relaxed) {
        print!("> ");
        io::stdout().flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => break, // EOF
        };

        match line.trim() {
            "t" => {
                if controls.is_playing() {
                    surface.trigger_release();
                } else {
                    surface.trigger_press();
                }
            }
            "p" => surface.pitch_env_press(),
            "s" => print_status(surface, controls, driver),
            "h" | "?" => print_help(),
            "q" => break,
            "" => {}
            other => println!("unknown command `{other}`; h for help"),
        }
    }

    Ok(())
}

fn print_help() {
    println!();
    println!("dubsiren interactive commands");
    println!("  t - trigger / release the siren (toggle)");
    println!("  p - cycle pitch envelope mode (none -> up -> down)");
    println!("  s - show status");
    println!("  h - show this help");
    println!("  q - quit");
    println!();
}

fn print_status(surface: &ControlSurface, controls: &EngineControls, driver: &OutputDriver) {
    let params = surface.parameters();
    let stats = driver.stats();

    println!();
    println!("status");
    println!("  playing:    {}", if controls.is_playing() { "yes" } else { "no" });
    println!("  bank:       {:?}", surface.bank());
    println!("  volume:     {:.2}", params.volume);
    println!("  frequency:  {:.1} Hz", controls.frequency());
    println!("  waveform:   {}", controls.waveform().name());
    println!("  pitch env:  {}", controls.pitch_envelope_mode().name());
    println!("  blocks:     {}", stats.blocks);
    println!("  underruns:  {}", stats.underruns);
    println!("  dsp load:   {:.1}%", stats.cpu_usage);
    println!();
}
