//! chordloop: headless driver for the chordloop sequencer core

mod config;

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use chordloop_core::{Instrument, LoopPattern, MusicalClock, PatternId};
use chordloop_services::{TracingSink, TransportRunner, TriggerSink};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::AppConfig;

/// Offline render resolution in seconds
const RENDER_STEP: f64 = 0.01;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("chordloop=debug".parse()?))
        .init();

    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = config::load_config(path.as_deref());
    if path.is_none() {
        let default_path = config::config_path();
        if !default_path.exists() {
            config::save_config(&config, &default_path);
            tracing::info!(path = %default_path.display(), "Wrote default config");
        }
    }
    tracing::info!(
        bpm = config.transport.bpm,
        key = %config.harmony.tonal_center,
        scale = config.harmony.scale.name(),
        style = %config.arpeggiator.style,
        "Starting chordloop"
    );

    let instrument = build_instrument(&config);
    let instrument = if config.session.realtime {
        play_realtime(instrument, &config)?
    } else {
        play_offline(instrument, &config)
    };

    if config.session.record {
        let target = instrument.patterns().target(config.controls.pattern_id);
        print_pattern(target, instrument.pattern(target));
    }
    Ok(())
}

fn build_instrument(config: &AppConfig) -> Instrument {
    let mut instrument = Instrument::new("keys");
    instrument.set_bpm(config.transport.bpm);
    instrument.set_controls(config.controls.clone());
    instrument.set_harmony(config.harmony.clone());
    instrument.set_session_settings(config.arpeggiator.clone());
    instrument.set_companion_tracks(config.companion_tracks());
    if config.session.record {
        instrument.start_recording();
    }
    instrument.play();
    instrument
}

fn hold_secs(instrument: &Instrument, config: &AppConfig) -> f64 {
    let transport = instrument.transport();
    transport.seconds_per_beat() * transport.time_sig_num as f64 * config.session.bars as f64
}

fn play_offline(mut instrument: Instrument, config: &AppConfig) -> Instrument {
    let mut sink = TracingSink::default();
    for degree in config.session.degrees() {
        instrument.press_degree(degree);
        let mut remaining = hold_secs(&instrument, config);
        while remaining > 0.0 {
            let dt = remaining.min(RENDER_STEP);
            for trigger in instrument.advance(dt) {
                sink.send(trigger);
            }
            remaining -= dt;
        }
        instrument.release_degree(degree);
    }
    tracing::info!(
        triggers = sink.sent,
        position = %instrument.transport().format_time(),
        beats = instrument.transport().now() / instrument.transport().seconds_per_beat(),
        "Session finished"
    );
    instrument
}

fn play_realtime(instrument: Instrument, config: &AppConfig) -> anyhow::Result<Instrument> {
    let hold = Duration::from_secs_f64(hold_secs(&instrument, config));
    let mut runner = TransportRunner::new(instrument);
    runner.start(TracingSink::default()).context("starting transport runner")?;

    for degree in config.session.degrees() {
        runner.with_instrument(|i| i.press_degree(degree));
        thread::sleep(hold);
        runner.with_instrument(|i| i.release_degree(degree));
    }
    runner.stop().context("stopping transport runner")?;

    let shared = runner.instrument();
    drop(runner);
    let instrument = std::sync::Arc::try_unwrap(shared)
        .map_err(|_| anyhow::anyhow!("instrument still shared"))?
        .into_inner()
        .map_err(|_| anyhow::anyhow!("instrument lock poisoned"))?;
    Ok(instrument)
}

fn print_pattern(id: PatternId, pattern: &LoopPattern) {
    println!("Pattern {}", id.name());
    if let Some(chord) = &pattern.chord {
        println!("  chord: {} ({}) in {} {}", chord.roman_numeral, chord.voicing_label, chord.tonal_center, chord.scale.name());
    }
    if !pattern.grid.is_empty() {
        let row: String = pattern.grid.steps.iter().map(|&on| if on { 'x' } else { '.' }).collect();
        println!("  steps: {row}");
        let offsets: Vec<String> = pattern
            .grid
            .steps
            .iter()
            .zip(&pattern.grid.pitches)
            .map(|(&on, p)| if on { format!("{p:+}") } else { "-".into() })
            .collect();
        println!("  pitch: {}", offsets.join(" "));
    }
    for event in &pattern.note_events {
        println!("  {:>7.3}s {:<4} {:.3}s vel {:.2}", event.time, event.note, event.duration, event.velocity);
    }
    if pattern.loop_length > 0.0 {
        println!("  loop: {:.3}s", pattern.loop_length);
    }
}
