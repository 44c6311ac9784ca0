//! Binary entry point: flags, config discovery, GL bootstrap, the frame
//! loop and the watcher thread.
//!
//! The event-loop thread is the render thread; it owns the shared context
//! and every GPU handle. The watcher thread only parses config and pushes
//! it into the shared state, so all GL work stays here.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Context as _;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};

use wallglow::config::{self, ConfigFile, ConfigMode, WallpaperKind};
use wallglow::output::OutputState;
use wallglow::renderer::Renderer;
use wallglow::surface::{self, DisplaySurface, GlutinSurface};
use wallglow::validate;
use wallglow::watch::{self, FileWatch, SharedConfig};
use wallglow::{loge, logi, logw};

const USAGE: &str = "\
wallglow - per-output GPU wallpaper engine

USAGE:
    wallglow [OPTIONS]

OPTIONS:
    --config <path>     config file (default: $WALLGLOW_CONFIG, ./wallglow.json,
                        ~/.config/wallglow/wallglow.json)
    --strict            fail on unknown config fields
    --windowed          render into a single desktop window instead of
                        per-monitor fullscreen (debugging)
    --state-dir <path>  directory for per-display state records
    --help              print this help
";

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    config: Option<PathBuf>,
    strict: bool,
    windowed: bool,
    state_dir: Option<PathBuf>,
    help: bool,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<CliArgs, String> {
    let mut parsed = CliArgs::default();
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => {
                let v = it.next().ok_or("--config needs a path")?;
                parsed.config = Some(PathBuf::from(v));
            }
            "--state-dir" => {
                let v = it.next().ok_or("--state-dir needs a path")?;
                parsed.state_dir = Some(PathBuf::from(v));
            }
            "--strict" => parsed.strict = true,
            "--windowed" => parsed.windowed = true,
            "--help" | "-h" => parsed.help = true,
            other => return Err(format!("unknown flag '{other}'")),
        }
    }
    Ok(parsed)
}

/// One display: its surface, its wallpaper state, and the config generation
/// it last applied.
struct Slot {
    surface: GlutinSurface,
    out: OutputState,
    applied_gen: Option<u64>,
}

/// Whether an image output's cycle timer has run out. Mirrors the renderer's
/// advance logic so settled outputs wake up exactly when due.
fn cycle_due(out: &OutputState, now: Instant) -> bool {
    let cfg = match out.config.as_ref() {
        Some(c) if c.wallpaper == WallpaperKind::Image => c,
        _ => return false,
    };
    let cycle = match cfg.cycle.as_ref() {
        Some(c) if !c.paths.is_empty() && c.duration_secs > 0 => c,
        _ => return false,
    };
    match out.cycle_started {
        Some(t) => now.saturating_duration_since(t) >= Duration::from_secs(cycle.duration_secs),
        None => true,
    }
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(a) => a,
        Err(msg) => {
            eprintln!("{msg}\n\n{USAGE}");
            std::process::exit(2);
        }
    };
    if args.help {
        print!("{USAGE}");
        return Ok(());
    }
    let mode = if args.strict { ConfigMode::Strict } else { ConfigMode::Lenient };

    let config_path = config::discover_config_path(args.config);
    let initial = match &config_path {
        Some(p) => {
            logi!("BOOT", "config: {}", p.display());
            match config::load_config(p, mode) {
                Ok(file) => file,
                Err(e) if mode == ConfigMode::Strict => return Err(e.into()),
                Err(e) => {
                    loge!("CONFIG", "{e}; starting with an empty config");
                    ConfigFile::default()
                }
            }
        }
        None => {
            logw!("BOOT", "no config found; outputs stay black until one appears");
            ConfigFile::default()
        }
    };
    let issues = validate::validate_config(&initial);
    validate::emit_issues("CONFIG", &issues);
    validate::emit_summary("CONFIG", "startup", &issues);

    let event_loop = EventLoop::new().context("event loop creation failed")?;
    let boot = surface::init_gl(&event_loop, args.windowed)?;
    let gl = Arc::clone(&boot.gl);
    logi!("BOOT", "{} output(s) online", boot.surfaces.len());

    let shared = Arc::new(Mutex::new(SharedConfig::new(initial)));
    let mut _watch_thread = None;
    if let Some(path) = config_path.clone() {
        match FileWatch::new(&path) {
            Ok(mut fw) => {
                for shader in config::shader_paths(&watch::lock_shared(&shared).file) {
                    if let Err(e) = fw.watch_shader(&shader) {
                        logw!("WATCH", "cannot watch {}: {e}", shader.display());
                    }
                }
                match watch::spawn_watch_thread(fw, path, mode, Arc::clone(&shared)) {
                    Ok(handle) => _watch_thread = Some(handle),
                    Err(e) => logw!("WATCH", "watcher thread failed to start: {e}"),
                }
            }
            Err(e) => logw!("WATCH", "file watching disabled: {e}"),
        }
    }

    let mut renderer = Renderer::new(Arc::clone(&gl), args.state_dir)
        .map_err(|e| anyhow::anyhow!("renderer bootstrap failed: {e}"))?;

    let mut slots: Vec<Slot> = boot
        .surfaces
        .into_iter()
        .map(|surface| {
            let (width, height) = surface.size();
            let out = OutputState::new(surface.name.clone(), width, height);
            Slot { surface, out, applied_gen: None }
        })
        .collect();
    for slot in &slots {
        slot.surface.request_redraw();
    }

    event_loop.run(move |event, target| {
        target.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { window_id, event } => match event {
                WindowEvent::CloseRequested => target.exit(),

                WindowEvent::Resized(size) => {
                    let slot = match slots.iter_mut().find(|s| s.surface.window_id() == window_id) {
                        Some(s) => s,
                        None => return,
                    };
                    if size.width == 0 || size.height == 0 {
                        return;
                    }
                    if (slot.out.width, slot.out.height) == (size.width, size.height) {
                        return;
                    }
                    slot.surface.resize(size.width, size.height);
                    slot.out.width = size.width;
                    slot.out.height = size.height;
                    if slot.surface.make_current() {
                        slot.out.cache.invalidate();
                        // re-fit the wallpaper at the new size, no transition
                        renderer.reload_static(&mut slot.out, Instant::now());
                    }
                    slot.out.dirty = true;
                    slot.surface.request_redraw();
                }

                WindowEvent::RedrawRequested => {
                    let now = Instant::now();
                    let slot = match slots.iter_mut().find(|s| s.surface.window_id() == window_id) {
                        Some(s) => s,
                        None => return,
                    };
                    let (generation, cfg) = {
                        let s = watch::lock_shared(&shared);
                        (s.generation, s.file.for_output(&slot.out.name).cloned())
                    };

                    let current_ok = slot.surface.make_current();
                    if current_ok {
                        if slot.applied_gen != Some(generation) {
                            if let Some(cfg) = cfg {
                                renderer.configure_output(&mut slot.out, &cfg, now);
                            }
                            slot.applied_gen = Some(generation);
                        }
                        renderer.advance_cycle(&mut slot.out, now);
                    }

                    let result = renderer.render_frame(&mut slot.out, &mut slot.surface, now);
                    if result.drew && !slot.surface.swap() {
                        logw!("RENDER", "{}: swap_buffers failed", slot.out.name);
                    }
                    if result.animating || !current_ok {
                        slot.surface.request_redraw();
                    }
                }

                _ => {}
            },

            Event::AboutToWait => {
                let now = Instant::now();
                let (generation, touched) = {
                    let mut s = watch::lock_shared(&shared);
                    (s.generation, s.take_touched())
                };
                for slot in slots.iter_mut() {
                    if !touched.is_empty() {
                        renderer.notify_shader_touched(&mut slot.out, &touched, now);
                    }
                    let stale = slot.applied_gen != Some(generation);
                    if stale || slot.out.dirty || cycle_due(&slot.out, now) {
                        slot.surface.request_redraw();
                    }
                }
            }

            Event::LoopExiting => {
                let current_ok = slots.first_mut().map(|s| s.surface.make_current()).unwrap_or(false);
                if current_ok {
                    for slot in slots.iter_mut() {
                        slot.out.destroy_gpu(&gl);
                    }
                    renderer.shutdown();
                }
                logi!("BOOT", "exiting");
            }

            _ => {}
        }
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn flags_parse_in_any_order() {
        let parsed = parse_args(args(&[
            "--windowed",
            "--config",
            "/etc/wallglow.json",
            "--strict",
            "--state-dir",
            "/var/lib/wallglow",
        ]))
        .unwrap();
        assert_eq!(parsed.config.as_deref(), Some(std::path::Path::new("/etc/wallglow.json")));
        assert!(parsed.strict);
        assert!(parsed.windowed);
        assert_eq!(parsed.state_dir.as_deref(), Some(std::path::Path::new("/var/lib/wallglow")));
        assert!(!parsed.help);
    }

    #[test]
    fn empty_invocation_is_all_defaults() {
        assert_eq!(parse_args(args(&[])).unwrap(), CliArgs::default());
    }

    #[test]
    fn missing_values_and_unknown_flags_are_rejected() {
        assert!(parse_args(args(&["--config"])).is_err());
        assert!(parse_args(args(&["--state-dir"])).is_err());
        assert!(parse_args(args(&["--sparkle"])).is_err());
    }

    #[test]
    fn help_short_and_long() {
        assert!(parse_args(args(&["-h"])).unwrap().help);
        assert!(parse_args(args(&["--help"])).unwrap().help);
    }

    #[test]
    fn cycle_due_only_fires_for_cycling_image_outputs() {
        let t0 = Instant::now();
        let mut out = OutputState::new("DP-1", 1920, 1080);
        assert!(!cycle_due(&out, t0), "unconfigured output");

        let mut cfg = wallglow::config::WallpaperConfig::default();
        cfg.cycle = Some(wallglow::config::CycleConfig {
            duration_secs: 60,
            index: 0,
            paths: vec![PathBuf::from("a.png"), PathBuf::from("b.png")],
        });
        out.config = Some(cfg);
        assert!(cycle_due(&out, t0), "never started counts as due");

        out.cycle_started = Some(t0);
        assert!(!cycle_due(&out, t0 + Duration::from_secs(59)));
        assert!(cycle_due(&out, t0 + Duration::from_secs(60)));

        // zero duration disables cycling entirely
        if let Some(cfg) = out.config.as_mut() {
            if let Some(cy) = cfg.cycle.as_mut() {
                cy.duration_secs = 0;
            }
        }
        assert!(!cycle_due(&out, t0 + Duration::from_secs(600)));
    }
}
