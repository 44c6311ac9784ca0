//! Live-shader reload choreography.
//!
//! Editing a shader on disk does not recompile it mid-frame. A black overlay
//! eases in over the running program, the swap happens exactly once at full
//! cover (channels first, then the program), and the overlay eases back out
//! over the new program. Compile failures at swap time abort back to the old
//! program; compile failures with no program at all go through a retry guard
//! so a broken file cannot spin the log.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::shaders::ShaderPass;

/// Overlay ramp-up time before the swap.
pub const FADE_OUT: Duration = Duration::from_millis(300);
/// Overlay ramp-down time after the swap.
pub const FADE_IN: Duration = Duration::from_millis(300);

pub fn ease_in_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * t
}

pub fn ease_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    let u = 1.0 - t;
    1.0 - u * u * u
}

/// Which part of the reload envelope a frame falls in. `overlay` is the
/// scrim alpha to draw over the shader output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FadePhase {
    Steady,
    FadeOut { overlay: f32 },
    FadeIn { overlay: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeStep {
    pub phase: FadePhase,
    /// True on exactly one step per fade, the first one at or past full cover.
    pub do_swap: bool,
    /// True once the envelope has fully played out.
    pub done: bool,
}

/// Clock for one reload fade. The swap latch is independent of the phase so
/// a stalled render loop that skips straight past the window still swaps.
#[derive(Debug, Clone, Copy)]
pub struct ReloadFade {
    started: Instant,
    swapped: bool,
}

impl ReloadFade {
    pub fn begin(now: Instant) -> ReloadFade {
        ReloadFade { started: now, swapped: false }
    }

    pub fn step(&mut self, now: Instant) -> FadeStep {
        let t = now.saturating_duration_since(self.started);
        let do_swap = t >= FADE_OUT && !self.swapped;
        if do_swap {
            self.swapped = true;
        }
        if t < FADE_OUT {
            let x = t.as_secs_f32() / FADE_OUT.as_secs_f32();
            FadeStep { phase: FadePhase::FadeOut { overlay: ease_in_cubic(x) }, do_swap, done: false }
        } else if t < FADE_OUT + FADE_IN {
            let x = (t - FADE_OUT).as_secs_f32() / FADE_IN.as_secs_f32();
            FadeStep { phase: FadePhase::FadeIn { overlay: 1.0 - ease_out_cubic(x) }, do_swap, done: false }
        } else {
            FadeStep { phase: FadePhase::Steady, do_swap, done: true }
        }
    }
}

pub const MAX_COMPILE_ATTEMPTS: u32 = 3;
pub const RETRY_THROTTLE: Duration = Duration::from_secs(1);

/// Gate for compiling a shader that has no working program yet. Three
/// throttled attempts, then the output goes permanently dark until a manual
/// reconfigure resets the guard.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryGuard {
    attempts: u32,
    last_attempt: Option<Instant>,
    failed: bool,
}

impl RetryGuard {
    pub fn new() -> RetryGuard {
        RetryGuard::default()
    }

    pub fn should_attempt(&self, now: Instant) -> bool {
        if self.failed || self.attempts >= MAX_COMPILE_ATTEMPTS {
            return false;
        }
        match self.last_attempt {
            Some(t) => now.saturating_duration_since(t) >= RETRY_THROTTLE,
            None => true,
        }
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.attempts += 1;
        self.last_attempt = Some(now);
        if self.attempts >= MAX_COMPILE_ATTEMPTS {
            self.failed = true;
        }
    }

    pub fn record_success(&mut self) {
        *self = RetryGuard::default();
    }

    pub fn reset(&mut self) {
        *self = RetryGuard::default();
    }

    pub fn failed_permanently(&self) -> bool {
        self.failed
    }
}

/// Everything one output tracks about its animated shader.
#[derive(Debug)]
pub struct LiveShader {
    pub source_path: PathBuf,
    pub pass: Option<ShaderPass>,
    pub started: Instant,
    pub speed: f32,
    pub pending: Option<PathBuf>,
    pub fade: Option<ReloadFade>,
    pub retry: RetryGuard,
}

impl LiveShader {
    pub fn new(source_path: PathBuf, speed: f32, now: Instant) -> LiveShader {
        let mut shader = LiveShader {
            source_path,
            pass: None,
            started: now,
            speed: 1.0,
            pending: None,
            fade: None,
            retry: RetryGuard::new(),
        };
        shader.set_speed(speed);
        shader
    }

    /// Update the clock multiplier in place. Junk values fall back to realtime.
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = if speed.is_finite() && speed > 0.0 { speed } else { 1.0 };
    }

    /// Shader clock in seconds, already scaled. Keeps running across reloads.
    pub fn elapsed_seconds(&self, now: Instant) -> f32 {
        now.saturating_duration_since(self.started).as_secs_f32() * self.speed
    }

    /// Queue a reload of `path`. Starts a fade unless one is already playing;
    /// repeated edits during a fade collapse to the newest path.
    pub fn request_swap(&mut self, path: PathBuf, now: Instant) {
        self.pending = Some(path);
        if self.fade.is_none() {
            self.fade = Some(ReloadFade::begin(now));
        }
    }

    pub fn destroy(&mut self, gl: &glow::Context) {
        if let Some(pass) = self.pass.take() {
            pass.destroy(gl);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn ease_curves_hit_endpoints() {
        assert_eq!(ease_in_cubic(0.0), 0.0);
        assert_eq!(ease_in_cubic(1.0), 1.0);
        assert_eq!(ease_out_cubic(0.0), 0.0);
        assert_eq!(ease_out_cubic(1.0), 1.0);
        // in starts slow, out starts fast
        assert!(ease_in_cubic(0.25) < 0.25);
        assert!(ease_out_cubic(0.25) > 0.25);
        // clamped outside the unit interval
        assert_eq!(ease_in_cubic(4.0), 1.0);
        assert_eq!(ease_out_cubic(-1.0), 0.0);
    }

    #[test]
    fn phases_are_exclusive_over_the_window() {
        let t0 = Instant::now();
        let mut fade = ReloadFade::begin(t0);
        for off in (0..=700).step_by(25) {
            let step = fade.step(t0 + ms(off));
            match step.phase {
                FadePhase::FadeOut { overlay } => {
                    assert!(off < 300, "fade-out at {off}ms");
                    assert!((0.0..=1.0).contains(&overlay));
                    assert!(!step.done);
                }
                FadePhase::FadeIn { overlay } => {
                    assert!((300..600).contains(&off), "fade-in at {off}ms");
                    assert!((0.0..=1.0).contains(&overlay));
                    assert!(!step.done);
                }
                FadePhase::Steady => {
                    assert!(off >= 600, "steady at {off}ms");
                    assert!(step.done);
                }
            }
        }
    }

    #[test]
    fn overlay_is_dark_at_the_seam() {
        let t0 = Instant::now();
        let mut fade = ReloadFade::begin(t0);
        match fade.step(t0).phase {
            FadePhase::FadeOut { overlay } => assert_eq!(overlay, 0.0),
            other => panic!("unexpected {other:?}"),
        }
        match fade.step(t0 + ms(300)).phase {
            FadePhase::FadeIn { overlay } => assert_eq!(overlay, 1.0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn swap_fires_exactly_once() {
        let t0 = Instant::now();
        let mut fade = ReloadFade::begin(t0);
        assert!(!fade.step(t0 + ms(150)).do_swap);
        assert!(fade.step(t0 + ms(310)).do_swap);
        assert!(!fade.step(t0 + ms(350)).do_swap);
        assert!(!fade.step(t0 + ms(700)).do_swap);
    }

    #[test]
    fn swap_survives_a_stalled_loop() {
        let t0 = Instant::now();
        let mut fade = ReloadFade::begin(t0);
        // first step lands way past the whole envelope
        let step = fade.step(t0 + ms(10_000));
        assert!(step.do_swap);
        assert!(step.done);
        assert_eq!(step.phase, FadePhase::Steady);
        assert!(!fade.step(t0 + ms(10_100)).do_swap);
    }

    #[test]
    fn retry_guard_throttles_then_gives_up() {
        let t0 = Instant::now();
        let mut guard = RetryGuard::new();

        assert!(guard.should_attempt(t0));
        guard.record_failure(t0);
        assert!(!guard.should_attempt(t0 + ms(100)));
        assert!(guard.should_attempt(t0 + ms(1_100)));
        guard.record_failure(t0 + ms(1_100));
        assert!(guard.should_attempt(t0 + ms(2_200)));
        guard.record_failure(t0 + ms(2_200));

        assert!(guard.failed_permanently());
        assert!(!guard.should_attempt(t0 + ms(60_000)));

        guard.reset();
        assert!(!guard.failed_permanently());
        assert!(guard.should_attempt(t0 + ms(60_000)));
    }

    #[test]
    fn success_clears_the_attempt_count() {
        let t0 = Instant::now();
        let mut guard = RetryGuard::new();
        guard.record_failure(t0);
        guard.record_failure(t0 + ms(1_000));
        guard.record_success();
        assert!(guard.should_attempt(t0 + ms(1_001)));
        assert!(!guard.failed_permanently());
    }

    #[test]
    fn edits_during_a_fade_keep_the_newest_path() {
        let t0 = Instant::now();
        let mut shader = LiveShader::new(PathBuf::from("/tmp/a.frag"), 1.0, t0);
        shader.request_swap(PathBuf::from("/tmp/a.frag"), t0);
        let first_fade = shader.fade.map(|f| f.started);
        shader.request_swap(PathBuf::from("/tmp/b.frag"), t0 + ms(50));
        assert_eq!(shader.pending.as_deref(), Some(std::path::Path::new("/tmp/b.frag")));
        assert_eq!(shader.fade.map(|f| f.started), first_fade);
    }

    #[test]
    fn shader_clock_scales_with_speed() {
        let t0 = Instant::now();
        let shader = LiveShader::new(PathBuf::from("/tmp/a.frag"), 2.0, t0);
        let t = shader.elapsed_seconds(t0 + ms(1_500));
        assert!((t - 3.0).abs() < 1e-3);
        // junk speeds fall back to realtime
        for junk in [f32::NAN, 0.0, -2.0] {
            let shader = LiveShader::new(PathBuf::from("/tmp/a.frag"), junk, t0);
            assert!((shader.elapsed_seconds(t0 + ms(1_000)) - 1.0).abs() < 1e-3);
        }
        let mut shader = LiveShader::new(PathBuf::from("/tmp/a.frag"), 1.0, t0);
        shader.set_speed(0.5);
        assert!((shader.elapsed_seconds(t0 + ms(1_000)) - 0.5).abs() < 1e-3);
    }
}
