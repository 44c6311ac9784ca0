//! Per-output wallpaper state.
//!
//! Each output owns two wallpaper slots. `current` always holds what the
//! output is converging on; during a transition `next` holds the outgoing
//! wallpaper being covered up. Completion frees `next` and leaves `current`
//! untouched, so the roles never swap.
//!
//! GPU handles stored here are owned by the output. Mutators that would drop
//! a handle hand it back to the caller for deletion instead of touching the
//! driver, which keeps this module testable with fabricated handles.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::config::{FitMode, WallpaperConfig};
use crate::glstate::GlStateCache;
use crate::reload::LiveShader;
use crate::textures::{self, ChannelTexture};
use crate::transitions::TransitionKind;

/// CPU-side record of an uploaded wallpaper image: where it came from, how it
/// was fitted and the composed size. A slot matching the output's current
/// geometry and fit needs no re-upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSlot {
    pub path: PathBuf,
    pub fit: FitMode,
    pub width: u32,
    pub height: u32,
}

/// A running transition. `progress` is the high-water mark so a jittery
/// clock can never run it backwards.
#[derive(Debug, Clone, Copy)]
pub struct TransitionDescriptor {
    pub kind: TransitionKind,
    pub started: Instant,
    pub duration: Duration,
    pub progress: f32,
}

/// What one call to [`OutputState::step_transition`] observed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransitionTick {
    Idle,
    Active { kind: TransitionKind, progress: f32 },
    Finished,
}

#[derive(Debug)]
pub struct OutputState {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub config: Option<WallpaperConfig>,

    pub current_image: Option<ImageSlot>,
    pub current_texture: Option<glow::NativeTexture>,
    pub next_image: Option<ImageSlot>,
    pub next_texture: Option<glow::NativeTexture>,
    pub transition: Option<TransitionDescriptor>,

    pub shader: Option<LiveShader>,
    pub channels: Vec<ChannelTexture>,

    pub cache: GlStateCache,
    pub frame_count: u64,
    pub dirty: bool,

    pub cycle_index: usize,
    pub cycle_started: Option<Instant>,
}

impl OutputState {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> OutputState {
        OutputState {
            name: name.into(),
            width,
            height,
            config: None,
            current_image: None,
            current_texture: None,
            next_image: None,
            next_texture: None,
            transition: None,
            shader: None,
            channels: Vec::new(),
            cache: GlStateCache::new(),
            frame_count: 0,
            dirty: true,
            cycle_index: 0,
            cycle_started: None,
        }
    }

    /// A transition renders only while all three parts exist: the clock, the
    /// outgoing image record and the outgoing texture.
    pub fn transition_active(&self) -> bool {
        self.transition.is_some() && self.next_image.is_some() && self.next_texture.is_some()
    }

    /// Install a freshly uploaded wallpaper. With a transition the previous
    /// wallpaper moves into the next slot to be faded away; without one both
    /// slots are replaced outright. Returns the handles the output no longer
    /// owns.
    pub fn set_wallpaper(
        &mut self,
        image: ImageSlot,
        texture: glow::NativeTexture,
        transition: Option<(TransitionKind, Duration)>,
        now: Instant,
    ) -> Vec<glow::NativeTexture> {
        let mut retired = Vec::new();
        match transition {
            Some((kind, duration)) if !duration.is_zero() && self.current_texture.is_some() => {
                if let Some(old_next) = self.next_texture.take() {
                    retired.push(old_next);
                }
                self.next_image = self.current_image.take();
                self.next_texture = self.current_texture.take();
                self.current_image = Some(image);
                self.current_texture = Some(texture);
                self.transition = Some(TransitionDescriptor {
                    kind,
                    started: now,
                    duration,
                    progress: 0.0,
                });
            }
            _ => {
                if let Some(old) = self.current_texture.take() {
                    retired.push(old);
                }
                if let Some(old) = self.next_texture.take() {
                    retired.push(old);
                }
                self.current_image = Some(image);
                self.current_texture = Some(texture);
                self.next_image = None;
                self.transition = None;
            }
        }
        self.dirty = true;
        retired
    }

    /// Advance the transition clock. Progress only ever rises.
    pub fn step_transition(&mut self, now: Instant) -> TransitionTick {
        if !self.transition_active() {
            return TransitionTick::Idle;
        }
        if let Some(tr) = self.transition.as_mut() {
            let raw = if tr.duration.is_zero() {
                1.0
            } else {
                let t = now.saturating_duration_since(tr.started).as_secs_f32();
                (t / tr.duration.as_secs_f32()).clamp(0.0, 1.0)
            };
            tr.progress = tr.progress.max(raw);
            if tr.progress >= 1.0 {
                TransitionTick::Finished
            } else {
                TransitionTick::Active { kind: tr.kind, progress: tr.progress }
            }
        } else {
            TransitionTick::Idle
        }
    }

    /// Drop the descriptor and the outgoing slot together. Returns the
    /// outgoing texture for deletion.
    pub fn clear_transition(&mut self) -> Vec<glow::NativeTexture> {
        self.transition = None;
        self.next_image = None;
        self.next_texture.take().into_iter().collect()
    }

    /// Release every GPU resource this output holds.
    pub fn destroy_gpu(&mut self, gl: &glow::Context) {
        use glow::HasContext;
        for tex in self.current_texture.take().into_iter().chain(self.next_texture.take()) {
            unsafe { gl.delete_texture(tex) };
        }
        self.current_image = None;
        self.next_image = None;
        self.transition = None;
        textures::free_channels(gl, &mut self.channels);
        if let Some(mut shader) = self.shader.take() {
            shader.destroy(gl);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU32;

    fn tex(n: u32) -> glow::NativeTexture {
        glow::NativeTexture(NonZeroU32::new(n).unwrap())
    }

    fn slot(name: &str) -> ImageSlot {
        ImageSlot {
            path: PathBuf::from(format!("/walls/{name}.png")),
            fit: FitMode::Fill,
            width: 1920,
            height: 1080,
        }
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn plain_set_replaces_both_slots() {
        let mut out = OutputState::new("DP-1", 1920, 1080);
        let retired = out.set_wallpaper(slot("a"), tex(1), None, Instant::now());
        assert!(retired.is_empty());

        let retired = out.set_wallpaper(slot("b"), tex(2), None, Instant::now());
        assert_eq!(retired, vec![tex(1)]);
        assert_eq!(out.current_texture, Some(tex(2)));
        assert!(out.next_texture.is_none());
        assert!(!out.transition_active());
    }

    #[test]
    fn transition_keeps_the_old_wallpaper_in_the_next_slot() {
        let t0 = Instant::now();
        let mut out = OutputState::new("DP-1", 1920, 1080);
        out.set_wallpaper(slot("a"), tex(1), None, t0);

        let retired = out.set_wallpaper(slot("b"), tex(2), Some((TransitionKind::Fade, ms(300))), t0);
        assert!(retired.is_empty());
        // incoming occupies current, outgoing waits in next
        assert_eq!(out.current_texture, Some(tex(2)));
        assert_eq!(out.current_image.as_ref().map(|s| s.path.clone()), Some(PathBuf::from("/walls/b.png")));
        assert_eq!(out.next_texture, Some(tex(1)));
        assert!(out.transition_active());
    }

    #[test]
    fn first_wallpaper_never_starts_a_transition() {
        let mut out = OutputState::new("DP-1", 1920, 1080);
        let retired =
            out.set_wallpaper(slot("a"), tex(1), Some((TransitionKind::Fade, ms(300))), Instant::now());
        assert!(retired.is_empty());
        assert!(!out.transition_active());
        assert_eq!(out.current_texture, Some(tex(1)));
    }

    #[test]
    fn interrupting_a_transition_retires_the_oldest_texture() {
        let t0 = Instant::now();
        let mut out = OutputState::new("DP-1", 1920, 1080);
        out.set_wallpaper(slot("a"), tex(1), None, t0);
        out.set_wallpaper(slot("b"), tex(2), Some((TransitionKind::Fade, ms(300))), t0);

        // c arrives mid-fade: a (the staged outgoing) is dropped, b becomes outgoing
        let retired = out.set_wallpaper(slot("c"), tex(3), Some((TransitionKind::Fade, ms(300))), t0 + ms(100));
        assert_eq!(retired, vec![tex(1)]);
        assert_eq!(out.current_texture, Some(tex(3)));
        assert_eq!(out.next_texture, Some(tex(2)));
    }

    #[test]
    fn progress_rises_and_finishes() {
        let t0 = Instant::now();
        let mut out = OutputState::new("DP-1", 1920, 1080);
        out.set_wallpaper(slot("a"), tex(1), None, t0);
        out.set_wallpaper(slot("b"), tex(2), Some((TransitionKind::Fade, ms(300))), t0);

        match out.step_transition(t0 + ms(150)) {
            TransitionTick::Active { kind, progress } => {
                assert_eq!(kind, TransitionKind::Fade);
                assert!((progress - 0.5).abs() < 0.01);
            }
            other => panic!("unexpected {other:?}"),
        }
        // a clock hiccup cannot move progress backwards
        match out.step_transition(t0 + ms(100)) {
            TransitionTick::Active { progress, .. } => assert!((progress - 0.5).abs() < 0.01),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(out.step_transition(t0 + ms(400)), TransitionTick::Finished);

        let retired = out.clear_transition();
        assert_eq!(retired, vec![tex(1)]);
        assert_eq!(out.current_texture, Some(tex(2)));
        assert!(out.next_image.is_none());
        assert!(!out.transition_active());
    }

    #[test]
    fn idle_without_all_three_parts() {
        let t0 = Instant::now();
        let mut out = OutputState::new("DP-1", 1920, 1080);
        out.set_wallpaper(slot("a"), tex(1), None, t0);
        out.set_wallpaper(slot("b"), tex(2), Some((TransitionKind::Fade, ms(300))), t0);
        assert!(out.transition_active());

        // losing the outgoing texture deactivates the transition outright
        out.next_texture = None;
        assert!(!out.transition_active());
        assert_eq!(out.step_transition(t0 + ms(150)), TransitionTick::Idle);
    }

    #[test]
    fn zero_duration_finishes_immediately() {
        let t0 = Instant::now();
        let mut out = OutputState::new("DP-1", 1920, 1080);
        out.set_wallpaper(slot("a"), tex(1), None, t0);
        // zero duration is treated as no transition at all
        let retired = out.set_wallpaper(slot("b"), tex(2), Some((TransitionKind::Fade, ms(0))), t0);
        assert_eq!(retired, vec![tex(1)]);
        assert!(!out.transition_active());
    }
}
