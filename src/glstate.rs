//! Redundant-call filtering for the hot GL bind points.
//!
//! The cache answers one question per setter: "does this change the state the
//! driver currently holds?" The caller issues the actual GL call only when the
//! answer is true. Keeping the decision separate from the call keeps the cache
//! testable without a context, and keeps the unbind-vs-bind logic in one place.
//!
//! After a surface switch the real driver state is unknowable (another surface
//! was current in between), so [`GlStateCache::invalidate`] drops every entry
//! back to `Unknown` and the next frame re-issues everything once.

use glow::{NativeProgram, NativeTexture};

/// Texture units the cache tracks. Covers unit 0/1 for the quad pipelines and
/// the shader channel bindings.
pub const TEXTURE_UNITS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cached<T> {
    Unknown,
    Known(T),
}

impl<T: PartialEq> Cached<T> {
    /// True when `value` differs from the remembered state. Records `value`
    /// either way.
    fn update(&mut self, value: T) -> bool {
        let stale = !matches!(self, Cached::Known(v) if *v == value);
        *self = Cached::Known(value);
        stale
    }
}

#[derive(Debug)]
pub struct GlStateCache {
    program: Cached<Option<NativeProgram>>,
    textures: [Cached<Option<NativeTexture>>; TEXTURE_UNITS],
    blend: Cached<bool>,
}

impl Default for GlStateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl GlStateCache {
    pub fn new() -> Self {
        GlStateCache {
            program: Cached::Unknown,
            textures: [Cached::Unknown; TEXTURE_UNITS],
            blend: Cached::Unknown,
        }
    }

    /// Forget everything. Call after the shared context was made current on a
    /// different surface.
    pub fn invalidate(&mut self) {
        *self = GlStateCache::new();
    }

    /// Returns true when `gl.use_program(program)` must be issued.
    pub fn set_program(&mut self, program: Option<NativeProgram>) -> bool {
        self.program.update(program)
    }

    /// Returns true when the texture must be (un)bound on `unit`.
    /// Units beyond [`TEXTURE_UNITS`] are never filtered.
    pub fn set_texture(&mut self, unit: usize, texture: Option<NativeTexture>) -> bool {
        match self.textures.get_mut(unit) {
            Some(slot) => slot.update(texture),
            None => true,
        }
    }

    /// Returns true when blending must be toggled.
    pub fn set_blend(&mut self, enabled: bool) -> bool {
        self.blend.update(enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU32;

    fn prog(n: u32) -> NativeProgram {
        glow::NativeProgram(NonZeroU32::new(n).unwrap())
    }

    fn tex(n: u32) -> NativeTexture {
        glow::NativeTexture(NonZeroU32::new(n).unwrap())
    }

    #[test]
    fn first_use_is_never_filtered() {
        let mut cache = GlStateCache::new();
        assert!(cache.set_program(Some(prog(1))));
        assert!(cache.set_texture(0, Some(tex(1))));
        assert!(cache.set_blend(true));
    }

    #[test]
    fn repeats_are_filtered() {
        let mut cache = GlStateCache::new();
        cache.set_program(Some(prog(1)));
        assert!(!cache.set_program(Some(prog(1))));
        assert!(cache.set_program(Some(prog(2))));

        cache.set_blend(false);
        assert!(!cache.set_blend(false));
        assert!(cache.set_blend(true));
    }

    #[test]
    fn units_are_tracked_independently() {
        let mut cache = GlStateCache::new();
        assert!(cache.set_texture(0, Some(tex(7))));
        assert!(cache.set_texture(1, Some(tex(7))));
        assert!(!cache.set_texture(0, Some(tex(7))));
        assert!(cache.set_texture(0, None));
        assert!(!cache.set_texture(0, None));
    }

    #[test]
    fn unbind_is_a_distinct_state() {
        let mut cache = GlStateCache::new();
        // an explicit unbind into unknown state must still be issued
        assert!(cache.set_program(None));
        assert!(!cache.set_program(None));
    }

    #[test]
    fn invalidate_forgets_everything() {
        let mut cache = GlStateCache::new();
        cache.set_program(Some(prog(3)));
        cache.set_texture(2, Some(tex(9)));
        cache.set_blend(true);
        cache.invalidate();
        assert!(cache.set_program(Some(prog(3))));
        assert!(cache.set_texture(2, Some(tex(9))));
        assert!(cache.set_blend(true));
    }

    #[test]
    fn out_of_range_units_pass_through() {
        let mut cache = GlStateCache::new();
        assert!(cache.set_texture(TEXTURE_UNITS + 3, Some(tex(1))));
        assert!(cache.set_texture(TEXTURE_UNITS + 3, Some(tex(1))));
    }
}
