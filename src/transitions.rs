//! Transition styles and the per-frame draw context they render through.
//!
//! During a transition the incoming wallpaper occupies the current slot and
//! the outgoing one the next slot; every style here draws with that
//! orientation. The envelope math is kept in plain functions so the curves
//! are checkable without a context.

use glow::HasContext;

use crate::error::RenderError;
use crate::glstate::GlStateCache;
use crate::renderer::RendererResources;
use crate::shaders::QuadPipeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Fade,
    SlideLeft,
    SlideRight,
    Glitch,
    Pixelate,
}

impl TransitionKind {
    /// Every style the engine ships, in registry order.
    pub const REGISTRY: [(&'static str, TransitionKind); 5] = [
        ("fade", TransitionKind::Fade),
        ("slide-left", TransitionKind::SlideLeft),
        ("slide-right", TransitionKind::SlideRight),
        ("glitch", TransitionKind::Glitch),
        ("pixelate", TransitionKind::Pixelate),
    ];

    pub fn name(self) -> &'static str {
        match Self::REGISTRY.iter().find(|(_, k)| *k == self) {
            Some((n, _)) => n,
            None => "fade",
        }
    }

    pub fn from_name(name: &str) -> Result<TransitionKind, RenderError> {
        let wanted = name.trim();
        Self::REGISTRY
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(wanted))
            .map(|(_, k)| *k)
            .ok_or_else(|| RenderError::UnknownTransition { name: name.to_string() })
    }

    /// Draw one frame of this transition at `progress` in [0, 1].
    pub fn render(
        self,
        ctx: &mut TransitionCtx<'_>,
        incoming: glow::NativeTexture,
        outgoing: glow::NativeTexture,
        progress: f32,
    ) {
        match self {
            TransitionKind::Fade => {
                let (out_alpha, in_alpha) = fade_alphas(progress);
                ctx.draw_textured_quad(outgoing, out_alpha, None);
                ctx.draw_textured_quad(incoming, in_alpha, None);
            }
            TransitionKind::SlideLeft | TransitionKind::SlideRight => {
                let dir = if self == TransitionKind::SlideLeft { 1.0 } else { -1.0 };
                let (out_off, in_off) = slide_offsets(dir, progress);
                ctx.draw_textured_quad(outgoing, 1.0, Some(&offset_quad(out_off)));
                ctx.draw_textured_quad(incoming, 1.0, Some(&offset_quad(in_off)));
            }
            TransitionKind::Glitch => {
                ctx.draw_blended_textures(self, incoming, outgoing, progress, glitch_strength(progress));
            }
            TransitionKind::Pixelate => {
                ctx.draw_blended_textures(self, incoming, outgoing, progress, pixelate_ease(progress));
            }
        }
    }
}

/// Alphas for the plain crossfade, `(outgoing, incoming)`. The outgoing side
/// stays fully opaque underneath so the fade never flashes the clear color.
pub fn fade_alphas(progress: f32) -> (f32, f32) {
    (1.0, progress.clamp(0.0, 1.0))
}

/// Horizontal NDC offsets for the slide styles, `(outgoing, incoming)`.
/// `dir` is +1 for slide-left, -1 for slide-right; the visible span is two
/// NDC units wide.
pub fn slide_offsets(dir: f32, progress: f32) -> (f32, f32) {
    let p = progress.clamp(0.0, 1.0);
    (-dir * p * 2.0, dir * (1.0 - p) * 2.0)
}

/// Glitch intensity envelope, zero at both ends and 1.0 at the midpoint.
pub fn glitch_strength(progress: f32) -> f32 {
    let p = progress.clamp(0.0, 1.0);
    (p * (1.0 - p) * 4.0).clamp(0.0, 1.0)
}

/// Pixelation envelope: eased in with 2p^2, mirrored back down with
/// 2(1-p)^2, so blocks grow toward the midpoint and dissolve again.
pub fn pixelate_ease(progress: f32) -> f32 {
    let p = progress.clamp(0.0, 1.0);
    if p < 0.5 {
        2.0 * p * p
    } else {
        let q = 1.0 - p;
        2.0 * q * q
    }
}

/// Fullscreen quad as a triangle strip, interleaved position/texcoord.
/// V runs top-down so images uploaded in file row order display upright.
pub const QUAD: [f32; 16] = [
    -1.0, -1.0, 0.0, 1.0, //
    1.0, -1.0, 1.0, 1.0, //
    -1.0, 1.0, 0.0, 0.0, //
    1.0, 1.0, 1.0, 0.0, //
];

/// The quad shifted horizontally by `dx` NDC units.
pub fn offset_quad(dx: f32) -> [f32; 16] {
    let mut q = QUAD;
    for v in 0..4 {
        q[v * 4] += dx;
    }
    q
}

/// Borrowed draw state for one transition frame. `begin` primes the surface,
/// the draw calls run through the state cache, `end` restores what it touched
/// and reports whether the driver stayed clean.
pub struct TransitionCtx<'a> {
    gl: &'a glow::Context,
    res: &'a RendererResources,
    cache: &'a mut GlStateCache,
    time: f32,
    width: u32,
    height: u32,
}

impl<'a> TransitionCtx<'a> {
    pub fn begin(
        gl: &'a glow::Context,
        res: &'a RendererResources,
        cache: &'a mut GlStateCache,
        width: u32,
        height: u32,
        time: f32,
    ) -> TransitionCtx<'a> {
        unsafe {
            gl.viewport(0, 0, width as i32, height as i32);
            gl.clear_color(0.0, 0.0, 0.0, 1.0);
            gl.clear(glow::COLOR_BUFFER_BIT);
            if cache.set_blend(true) {
                gl.enable(glow::BLEND);
            }
            gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
            gl.bind_vertex_array(Some(res.quad_vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(res.quad_vbo));
        }
        TransitionCtx { gl, res, cache, time, width, height }
    }

    fn upload_geometry(&self, geometry: Option<&[f32; 16]>) {
        let verts = geometry.unwrap_or(&QUAD);
        unsafe {
            let bytes = core::slice::from_raw_parts(
                verts.as_ptr() as *const u8,
                verts.len() * core::mem::size_of::<f32>(),
            );
            self.gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, bytes, glow::STREAM_DRAW);
        }
    }

    fn bind_unit(&mut self, unit: u32, texture: Option<glow::NativeTexture>) {
        if self.cache.set_texture(unit as usize, texture) {
            unsafe {
                self.gl.active_texture(glow::TEXTURE0 + unit);
                self.gl.bind_texture(glow::TEXTURE_2D, texture);
            }
        }
    }

    fn use_pipeline(&mut self, pipeline: &QuadPipeline) {
        if self.cache.set_program(Some(pipeline.program)) {
            unsafe { self.gl.use_program(Some(pipeline.program)) };
        }
    }

    /// One textured quad at `alpha`, optionally with custom geometry.
    pub fn draw_textured_quad(
        &mut self,
        texture: glow::NativeTexture,
        alpha: f32,
        geometry: Option<&[f32; 16]>,
    ) {
        let res = self.res;
        self.use_pipeline(&res.textured);
        self.bind_unit(0, Some(texture));
        let u = &res.textured.uniforms;
        unsafe {
            if let Some(loc) = &u.texture0 {
                self.gl.uniform_1_i32(Some(loc), 0);
            }
            if let Some(loc) = &u.alpha {
                self.gl.uniform_1_f32(Some(loc), alpha);
            }
        }
        self.upload_geometry(geometry);
        unsafe { self.gl.draw_arrays(glow::TRIANGLE_STRIP, 0, 4) };
    }

    /// One fullscreen pass mixing both wallpapers in the style's fragment
    /// shader. `incoming` lands on unit 0, `outgoing` on unit 1.
    pub fn draw_blended_textures(
        &mut self,
        kind: TransitionKind,
        incoming: glow::NativeTexture,
        outgoing: glow::NativeTexture,
        progress: f32,
        strength: f32,
    ) {
        let res = self.res;
        let pipeline = match kind {
            TransitionKind::Pixelate => &res.pixelate,
            _ => &res.glitch,
        };
        self.use_pipeline(pipeline);
        self.bind_unit(0, Some(incoming));
        self.bind_unit(1, Some(outgoing));
        let u = &pipeline.uniforms;
        unsafe {
            if let Some(loc) = &u.texture0 {
                self.gl.uniform_1_i32(Some(loc), 0);
            }
            if let Some(loc) = &u.texture1 {
                self.gl.uniform_1_i32(Some(loc), 1);
            }
            if let Some(loc) = &u.progress {
                self.gl.uniform_1_f32(Some(loc), progress.clamp(0.0, 1.0));
            }
            if let Some(loc) = &u.strength {
                self.gl.uniform_1_f32(Some(loc), strength);
            }
            if let Some(loc) = &u.time {
                self.gl.uniform_1_f32(Some(loc), self.time);
            }
            if let Some(loc) = &u.resolution {
                self.gl.uniform_2_f32(Some(loc), self.width as f32, self.height as f32);
            }
        }
        self.upload_geometry(None);
        unsafe { self.gl.draw_arrays(glow::TRIANGLE_STRIP, 0, 4) };
    }

    /// Unbind what the frame touched and report whether GL stayed clean.
    pub fn end(mut self) -> bool {
        for unit in (0..2u32).rev() {
            self.bind_unit(unit, None);
        }
        unsafe {
            self.gl.active_texture(glow::TEXTURE0);
            self.gl.bind_vertex_array(None);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
            if self.cache.set_blend(false) {
                self.gl.disable(glow::BLEND);
            }
            self.gl.get_error() == glow::NO_ERROR
        }
    }
}
