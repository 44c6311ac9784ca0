//! The render loop body.
//!
//! One renderer serves every output through a shared GL context. Each frame
//! makes the output's surface current first; if that fails nothing else
//! happens. Because another surface may have been current in between, each
//! output keeps its own state cache and the renderer invalidates it whenever
//! the active output changes.
//!
//! Frame work per mode:
//!   image, settled     clear + one textured quad, no further redraws
//!   image, transition  advance the clock, draw the style, retire the
//!                      outgoing texture when it completes
//!   shader             ensure a program exists (retry-guarded), feed the
//!                      uniform contract, draw, scrim on top during reloads

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use glow::HasContext;

use crate::config::{WallpaperConfig, WallpaperKind};
use crate::error::{DiagnosticGate, RenderError};
use crate::glstate::GlStateCache;
use crate::images;
use crate::output::{ImageSlot, OutputState, TransitionTick};
use crate::persist::{self, StateRecord};
use crate::reload::{FadePhase, LiveShader};
use crate::shaders::{self, QuadPipeline, ShaderPass};
use crate::surface::DisplaySurface;
use crate::textures::{self, MIN_CHANNELS};
use crate::transitions::{TransitionCtx, TransitionKind, QUAD};
use crate::{loge, logi, logw};

/// GPU objects shared by every output.
#[derive(Debug)]
pub struct RendererResources {
    pub quad_vao: glow::NativeVertexArray,
    pub quad_vbo: glow::NativeBuffer,
    pub textured: QuadPipeline,
    pub glitch: QuadPipeline,
    pub pixelate: QuadPipeline,
    pub overlay: QuadPipeline,
    pub defaults: textures::DefaultCache,
}

impl RendererResources {
    pub fn create(gl: &glow::Context) -> Result<RendererResources, RenderError> {
        let textured = QuadPipeline::create(gl, shaders::TEXTURED_FRAG)?;
        let glitch = QuadPipeline::create(gl, shaders::GLITCH_FRAG).map_err(|e| {
            textured.destroy(gl);
            e
        })?;
        let pixelate = QuadPipeline::create(gl, shaders::PIXELATE_FRAG).map_err(|e| {
            textured.destroy(gl);
            glitch.destroy(gl);
            e
        })?;
        let overlay = QuadPipeline::create(gl, shaders::OVERLAY_FRAG).map_err(|e| {
            textured.destroy(gl);
            glitch.destroy(gl);
            pixelate.destroy(gl);
            e
        })?;

        unsafe {
            let quad_vao = gl
                .create_vertex_array()
                .map_err(|detail| RenderError::Gpu { what: "create_vertex_array", detail })?;
            let quad_vbo = gl
                .create_buffer()
                .map_err(|detail| RenderError::Gpu { what: "create_buffer", detail })?;
            gl.bind_vertex_array(Some(quad_vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(quad_vbo));
            upload_quad(gl, &QUAD);
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, 16, 0);
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(1, 2, glow::FLOAT, false, 16, 8);
            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);

            Ok(RendererResources {
                quad_vao,
                quad_vbo,
                textured,
                glitch,
                pixelate,
                overlay,
                defaults: textures::DefaultCache::default(),
            })
        }
    }

    pub fn destroy(&mut self, gl: &glow::Context) {
        self.textured.destroy(gl);
        self.glitch.destroy(gl);
        self.pixelate.destroy(gl);
        self.overlay.destroy(gl);
        self.defaults.destroy(gl);
        unsafe {
            gl.delete_vertex_array(self.quad_vao);
            gl.delete_buffer(self.quad_vbo);
        }
    }
}

fn upload_quad(gl: &glow::Context, verts: &[f32; 16]) {
    unsafe {
        let bytes = core::slice::from_raw_parts(
            verts.as_ptr() as *const u8,
            verts.len() * core::mem::size_of::<f32>(),
        );
        gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, bytes, glow::STREAM_DRAW);
    }
}

/// What one frame of one output produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameResult {
    /// A frame was rendered and is worth presenting.
    pub drew: bool,
    /// More frames are wanted without waiting for external events.
    pub animating: bool,
}

/// The transition an output's config asks for, if it names a usable one.
pub fn transition_request(cfg: &WallpaperConfig) -> Option<(TransitionKind, Duration)> {
    if cfg.transition.is_none() {
        return None;
    }
    match TransitionKind::from_name(&cfg.transition.kind) {
        Ok(kind) => Some((kind, Duration::from_millis(cfg.transition.duration_ms))),
        Err(e) => {
            logw!("CONFIG", "{e}; swapping without a transition");
            None
        }
    }
}

/// Whether a shader reconfiguration can ride the reload fade instead of a
/// cold rebuild: the output must already have a healthy program on screen.
/// Given-up outputs rebuild cold, which is what resets their retry guard.
fn can_bridge_shader_swap(out: &OutputState) -> bool {
    out.shader
        .as_ref()
        .map(|s| s.pass.is_some() && !s.retry.failed_permanently())
        .unwrap_or(false)
}

fn aspect(width: u32, height: u32) -> f32 {
    if height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}

pub struct Renderer {
    gl: Arc<glow::Context>,
    pub res: RendererResources,
    state_dir: Option<PathBuf>,
    active_output: Option<String>,
    gate: DiagnosticGate,
    started: Instant,
}

impl Renderer {
    pub fn new(gl: Arc<glow::Context>, state_dir: Option<PathBuf>) -> Result<Renderer, RenderError> {
        let res = RendererResources::create(&gl)?;
        Ok(Renderer {
            gl,
            res,
            state_dir,
            active_output: None,
            gate: DiagnosticGate::new(Duration::from_secs(10)),
            started: Instant::now(),
        })
    }

    pub fn shutdown(&mut self) {
        self.res.destroy(&self.gl);
    }

    /// Render one frame for `out` onto its surface. Returns what happened;
    /// when the surface cannot be made current nothing is touched.
    pub fn render_frame(
        &mut self,
        out: &mut OutputState,
        surface: &mut dyn DisplaySurface,
        now: Instant,
    ) -> FrameResult {
        if !surface.make_current() {
            if self.gate.allow(now) {
                logw!("RENDER", "{}: surface unavailable, skipping frame", out.name);
            }
            return FrameResult::default();
        }
        if self.active_output.as_deref() != Some(out.name.as_str()) {
            self.active_output = Some(out.name.clone());
            out.cache.invalidate();
        }

        match out.config.as_ref().map(|c| c.wallpaper) {
            Some(WallpaperKind::Shader) => self.draw_shader(out, now),
            _ => {
                if out.transition_active() {
                    self.draw_transition(out, now)
                } else {
                    self.draw_static(out, now)
                }
            }
        }
    }

    fn frame_time(&self, now: Instant) -> f32 {
        now.saturating_duration_since(self.started).as_secs_f32()
    }

    fn draw_static(&mut self, out: &mut OutputState, now: Instant) -> FrameResult {
        let time = self.frame_time(now);
        let mut ctx =
            TransitionCtx::begin(&self.gl, &self.res, &mut out.cache, out.width, out.height, time);
        if let Some(tex) = out.current_texture {
            ctx.draw_textured_quad(tex, 1.0, None);
        }
        let ok = ctx.end();
        if ok {
            out.frame_count += 1;
            out.dirty = false;
        } else if self.gate.allow(now) {
            loge!("RENDER", "{}: GL error during static draw", out.name);
        }
        FrameResult { drew: ok, animating: false }
    }

    fn draw_transition(&mut self, out: &mut OutputState, now: Instant) -> FrameResult {
        let (kind, progress, finishing) = match out.step_transition(now) {
            TransitionTick::Idle => return self.draw_static(out, now),
            TransitionTick::Active { kind, progress } => (kind, progress, false),
            TransitionTick::Finished => {
                let kind = match out.transition {
                    Some(tr) => tr.kind,
                    None => return self.draw_static(out, now),
                };
                (kind, 1.0, true)
            }
        };
        let (incoming, outgoing) = match (out.current_texture, out.next_texture) {
            (Some(a), Some(b)) => (a, b),
            _ => return self.draw_static(out, now),
        };

        let time = self.frame_time(now);
        let mut ctx =
            TransitionCtx::begin(&self.gl, &self.res, &mut out.cache, out.width, out.height, time);
        kind.render(&mut ctx, incoming, outgoing, progress);
        let ok = ctx.end();

        if !ok {
            if self.gate.allow(now) {
                loge!("RENDER", "{}: GL error during {} transition", out.name, kind.name());
            }
            return FrameResult { drew: false, animating: true };
        }
        out.frame_count += 1;
        if finishing {
            for tex in out.clear_transition() {
                unsafe { self.gl.delete_texture(tex) };
            }
            out.dirty = false;
            return FrameResult { drew: true, animating: false };
        }
        FrameResult { drew: true, animating: true }
    }

    fn draw_shader(&mut self, out: &mut OutputState, now: Instant) -> FrameResult {
        // Reload fade first; it may demand the swap this frame.
        let mut overlay: Option<f32> = None;
        let mut do_swap = false;
        let mut fade_done = false;
        match out.shader.as_mut() {
            Some(sh) => {
                if sh.retry.failed_permanently() {
                    out.dirty = false;
                    return FrameResult { drew: false, animating: false };
                }
                if let Some(fade) = sh.fade.as_mut() {
                    let step = fade.step(now);
                    do_swap = step.do_swap;
                    fade_done = step.done;
                    overlay = match step.phase {
                        FadePhase::FadeOut { overlay } | FadePhase::FadeIn { overlay } => Some(overlay),
                        FadePhase::Steady => None,
                    };
                }
            }
            None => return FrameResult { drew: false, animating: false },
        }

        if do_swap && !self.swap_live_shader(out) {
            // keep the old program running; the fade is over
            if let Some(sh) = out.shader.as_mut() {
                sh.fade = None;
                sh.pending = None;
            }
            overlay = None;
            fade_done = false;
        }
        if fade_done {
            if let Some(sh) = out.shader.as_mut() {
                sh.fade = None;
            }
        }

        // No program yet: retry-guarded compile, dark frames in between.
        if out.shader.as_ref().map(|s| s.pass.is_none()).unwrap_or(true) {
            let attempt = out
                .shader
                .as_ref()
                .map(|s| s.retry.should_attempt(now))
                .unwrap_or(false);
            if attempt {
                self.compile_live_shader(out, now);
            }
            if out.shader.as_ref().map(|s| s.pass.is_none()).unwrap_or(true) {
                let permanent = out
                    .shader
                    .as_ref()
                    .map(|s| s.retry.failed_permanently())
                    .unwrap_or(true);
                return FrameResult { drew: false, animating: !permanent };
            }
        }

        let ok = self.draw_shader_pass(out, now, overlay);
        if ok {
            out.frame_count += 1;
            out.dirty = true;
        } else if self.gate.allow(now) {
            loge!("RENDER", "{}: GL error during shader frame", out.name);
        }
        FrameResult { drew: ok, animating: true }
    }

    fn draw_shader_pass(&mut self, out: &mut OutputState, now: Instant, overlay: Option<f32>) -> bool {
        let gl = &self.gl;
        let (width, height) = (out.width, out.height);
        unsafe {
            gl.viewport(0, 0, width as i32, height as i32);
            gl.clear_color(0.0, 0.0, 0.0, 1.0);
            gl.clear(glow::COLOR_BUFFER_BIT);
        }

        let sh = match out.shader.as_ref() {
            Some(sh) => sh,
            None => return false,
        };
        let pass = match sh.pass.as_ref() {
            Some(p) => p,
            None => return false,
        };

        if out.cache.set_program(Some(pass.program)) {
            unsafe { gl.use_program(Some(pass.program)) };
        }
        let t = sh.elapsed_seconds(now);
        unsafe {
            let u = &pass.uniforms;
            if let Some(loc) = &u.time {
                gl.uniform_1_f32(Some(loc), t);
            }
            if let Some(loc) = &u.u_time {
                gl.uniform_1_f32(Some(loc), t);
            }
            if let Some(loc) = &u.resolution {
                gl.uniform_2_f32(Some(loc), width as f32, height as f32);
            }
            if let Some(loc) = &u.i_resolution {
                gl.uniform_3_f32(Some(loc), width as f32, height as f32, aspect(width, height));
            }
        }
        for (i, ch) in out.channels.iter().enumerate() {
            let tex = match ch.handle() {
                Some(t) => t,
                None => continue,
            };
            if out.cache.set_texture(i, Some(tex)) {
                unsafe {
                    gl.active_texture(glow::TEXTURE0 + i as u32);
                    gl.bind_texture(glow::TEXTURE_2D, Some(tex));
                }
            }
            if let Some(Some(loc)) = pass.uniforms.channels.get(i) {
                unsafe { gl.uniform_1_i32(Some(loc), i as i32) };
            }
        }
        if out.cache.set_blend(false) {
            unsafe { gl.disable(glow::BLEND) };
        }
        unsafe {
            gl.active_texture(glow::TEXTURE0);
            gl.bind_vertex_array(Some(self.res.quad_vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.res.quad_vbo));
            upload_quad(gl, &QUAD);
            gl.draw_arrays(glow::TRIANGLE_STRIP, 0, 4);
        }

        if let Some(alpha) = overlay {
            if alpha > 0.0 {
                self.draw_overlay(&mut out.cache, alpha.min(1.0));
            }
        }

        unsafe {
            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            gl.get_error() == glow::NO_ERROR
        }
    }

    /// Black scrim over the current frame. Quad geometry must already be
    /// bound.
    fn draw_overlay(&self, cache: &mut GlStateCache, alpha: f32) {
        let gl = &self.gl;
        if cache.set_blend(true) {
            unsafe { gl.enable(glow::BLEND) };
        }
        unsafe { gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA) };
        if cache.set_program(Some(self.res.overlay.program)) {
            unsafe { gl.use_program(Some(self.res.overlay.program)) };
        }
        if let Some(loc) = &self.res.overlay.uniforms.alpha {
            unsafe { gl.uniform_1_f32(Some(loc), alpha) };
        }
        unsafe { gl.draw_arrays(glow::TRIANGLE_STRIP, 0, 4) };
    }

    /// Apply a config to an output, tearing down and rebuilding only what
    /// changed. An output whose shader gave up is always rebuilt, so touching
    /// the config is the documented way to bring it back.
    pub fn configure_output(&mut self, out: &mut OutputState, cfg: &WallpaperConfig, now: Instant) {
        let gave_up = out
            .shader
            .as_ref()
            .map(|s| s.retry.failed_permanently())
            .unwrap_or(false);
        if !gave_up && out.config.as_ref() == Some(cfg) {
            return;
        }
        logi!("CONFIG", "{}: {} mode", out.name, cfg.wallpaper.name());

        match cfg.wallpaper {
            WallpaperKind::Image => {
                if out.shader.is_some() {
                    out.destroy_gpu(&self.gl);
                    out.cache.invalidate();
                }
                out.cycle_index = cfg.cycle.as_ref().map(|c| c.index).unwrap_or(0);
                out.cycle_started = Some(now);
                let path = cfg.image_path_at(out.cycle_index).map(Path::to_path_buf);
                out.config = Some(cfg.clone());
                match path {
                    Some(p) => self.show_image(out, &p, now, true),
                    None => loge!("CONFIG", "{}: image mode without a path", out.name),
                }
            }
            WallpaperKind::Shader => {
                out.cycle_started = None;
                match cfg.path.clone() {
                    Some(path) if can_bridge_shader_swap(out) => {
                        // a program is on screen: fade to the new source
                        // instead of cutting to a cold recompile
                        out.config = Some(cfg.clone());
                        if let Some(sh) = out.shader.as_mut() {
                            sh.set_speed(cfg.shader_speed);
                            logi!("SHADER", "{}: bridging to {}", out.name, path.display());
                            sh.request_swap(path, now);
                        }
                    }
                    Some(path) => {
                        out.destroy_gpu(&self.gl);
                        out.cache.invalidate();
                        out.config = Some(cfg.clone());
                        out.shader = Some(LiveShader::new(path, cfg.shader_speed, now));
                        self.compile_live_shader(out, now);
                    }
                    None => {
                        out.destroy_gpu(&self.gl);
                        out.cache.invalidate();
                        out.config = Some(cfg.clone());
                        loge!("CONFIG", "{}: shader mode without a path", out.name);
                    }
                }
            }
        }
        out.dirty = true;
    }

    /// Load, fit and install an image wallpaper. `with_transition` is off for
    /// resize reloads, which replace in place.
    fn show_image(&mut self, out: &mut OutputState, path: &Path, now: Instant, with_transition: bool) {
        let fit = out.config.as_ref().map(|c| c.fit).unwrap_or_default();
        let already = out.current_image.as_ref().map(|s| {
            s.path.as_path() == path && s.fit == fit && s.width == out.width && s.height == out.height
        });
        if already == Some(true) {
            return;
        }
        let image = match images::load(path, out.width, out.height, fit) {
            Ok(img) => img,
            Err(e) => {
                loge!("RENDER", "{}: {e}", out.name);
                return;
            }
        };
        let (width, height) = (image.width, image.height);
        let tex = match textures::create_texture(&self.gl, image) {
            Some(t) => t,
            None => {
                loge!("RENDER", "{}: texture upload failed for {}", out.name, path.display());
                return;
            }
        };
        out.cache.invalidate();

        let transition = if with_transition {
            out.config.as_ref().and_then(transition_request)
        } else {
            None
        };
        let slot = ImageSlot { path: path.to_path_buf(), fit, width, height };
        for old in out.set_wallpaper(slot, tex, transition, now) {
            unsafe { self.gl.delete_texture(old) };
        }
        self.persist_record(out, "ok");
    }

    /// Rotate to the next cycle entry once the period has elapsed.
    pub fn advance_cycle(&mut self, out: &mut OutputState, now: Instant) {
        let (len, period) = match out.config.as_ref() {
            Some(cfg) if cfg.wallpaper == WallpaperKind::Image => match cfg.cycle.as_ref() {
                // a zero duration disables cycling, as validation warns
                Some(cy) if !cy.paths.is_empty() && cy.duration_secs > 0 => {
                    (cy.paths.len(), Duration::from_secs(cy.duration_secs))
                }
                _ => return,
            },
            _ => return,
        };
        let due = match out.cycle_started {
            Some(t) => now.saturating_duration_since(t) >= period,
            None => true,
        };
        if !due {
            return;
        }
        out.cycle_index = (out.cycle_index + 1) % len;
        out.cycle_started = Some(now);
        let path = out
            .config
            .as_ref()
            .and_then(|c| c.image_path_at(out.cycle_index))
            .map(Path::to_path_buf);
        if let Some(p) = path {
            logi!("CYCLE", "{}: advancing to {}", out.name, p.display());
            self.show_image(out, &p, now, true);
        }
    }

    /// Re-fit the current wallpaper after the output changed size.
    pub fn reload_static(&mut self, out: &mut OutputState, now: Instant) {
        let path = out.current_image.as_ref().map(|s| s.path.clone());
        if let Some(p) = path {
            self.show_image(out, &p, now, false);
        }
    }

    /// Queue a reload on outputs whose shader source matches a touched file.
    /// Matching is by file name since watch events report absolute paths.
    pub fn notify_shader_touched(&self, out: &mut OutputState, touched: &[PathBuf], now: Instant) {
        if let Some(sh) = out.shader.as_mut() {
            if sh.retry.failed_permanently() {
                return;
            }
            let mine = match sh.source_path.file_name() {
                Some(n) => n.to_os_string(),
                None => return,
            };
            if touched.iter().any(|p| p.file_name() == Some(mine.as_os_str())) {
                if sh.pass.is_some() {
                    logi!("SHADER", "{}: scheduling reload of {}", out.name, sh.source_path.display());
                    sh.request_swap(sh.source_path.clone(), now);
                }
                // with no working program the next retry tick picks the
                // edited file up anyway
            }
        }
    }

    /// The fade-out hit full cover: reload channels, compile the pending
    /// source and cut over. On failure the previous program keeps running.
    fn swap_live_shader(&mut self, out: &mut OutputState) -> bool {
        let pending = match out.shader.as_mut().and_then(|s| s.pending.take()) {
            Some(p) => p,
            None => return false,
        };
        let src = match std::fs::read_to_string(&pending) {
            Ok(s) => s,
            Err(e) => {
                loge!("SHADER", "{}: cannot read {}: {e}", out.name, pending.display());
                return false;
            }
        };
        let specs = out.config.as_ref().map(|c| c.channels.clone()).unwrap_or_default();
        let staged = textures::load_channel_textures(&self.gl, &mut self.res.defaults, &specs);
        out.cache.invalidate();

        match ShaderPass::create(&self.gl, &src, staged.len().max(MIN_CHANNELS)) {
            Ok(pass) => {
                textures::free_channels(&self.gl, &mut out.channels);
                out.channels = staged;
                if let Some(sh) = out.shader.as_mut() {
                    if let Some(old) = sh.pass.take() {
                        old.destroy(&self.gl);
                    }
                    sh.pass = Some(pass);
                    sh.source_path = pending.clone();
                    sh.retry.record_success();
                }
                out.cache.invalidate();
                logi!("SHADER", "{}: now running {}", out.name, pending.display());
                self.persist_record(out, "ok");
                true
            }
            Err(e) => {
                let mut staged = staged;
                textures::free_channels(&self.gl, &mut staged);
                loge!("SHADER", "{}: reload of {} rejected: {e}", out.name, pending.display());
                false
            }
        }
    }

    /// Compile when no program exists at all. Failures count against the
    /// retry guard; the third one puts the output to sleep until the config
    /// is reapplied.
    fn compile_live_shader(&mut self, out: &mut OutputState, now: Instant) {
        let path = match out.shader.as_ref() {
            Some(sh) => sh.source_path.clone(),
            None => return,
        };
        let specs = out.config.as_ref().map(|c| c.channels.clone()).unwrap_or_default();
        if out.channels.is_empty() {
            out.channels = textures::load_channel_textures(&self.gl, &mut self.res.defaults, &specs);
            out.cache.invalidate();
        }

        let outcome = std::fs::read_to_string(&path)
            .map_err(|e| RenderError::Io { path: path.clone(), source: e })
            .and_then(|src| ShaderPass::create(&self.gl, &src, out.channels.len().max(MIN_CHANNELS)));

        let sh = match out.shader.as_mut() {
            Some(sh) => sh,
            None => return,
        };
        match outcome {
            Ok(pass) => {
                sh.pass = Some(pass);
                sh.retry.record_success();
                logi!("SHADER", "{}: compiled {}", out.name, path.display());
                self.persist_record(out, "ok");
            }
            Err(e) => {
                sh.retry.record_failure(now);
                loge!("SHADER", "{}: {e}", out.name);
                if sh.retry.failed_permanently() {
                    loge!(
                        "SHADER",
                        "{name}: shader wallpaper disabled\n\
                         \x20 output:   {name}\n\
                         \x20 shader:   {path}\n\
                         \x20 attempts: {attempts} (1/s)\n\
                         \x20 the output stays black; fix the shader or its path, then\n\
                         \x20 save the config file to retry",
                        name = out.name,
                        path = path.display(),
                        attempts = crate::reload::MAX_COMPILE_ATTEMPTS
                    );
                    self.persist_record(out, "shader failed");
                }
            }
        }
    }

    fn persist_record(&self, out: &OutputState, status: &str) {
        let dir = match self.state_dir.as_ref() {
            Some(d) => d,
            None => return,
        };
        let cfg = out.config.as_ref();
        let path = match cfg.map(|c| c.wallpaper) {
            Some(WallpaperKind::Shader) => out
                .shader
                .as_ref()
                .map(|s| s.source_path.display().to_string())
                .unwrap_or_default(),
            _ => out
                .current_image
                .as_ref()
                .map(|s| s.path.display().to_string())
                .unwrap_or_default(),
        };
        let record = StateRecord {
            display: out.name.clone(),
            path,
            mode: cfg.map(|c| c.wallpaper.name()).unwrap_or("image").to_string(),
            cycle_index: out.cycle_index,
            cycle_count: cfg.and_then(|c| c.cycle.as_ref()).map(|c| c.paths.len()).unwrap_or(0),
            status: status.to_string(),
            updated: persist::timestamp_now(),
        };
        if let Err(e) = persist::write_record(dir, &record) {
            logw!("STATE", "{}: could not write record: {e}", out.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransitionConfig;
    use crate::shaders::ShaderUniforms;
    use std::num::NonZeroU32;

    fn fabricated_pass() -> ShaderPass {
        ShaderPass {
            program: glow::NativeProgram(NonZeroU32::new(7).unwrap()),
            uniforms: ShaderUniforms {
                time: None,
                u_time: None,
                resolution: None,
                i_resolution: None,
                channels: Vec::new(),
            },
        }
    }

    #[test]
    fn shader_config_swaps_bridge_only_over_a_live_program() {
        let t0 = Instant::now();
        let mut out = OutputState::new("DP-1", 1920, 1080);
        assert!(!can_bridge_shader_swap(&out), "unconfigured output");

        out.shader = Some(LiveShader::new(PathBuf::from("/fx/old.frag"), 1.0, t0));
        assert!(!can_bridge_shader_swap(&out), "no compiled program yet");

        out.shader.as_mut().unwrap().pass = Some(fabricated_pass());
        assert!(can_bridge_shader_swap(&out));

        // the bridge queues the new source under a fade while the old
        // program keeps drawing
        let sh = out.shader.as_mut().unwrap();
        sh.request_swap(PathBuf::from("/fx/new.frag"), t0);
        assert_eq!(sh.pending.as_deref(), Some(Path::new("/fx/new.frag")));
        assert!(sh.fade.is_some());
        assert!(sh.pass.is_some());
    }

    #[test]
    fn given_up_outputs_take_the_cold_rebuild_path() {
        let t0 = Instant::now();
        let mut out = OutputState::new("DP-1", 1920, 1080);
        let mut sh = LiveShader::new(PathBuf::from("/fx/broken.frag"), 1.0, t0);
        sh.pass = Some(fabricated_pass());
        for i in 0..3u64 {
            sh.retry.record_failure(t0 + Duration::from_secs(i + 1));
        }
        out.shader = Some(sh);
        assert!(!can_bridge_shader_swap(&out));
    }

    #[test]
    fn default_config_asks_for_a_300ms_fade() {
        let cfg = WallpaperConfig::default();
        assert_eq!(
            transition_request(&cfg),
            Some((TransitionKind::Fade, Duration::from_millis(300)))
        );
    }

    #[test]
    fn disabled_transitions_yield_nothing() {
        let mut cfg = WallpaperConfig::default();
        cfg.transition = TransitionConfig { kind: "none".to_string(), duration_ms: 500 };
        assert_eq!(transition_request(&cfg), None);
        cfg.transition = TransitionConfig { kind: "fade".to_string(), duration_ms: 0 };
        assert_eq!(transition_request(&cfg), None);
    }

    #[test]
    fn unknown_transition_names_degrade_to_plain_swaps() {
        let mut cfg = WallpaperConfig::default();
        cfg.transition = TransitionConfig { kind: "explode".to_string(), duration_ms: 300 };
        assert_eq!(transition_request(&cfg), None);
    }

    #[test]
    fn registry_names_parse_from_config() {
        for (name, kind) in TransitionKind::REGISTRY {
            let mut cfg = WallpaperConfig::default();
            cfg.transition = TransitionConfig { kind: name.to_string(), duration_ms: 450 };
            assert_eq!(transition_request(&cfg), Some((kind, Duration::from_millis(450))));
        }
    }

    #[test]
    fn aspect_guards_zero_height() {
        assert_eq!(aspect(1920, 1080), 1920.0 / 1080.0);
        assert_eq!(aspect(1920, 0), 1.0);
    }
}
