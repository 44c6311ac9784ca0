//! Program compilation and the built-in GLSL sources.
//!
//! Every draw in the engine goes through one of two program shapes: a quad
//! pipeline (fullscreen textured quad, used for static wallpapers, transitions
//! and the reload overlay) or a shader pass (a user fragment shader driven by
//! the time/resolution/channel uniform contract). Both resolve their uniform
//! locations once at link time; a location that the driver optimized out stays
//! `None` and is skipped when setting.

use glow::HasContext;

use crate::error::{RenderError, ShaderStage};

/// Shared vertex stage for all quad pipelines.
pub const QUAD_VERT: &str = r#"#version 330 core
layout (location = 0) in vec2 position;
layout (location = 1) in vec2 texcoord;
out vec2 v_uv;
void main() {
    v_uv = texcoord;
    gl_Position = vec4(position, 0.0, 1.0);
}
"#;

/// Plain textured quad with a global alpha. Drives static draws and fades.
pub const TEXTURED_FRAG: &str = r#"#version 330 core
in vec2 v_uv;
out vec4 frag_color;
uniform sampler2D texture0;
uniform float alpha;
void main() {
    vec4 c = texture(texture0, v_uv);
    frag_color = vec4(c.rgb, c.a * alpha);
}
"#;

/// Two-texture glitch mix. `texture0` is the incoming wallpaper, `texture1`
/// the outgoing one; `strength` carries the CPU-side envelope.
pub const GLITCH_FRAG: &str = r#"#version 330 core
in vec2 v_uv;
out vec4 frag_color;
uniform sampler2D texture0;
uniform sampler2D texture1;
uniform float progress;
uniform float strength;
uniform float time;
uniform vec2 resolution;

float hash(float n) {
    return fract(sin(n) * 43758.5453123);
}

void main() {
    float band = floor(v_uv.y * 24.0);
    float jitter = (hash(band + floor(time * 18.0)) - 0.5) * strength * 0.3;
    vec2 uv = vec2(fract(v_uv.x + jitter), v_uv.y);
    // chromatic shift snapped to whole pixels
    float shift = floor(strength * 0.02 * resolution.x) / max(resolution.x, 1.0);
    vec3 from_col;
    from_col.r = texture(texture1, vec2(fract(uv.x + shift), uv.y)).r;
    from_col.g = texture(texture1, uv).g;
    from_col.b = texture(texture1, vec2(fract(uv.x - shift), uv.y)).b;
    vec3 to_col;
    to_col.r = texture(texture0, vec2(fract(uv.x + shift), uv.y)).r;
    to_col.g = texture(texture0, uv).g;
    to_col.b = texture(texture0, vec2(fract(uv.x - shift), uv.y)).b;
    float m = progress;
    if (strength > 0.0 && hash(band * 7.31 + floor(time * 11.0)) < strength * 0.35) {
        m = 1.0 - m;
    }
    // static grain, seeded per pixel and per frame
    float grain = (hash(dot(uv, vec2(127.1, 311.7)) + floor(time * 24.0)) - 0.5) * strength * 0.12;
    frag_color = vec4(mix(from_col, to_col, m) + grain, 1.0);
}
"#;

/// Quantized crossfade. `strength` follows the mirrored ease so blocks grow
/// toward the midpoint and dissolve again.
pub const PIXELATE_FRAG: &str = r#"#version 330 core
in vec2 v_uv;
out vec4 frag_color;
uniform sampler2D texture0;
uniform sampler2D texture1;
uniform float progress;
uniform float strength;
uniform vec2 resolution;

vec2 quantize(vec2 uv, float block) {
    vec2 cells = max(resolution / block, vec2(1.0));
    return (floor(uv * cells) + 0.5) / cells;
}

void main() {
    float block = max(strength * 64.0, 1.0);
    vec2 uv = quantize(v_uv, block);
    vec4 from_col = texture(texture1, uv);
    vec4 to_col = texture(texture0, uv);
    frag_color = mix(from_col, to_col, progress);
}
"#;

/// Solid black scrim for the live-shader reload fade.
pub const OVERLAY_FRAG: &str = r#"#version 330 core
out vec4 frag_color;
uniform float alpha;
void main() {
    frag_color = vec4(0.0, 0.0, 0.0, alpha);
}
"#;

unsafe fn compile_stage(
    gl: &glow::Context,
    stage: ShaderStage,
    src: &str,
) -> Result<glow::NativeShader, RenderError> {
    let kind = match stage {
        ShaderStage::Vertex => glow::VERTEX_SHADER,
        ShaderStage::Fragment => glow::FRAGMENT_SHADER,
    };
    let shader = gl
        .create_shader(kind)
        .map_err(|detail| RenderError::Gpu { what: "create_shader", detail })?;
    gl.shader_source(shader, src);
    gl.compile_shader(shader);
    if !gl.get_shader_compile_status(shader) {
        let log = gl.get_shader_info_log(shader);
        gl.delete_shader(shader);
        return Err(RenderError::ShaderCompile { stage, log });
    }
    Ok(shader)
}

/// Compile both stages and link. No program object survives a failure.
pub fn compile_and_link(
    gl: &glow::Context,
    vert_src: &str,
    frag_src: &str,
) -> Result<glow::NativeProgram, RenderError> {
    unsafe {
        let vert = compile_stage(gl, ShaderStage::Vertex, vert_src)?;
        let frag = match compile_stage(gl, ShaderStage::Fragment, frag_src) {
            Ok(s) => s,
            Err(e) => {
                gl.delete_shader(vert);
                return Err(e);
            }
        };
        let program = match gl.create_program() {
            Ok(p) => p,
            Err(detail) => {
                gl.delete_shader(vert);
                gl.delete_shader(frag);
                return Err(RenderError::Gpu { what: "create_program", detail });
            }
        };
        gl.attach_shader(program, vert);
        gl.attach_shader(program, frag);
        gl.link_program(program);
        let linked = gl.get_program_link_status(program);
        let log = gl.get_program_info_log(program);
        gl.detach_shader(program, vert);
        gl.detach_shader(program, frag);
        gl.delete_shader(vert);
        gl.delete_shader(frag);
        if !linked {
            gl.delete_program(program);
            return Err(RenderError::ProgramLink { log });
        }
        Ok(program)
    }
}

/// Delete a program through its owning slot. Safe to call twice.
pub fn destroy_program(gl: &glow::Context, program: &mut Option<glow::NativeProgram>) {
    if let Some(p) = program.take() {
        unsafe { gl.delete_program(p) };
    }
}

/// Uniform contract of the quad pipelines.
#[derive(Debug, Clone)]
pub struct QuadUniforms {
    pub texture0: Option<glow::UniformLocation>,
    pub texture1: Option<glow::UniformLocation>,
    pub progress: Option<glow::UniformLocation>,
    pub strength: Option<glow::UniformLocation>,
    pub time: Option<glow::UniformLocation>,
    pub resolution: Option<glow::UniformLocation>,
    pub alpha: Option<glow::UniformLocation>,
}

impl QuadUniforms {
    pub fn resolve(gl: &glow::Context, program: glow::NativeProgram) -> QuadUniforms {
        unsafe {
            QuadUniforms {
                texture0: gl.get_uniform_location(program, "texture0"),
                texture1: gl.get_uniform_location(program, "texture1"),
                progress: gl.get_uniform_location(program, "progress"),
                strength: gl.get_uniform_location(program, "strength"),
                time: gl.get_uniform_location(program, "time"),
                resolution: gl.get_uniform_location(program, "resolution"),
                alpha: gl.get_uniform_location(program, "alpha"),
            }
        }
    }
}

#[derive(Debug)]
pub struct QuadPipeline {
    pub program: glow::NativeProgram,
    pub uniforms: QuadUniforms,
}

impl QuadPipeline {
    pub fn create(gl: &glow::Context, frag_src: &str) -> Result<QuadPipeline, RenderError> {
        let program = compile_and_link(gl, QUAD_VERT, frag_src)?;
        let uniforms = QuadUniforms::resolve(gl, program);
        Ok(QuadPipeline { program, uniforms })
    }

    pub fn destroy(&self, gl: &glow::Context) {
        unsafe { gl.delete_program(self.program) };
    }
}

/// Uniform contract offered to user fragment shaders. Both the bare and the
/// namespaced/Shadertoy spellings resolve; whichever the shader declares gets
/// fed each frame.
#[derive(Debug, Clone)]
pub struct ShaderUniforms {
    pub time: Option<glow::UniformLocation>,
    pub u_time: Option<glow::UniformLocation>,
    pub resolution: Option<glow::UniformLocation>,
    pub i_resolution: Option<glow::UniformLocation>,
    pub channels: Vec<Option<glow::UniformLocation>>,
}

impl ShaderUniforms {
    pub fn resolve(
        gl: &glow::Context,
        program: glow::NativeProgram,
        channel_count: usize,
    ) -> ShaderUniforms {
        unsafe {
            ShaderUniforms {
                time: gl.get_uniform_location(program, "time"),
                u_time: gl.get_uniform_location(program, "u_time"),
                resolution: gl.get_uniform_location(program, "resolution"),
                i_resolution: gl.get_uniform_location(program, "iResolution"),
                channels: (0..channel_count)
                    .map(|i| gl.get_uniform_location(program, &format!("iChannel{i}")))
                    .collect(),
            }
        }
    }
}

/// A linked user shader plus its resolved uniform contract.
#[derive(Debug)]
pub struct ShaderPass {
    pub program: glow::NativeProgram,
    pub uniforms: ShaderUniforms,
}

impl ShaderPass {
    pub fn create(
        gl: &glow::Context,
        frag_src: &str,
        channel_count: usize,
    ) -> Result<ShaderPass, RenderError> {
        let program = compile_and_link(gl, QUAD_VERT, frag_src)?;
        let uniforms = ShaderUniforms::resolve(gl, program, channel_count);
        Ok(ShaderPass { program, uniforms })
    }

    pub fn destroy(&self, gl: &glow::Context) {
        unsafe { gl.delete_program(self.program) };
    }
}
