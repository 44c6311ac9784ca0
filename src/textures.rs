//! Texture upload and shader channel management.
//!
//! Uploads either fully succeed or leave nothing behind: any GL error during
//! creation deletes the half-built texture and reports `None`. CPU pixel
//! buffers are consumed by the upload and freed on return.
//!
//! Channel slots distinguish ownership. Built-in defaults are created once per
//! process and shared across outputs; file-backed channels belong to the
//! output that loaded them and die with its channel array.

use std::collections::HashMap;
use std::path::PathBuf;

use glow::HasContext;

use crate::defaults::{DefaultTexture, DEFAULT_TEXTURE_SIZE};
use crate::images::LoadedImage;
use crate::logw;

/// Minimum number of channel slots a shader can rely on.
pub const MIN_CHANNELS: usize = 5;

/// Upload an RGBA image as a linear, clamp-to-edge 2D texture.
pub fn create_texture(gl: &glow::Context, image: LoadedImage) -> Option<glow::NativeTexture> {
    if image.width == 0 || image.height == 0 {
        return None;
    }
    unsafe {
        // drain stale errors so the post-upload check is attributable
        while gl.get_error() != glow::NO_ERROR {}
        let tex = match gl.create_texture() {
            Ok(t) => t,
            Err(detail) => {
                logw!("GL", "create_texture failed: {detail}");
                return None;
            }
        };
        gl.bind_texture(glow::TEXTURE_2D, Some(tex));
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
        gl.tex_image_2d(
            glow::TEXTURE_2D,
            0,
            glow::RGBA8 as i32,
            image.width as i32,
            image.height as i32,
            0,
            glow::RGBA,
            glow::UNSIGNED_BYTE,
            glow::PixelUnpackData::Slice(Some(&image.pixels)),
        );
        gl.bind_texture(glow::TEXTURE_2D, None);
        let err = gl.get_error();
        if err != glow::NO_ERROR {
            logw!("GL", "texture upload {}x{} failed: 0x{err:04x}", image.width, image.height);
            gl.delete_texture(tex);
            return None;
        }
        Some(tex)
    }
}

/// Like [`create_texture`] but flips rows first. Image files address rows
/// top-down while GL samples bottom-up.
pub fn create_texture_flipped(gl: &glow::Context, mut image: LoadedImage) -> Option<glow::NativeTexture> {
    flip_rows(&mut image.pixels, (image.width as usize) * 4);
    create_texture(gl, image)
}

fn flip_rows(pixels: &mut [u8], stride: usize) {
    if stride == 0 {
        return;
    }
    let rows = pixels.len() / stride;
    for y in 0..rows / 2 {
        let top = y * stride;
        let bottom = (rows - 1 - y) * stride;
        let (head, tail) = pixels.split_at_mut(bottom);
        head[top..top + stride].swap_with_slice(&mut tail[..stride]);
    }
}

/// What a channel specifier string resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSource {
    /// Explicitly empty slot, left unbound.
    Skip,
    /// One of the built-in generated textures.
    Default(DefaultTexture),
    /// An image file, uploaded flipped.
    File(PathBuf),
}

/// Classify the configured specifiers and pad the list to [`MIN_CHANNELS`]
/// with rgba noise.
pub fn parse_channel_specifiers(specs: &[String]) -> Vec<ChannelSource> {
    let mut out: Vec<ChannelSource> = specs
        .iter()
        .map(|s| {
            let t = s.trim();
            if t.is_empty() || t.eq_ignore_ascii_case("none") {
                ChannelSource::Skip
            } else if let Some(d) = DefaultTexture::from_name(t) {
                ChannelSource::Default(d)
            } else {
                ChannelSource::File(PathBuf::from(t))
            }
        })
        .collect();
    while out.len() < MIN_CHANNELS {
        out.push(ChannelSource::Default(DefaultTexture::RgbaNoise));
    }
    out
}

/// A bound channel slot. `Shared` handles live in the process-wide default
/// cache and must not be deleted with the array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelTexture {
    Empty,
    Shared(glow::NativeTexture),
    Owned(glow::NativeTexture),
}

impl ChannelTexture {
    pub fn handle(self) -> Option<glow::NativeTexture> {
        match self {
            ChannelTexture::Empty => None,
            ChannelTexture::Shared(t) | ChannelTexture::Owned(t) => Some(t),
        }
    }
}

/// Process-wide cache of the built-in textures, generated on first use.
#[derive(Debug, Default)]
pub struct DefaultCache {
    map: HashMap<DefaultTexture, glow::NativeTexture>,
}

impl DefaultCache {
    pub fn get_or_create(&mut self, gl: &glow::Context, which: DefaultTexture) -> Option<glow::NativeTexture> {
        if let Some(t) = self.map.get(&which) {
            return Some(*t);
        }
        let image = LoadedImage {
            pixels: which.generate(DEFAULT_TEXTURE_SIZE),
            width: DEFAULT_TEXTURE_SIZE,
            height: DEFAULT_TEXTURE_SIZE,
            channels: 4,
        };
        let tex = create_texture(gl, image)?;
        self.map.insert(which, tex);
        Some(tex)
    }

    pub fn destroy(&mut self, gl: &glow::Context) {
        for (_, t) in self.map.drain() {
            unsafe { gl.delete_texture(t) };
        }
    }
}

/// Slot for a file-backed channel given its upload outcome. A failed load
/// leaves the unit unbound; the shader samples nothing there rather than a
/// texture the config never named.
fn file_channel_slot(uploaded: Option<glow::NativeTexture>) -> ChannelTexture {
    match uploaded {
        Some(t) => ChannelTexture::Owned(t),
        None => ChannelTexture::Empty,
    }
}

/// Resolve the configured channel list into bound textures. A slot that fails
/// to load is left empty and logged; it never fails the wallpaper as a whole.
pub fn load_channel_textures(
    gl: &glow::Context,
    defaults: &mut DefaultCache,
    specs: &[String],
) -> Vec<ChannelTexture> {
    parse_channel_specifiers(specs)
        .into_iter()
        .enumerate()
        .map(|(i, src)| match src {
            ChannelSource::Skip => ChannelTexture::Empty,
            ChannelSource::Default(d) => match defaults.get_or_create(gl, d) {
                Some(t) => ChannelTexture::Shared(t),
                None => {
                    logw!("RENDER", "channel {i}: could not create default '{}'", d.name());
                    ChannelTexture::Empty
                }
            },
            ChannelSource::File(path) => {
                let uploaded = load_channel_file(gl, &path);
                if uploaded.is_none() {
                    logw!(
                        "RENDER",
                        "channel {i}: failed to load {}, leaving the channel empty",
                        path.display()
                    );
                }
                file_channel_slot(uploaded)
            }
        })
        .collect()
}

fn load_channel_file(gl: &glow::Context, path: &std::path::Path) -> Option<glow::NativeTexture> {
    let img = match image::open(path) {
        Ok(img) => img.to_rgba8(),
        Err(e) => {
            logw!("RENDER", "channel image {}: {e}", path.display());
            return None;
        }
    };
    let (width, height) = img.dimensions();
    let image = LoadedImage { pixels: img.into_raw(), width, height, channels: 4 };
    create_texture_flipped(gl, image)
}

/// Drop an output's channel array, deleting only the textures it owns.
pub fn free_channels(gl: &glow::Context, channels: &mut Vec<ChannelTexture>) {
    for ch in channels.drain(..) {
        if let ChannelTexture::Owned(t) = ch {
            unsafe { gl.delete_texture(t) };
        }
    }
}
