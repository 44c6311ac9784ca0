//! Built-in procedural channel textures.
//!
//! Shader configs can name these instead of an image file. Generation is fully
//! deterministic (hash mixing, no RNG state) so a channel looks the same on
//! every run; the GPU-side cache in the renderer resources guarantees each is
//! generated at most once per process.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefaultTexture {
    RgbaNoise,
    GrayNoise,
    BlueNoise,
    Wood,
    Abstract,
}

/// Default edge length for generated channel textures.
pub const DEFAULT_TEXTURE_SIZE: u32 = 256;

impl DefaultTexture {
    pub const ALL: [DefaultTexture; 5] = [
        DefaultTexture::RgbaNoise,
        DefaultTexture::GrayNoise,
        DefaultTexture::BlueNoise,
        DefaultTexture::Wood,
        DefaultTexture::Abstract,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DefaultTexture::RgbaNoise => "rgba_noise",
            DefaultTexture::GrayNoise => "gray_noise",
            DefaultTexture::BlueNoise => "blue_noise",
            DefaultTexture::Wood => "wood",
            DefaultTexture::Abstract => "abstract",
        }
    }

    pub fn from_name(name: &str) -> Option<DefaultTexture> {
        Self::ALL.iter().copied().find(|d| d.name() == name)
    }

    /// Generate a `size` x `size` RGBA pixel buffer.
    pub fn generate(self, size: u32) -> Vec<u8> {
        let size = size.max(1);
        match self {
            DefaultTexture::RgbaNoise => rgba_noise(size),
            DefaultTexture::GrayNoise => gray_noise(size),
            DefaultTexture::BlueNoise => blue_noise(size),
            DefaultTexture::Wood => wood(size),
            DefaultTexture::Abstract => abstract_plasma(size),
        }
    }
}

// 32-bit avalanche mix (splitmix-style finalizer).
fn mix32(mut x: u32) -> u32 {
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;
    x
}

fn cell_hash(x: u32, y: u32, salt: u32) -> u32 {
    mix32(x.wrapping_mul(0x9e37_79b9) ^ y.wrapping_mul(0x85eb_ca6b) ^ salt)
}

fn rgba_noise(size: u32) -> Vec<u8> {
    let mut px = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let h = cell_hash(x, y, 0x52_47_42_41);
            px.extend_from_slice(&h.to_le_bytes());
        }
    }
    px
}

fn gray_noise(size: u32) -> Vec<u8> {
    let mut px = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let v = (cell_hash(x, y, 0x47_52_41_59) & 0xff) as u8;
            px.extend_from_slice(&[v, v, v, 255]);
        }
    }
    px
}

// Interleaved gradient noise (Jimenez): cheap, evenly distributed, visually
// much closer to blue noise than white noise for dithering-style sampling.
fn blue_noise(size: u32) -> Vec<u8> {
    let mut px = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let v = 52.982_918_f32 * (0.067_110_56_f32 * x as f32 + 0.005_837_15_f32 * y as f32).fract();
            let v = (v.fract() * 255.0) as u8;
            px.extend_from_slice(&[v, v, v, 255]);
        }
    }
    px
}

fn wood(size: u32) -> Vec<u8> {
    let mut px = Vec::with_capacity((size * size * 4) as usize);
    let center = size as f32 / 2.0;
    for y in 0..size {
        for x in 0..size {
            let dx = x as f32 - center;
            let dy = (y as f32 - center) * 0.35;
            let grain = (cell_hash(x, y, 0x57_4f_4f_44) & 0xff) as f32 / 255.0;
            let dist = (dx * dx + dy * dy).sqrt() / size as f32;
            let ring = ((dist * 40.0 + grain * 0.6).sin() * 0.5 + 0.5).powf(0.7);
            let r = 92.0 + ring * 96.0 + grain * 14.0;
            let g = 58.0 + ring * 58.0 + grain * 10.0;
            let b = 32.0 + ring * 26.0 + grain * 6.0;
            px.extend_from_slice(&[r.min(255.0) as u8, g.min(255.0) as u8, b.min(255.0) as u8, 255]);
        }
    }
    px
}

fn abstract_plasma(size: u32) -> Vec<u8> {
    let mut px = Vec::with_capacity((size * size * 4) as usize);
    let f = std::f32::consts::TAU / size as f32;
    for y in 0..size {
        for x in 0..size {
            let (fx, fy) = (x as f32 * f, y as f32 * f);
            let v = (fx * 3.0).sin()
                + (fy * 2.0).sin()
                + ((fx + fy) * 4.0).sin()
                + ((fx * fx + fy * fy).sqrt() * 5.0).sin();
            let t = v * 0.125 + 0.5;
            let r = ((t * std::f32::consts::TAU).sin() * 0.5 + 0.5) * 255.0;
            let g = ((t * std::f32::consts::TAU + 2.0).sin() * 0.5 + 0.5) * 255.0;
            let b = ((t * std::f32::consts::TAU + 4.0).sin() * 0.5 + 0.5) * 255.0;
            px.extend_from_slice(&[r as u8, g as u8, b as u8, 255]);
        }
    }
    px
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for d in DefaultTexture::ALL {
            assert_eq!(DefaultTexture::from_name(d.name()), Some(d));
        }
        assert_eq!(DefaultTexture::from_name("sparkles"), None);
    }

    #[test]
    fn buffers_are_rgba_sized() {
        for d in DefaultTexture::ALL {
            assert_eq!(d.generate(16).len(), 16 * 16 * 4, "{}", d.name());
        }
        // degenerate size is clamped, not panicked on
        assert_eq!(DefaultTexture::Wood.generate(0).len(), 4);
    }

    #[test]
    fn generation_is_deterministic() {
        for d in DefaultTexture::ALL {
            assert_eq!(d.generate(32), d.generate(32), "{}", d.name());
        }
    }

    #[test]
    fn generators_differ_from_each_other() {
        let a = DefaultTexture::RgbaNoise.generate(32);
        let b = DefaultTexture::GrayNoise.generate(32);
        let c = DefaultTexture::Wood.generate(32);
        assert_ne!(a, b);
        assert_ne!(b, c);
    }

    #[test]
    fn gray_noise_is_opaque_and_gray() {
        let px = DefaultTexture::GrayNoise.generate(8);
        for p in px.chunks_exact(4) {
            assert_eq!(p[0], p[1]);
            assert_eq!(p[1], p[2]);
            assert_eq!(p[3], 255);
        }
    }
}
