//! Wallpaper configuration: one entry per output, plus a `"*"` fallback entry.
//!
//! Versioning: `version` defaults to 1 when omitted.
//! Unknown fields are ignored by default (serde default behavior), keeping configs
//! forward-compatible; `ConfigMode::Strict` flips to fail-fast parsing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::RenderError;

/// How strictly to interpret/validate config files.
///
/// - `Lenient` is forward-compatible: unknown fields are ignored and missing optional
///   keys fall back to defaults.
/// - `Strict` is fail-fast: unknown fields become errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    Lenient,
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WallpaperKind {
    Image,
    Shader,
}

impl WallpaperKind {
    pub fn name(self) -> &'static str {
        match self {
            WallpaperKind::Image => "image",
            WallpaperKind::Shader => "shader",
        }
    }
}

/// How a source image is mapped onto the output's dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    Stretch,
    Fill,
    Fit,
    Center,
    Tile,
}

impl FitMode {
    pub fn name(self) -> &'static str {
        match self {
            FitMode::Stretch => "stretch",
            FitMode::Fill => "fill",
            FitMode::Fit => "fit",
            FitMode::Center => "center",
            FitMode::Tile => "tile",
        }
    }
}

impl Default for FitMode {
    fn default() -> Self {
        FitMode::Fill
    }
}

/// Transition selection. `kind` is a registry tag (`fade`, `slide-left`,
/// `slide-right`, `glitch`, `pixelate`) or `none` to swap without an effect.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct TransitionConfig {
    #[serde(default = "default_transition_kind")]
    pub kind: String,

    #[serde(default = "default_transition_ms")]
    pub duration_ms: u64,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            kind: default_transition_kind(),
            duration_ms: default_transition_ms(),
        }
    }
}

impl TransitionConfig {
    /// A transition is disabled by `kind = "none"` or a zero duration.
    pub fn is_none(&self) -> bool {
        self.duration_ms == 0 || self.kind.eq_ignore_ascii_case("none")
    }
}

/// Optional rotating image list for an output.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct CycleConfig {
    #[serde(default = "default_cycle_secs")]
    pub duration_secs: u64,

    /// Starting position within `paths`.
    #[serde(default)]
    pub index: usize,

    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct WallpaperConfig {
    #[serde(default = "default_kind")]
    pub wallpaper: WallpaperKind,

    /// Image path or fragment-shader path, depending on `wallpaper`.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub fit: FitMode,

    #[serde(default)]
    pub transition: TransitionConfig,

    #[serde(default = "default_shader_speed")]
    pub shader_speed: f32,

    /// Ordered channel-texture specifiers for shader mode. Each entry is a skip
    /// marker (`none` / empty), a named default (`rgba_noise`, `gray_noise`,
    /// `blue_noise`, `wood`, `abstract`), or an image file path.
    #[serde(default)]
    pub channels: Vec<String>,

    #[serde(default)]
    pub cycle: Option<CycleConfig>,
}

impl Default for WallpaperConfig {
    fn default() -> Self {
        Self {
            wallpaper: default_kind(),
            path: None,
            fit: FitMode::default(),
            transition: TransitionConfig::default(),
            shader_speed: default_shader_speed(),
            channels: Vec::new(),
            cycle: None,
        }
    }
}

impl WallpaperConfig {
    /// The image path the output should currently show, honoring the cycle list.
    pub fn image_path_at(&self, cycle_index: usize) -> Option<&Path> {
        if let Some(cycle) = &self.cycle {
            if !cycle.paths.is_empty() {
                return cycle.paths.get(cycle_index % cycle.paths.len()).map(PathBuf::as_path);
            }
        }
        self.path.as_deref()
    }
}

/// Typed view of the config file.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ConfigFile {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Keyed by output name as reported by the display layer; the `"*"` entry
    /// applies to any output without an exact match.
    #[serde(default)]
    pub outputs: HashMap<String, WallpaperConfig>,
}

/// Strict twin of `ConfigFile` that fails on unknown fields.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFileStrict {
    #[serde(default = "default_version")]
    version: u32,

    #[serde(default)]
    outputs: HashMap<String, WallpaperConfigStrict>,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct WallpaperConfigStrict {
    #[serde(default = "default_kind")]
    wallpaper: WallpaperKind,
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    fit: FitMode,
    #[serde(default)]
    transition: TransitionConfig,
    #[serde(default = "default_shader_speed")]
    shader_speed: f32,
    #[serde(default)]
    channels: Vec<String>,
    #[serde(default)]
    cycle: Option<CycleConfig>,
}

impl From<WallpaperConfigStrict> for WallpaperConfig {
    fn from(s: WallpaperConfigStrict) -> Self {
        Self {
            wallpaper: s.wallpaper,
            path: s.path,
            fit: s.fit,
            transition: s.transition,
            shader_speed: s.shader_speed,
            channels: s.channels,
            cycle: s.cycle,
        }
    }
}

fn default_version() -> u32 {
    1
}
fn default_kind() -> WallpaperKind {
    WallpaperKind::Image
}
fn default_shader_speed() -> f32 {
    1.0
}
fn default_transition_kind() -> String {
    "fade".to_string()
}
fn default_transition_ms() -> u64 {
    300
}
fn default_cycle_secs() -> u64 {
    600
}

impl Default for ConfigFile {
    fn default() -> Self {
        ConfigFile { version: default_version(), outputs: HashMap::new() }
    }
}

impl ConfigFile {
    /// Exact output-name match, else the `"*"` fallback entry.
    pub fn for_output(&self, name: &str) -> Option<&WallpaperConfig> {
        self.outputs.get(name).or_else(|| self.outputs.get("*"))
    }
}

/// Resolve the config path: explicit flag, then `WALLGLOW_CONFIG`, then
/// `./wallglow.json`, then `~/.config/wallglow/wallglow.json`.
pub fn discover_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p);
    }
    if let Ok(p) = std::env::var("WALLGLOW_CONFIG") {
        return Some(PathBuf::from(p));
    }
    let local = PathBuf::from("wallglow.json");
    if local.exists() {
        return Some(local);
    }
    if let Ok(home) = std::env::var("HOME") {
        let user = PathBuf::from(home).join(".config").join("wallglow").join("wallglow.json");
        if user.exists() {
            return Some(user);
        }
    }
    None
}

/// Load and parse the config file in the requested mode.
///
/// This function is non-panicking and returns Result for better stability/diagnostics.
pub fn load_config(path: &Path, mode: ConfigMode) -> Result<ConfigFile, RenderError> {
    let data = std::fs::read_to_string(path).map_err(|e| RenderError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let file = match mode {
        ConfigMode::Lenient => {
            serde_json::from_str::<ConfigFile>(&data).map_err(|e| RenderError::Json {
                path: path.to_path_buf(),
                source: e,
            })?
        }
        ConfigMode::Strict => {
            let strict: ConfigFileStrict =
                serde_json::from_str(&data).map_err(|e| RenderError::Json {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            ConfigFile {
                version: strict.version,
                outputs: strict
                    .outputs
                    .into_iter()
                    .map(|(k, v)| (k, WallpaperConfig::from(v)))
                    .collect(),
            }
        }
    };

    if mode == ConfigMode::Strict && file.version != 1 {
        return Err(RenderError::InvalidConfig {
            path: path.to_path_buf(),
            msg: format!("unsupported config version {} (expected 1)", file.version),
        });
    }

    Ok(file)
}

/// Every fragment-shader path the config references, for watch registration.
pub fn shader_paths(file: &ConfigFile) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for cfg in file.outputs.values() {
        if cfg.wallpaper == WallpaperKind::Shader {
            if let Some(p) = &cfg.path {
                if !out.contains(p) {
                    out.push(p.clone());
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let cfg: WallpaperConfig = serde_json::from_str(r#"{ "path": "a.png" }"#).unwrap();
        assert_eq!(cfg.wallpaper, WallpaperKind::Image);
        assert_eq!(cfg.fit, FitMode::Fill);
        assert_eq!(cfg.transition.kind, "fade");
        assert_eq!(cfg.transition.duration_ms, 300);
        assert_eq!(cfg.shader_speed, 1.0);
        assert!(cfg.channels.is_empty());
        assert!(cfg.cycle.is_none());
    }

    #[test]
    fn lenient_ignores_unknown_fields_strict_rejects() {
        let src = r#"{ "outputs": { "*": { "path": "a.png", "sparkle": true } } }"#;
        let path = Path::new("test.json");

        let lenient = serde_json::from_str::<ConfigFile>(src);
        assert!(lenient.is_ok());

        let strict: Result<ConfigFileStrict, _> = serde_json::from_str(src);
        assert!(strict.is_err());

        // version gate only applies in strict mode
        let v2 = r#"{ "version": 2 }"#;
        assert!(serde_json::from_str::<ConfigFile>(v2).unwrap().version == 2);
        let _ = path;
    }

    #[test]
    fn for_output_falls_back_to_star() {
        let file: ConfigFile = serde_json::from_str(
            r#"{ "outputs": {
                "HDMI-A-1": { "path": "left.png" },
                "*": { "path": "any.png" }
            } }"#,
        )
        .unwrap();
        assert_eq!(
            file.for_output("HDMI-A-1").unwrap().path.as_deref(),
            Some(Path::new("left.png"))
        );
        assert_eq!(
            file.for_output("DP-3").unwrap().path.as_deref(),
            Some(Path::new("any.png"))
        );
    }

    #[test]
    fn transition_none_and_zero_duration_disable() {
        let mut t = TransitionConfig::default();
        assert!(!t.is_none());
        t.kind = "None".into();
        assert!(t.is_none());
        t.kind = "fade".into();
        t.duration_ms = 0;
        assert!(t.is_none());
    }

    #[test]
    fn cycle_list_overrides_single_path() {
        let cfg: WallpaperConfig = serde_json::from_str(
            r#"{ "path": "solo.png",
                 "cycle": { "duration_secs": 60, "paths": ["a.png", "b.png", "c.png"] } }"#,
        )
        .unwrap();
        assert_eq!(cfg.image_path_at(0), Some(Path::new("a.png")));
        assert_eq!(cfg.image_path_at(2), Some(Path::new("c.png")));
        assert_eq!(cfg.image_path_at(4), Some(Path::new("b.png")), "wraps");

        let solo: WallpaperConfig = serde_json::from_str(r#"{ "path": "solo.png" }"#).unwrap();
        assert_eq!(solo.image_path_at(7), Some(Path::new("solo.png")));
    }

    #[test]
    fn shader_paths_are_deduplicated() {
        let file: ConfigFile = serde_json::from_str(
            r#"{ "outputs": {
                "A": { "wallpaper": "shader", "path": "fx/waves.frag" },
                "B": { "wallpaper": "shader", "path": "fx/waves.frag" },
                "C": { "path": "img.png" }
            } }"#,
        )
        .unwrap();
        let paths = shader_paths(&file);
        assert_eq!(paths, vec![PathBuf::from("fx/waves.frag")]);
    }
}
