//! Config and shader file watching.
//!
//! Directories are watched rather than files because editors save through
//! write temp, rename, delete old; watching the parent is the only reliable
//! cross-platform way to see the rename land.
//!
//! The watcher thread owns reload parsing and validation. The render thread
//! never touches the filesystem for config; it observes the shared state's
//! generation counter and applies changes between frames. Heavy work (image
//! decode, shader compile, GL) stays on the render thread.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::{self, ConfigFile, ConfigMode};
use crate::validate;
use crate::{loge, logi};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The config JSON (or some JSON in its directory) changed.
    ConfigChanged(PathBuf),
    /// A shader source changed.
    ShaderChanged(PathBuf),
    Other,
}

fn classify(p: PathBuf) -> WatchEvent {
    match p.extension().and_then(|s| s.to_str()) {
        Some("json") => WatchEvent::ConfigChanged(p),
        Some("frag") | Some("glsl") | Some("vert") => WatchEvent::ShaderChanged(p),
        _ => WatchEvent::Other,
    }
}

pub struct FileWatch {
    watcher: RecommendedWatcher,
    rx: Receiver<WatchEvent>,
}

impl FileWatch {
    pub fn new(config_path: &Path) -> anyhow::Result<FileWatch> {
        let (tx, rx) = unbounded::<WatchEvent>();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(ev) = res {
                    // editors do write temp + rename, so any event counts as a change
                    for p in ev.paths {
                        let _ = tx.send(classify(p));
                    }
                }
            },
            Config::default().with_poll_interval(Duration::from_millis(250)),
        )?;

        watch_parent(&mut watcher, config_path)?;

        Ok(FileWatch { watcher, rx })
    }

    pub fn watch_shader(&mut self, path: &Path) -> anyhow::Result<()> {
        watch_parent(&mut self.watcher, path)
    }

    pub fn rx(&self) -> &Receiver<WatchEvent> {
        &self.rx
    }
}

fn watch_parent(w: &mut RecommendedWatcher, file: &Path) -> anyhow::Result<()> {
    let parent = file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    w.watch(&parent, RecursiveMode::NonRecursive)?;
    Ok(())
}

/// Config state shared between the watcher thread and the render thread.
/// Every mutation bumps `generation`; the render thread applies on change.
#[derive(Debug)]
pub struct SharedConfig {
    pub generation: u64,
    pub file: ConfigFile,
    pub touched_shaders: Vec<PathBuf>,
}

impl SharedConfig {
    pub fn new(file: ConfigFile) -> SharedConfig {
        SharedConfig { generation: 0, file, touched_shaders: Vec::new() }
    }

    /// Drain the shader-change queue. Paths are matched downstream by file
    /// name since watch events come back absolute.
    pub fn take_touched(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.touched_shaders)
    }
}

pub fn lock_shared(shared: &Mutex<SharedConfig>) -> MutexGuard<'_, SharedConfig> {
    match shared.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Run the watch loop on its own thread. Owns the watcher so it can register
/// newly configured shader directories after each successful reload.
pub fn spawn_watch_thread(
    watch: FileWatch,
    config_path: PathBuf,
    mode: ConfigMode,
    shared: Arc<Mutex<SharedConfig>>,
) -> anyhow::Result<std::thread::JoinHandle<()>> {
    let FileWatch { mut watcher, rx } = watch;
    let handle = std::thread::Builder::new()
        .name("wallglow-watch".to_string())
        .spawn(move || {
            while let Ok(ev) = rx.recv() {
                match ev {
                    WatchEvent::ConfigChanged(p) => {
                        if p.file_name() != config_path.file_name() {
                            continue;
                        }
                        match config::load_config(&config_path, mode) {
                            Ok(file) => {
                                let issues = validate::validate_config(&file);
                                validate::emit_issues("CONFIG", &issues);
                                validate::emit_summary("CONFIG", "reload", &issues);
                                for shader in config::shader_paths(&file) {
                                    if let Err(e) = watch_parent(&mut watcher, &shader) {
                                        loge!("WATCH", "cannot watch {}: {e}", shader.display());
                                    }
                                }
                                let mut s = lock_shared(&shared);
                                s.file = file;
                                s.generation += 1;
                                logi!("CONFIG", "reloaded {} (generation {})", config_path.display(), s.generation);
                            }
                            Err(e) => loge!("CONFIG", "reload of {} failed: {e}", config_path.display()),
                        }
                    }
                    WatchEvent::ShaderChanged(p) => {
                        let mut s = lock_shared(&shared);
                        if !s.touched_shaders.contains(&p) {
                            s.touched_shaders.push(p);
                        }
                        s.generation += 1;
                    }
                    WatchEvent::Other => {}
                }
            }
        })?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_classify_by_extension() {
        assert_eq!(
            classify(PathBuf::from("/etc/wallglow.json")),
            WatchEvent::ConfigChanged(PathBuf::from("/etc/wallglow.json"))
        );
        for ext in ["frag", "glsl", "vert"] {
            assert_eq!(
                classify(PathBuf::from(format!("/shaders/p.{ext}"))),
                WatchEvent::ShaderChanged(PathBuf::from(format!("/shaders/p.{ext}")))
            );
        }
        assert_eq!(classify(PathBuf::from("/walls/a.png")), WatchEvent::Other);
        assert_eq!(classify(PathBuf::from("/walls/noext")), WatchEvent::Other);
    }

    #[test]
    fn touched_shaders_drain_once() {
        let mut shared = SharedConfig::new(ConfigFile::default());
        shared.touched_shaders.push(PathBuf::from("/shaders/a.frag"));
        shared.touched_shaders.push(PathBuf::from("/shaders/b.frag"));
        let taken = shared.take_touched();
        assert_eq!(taken.len(), 2);
        assert!(shared.take_touched().is_empty());
    }
}
