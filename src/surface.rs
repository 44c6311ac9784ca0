//! Display surfaces and GL bootstrap.
//!
//! All outputs share one GL context; whoever renders makes its own surface
//! current first. [`DisplaySurface`] is the seam the renderer draws through,
//! so frame logic never depends on a live compositor.
//!
//! Each monitor gets a borderless fullscreen window pinned to the bottom of
//! the stacking order. Monitors that fail window or surface creation are
//! skipped with a warning rather than aborting the ones that worked.

use std::ffi::CString;
use std::num::NonZeroU32;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::anyhow;
use glutin::config::ConfigTemplateBuilder;
use glutin::context::{ContextApi, ContextAttributesBuilder, NotCurrentContext, PossiblyCurrentContext, Version};
use glutin::display::GetGlDisplay;
use glutin::prelude::*;
use glutin::surface::{Surface, SurfaceAttributesBuilder, SwapInterval, WindowSurface};
use glutin_winit::DisplayBuilder;
use raw_window_handle::HasRawWindowHandle;
use winit::dpi::PhysicalSize;
use winit::event_loop::EventLoop;
use winit::monitor::MonitorHandle;
use winit::window::{Fullscreen, WindowBuilder, WindowLevel};

use crate::logw;

/// What the renderer needs from a surface: activate it, know its size.
pub trait DisplaySurface {
    /// Make this surface current on the shared context. False means the
    /// surface is unusable right now and the frame must be skipped.
    fn make_current(&mut self) -> bool;

    fn size(&self) -> (u32, u32);
}

/// A window-backed surface on the shared context.
pub struct GlutinSurface {
    pub name: String,
    window: winit::window::Window,
    surface: Surface<WindowSurface>,
    context: Rc<PossiblyCurrentContext>,
}

impl GlutinSurface {
    pub fn window_id(&self) -> winit::window::WindowId {
        self.window.id()
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    pub fn swap(&self) -> bool {
        self.surface.swap_buffers(&self.context).is_ok()
    }

    pub fn resize(&self, width: u32, height: u32) {
        self.surface.resize(&self.context, non_zero(width), non_zero(height));
    }
}

impl DisplaySurface for GlutinSurface {
    fn make_current(&mut self) -> bool {
        self.context.make_current(&self.surface).is_ok()
    }

    fn size(&self) -> (u32, u32) {
        let s = self.window.inner_size();
        (s.width, s.height)
    }
}

pub struct GlBootstrap {
    pub gl: Arc<glow::Context>,
    pub surfaces: Vec<GlutinSurface>,
}

fn non_zero(v: u32) -> NonZeroU32 {
    NonZeroU32::new(v.max(1)).unwrap_or(NonZeroU32::MIN)
}

fn monitor_label(index: usize, name: Option<String>) -> String {
    match name {
        Some(n) if !n.trim().is_empty() => n,
        _ => format!("output-{index}"),
    }
}

fn base_window_builder(monitor: Option<&MonitorHandle>, windowed: bool) -> WindowBuilder {
    let builder = WindowBuilder::new().with_title("wallglow");
    if windowed {
        builder.with_inner_size(PhysicalSize::new(1280, 720))
    } else {
        builder
            .with_decorations(false)
            .with_window_level(WindowLevel::AlwaysOnBottom)
            .with_fullscreen(Some(Fullscreen::Borderless(monitor.cloned())))
    }
}

fn create_surface(
    gl_display: &glutin::display::Display,
    gl_config: &glutin::config::Config,
    window: &winit::window::Window,
) -> anyhow::Result<Surface<WindowSurface>> {
    let size = window.inner_size();
    let attrs = SurfaceAttributesBuilder::<WindowSurface>::new().build(
        window.raw_window_handle(),
        non_zero(size.width),
        non_zero(size.height),
    );
    let surface = unsafe { gl_display.create_window_surface(gl_config, &attrs)? };
    Ok(surface)
}

/// Build the shared context and one surface per monitor. With `windowed` set
/// only a single desktop window is created, which is the debugging setup.
pub fn init_gl(event_loop: &EventLoop<()>, windowed: bool) -> anyhow::Result<GlBootstrap> {
    let monitors: Vec<MonitorHandle> = event_loop.available_monitors().collect();

    let template = ConfigTemplateBuilder::new().with_alpha_size(8).with_depth_size(0);
    let display_builder = DisplayBuilder::new()
        .with_window_builder(Some(base_window_builder(monitors.first(), windowed)));

    let (first_window, gl_config) = display_builder
        .build(event_loop, template, |configs| {
            configs
                .reduce(|a, b| if a.num_samples() > b.num_samples() { a } else { b })
                .unwrap()
        })
        .map_err(|e| anyhow!("failed to build GL display: {e}"))?;
    let first_window = first_window.ok_or_else(|| anyhow!("display builder produced no window"))?;
    let gl_display = gl_config.display();

    let context_attributes = ContextAttributesBuilder::new()
        .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
        .build(Some(first_window.raw_window_handle()));
    let not_current: NotCurrentContext =
        unsafe { gl_display.create_context(&gl_config, &context_attributes)? };

    let first_surface = create_surface(&gl_display, &gl_config, &first_window)?;
    let context = not_current.make_current(&first_surface)?;
    first_surface
        .set_swap_interval(&context, SwapInterval::Wait(NonZeroU32::MIN))
        .ok();

    let gl = unsafe {
        glow::Context::from_loader_function(|s| {
            gl_display.get_proc_address(&CString::new(s).unwrap()) as *const _
        })
    };

    let context = Rc::new(context);
    let mut surfaces = vec![GlutinSurface {
        name: monitor_label(0, first_window.current_monitor().and_then(|m| m.name())),
        window: first_window,
        surface: first_surface,
        context: Rc::clone(&context),
    }];

    if !windowed {
        for (i, monitor) in monitors.iter().enumerate().skip(1) {
            let builder = base_window_builder(Some(monitor), false);
            let window = match glutin_winit::finalize_window(event_loop, builder, &gl_config) {
                Ok(w) => w,
                Err(e) => {
                    logw!("INIT", "monitor {i}: window creation failed: {e}");
                    continue;
                }
            };
            let surface = match create_surface(&gl_display, &gl_config, &window) {
                Ok(s) => s,
                Err(e) => {
                    logw!("INIT", "monitor {i}: surface creation failed: {e}");
                    continue;
                }
            };
            if context.make_current(&surface).is_ok() {
                surface
                    .set_swap_interval(&context, SwapInterval::Wait(NonZeroU32::MIN))
                    .ok();
            }
            surfaces.push(GlutinSurface {
                name: monitor_label(i, monitor.name()),
                window,
                surface,
                context: Rc::clone(&context),
            });
        }
    }

    Ok(GlBootstrap { gl: Arc::new(gl), surfaces })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_labels_fall_back_to_an_index() {
        assert_eq!(monitor_label(0, Some("DP-1".to_string())), "DP-1");
        assert_eq!(monitor_label(2, Some("  ".to_string())), "output-2");
        assert_eq!(monitor_label(1, None), "output-1");
    }

    #[test]
    fn sizes_never_collapse_to_zero() {
        assert_eq!(non_zero(0).get(), 1);
        assert_eq!(non_zero(1080).get(), 1080);
    }

    #[test]
    fn the_surface_seam_is_object_safe() {
        struct Fixed {
            usable: bool,
        }
        impl DisplaySurface for Fixed {
            fn make_current(&mut self) -> bool {
                self.usable
            }
            fn size(&self) -> (u32, u32) {
                (640, 480)
            }
        }
        let mut fixed = Fixed { usable: false };
        let surface: &mut dyn DisplaySurface = &mut fixed;
        assert!(!surface.make_current());
        assert_eq!(surface.size(), (640, 480));
    }
}
