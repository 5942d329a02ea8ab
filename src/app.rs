//! Application event loop.
//!
//! [`App`] implements winit's [`ApplicationHandler`]. Once a window exists it
//! builds the [`Showcase`] and the GPU [`Context`], marks the static features
//! ready and starts the model load. From then on every `RedrawRequested` runs
//! one frame, which schedules the next one, so the loop keeps going until the
//! stop token is triggered by closing the window or pressing `Escape`.
//!
//! The loading task wakes the loop with [`ShowcaseEvent::LoaderReady`]; the
//! outcome is applied on the event loop, never from the task itself.

use std::{fmt, sync::Arc};

use anyhow::Context as _;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use crate::{
    config::ShowcaseConfig,
    context::Context,
    frame::LoopState,
    loader::AssetLoader,
    showcase::Showcase,
    ui::{ChecklistView, LogChecklist},
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// A live showcase together with the context it draws into.
pub struct Running {
    context: Context,
    showcase: Showcase,
}

pub enum ShowcaseEvent {
    /// The GPU context finished initializing (web only, where it is async).
    #[cfg(target_arch = "wasm32")]
    Initialized(Box<Running>),
    /// The loading task settled.
    LoaderReady,
    ToggleSpin,
    Exit,
}

impl fmt::Debug for ShowcaseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(target_arch = "wasm32")]
            ShowcaseEvent::Initialized(_) => f.write_str("Initialized"),
            ShowcaseEvent::LoaderReady => f.write_str("LoaderReady"),
            ShowcaseEvent::ToggleSpin => f.write_str("ToggleSpin"),
            ShowcaseEvent::Exit => f.write_str("Exit"),
        }
    }
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<ShowcaseEvent>,
    config: Option<ShowcaseConfig>,
    running: Option<Running>,
}

impl App {
    pub fn new(event_loop: &EventLoop<ShowcaseEvent>, config: ShowcaseConfig) -> anyhow::Result<Self> {
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new().context("failed to start the tokio runtime")?,
            proxy: event_loop.create_proxy(),
            config: Some(config),
            running: None,
        })
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn mk_loader(&self, config: &ShowcaseConfig) -> AssetLoader {
        let fetcher = crate::resources::FsFetcher::new(config.assets_root.clone());
        log::info!("serving assets from {}", fetcher.root().display());
        let proxy = std::sync::Mutex::new(self.proxy.clone());
        AssetLoader::new(Arc::new(fetcher), self.async_runtime.handle().clone()).on_settled(
            move || {
                let sent = proxy
                    .lock()
                    .map(|proxy| proxy.send_event(ShowcaseEvent::LoaderReady).is_ok())
                    .unwrap_or(false);
                if !sent {
                    log::debug!("event loop gone, load result stays queued");
                }
            },
        )
    }

    #[cfg(target_arch = "wasm32")]
    fn mk_loader(&self, _config: &ShowcaseConfig) -> AssetLoader {
        let fetcher = crate::resources::HttpFetcher::from_location().unwrap_or_else(|e| {
            log::warn!("could not read the page location ({}), using relative URLs", e);
            crate::resources::HttpFetcher::new("/assets")
        });
        let proxy = self.proxy.clone();
        AssetLoader::new(Arc::new(fetcher)).on_settled(move || {
            if proxy.send_event(ShowcaseEvent::LoaderReady).is_err() {
                log::debug!("event loop gone, load result stays queued");
            }
        })
    }

    fn start(&mut self, mut running: Running) {
        let size = running.context.window().inner_size();
        running
            .showcase
            .resize(&mut running.context, size.width, size.height);
        running.showcase.mark_startup();

        let loader = self.mk_loader(running.showcase.config());
        running.showcase.start_loading(&loader);

        running.context.window().request_redraw();
        self.running = Some(running);
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(running) = self.running.as_mut() {
            running.showcase.stop();
            log::info!("stopped after {} frames", running.showcase.frames());
        }
        event_loop.exit();
    }
}

fn checklist_view(title: &str, window: &Arc<Window>) -> Box<dyn ChecklistView> {
    #[cfg(target_arch = "wasm32")]
    {
        if let Some(view) = crate::ui::DomChecklist::new() {
            return Box::new(view);
        }
    }
    Box::new(LogChecklist::new(title, Some(window.clone())))
}

impl ApplicationHandler<ShowcaseEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(config) = self.config.take() else {
            return;
        };

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title(config.title.clone());

        #[cfg(target_arch = "wasm32")]
        {
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let canvas = web_sys::window()
                .and_then(|window| window.document())
                .and_then(|document| document.get_element_by_id(CANVAS_ID))
                .and_then(|canvas| canvas.dyn_into::<web_sys::HtmlCanvasElement>().ok());
            if canvas.is_none() {
                log::warn!("no #{} canvas on the page, winit will create one", CANVAS_ID);
            }
            window_attributes = window_attributes.with_canvas(canvas).with_append(true);
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("could not create the window: {}", e);
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        let view = checklist_view(&config.title, &window);
        let showcase = Showcase::new(config, view, size.width, size.height);

        #[cfg(not(target_arch = "wasm32"))]
        {
            let context = self.async_runtime.block_on(Context::new(
                window,
                showcase.scene(),
                showcase.camera(),
            ));
            match context {
                Ok(context) => self.start(Running { context, showcase }),
                Err(e) => {
                    log::error!("could not initialize the renderer: {:#}", e);
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            crate::ui::bind_toggle_button(self.proxy.clone());
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match Context::new(window, showcase.scene(), showcase.camera()).await {
                    Ok(context) => {
                        let running = Box::new(Running { context, showcase });
                        if proxy.send_event(ShowcaseEvent::Initialized(running)).is_err() {
                            log::error!("event loop closed during initialization");
                        }
                    }
                    Err(e) => {
                        log::error!("could not initialize the renderer: {:#}", e);
                        let _ = proxy.send_event(ShowcaseEvent::Exit);
                    }
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ShowcaseEvent) {
        match event {
            #[cfg(target_arch = "wasm32")]
            ShowcaseEvent::Initialized(running) => self.start(*running),
            ShowcaseEvent::LoaderReady => {
                if let Some(running) = self.running.as_mut() {
                    if running.showcase.drain_loader() {
                        running.context.window().request_redraw();
                    }
                }
            }
            ShowcaseEvent::ToggleSpin => {
                if let Some(running) = self.running.as_mut() {
                    running.showcase.toggle_spin();
                }
            }
            ShowcaseEvent::Exit => self.shutdown(event_loop),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(running) = self.running.as_mut() else {
            if let WindowEvent::CloseRequested = event {
                event_loop.exit();
            }
            return;
        };

        if running.showcase.handle_window_event(&event) {
            running.context.window().request_redraw();
        }

        let mut exit = false;
        match event {
            WindowEvent::CloseRequested => exit = true,
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match code {
                KeyCode::Space => {
                    running.showcase.toggle_spin();
                }
                KeyCode::Escape => exit = true,
                _ => {}
            },
            WindowEvent::Resized(size) => {
                running
                    .showcase
                    .resize(&mut running.context, size.width, size.height);
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = running.context.window().inner_size();
                running
                    .showcase
                    .resize(&mut running.context, size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                let window = running.context.window().clone();
                match running
                    .showcase
                    .frame(&mut running.context, || window.request_redraw())
                {
                    Ok(LoopState::Running) => {}
                    Ok(LoopState::Stopped) => exit = true,
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = window.inner_size();
                        if !running
                            .showcase
                            .resize(&mut running.context, size.width, size.height)
                        {
                            running.context.reconfigure();
                        }
                    }
                    Err(wgpu::SurfaceError::Timeout) => log::warn!("surface timeout, skipping frame"),
                    Err(e) => {
                        log::error!("render error: {}", e);
                        exit = true;
                    }
                }
            }
            _ => {}
        }

        if exit {
            self.shutdown(event_loop);
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(running) = self.running.as_mut() {
            running.showcase.stop();
        }
    }
}

pub fn run() -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        let env = env_logger::Env::default().default_filter_or("info");
        if let Err(e) = env_logger::Builder::from_env(env).try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        }
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info)
            .context("failed to initialize console logging")?;
    }

    let event_loop: EventLoop<ShowcaseEvent> = EventLoop::with_user_event()
        .build()
        .context("failed to create the event loop")?;

    let config = ShowcaseConfig::from_env();
    log::info!("loading model {}", config.model_path);
    let mut app = App::new(&event_loop, config)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}
