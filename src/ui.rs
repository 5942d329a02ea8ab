//! Checklist presentation.
//!
//! The readiness tracker talks to a [`ChecklistView`]. Natively that is a
//! [`LogChecklist`], which logs every change and mirrors the spin button label
//! in the window title. On the web the [`DomChecklist`] ticks the
//! `check-<id>` boxes of the page, appends errors to `feature-list` and
//! relabels the `toggle-spin` button.

use std::sync::Arc;

use winit::window::Window;

use crate::readiness::Feature;

pub trait ChecklistView {
    fn on_entry(&mut self, feature: Feature, ready: Option<bool>);
    fn on_error(&mut self, message: &str);
    fn on_spin_label(&mut self, label: &str);
}

/// A view that shows nothing. Useful before a window exists and in tests.
#[derive(Debug, Default)]
pub struct NullChecklist;

impl ChecklistView for NullChecklist {
    fn on_entry(&mut self, _feature: Feature, _ready: Option<bool>) {}
    fn on_error(&mut self, _message: &str) {}
    fn on_spin_label(&mut self, _label: &str) {}
}

#[derive(Debug)]
pub struct LogChecklist {
    window: Option<Arc<Window>>,
    title: String,
}

impl LogChecklist {
    pub fn new(title: impl Into<String>, window: Option<Arc<Window>>) -> Self {
        Self {
            window,
            title: title.into(),
        }
    }
}

impl ChecklistView for LogChecklist {
    fn on_entry(&mut self, feature: Feature, ready: Option<bool>) {
        let mark = match ready {
            Some(true) => "x",
            Some(false) => "!",
            None => " ",
        };
        log::info!("[{}] {}", mark, feature.label());
    }

    fn on_error(&mut self, message: &str) {
        log::error!("{}", message);
    }

    fn on_spin_label(&mut self, label: &str) {
        log::info!("{}", label);
        if let Some(window) = &self.window {
            window.set_title(&format!("{} | {}", self.title, label));
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use web::{DomChecklist, bind_toggle_button};

#[cfg(target_arch = "wasm32")]
mod web {
    use wasm_bindgen::{JsCast, closure::Closure};
    use winit::event_loop::EventLoopProxy;

    use super::ChecklistView;
    use crate::{app::ShowcaseEvent, readiness::Feature};

    pub const FEATURE_LIST_ID: &str = "feature-list";
    pub const TOGGLE_BUTTON_ID: &str = "toggle-spin";

    #[derive(Debug)]
    pub struct DomChecklist {
        document: web_sys::Document,
    }

    impl DomChecklist {
        pub fn new() -> Option<Self> {
            let document = web_sys::window()?.document()?;
            Some(Self { document })
        }
    }

    impl ChecklistView for DomChecklist {
        fn on_entry(&mut self, feature: Feature, ready: Option<bool>) {
            let id = format!("check-{}", feature.id());
            let Some(input) = self
                .document
                .get_element_by_id(&id)
                .and_then(|el| el.dyn_into::<web_sys::HtmlInputElement>().ok())
            else {
                log::warn!("no checkbox #{} on the page", id);
                return;
            };
            input.set_checked(ready == Some(true));
        }

        fn on_error(&mut self, message: &str) {
            let Some(list) = self.document.get_element_by_id(FEATURE_LIST_ID) else {
                log::warn!("no #{} on the page", FEATURE_LIST_ID);
                return;
            };
            let item = match self.document.create_element("li") {
                Ok(item) => item,
                Err(e) => {
                    log::error!("could not create list item: {:?}", e);
                    return;
                }
            };
            item.set_text_content(Some(message));
            if let Err(e) = item.set_attribute("style", "color: #ff6b6b") {
                log::warn!("could not style error entry: {:?}", e);
            }
            if let Err(e) = list.append_child(&item) {
                log::error!("could not append error entry: {:?}", e);
            }
        }

        fn on_spin_label(&mut self, label: &str) {
            if let Some(button) = self.document.get_element_by_id(TOGGLE_BUTTON_ID) {
                button.set_text_content(Some(label));
            }
        }
    }

    /// Forward clicks on the spin button into the event loop.
    pub fn bind_toggle_button(proxy: EventLoopProxy<ShowcaseEvent>) {
        let Some(button) = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id(TOGGLE_BUTTON_ID))
        else {
            log::warn!("no #{} on the page", TOGGLE_BUTTON_ID);
            return;
        };
        let on_click = Closure::<dyn FnMut()>::new(move || {
            if proxy.send_event(ShowcaseEvent::ToggleSpin).is_err() {
                log::warn!("event loop closed, dropping spin toggle");
            }
        });
        if let Err(e) =
            button.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())
        {
            log::error!("could not bind the spin button: {:?}", e);
        }
        // The listener lives as long as the page.
        on_click.forget();
    }
}
