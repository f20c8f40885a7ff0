use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::scheduler::Scheduler;
use crate::window::{Location, Window};

type LoadListener = Rc<dyn Fn()>;

/// An embedded child document: the iframe equivalent.
///
/// The content window exists from construction (so the embedded script can
/// start listening), but the load event only fires once the frame has been
/// appended to a [`Container`]. A load listener added after the load has
/// already happened is scheduled immediately, which lets additional channels
/// attach to a shared frame later.
#[derive(Clone)]
pub struct Frame {
    inner: Rc<RefCell<FrameInner>>,
    scheduler: Scheduler,
}

struct FrameInner {
    url: String,
    content: Window,
    loaded: bool,
    attached: bool,
    load_listeners: Vec<LoadListener>,
}

impl Frame {
    /// `content_location` is the resolved location the frame will navigate
    /// to; the owner becomes the content window's parent.
    pub fn new(owner: &Window, url: impl Into<String>, content_location: Location) -> Self {
        let scheduler = owner.scheduler();
        let content = Window::with_parent(&scheduler, content_location, Some(owner));
        Self {
            inner: Rc::new(RefCell::new(FrameInner {
                url: url.into(),
                content,
                loaded: false,
                attached: false,
                load_listeners: Vec::new(),
            })),
            scheduler,
        }
    }

    pub fn url(&self) -> String {
        self.inner.borrow().url.clone()
    }

    pub fn content_window(&self) -> Window {
        self.inner.borrow().content.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.borrow().loaded
    }

    pub fn is_attached(&self) -> bool {
        self.inner.borrow().attached
    }

    /// True when both handles refer to the same frame.
    pub fn ptr_eq(&self, other: &Frame) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run `listener` when the frame finishes loading; immediately (but
    /// still asynchronously) if it already has.
    pub fn on_load(&self, listener: impl Fn() + 'static) {
        let listener: LoadListener = Rc::new(listener);
        let mut inner = self.inner.borrow_mut();
        if inner.loaded {
            drop(inner);
            self.scheduler.schedule(move || listener());
        } else {
            inner.load_listeners.push(listener);
        }
    }

    fn attach(&self) {
        self.inner.borrow_mut().attached = true;
        let frame = self.clone();
        self.scheduler.schedule(move || frame.fire_load());
    }

    fn detach(&self) {
        self.inner.borrow_mut().attached = false;
    }

    fn fire_load(&self) {
        let listeners = {
            let mut inner = self.inner.borrow_mut();
            if inner.loaded || !inner.attached {
                return;
            }
            inner.loaded = true;
            std::mem::take(&mut inner.load_listeners)
        };
        debug!(url = %self.url(), "frame loaded");
        for listener in listeners {
            listener();
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Frame")
            .field("url", &inner.url)
            .field("loaded", &inner.loaded)
            .field("attached", &inner.attached)
            .finish()
    }
}

/// Owns frames on the embedding side: the DOM-subtree equivalent the parent
/// appends iframes to and removes them from.
#[derive(Clone)]
pub struct Container {
    frames: Rc<RefCell<Vec<Frame>>>,
}

impl Container {
    pub fn new() -> Self {
        Self {
            frames: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Append a frame, which schedules its load event.
    pub fn append(&self, frame: &Frame) {
        self.frames.borrow_mut().push(frame.clone());
        frame.attach();
    }

    /// Remove a frame. Returns false when it was not in this container.
    pub fn remove(&self, frame: &Frame) -> bool {
        let mut frames = self.frames.borrow_mut();
        let before = frames.len();
        frames.retain(|held| !held.ptr_eq(frame));
        let removed = frames.len() != before;
        if removed {
            frame.detach();
        }
        removed
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.frames.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.frames.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.borrow().is_empty()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("frames", &self.len())
            .finish()
    }
}
