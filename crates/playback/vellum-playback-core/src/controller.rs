//! Controller: sequences engine load, asset fetch and playback start, queues
//! early caller actions, and drives the frame loop.
//!
//! Lifecycle:
//! - construction enqueues the implicit `load` marker (and an autoplay `play`)
//!   and spawns the load pipeline on the host;
//! - the pipeline resolves the shared engine, fetches and decodes the asset and
//!   emits `load`, which releases the queued actions;
//! - the first `play()` after load selects the artboard, creates instances,
//!   starts the frame loop and emits `play`;
//! - every frame advances, draws, reports loop completions and reschedules itself.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use futures::future::{self, FutureExt, LocalBoxFuture, Shared};
use log::{debug, error, info};
use uuid::Uuid;

use crate::config::{ControllerConfig, PlaybackOptions, Services};
use crate::engine::EngineHandle;
use crate::error::PlaybackError;
use crate::events::{EventBus, EventKind, PlaybackEvent};
use crate::frame::{LoopState, PlaybackLoop, PlaybackSession};
use crate::runtime::{Animation, AnimationFile, CanvasTarget};
use crate::tasks::TaskQueue;
use crate::Result;

type SharedLoad = Shared<LocalBoxFuture<'static, Result<()>>>;

struct ControllerInner {
    id: Uuid,
    options: PlaybackOptions,
    canvas: CanvasTarget,
    services: Services,
    functional: bool,
    tasks: TaskQueue,
    events: EventBus,
    runtime: RefCell<Option<EngineHandle>>,
    file: RefCell<Option<Box<dyn AnimationFile>>>,
    session: RefCell<Option<PlaybackSession>>,
    playback: RefCell<PlaybackLoop>,
    load: RefCell<Option<SharedLoad>>,
}

/// Playback controller for one animation asset on one canvas.
///
/// Cheap to clone; clones drive the same playback.
#[derive(Clone)]
pub struct Controller {
    inner: Rc<ControllerInner>,
}

impl Controller {
    /// Create a controller and start loading its asset.
    ///
    /// A missing or blank `src` is logged and leaves the controller inert: nothing
    /// is queued or loaded and no event is ever emitted.
    pub fn new(config: ControllerConfig, services: Services) -> Self {
        let ControllerConfig {
            mut options,
            canvas,
            listeners,
        } = config;
        // fetched and reported locator are the same trimmed string
        options.src = options.source().map(str::to_owned);
        let functional = options.src.is_some();
        let controller = Controller {
            inner: Rc::new(ControllerInner {
                id: Uuid::new_v4(),
                options,
                canvas,
                services,
                functional,
                tasks: TaskQueue::new(),
                events: EventBus::new(),
                runtime: RefCell::new(None),
                file: RefCell::new(None),
                session: RefCell::new(None),
                playback: RefCell::new(PlaybackLoop::new()),
                load: RefCell::new(None),
            }),
        };
        let inner = &controller.inner;
        for (kind, listener) in listeners {
            inner.events.on(kind, listener);
        }
        if !functional {
            error!("[{}] animation source is required; controller is inactive", inner.id);
            return controller;
        }

        inner.tasks.enqueue_marker(EventKind::Load);
        if inner.options.autoplay {
            controller.queue_play();
        }

        let load = ControllerInner::load(inner.clone()).boxed_local().shared();
        *inner.load.borrow_mut() = Some(load.clone());
        inner.services.host.spawn(
            async move {
                // Failures were already logged and emitted as `loaderror`.
                let _ = load.await;
            }
            .boxed_local(),
        );
        controller
    }

    /// Start playback, or queue the request until the asset has loaded.
    ///
    /// Every call made before `load` queues its own task; they all run once the
    /// asset is ready, and only the first initialises a session.
    pub fn play(&self) -> Result<()> {
        let inner = &self.inner;
        if !inner.functional {
            debug!("[{}] play ignored: controller is inactive", inner.id);
            return Ok(());
        }
        if inner.file.borrow().is_none() {
            debug!("[{}] play queued until load", inner.id);
            self.queue_play();
            return Ok(());
        }
        if inner.playback.borrow().is_running() {
            debug!("[{}] play ignored: already playing", inner.id);
            return Ok(());
        }

        let session = match inner.initialize() {
            Ok(session) => session,
            Err(err) => {
                error!("[{}] playback failed to start: {err}", inner.id);
                inner.emit(PlaybackEvent::LoadError {
                    message: err.to_string(),
                });
                return Err(err);
            }
        };
        info!(
            "[{}] playing {:?} on artboard {}",
            inner.id,
            session.animation_names(),
            session.artboard.name()
        );
        *inner.session.borrow_mut() = Some(session);
        inner.playback.borrow_mut().start();
        ControllerInner::schedule_frame(inner);
        inner.emit(PlaybackEvent::Play);
        Ok(())
    }

    /// Reserved. Playback cannot be paused yet.
    pub fn pause(&self) {
        debug!("[{}] pause is not supported", self.inner.id);
    }

    /// Register a listener for a lifecycle event.
    pub fn on(&self, kind: EventKind, listener: impl Fn(&PlaybackEvent) + 'static) -> &Self {
        self.inner.events.on(kind, Rc::new(listener));
        self
    }

    /// Resolves once the asset has loaded, or with the load error.
    pub fn when_loaded(&self) -> LocalBoxFuture<'static, Result<()>> {
        match self.inner.load.borrow().clone() {
            Some(load) => load.boxed_local(),
            None => future::ready(Err(PlaybackError::MissingSource)).boxed_local(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn options(&self) -> &PlaybackOptions {
        &self.inner.options
    }

    pub fn is_functional(&self) -> bool {
        self.inner.functional
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.file.borrow().is_some()
    }

    pub fn playback_state(&self) -> LoopState {
        self.inner.playback.borrow().state()
    }

    /// Frames rendered so far.
    pub fn frame_count(&self) -> u64 {
        self.inner.playback.borrow().frame_count()
    }

    /// Names of the active animation instances, in playback order.
    pub fn animation_names(&self) -> Vec<String> {
        self.inner
            .session
            .borrow()
            .as_ref()
            .map(PlaybackSession::animation_names)
            .unwrap_or_default()
    }

    /// Listeners registered for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner.events.listener_count(kind)
    }

    /// Milestones of the queued tasks, head first.
    pub fn pending_tasks(&self) -> Vec<EventKind> {
        self.inner.tasks.pending()
    }

    fn queue_play(&self) {
        let owner: Weak<ControllerInner> = Rc::downgrade(&self.inner);
        self.inner.tasks.enqueue(
            EventKind::Load,
            Box::new(move || {
                let Some(inner) = owner.upgrade() else { return };
                let id = inner.id;
                if let Err(err) = (Controller { inner }).play() {
                    error!("[{id}] queued play failed: {err}");
                }
            }),
        );
    }
}

impl ControllerInner {
    async fn load(self: Rc<Self>) -> Result<()> {
        let src = self.options.src.clone().unwrap_or_default();

        let runtime = match self.services.engine.ensure_loaded().await {
            Ok(runtime) => runtime,
            Err(err) => return Err(self.fail_load(err.into())),
        };

        let bytes = match self.services.fetcher.fetch(&src).await {
            Ok(bytes) => bytes,
            Err(reason) => {
                return Err(self.fail_load(PlaybackError::AssetFetch {
                    src: src.clone(),
                    reason,
                }))
            }
        };

        let file = match runtime.load_file(&bytes) {
            Ok(file) => file,
            Err(err) => {
                return Err(self.fail_load(PlaybackError::AssetParse {
                    src: src.clone(),
                    reason: err.message,
                }))
            }
        };

        *self.runtime.borrow_mut() = Some(runtime);
        *self.file.borrow_mut() = Some(file);
        info!("[{}] loaded {src} ({} bytes)", self.id, bytes.len());
        self.emit(PlaybackEvent::Load);
        Ok(())
    }

    fn fail_load(&self, err: PlaybackError) -> PlaybackError {
        debug_assert!(err.is_load_error(), "not a load-phase error: {err:?}");
        error!("[{}] load failed ({}): {err}", self.id, err.category());
        self.emit(PlaybackEvent::LoadError {
            message: err.to_string(),
        });
        err
    }

    /// Schedule listeners, then release queued actions gated on this event.
    fn emit(&self, event: PlaybackEvent) {
        let kind = event.kind();
        let scheduled = self.events.emit(self.services.host.as_ref(), &event);
        debug!("[{}] emit {kind} to {scheduled} listener(s)", self.id);
        self.tasks.advance(Some(kind));
    }

    /// Select the artboard and build one instance per requested animation.
    fn initialize(&self) -> Result<PlaybackSession> {
        let runtime = self
            .runtime
            .borrow()
            .clone()
            .ok_or_else(|| PlaybackError::Engine {
                reason: "engine not loaded".into(),
            })?;
        let file_slot = self.file.borrow();
        let file = file_slot.as_ref().ok_or_else(|| PlaybackError::Engine {
            reason: "animation file not loaded".into(),
        })?;

        let artboard = match self.options.artboard.as_deref() {
            Some(name) => file
                .artboard(name)?
                .ok_or_else(|| PlaybackError::ArtboardNotFound { name: name.into() })?,
            None => file
                .default_artboard()?
                .ok_or_else(|| PlaybackError::ArtboardNotFound {
                    name: "(default)".into(),
                })?,
        };
        let artboard_name = artboard.name();
        if artboard.animation_count()? == 0 {
            return Err(PlaybackError::NoAnimations {
                artboard: artboard_name,
            });
        }

        let requested = self.options.animation_names();
        let animations: Vec<Box<dyn Animation>> = if requested.is_empty() {
            let first = artboard
                .animation_at(0)?
                .ok_or_else(|| PlaybackError::NoAnimations {
                    artboard: artboard_name.clone(),
                })?;
            vec![first]
        } else {
            requested
                .iter()
                .map(|name| {
                    artboard
                        .animation_by_name(name)?
                        .ok_or_else(|| PlaybackError::AnimationNotFound {
                            artboard: artboard_name.clone(),
                            name: name.clone(),
                        })
                })
                .collect::<Result<_>>()?
        };

        let renderer = runtime.renderer(&self.canvas)?;
        let mut session = PlaybackSession::new(artboard, renderer);
        for animation in animations {
            let instance = runtime.instantiate(animation.as_ref())?;
            session.push(animation.name(), animation.loop_value(), instance);
        }
        Ok(session)
    }

    fn schedule_frame(self: &Rc<Self>) {
        let inner = self.clone();
        self.services
            .host
            .request_frame(Box::new(move |now| inner.frame(now)));
    }

    /// One display refresh. Engine errors halt this controller's playback.
    fn frame(self: Rc<Self>, now: f64) {
        let outcome = {
            let mut slot = self.session.borrow_mut();
            let Some(session) = slot.as_mut() else { return };
            self.playback.borrow_mut().tick(now, session)
        };
        match outcome {
            Ok(loops) => {
                for event in loops {
                    self.emit(PlaybackEvent::Loop(event));
                }
                self.schedule_frame();
            }
            Err(err) => {
                error!("[{}] playback halted: {err}", self.id);
            }
        }
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = &self.inner;
        f.debug_struct("Controller")
            .field("id", &inner.id)
            .field("options", &inner.options)
            .field("functional", &inner.functional)
            .field("loaded", &self.is_loaded())
            .field("state", &self.playback_state())
            .field("tasks", &inner.tasks)
            .field("events", &inner.events)
            .finish()
    }
}
