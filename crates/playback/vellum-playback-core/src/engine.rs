//! Shared, lazily-loaded engine handle.
//!
//! One `SharedEngine` is created by the host and passed by reference (cheap
//! clone) to every controller. The first `ensure_loaded` starts the engine
//! bundle load; concurrent callers join the same in-flight future and, once it
//! resolves, every later call resolves immediately with the retained handle.
//! A failed load is not cached: the next call starts a fresh attempt.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture, Shared};
use log::{debug, error};

use crate::error::EngineLoadError;
use crate::runtime::Runtime;

/// Reference to the loaded engine. Immutable once created; shared read-only.
pub type EngineHandle = Rc<dyn Runtime>;

/// Loads the engine bundle. Called at most once per successful load.
pub trait EngineLoader {
    fn load(&self) -> LocalBoxFuture<'static, Result<EngineHandle, EngineLoadError>>;
}

type PendingLoad = Shared<LocalBoxFuture<'static, Result<EngineHandle, EngineLoadError>>>;

enum EngineState {
    Idle,
    Loading(PendingLoad),
    Ready(EngineHandle),
}

struct EngineInner {
    loader: Box<dyn EngineLoader>,
    state: RefCell<EngineState>,
    attempts: Cell<usize>,
}

impl EngineInner {
    fn settle(&self, outcome: &Result<EngineHandle, EngineLoadError>) {
        let next = match outcome {
            Ok(handle) => {
                debug!("animation engine ready");
                EngineState::Ready(handle.clone())
            }
            Err(err) => {
                error!("animation engine failed to load: {err}");
                EngineState::Idle
            }
        };
        *self.state.borrow_mut() = next;
    }
}

/// Lazily-initialised engine shared by all controllers.
#[derive(Clone)]
pub struct SharedEngine {
    inner: Rc<EngineInner>,
}

impl SharedEngine {
    pub fn new(loader: impl EngineLoader + 'static) -> Self {
        Self {
            inner: Rc::new(EngineInner {
                loader: Box::new(loader),
                state: RefCell::new(EngineState::Idle),
                attempts: Cell::new(0),
            }),
        }
    }

    /// Resolve the engine handle, starting the load if none is ready or in flight.
    pub fn ensure_loaded(&self) -> LocalBoxFuture<'static, Result<EngineHandle, EngineLoadError>> {
        let mut state = self.inner.state.borrow_mut();
        match &*state {
            EngineState::Ready(handle) => future::ready(Ok(handle.clone())).boxed_local(),
            EngineState::Loading(pending) => pending.clone().boxed_local(),
            EngineState::Idle => {
                self.inner.attempts.set(self.inner.attempts.get() + 1);
                debug!(
                    "loading animation engine (attempt {})",
                    self.inner.attempts.get()
                );
                let load = self.inner.loader.load();
                let owner = Rc::downgrade(&self.inner);
                let pending = async move {
                    let outcome = load.await;
                    if let Some(inner) = owner.upgrade() {
                        inner.settle(&outcome);
                    }
                    outcome
                }
                .boxed_local()
                .shared();
                *state = EngineState::Loading(pending.clone());
                pending.boxed_local()
            }
        }
    }

    /// The handle, if a load has completed.
    pub fn handle(&self) -> Option<EngineHandle> {
        match &*self.inner.state.borrow() {
            EngineState::Ready(handle) => Some(handle.clone()),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(&*self.inner.state.borrow(), EngineState::Ready(_))
    }

    /// Number of loads started so far (including failed ones).
    pub fn load_attempts(&self) -> usize {
        self.inner.attempts.get()
    }
}

impl fmt::Debug for SharedEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.inner.state.borrow() {
            EngineState::Idle => "idle",
            EngineState::Loading(_) => "loading",
            EngineState::Ready(_) => "ready",
        };
        f.debug_struct("SharedEngine")
            .field("state", &state)
            .field("attempts", &self.inner.attempts.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::runtime::{Animation, AnimationFile, AnimationInstance, CanvasTarget, Renderer};
    use futures::channel::oneshot;
    use futures::executor::block_on;

    struct NullRuntime;

    impl Runtime for NullRuntime {
        fn load_file(&self, _bytes: &[u8]) -> Result<Box<dyn AnimationFile>, EngineError> {
            Err(EngineError::new("unsupported"))
        }
        fn renderer(&self, _canvas: &CanvasTarget) -> Result<Box<dyn Renderer>, EngineError> {
            Err(EngineError::new("unsupported"))
        }
        fn instantiate(
            &self,
            _animation: &dyn Animation,
        ) -> Result<Box<dyn AnimationInstance>, EngineError> {
            Err(EngineError::new("unsupported"))
        }
    }

    /// Loader whose outcomes are scripted per attempt.
    struct ScriptedLoader {
        outcomes: RefCell<Vec<Result<(), String>>>,
    }

    impl EngineLoader for ScriptedLoader {
        fn load(&self) -> LocalBoxFuture<'static, Result<EngineHandle, EngineLoadError>> {
            let next = self.outcomes.borrow_mut().remove(0);
            future::ready(match next {
                Ok(()) => Ok(Rc::new(NullRuntime) as EngineHandle),
                Err(reason) => Err(EngineLoadError::new(reason)),
            })
            .boxed_local()
        }
    }

    /// Loader that stays pending until the test completes it.
    struct GatedLoader {
        gate: RefCell<Option<oneshot::Receiver<()>>>,
    }

    impl EngineLoader for GatedLoader {
        fn load(&self) -> LocalBoxFuture<'static, Result<EngineHandle, EngineLoadError>> {
            let gate = self.gate.borrow_mut().take().expect("loaded twice");
            async move {
                gate.await
                    .map_err(|_| EngineLoadError::new("gate dropped"))?;
                Ok(Rc::new(NullRuntime) as EngineHandle)
            }
            .boxed_local()
        }
    }

    #[test]
    fn concurrent_callers_share_one_load() {
        let (tx, rx) = oneshot::channel();
        let engine = SharedEngine::new(GatedLoader {
            gate: RefCell::new(Some(rx)),
        });

        let first = engine.ensure_loaded();
        let second = engine.ensure_loaded();
        assert_eq!(engine.load_attempts(), 1);
        assert!(!engine.is_loaded());

        tx.send(()).unwrap();
        let (a, b) = block_on(future::join(first, second));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Rc::ptr_eq(&a, &b));
        assert!(engine.is_loaded());

        // Resolved handles are reused without another load.
        let c = block_on(engine.ensure_loaded()).unwrap();
        assert!(Rc::ptr_eq(&a, &c));
        assert_eq!(engine.load_attempts(), 1);
    }

    #[test]
    fn failed_load_is_not_cached() {
        let engine = SharedEngine::new(ScriptedLoader {
            outcomes: RefCell::new(vec![Err("bundle missing".into()), Ok(())]),
        });

        let err = block_on(engine.ensure_loaded()).err().unwrap();
        assert_eq!(err.reason, "bundle missing");
        assert!(engine.handle().is_none());

        assert!(block_on(engine.ensure_loaded()).is_ok());
        assert_eq!(engine.load_attempts(), 2);
        assert!(engine.handle().is_some());
    }
}
