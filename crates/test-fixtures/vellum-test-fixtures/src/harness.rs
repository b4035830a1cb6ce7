//! Deterministic host for driving controllers in tests.
//!
//! Spawned tasks run on a `LocalPool` only when the test settles it, and frame
//! callbacks wait in a queue until the test fires a frame with an explicit
//! timestamp.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use futures::executor::{LocalPool, LocalSpawner};
use futures::future::LocalBoxFuture;
use futures::task::LocalSpawnExt;

use vellum_playback::{Controller, ControllerConfig, Host, Services, SharedEngine};

use crate::mock::{Journal, MockFetcher, MockLoader};

type FrameCallback = Box<dyn FnOnce(f64)>;

pub struct ManualHost {
    spawner: LocalSpawner,
    frames: RefCell<VecDeque<FrameCallback>>,
}

impl ManualHost {
    pub fn new(spawner: LocalSpawner) -> Self {
        Self {
            spawner,
            frames: RefCell::new(VecDeque::new()),
        }
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.borrow().len()
    }

    fn take_frames(&self) -> Vec<FrameCallback> {
        self.frames.borrow_mut().drain(..).collect()
    }
}

impl Host for ManualHost {
    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        if let Err(err) = self.spawner.spawn_local(task) {
            panic!("test pool rejected task: {err}");
        }
    }

    fn request_frame(&self, callback: Box<dyn FnOnce(f64)>) {
        self.frames.borrow_mut().push_back(callback);
    }
}

/// A mock engine, fixture fetcher and manual host wired together.
pub struct Harness {
    pool: LocalPool,
    pub host: Rc<ManualHost>,
    pub journal: Journal,
    pub loader: MockLoader,
    pub engine: SharedEngine,
    pub fetcher: Rc<MockFetcher>,
}

impl Harness {
    pub fn new() -> Self {
        let fetcher = MockFetcher::with_fixtures().expect("fixture assets should load");
        Self::with_fetcher(fetcher)
    }

    pub fn with_fetcher(fetcher: MockFetcher) -> Self {
        let pool = LocalPool::new();
        let host = Rc::new(ManualHost::new(pool.spawner()));
        let journal = Journal::new();
        let loader = MockLoader::new(journal.clone());
        let engine = SharedEngine::new(loader.clone());
        Self {
            pool,
            host,
            journal,
            loader,
            engine,
            fetcher: Rc::new(fetcher),
        }
    }

    pub fn services(&self) -> Services {
        Services::new(self.engine.clone(), self.fetcher.clone(), self.host.clone())
    }

    pub fn controller(&self, config: ControllerConfig) -> Controller {
        Controller::new(config, self.services())
    }

    /// Run spawned tasks (loads, listener calls) until nothing can progress.
    pub fn settle(&mut self) {
        self.pool.run_until_stalled();
    }

    /// Fire every queued frame callback at `now` ms, then settle.
    pub fn frame(&mut self, now: f64) {
        for callback in self.host.take_frames() {
            callback(now);
        }
        self.settle();
    }

    /// Fire frames at `start`, `start + step`, ... `count` times.
    pub fn frames(&mut self, start: f64, step: f64, count: usize) {
        for i in 0..count {
            self.frame(start + step * i as f64);
        }
    }

    pub fn pending_frames(&self) -> usize {
        self.host.pending_frames()
    }

    /// Drive a future to completion on the harness pool.
    pub fn block_on<F: std::future::Future>(&mut self, fut: F) -> F::Output {
        self.pool.run_until(fut)
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
