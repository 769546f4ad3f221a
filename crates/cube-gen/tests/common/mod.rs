//! Helpers shared by the generator integration tests.

#![allow(dead_code)]

use cube_gen::{GeneratorConfig, LocalCubeGenerator, ProgressObserver, ProgressState};
use cube_store::StorePool;
use grid_mapping::InterpolationMethod;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Begin,
    Update,
    End,
}

#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub fraction: f64,
    pub stage_label: String,
    pub failed: bool,
}

/// Records every notification it receives.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn fractions(&self) -> Vec<f64> {
        self.events().iter().map(|e| e.fraction).collect()
    }

    fn record(&self, kind: EventKind, state: &ProgressState) {
        self.events.lock().unwrap().push(Event {
            kind,
            fraction: state.progress(),
            stage_label: state.stage_label.clone(),
            failed: state.failed,
        });
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_begin(&self, state: &ProgressState) {
        self.record(EventKind::Begin, state);
    }

    fn on_update(&self, state: &ProgressState) {
        self.record(EventKind::Update, state);
    }

    fn on_end(&self, state: &ProgressState) {
        self.record(EventKind::End, state);
    }
}

/// A generator using nearest-neighbour resampling, so values on matching
/// cell centres survive unchanged.
pub fn nearest_generator(pool: Arc<StorePool>) -> LocalCubeGenerator {
    let config = GeneratorConfig {
        interpolation: InterpolationMethod::Nearest,
        ..GeneratorConfig::default()
    };
    LocalCubeGenerator::new(pool, config)
}

/// Observers list holding a single recorder.
pub fn observed(recorder: &Arc<RecordingObserver>) -> Vec<Arc<dyn ProgressObserver>> {
    vec![recorder.clone()]
}
