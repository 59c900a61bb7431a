pub mod association;
pub mod attributes;
pub mod bbox;
pub mod behavior;
pub mod config;
pub mod detection;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod math;
pub mod motion;
pub mod scene;
pub mod store;

mod circular_queue;
mod track;

pub use attributes::{Attribute, Attributes};
pub use behavior::{Decision, Reason, Verdict};
pub use config::Config;
pub use detection::Detection;
pub use dispatch::{AlertDispatcher, AlertPayload, DispatchOutcome, Notifier};
pub use frame::Frame;
pub use scene::{FrameReport, Scene, TrackDecision};
pub use track::Track;

use error::Error;
use std::collections::HashMap;
use std::rc::Rc;

pub type TrackId = u32;

pub trait Monitoring {
    fn update(&mut self, src: &str, frame: &Frame) -> Result<FrameReport, Error>;
    fn tracks(&self, src: &str) -> Rc<[Track]>;
    fn remove_source(&mut self, src: &str) -> bool;
}

/// Runs one independent [`Scene`] per video source, created on first use.
pub struct Monitor {
    config: Config,
    scenes: HashMap<String, Scene>,
}

impl Monitor {
    pub fn new(config: Config) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self {
            config,
            scenes: HashMap::new(),
        })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn scene(&self, src: &str) -> Option<&Scene> {
        self.scenes.get(src)
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.scenes.keys().map(String::as_str)
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self {
            config: Config::default(),
            scenes: HashMap::new(),
        }
    }
}

impl crate::Monitoring for Monitor {
    fn update(&mut self, src: &str, frame: &Frame) -> Result<FrameReport, Error> {
        let scene = match self.scenes.get_mut(src) {
            Some(scene) => scene,
            None => {
                log::info!("new source {}", src);
                let scene = Scene::new(src, self.config.clone())?;

                self.scenes.entry(src.to_string()).or_insert(scene)
            }
        };

        scene.process(frame)
    }

    #[inline]
    fn tracks(&self, src: &str) -> Rc<[Track]> {
        if let Some(scene) = self.scenes.get(src) {
            return scene.tracks().into_boxed_slice().into();
        }

        Rc::new([])
    }

    fn remove_source(&mut self, src: &str) -> bool {
        self.scenes.remove(src).is_some()
    }
}
