use std::collections::BTreeMap;

use anyhow::{anyhow, Result};

use super::backend::{Detector, DetectorSpec};
use super::backends::{MotionDetector, PassthroughDetector};

/// Builds a detector from its construction-time parameters.
pub type DetectorFactory = fn(&DetectorSpec) -> Result<Box<dyn Detector>>;

/// Name-indexed registry of detector factories.
///
/// `with_builtin` registers every backend compiled into this build; callers
/// may add their own before building.
pub struct DetectorRegistry {
    factories: BTreeMap<String, DetectorFactory>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("passthrough", |_| Ok(Box::new(PassthroughDetector::new())));
        registry.register("motion", |_| Ok(Box::new(MotionDetector::new())));
        #[cfg(feature = "backend-tract")]
        registry.register("tract", |spec| {
            Ok(Box::new(super::backends::TractDetector::from_spec(spec)?))
        });
        registry
    }

    /// Register a factory. A later registration under the same name replaces the earlier one.
    pub fn register(&mut self, name: &str, factory: DetectorFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered backend names, sorted.
    pub fn list(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Build and warm up the named backend.
    pub fn build(&self, name: &str, spec: &DetectorSpec) -> Result<Box<dyn Detector>> {
        let factory = self.factories.get(name).ok_or_else(|| {
            anyhow!(
                "detector backend '{}' not available (known: {})",
                name,
                self.list().join(", ")
            )
        })?;
        let mut detector = factory(spec)?;
        detector.warm_up()?;
        log::info!("detector backend '{}' ready", detector.name());
        Ok(detector)
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::DetectParams;
    use crate::frame::Frame;

    #[test]
    fn builtin_backends_are_listed() {
        let registry = DetectorRegistry::with_builtin();
        let names = registry.list();
        assert!(names.contains(&"motion".to_string()));
        assert!(names.contains(&"passthrough".to_string()));
    }

    #[test]
    fn unknown_backend_is_an_error() {
        let registry = DetectorRegistry::with_builtin();
        let err = match registry.build("yolo-gpu", &DetectorSpec::default()) {
            Ok(_) => panic!("expected unknown backend error"),
            Err(e) => e.to_string(),
        };
        assert!(err.contains("yolo-gpu"));
        assert!(err.contains("passthrough"));
    }

    #[test]
    fn built_detector_runs() {
        let registry = DetectorRegistry::with_builtin();
        let mut detector = registry
            .build("passthrough", &DetectorSpec::default())
            .unwrap();
        let out = detector
            .predict(Frame::solid(4, 4, [1, 1, 1]).with_sequence(9), &DetectParams::default())
            .unwrap();
        assert_eq!(out.sequence(), 9);
    }

    #[test]
    fn custom_registration_replaces_builtin() {
        let mut registry = DetectorRegistry::new();
        registry.register("motion", |_| Ok(Box::new(PassthroughDetector::new())));
        let detector = registry.build("motion", &DetectorSpec::default()).unwrap();
        assert_eq!(detector.name(), "passthrough");
    }
}
