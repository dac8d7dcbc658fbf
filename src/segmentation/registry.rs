use std::collections::HashMap;

use crate::config::SegmentationConfig;
use crate::error::OracleError;
use crate::segmentation::{ChromaKeyOracle, MaskOracle};

type OracleFactory = Box<dyn Fn(&SegmentationConfig) -> Result<Box<dyn MaskOracle>, OracleError> + Send + Sync>;

/// Registry for the available segmentation oracles
///
/// Oracles are registered by name and built on demand from the segmentation
/// section of the configuration.
pub struct OracleRegistry {
    factories: HashMap<String, OracleFactory>,
}

impl OracleRegistry {
    /// Create a new registry with all built-in oracles
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register_builtin_oracles();
        registry
    }

    fn register_builtin_oracles(&mut self) {
        self.register("chroma-key", |config| {
            Ok(Box::new(ChromaKeyOracle::from_config(&config.chroma_key)) as Box<dyn MaskOracle>)
        });

        #[cfg(feature = "onnx")]
        self.register("onnx", |config| {
            let segmenter = crate::segmentation::OnnxSegmenter::from_config(&config.onnx)?;
            Ok(Box::new(segmenter) as Box<dyn MaskOracle>)
        });
    }

    /// Register a custom oracle
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&SegmentationConfig) -> Result<Box<dyn MaskOracle>, OracleError> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Build a new instance of the named oracle
    pub fn create(&self, name: &str, config: &SegmentationConfig) -> Result<Box<dyn MaskOracle>, OracleError> {
        let factory = self.factories.get(name).ok_or_else(|| OracleError::NotFound {
            name: name.to_string(),
        })?;
        factory(config)
    }

    /// All registered oracle names, sorted
    pub fn available_oracles(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_oracle(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl Default for OracleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::ProbabilityMap;
    use crate::video::types::Frame;

    struct Everything;

    impl MaskOracle for Everything {
        fn name(&self) -> &str {
            "everything"
        }

        fn predict(&mut self, frame: &Frame) -> Result<Option<ProbabilityMap>, OracleError> {
            Ok(Some(ProbabilityMap::from_fn(frame.width(), frame.height(), |_, _| 1.0)))
        }
    }

    #[test]
    fn test_builtin_oracles_available() {
        let registry = OracleRegistry::new();
        assert!(registry.has_oracle("chroma-key"));
        assert_eq!(cfg!(feature = "onnx"), registry.has_oracle("onnx"));
    }

    #[test]
    fn test_unknown_oracle() {
        let registry = OracleRegistry::new();
        let err = registry.create("magic", &SegmentationConfig::default()).err().unwrap();
        assert!(matches!(err, OracleError::NotFound { .. }));
    }

    #[test]
    fn test_custom_oracle_registration() {
        let mut registry = OracleRegistry::new();
        registry.register("everything", |_| Ok(Box::new(Everything) as Box<dyn MaskOracle>));

        let oracle = registry.create("everything", &SegmentationConfig::default()).unwrap();
        assert_eq!(oracle.name(), "everything");
        assert!(registry.available_oracles().contains(&"everything".to_string()));
    }
}
