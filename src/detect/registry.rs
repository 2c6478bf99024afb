use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};

use super::backend::DetectorBackend;

/// Backend handle shared between the registry and the detection adapter.
///
/// `DetectorBackend::detect` takes `&mut self`, so calls are serialized.
pub type SharedBackend = Arc<Mutex<dyn DetectorBackend>>;

/// Detector backends compiled into this build, keyed by `DetectorBackend::name`.
///
/// One of them serves frames: the first one registered, unless `select`
/// picks another.
#[derive(Default)]
pub struct BackendRegistry {
    backends: BTreeMap<&'static str, SharedBackend>,
    selected: Option<&'static str>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<B: DetectorBackend + 'static>(&mut self, backend: B) {
        let name = backend.name();
        self.selected.get_or_insert(name);
        self.backends.insert(name, Arc::new(Mutex::new(backend)));
    }

    /// Serve frames with the backend called `name`.
    pub fn select(&mut self, name: &str) -> Result<()> {
        let (&key, _) = self.backends.get_key_value(name).ok_or_else(|| {
            anyhow!(
                "detector backend '{}' is not available (registered: {})",
                name,
                self.names().join(", ")
            )
        })?;
        self.selected = Some(key);
        Ok(())
    }

    pub fn selected(&self) -> Option<&'static str> {
        self.selected
    }

    /// Registered backend names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.backends.keys().copied().collect()
    }

    /// Warm up every registered backend and hand out the selected one.
    pub fn activate(&self) -> Result<SharedBackend> {
        for (name, backend) in &self.backends {
            backend
                .lock()
                .map_err(|_| anyhow!("backend '{}' lock poisoned", name))?
                .warm_up()
                .with_context(|| format!("warm-up of backend '{}' failed", name))?;
        }
        let name = self
            .selected
            .ok_or_else(|| anyhow!("no detector backend registered"))?;
        self.backends
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("detector backend '{}' is not available", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backend::DetectParams;
    use crate::detect::backends::ScriptedBackend;
    use crate::detect::result::DetectedObject;
    use image::RgbImage;

    struct Cold {
        warmed: bool,
    }

    impl DetectorBackend for Cold {
        fn name(&self) -> &'static str {
            "cold"
        }

        fn detect(
            &mut self,
            _image: &RgbImage,
            _params: &DetectParams,
        ) -> Result<Option<Vec<DetectedObject>>> {
            if self.warmed {
                Ok(Some(Vec::new()))
            } else {
                Err(anyhow!("not warmed up"))
            }
        }

        fn warm_up(&mut self) -> Result<()> {
            self.warmed = true;
            Ok(())
        }
    }

    #[test]
    fn first_registered_backend_serves_by_default() -> Result<()> {
        let mut registry = BackendRegistry::new();
        assert!(registry.activate().is_err());

        registry.register(ScriptedBackend::new());
        registry.register(Cold { warmed: false });
        assert_eq!(registry.selected(), Some("scripted"));
        assert_eq!(registry.names(), vec!["cold", "scripted"]);

        let backend = registry.activate()?;
        let name = backend.lock().unwrap().name();
        assert_eq!(name, "scripted");
        Ok(())
    }

    #[test]
    fn activate_warms_every_backend() -> Result<()> {
        let mut registry = BackendRegistry::new();
        registry.register(Cold { warmed: false });
        registry.select("cold")?;

        let backend = registry.activate()?;
        let result = backend
            .lock()
            .unwrap()
            .detect(&RgbImage::new(2, 2), &DetectParams::default())?;
        assert_eq!(result, Some(Vec::new()));
        Ok(())
    }

    #[test]
    fn selecting_an_unknown_backend_lists_the_known_ones() {
        let mut registry = BackendRegistry::new();
        registry.register(ScriptedBackend::new());
        let err = registry.select("tract").unwrap_err();
        assert!(err.to_string().contains("registered: scripted"));
        assert_eq!(registry.selected(), Some("scripted"));
    }
}
