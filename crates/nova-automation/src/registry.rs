//! Parameter id to target handle mapping, with bridged-delivery throttling.

use dashmap::DashMap;
use nova_core::{AtomicFloat, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Something a parameter value can be written to.
///
/// Local targets are audio-graph node parameters; bridged targets forward the
/// value to an out-of-process plugin host.
pub trait ParameterTarget: Send + Sync {
    fn apply(&self, value: f32);
}

impl ParameterTarget for AtomicFloat {
    #[inline]
    fn apply(&self, value: f32) {
        self.set(value);
    }
}

impl<T: ParameterTarget + ?Sized> ParameterTarget for Arc<T> {
    #[inline]
    fn apply(&self, value: f32) {
        (**self).apply(value)
    }
}

/// Parameter registry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Minimum spacing between delivered updates to a bridged parameter.
    pub bridge_throttle: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            bridge_throttle: Duration::from_millis(30),
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bridge_throttle > Duration::from_secs(1) {
            return Err(Error::InvalidConfig(format!(
                "bridge_throttle {:?} exceeds 1s",
                self.bridge_throttle
            )));
        }
        Ok(())
    }
}

/// A mounted parameter control.
#[derive(Clone)]
pub struct RegisteredParameter {
    pub id: String,
    /// Owning track or plugin instance.
    pub target_id: String,
    pub default_value: f32,
    pub target: Arc<dyn ParameterTarget>,
    pub is_bridged: bool,
    /// Last delivered update (bridged parameters only).
    pub last_update: Option<Instant>,
}

impl std::fmt::Debug for RegisteredParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredParameter")
            .field("id", &self.id)
            .field("target_id", &self.target_id)
            .field("default_value", &self.default_value)
            .field("is_bridged", &self.is_bridged)
            .field("last_update", &self.last_update)
            .finish_non_exhaustive()
    }
}

/// Parameter registry.
///
/// Entries come and go with UI control mount/unmount, so every operation on
/// an unknown id is a silent no-op.
#[derive(Debug, Default)]
pub struct ParameterRegistry {
    params: DashMap<String, RegisteredParameter>,
    config: RegistryConfig,
}

impl ParameterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            params: DashMap::new(),
            config,
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register or replace a parameter. Re-registration resets throttling.
    pub fn register(
        &self,
        id: impl Into<String>,
        target_id: impl Into<String>,
        target: Arc<dyn ParameterTarget>,
        default_value: f32,
        is_bridged: bool,
    ) {
        let id = id.into();
        tracing::trace!(param = %id, is_bridged, "register parameter");
        self.params.insert(
            id.clone(),
            RegisteredParameter {
                id,
                target_id: target_id.into(),
                default_value,
                target,
                is_bridged,
                last_update: None,
            },
        );
    }

    /// Remove a parameter. Its automation lane is left alone.
    pub fn unregister(&self, id: &str) -> Option<RegisteredParameter> {
        self.params.remove(id).map(|(_, param)| param)
    }

    /// Deliver `value` to the parameter's target. See [`apply_at`](Self::apply_at).
    pub fn apply(&self, id: &str, value: f32) -> bool {
        self.apply_at(id, value, Instant::now())
    }

    /// Deliver `value` as of `now`.
    ///
    /// Bridged parameters drop updates arriving sooner than `bridge_throttle`
    /// after the last delivered one; the newest value wins on the next
    /// delivery. Returns whether the target was invoked.
    pub fn apply_at(&self, id: &str, value: f32, now: Instant) -> bool {
        let target = {
            let Some(mut param) = self.params.get_mut(id) else {
                return false;
            };
            if param.is_bridged {
                if let Some(last) = param.last_update {
                    if now.saturating_duration_since(last) < self.config.bridge_throttle {
                        tracing::trace!(param = %id, value, "bridged update throttled");
                        return false;
                    }
                }
                param.last_update = Some(now);
            }
            Arc::clone(&param.target)
        };

        target.apply(value);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.params.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.params.iter().map(|r| r.key().clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<RegisteredParameter> {
        self.params.get(id).map(|r| r.value().clone())
    }

    pub fn default_value(&self, id: &str) -> Option<f32> {
        self.params.get(id).map(|r| r.default_value)
    }

    pub fn target_id(&self, id: &str) -> Option<String> {
        self.params.get(id).map(|r| r.target_id.clone())
    }

    pub fn is_bridged(&self, id: &str) -> bool {
        self.params.get(id).is_some_and(|r| r.is_bridged)
    }

    /// Default value of every registered parameter.
    pub fn defaults(&self) -> BTreeMap<String, f32> {
        self.params
            .iter()
            .map(|r| (r.key().clone(), r.default_value))
            .collect()
    }
}
