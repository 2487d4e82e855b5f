//! Automation lanes keyed by parameter id.

use crate::CurveType;
use dashmap::DashMap;
use nova_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Noise floor for the thinning tolerance on flat segments.
const THIN_EPSILON: f32 = 1e-6;

/// One automation breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutomationPoint {
    /// Lane-unique id, assigned by the store.
    #[serde(default)]
    pub id: u64,
    /// Transport time in seconds.
    pub time: f64,
    pub value: f32,
    /// Law of the segment starting at this point.
    #[serde(default)]
    pub curve: CurveType,
}

impl AutomationPoint {
    pub fn new(time: f64, value: f32) -> Self {
        Self {
            id: 0,
            time,
            value,
            curve: CurveType::Linear,
        }
    }

    pub fn with_curve(time: f64, value: f32, curve: CurveType) -> Self {
        Self {
            id: 0,
            time,
            value,
            curve,
        }
    }
}

/// Last value per parameter.
pub type AutomationSnapshot = BTreeMap<String, f32>;

/// Serializable form of every lane, for the persistence collaborator.
pub type AutomationData = BTreeMap<String, Vec<AutomationPoint>>;

/// Automation store configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Writes closer than this (seconds) to the lane's last point rewrite it.
    pub coalesce_window: f64,
    /// Curve for recorded and snapshot points.
    pub default_curve: CurveType,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            coalesce_window: 0.05,
            default_curve: CurveType::Linear,
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.coalesce_window.is_finite() || self.coalesce_window < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "coalesce_window must be a non-negative number of seconds, got {}",
                self.coalesce_window
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct Lane {
    points: Vec<AutomationPoint>,
    next_id: u64,
}

impl Lane {
    fn from_points(mut points: Vec<AutomationPoint>) -> Self {
        points.retain(|p| p.time.is_finite());
        points.sort_by(|a, b| a.time.total_cmp(&b.time));
        for (i, point) in points.iter_mut().enumerate() {
            point.id = i as u64;
        }
        let next_id = points.len() as u64;
        Self { points, next_id }
    }

    fn value_at(&self, time: f64) -> Option<f32> {
        if !time.is_finite() {
            return None;
        }
        let first = self.points.first()?;
        let last = self.points.last()?;
        if time <= first.time {
            return Some(first.value);
        }
        if time >= last.time {
            return Some(last.value);
        }

        let idx = self.points.partition_point(|p| p.time <= time);
        let prev = &self.points[idx - 1];
        let next = &self.points[idx];
        let span = next.time - prev.time;
        if span <= 0.0 {
            return Some(prev.value);
        }
        let t = (time - prev.time) / span;
        Some(prev.curve.evaluate(prev.value, next.value, t))
    }
}

/// Per-parameter automation lanes.
///
/// Lanes live in a concurrent map; each lane is locked only for the duration
/// of a single operation.
#[derive(Debug, Default)]
pub struct AutomationStore {
    lanes: DashMap<String, Lane>,
    config: StoreConfig,
}

impl AutomationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            lanes: DashMap::new(),
            config,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Add a point, or rewrite the last point when `time` is within the
    /// coalescing window of it. Returns the id of the written point, or
    /// `None` when `time` is not finite.
    pub fn add_point(&self, lane: &str, time: f64, value: f32, curve: CurveType) -> Option<u64> {
        if !time.is_finite() {
            tracing::debug!(lane, time, "ignoring point at non-finite time");
            return None;
        }
        let mut entry = match self.lanes.get_mut(lane) {
            Some(entry) => entry,
            None => self.lanes.entry(lane.to_owned()).or_default(),
        };
        let lane = entry.value_mut();

        if let Some(last) = lane.points.last_mut() {
            if (time - last.time).abs() < self.config.coalesce_window {
                last.time = time;
                last.value = value;
                let id = last.id;
                let n = lane.points.len();
                if n >= 2 && lane.points[n - 2].time > time {
                    lane.points.sort_by(|a, b| a.time.total_cmp(&b.time));
                }
                return Some(id);
            }
        }

        let id = lane.next_id;
        lane.next_id += 1;
        let point = AutomationPoint {
            id,
            time,
            value,
            curve,
        };
        let idx = lane.points.partition_point(|p| p.time <= time);
        lane.points.insert(idx, point);
        Some(id)
    }

    pub fn remove_point(&self, lane: &str, id: u64) -> Option<AutomationPoint> {
        let mut lane = self.lanes.get_mut(lane)?;
        let idx = lane.points.iter().position(|p| p.id == id)?;
        Some(lane.points.remove(idx))
    }

    /// Drop every point in `lane`.
    pub fn clear(&self, lane: &str) {
        if let Some(mut lane) = self.lanes.get_mut(lane) {
            lane.points.clear();
        }
    }

    pub fn clear_all(&self) {
        self.lanes.clear();
    }

    /// Remove interior points that a straight line between their kept
    /// neighbours predicts within `threshold` (relative to the neighbours'
    /// value span). Endpoints are always kept. Returns the number removed.
    pub fn thin(&self, lane: &str, threshold: f32) -> usize {
        let Some(mut lane) = self.lanes.get_mut(lane) else {
            return 0;
        };
        let points = &lane.points;
        if points.len() < 3 {
            return 0;
        }

        let mut kept = Vec::with_capacity(points.len());
        kept.push(points[0]);
        for window in points.windows(2).skip(1) {
            let (current, next) = (window[0], window[1]);
            let prev = kept[kept.len() - 1];
            if deviates(&prev, &current, &next, threshold) {
                kept.push(current);
            }
        }
        kept.push(points[points.len() - 1]);

        let removed = points.len() - kept.len();
        lane.points = kept;
        removed
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Lane value at `time`, or `None` for an empty or unknown lane.
    #[inline]
    pub fn interpolate_at(&self, lane: &str, time: f64) -> Option<f32> {
        self.lanes.get(lane)?.value_at(time)
    }

    pub fn last_value(&self, lane: &str) -> Option<f32> {
        self.lanes.get(lane)?.points.last().map(|p| p.value)
    }

    pub fn points(&self, lane: &str) -> Vec<AutomationPoint> {
        self.lanes
            .get(lane)
            .map(|lane| lane.points.clone())
            .unwrap_or_default()
    }

    pub fn len(&self, lane: &str) -> usize {
        self.lanes.get(lane).map_or(0, |lane| lane.points.len())
    }

    pub fn is_empty(&self, lane: &str) -> bool {
        self.len(lane) == 0
    }

    pub fn lane_ids(&self) -> Vec<String> {
        self.lanes.iter().map(|r| r.key().clone()).collect()
    }

    // =========================================================================
    // Snapshot / persistence
    // =========================================================================

    /// Last value of every lane. Parameters in `defaults` with an empty or
    /// missing lane take their default.
    pub fn snapshot(&self, defaults: &BTreeMap<String, f32>) -> AutomationSnapshot {
        let mut snapshot: AutomationSnapshot = defaults.clone();
        for lane in self.lanes.iter() {
            if let Some(last) = lane.points.last() {
                snapshot.insert(lane.key().clone(), last.value);
            }
        }
        snapshot
    }

    /// Write one point per snapshot entry at `time`.
    pub fn apply_snapshot(&self, snapshot: &AutomationSnapshot, time: f64) {
        for (lane, value) in snapshot {
            self.add_point(lane, time, *value, self.config.default_curve);
        }
    }

    /// Replace the store contents. Points are sorted by time and re-numbered.
    pub fn load(&self, data: AutomationData) {
        self.lanes.clear();
        for (lane, points) in data {
            self.lanes.insert(lane, Lane::from_points(points));
        }
        tracing::debug!(lanes = self.lanes.len(), "automation loaded");
    }

    pub fn export(&self) -> AutomationData {
        self.lanes
            .iter()
            .map(|r| (r.key().clone(), r.value().points.clone()))
            .collect()
    }
}

fn deviates(
    prev: &AutomationPoint,
    current: &AutomationPoint,
    next: &AutomationPoint,
    threshold: f32,
) -> bool {
    let span = next.time - prev.time;
    let predicted = if span > 0.0 {
        let t = ((current.time - prev.time) / span) as f32;
        prev.value + (next.value - prev.value) * t
    } else {
        prev.value
    };
    let tolerance = threshold * ((next.value - prev.value).abs() + THIN_EPSILON);
    (current.value - predicted).abs() > tolerance
}
