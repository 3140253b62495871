use crate::identify::{identify_graphs_with, IdentifyOptions};
use crate::node_map::NodeMap;
use dashmap::DashMap;
use geograph_core::config::TimelineSettings;
use geograph_core::error::{ErrorCode, GeoGraphError};
use geograph_core::model::IdentificationMode;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use storage::PolygonGraph;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("no graph at timestamp {0}")]
    UnknownTimestamp(String),
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
}

impl GeoGraphError for TimelineError {
    fn error_code(&self) -> ErrorCode {
        match self {
            TimelineError::InvalidInput(_) => ErrorCode::InvalidInput,
            TimelineError::UnknownTimestamp(_) => ErrorCode::NotFound,
            TimelineError::NotImplemented(_) => ErrorCode::NotImplemented,
        }
    }
}

/// Bounds every timestamp type must meet: totally ordered, hashable as a
/// cache key and shareable across the identification pool.
pub trait Timestamp: Ord + Hash + Clone + Debug + Send + Sync {}

impl<T: Ord + Hash + Clone + Debug + Send + Sync> Timestamp for T {}

/// A polygon graph observed at `timestamp`.
#[derive(Debug, Clone)]
pub struct TimedGraph<T> {
    pub timestamp: T,
    pub graph: Arc<PolygonGraph>,
}

impl<T> TimedGraph<T> {
    pub fn new(timestamp: T, graph: PolygonGraph) -> Self {
        Self {
            timestamp,
            graph: Arc::new(graph),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineOptions {
    pub mode: IdentificationMode,
    pub use_cached: bool,
    pub parallel: bool,
}

impl Default for TimelineOptions {
    fn default() -> Self {
        Self {
            mode: IdentificationMode::Interior,
            use_cached: true,
            parallel: true,
        }
    }
}

impl From<&TimelineSettings> for TimelineOptions {
    fn from(settings: &TimelineSettings) -> Self {
        Self {
            mode: settings.mode,
            use_cached: settings.use_cached,
            ..Self::default()
        }
    }
}

/// Outcome of a cache probe. A miss is an ordinary result, not an error.
#[derive(Debug, Clone)]
pub enum CacheLookup {
    Found(Arc<NodeMap>),
    Absent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimelineStats {
    pub fresh_computations: u64,
    pub direct_hits: u64,
    pub inverted_hits: u64,
}

#[derive(Debug, Default)]
struct Counters {
    fresh_computations: AtomicU64,
    direct_hits: AtomicU64,
    inverted_hits: AtomicU64,
}

/// Polygon graphs ordered by timestamp, with memoised pairwise node maps.
///
/// The cache sits behind `&self`; two threads asking for the same uncached
/// pair may both compute it, and the later insert wins with an equal map.
#[derive(Debug)]
pub struct Timeline<T: Timestamp> {
    graphs: BTreeMap<T, Arc<PolygonGraph>>,
    cache: DashMap<(T, T), Arc<NodeMap>>,
    options: TimelineOptions,
    counters: Counters,
}

impl<T: Timestamp> Timeline<T> {
    /// Build from timed graphs in any order. Duplicate timestamps are rejected.
    pub fn from_graphs(
        graphs: impl IntoIterator<Item = TimedGraph<T>>,
    ) -> Result<Self, TimelineError> {
        let mut ordered = BTreeMap::new();
        for timed in graphs {
            if ordered.contains_key(&timed.timestamp) {
                return Err(TimelineError::InvalidInput(format!(
                    "duplicate timestamp {:?}",
                    timed.timestamp
                )));
            }
            ordered.insert(timed.timestamp, timed.graph);
        }
        Ok(Self::from_ordered(ordered))
    }

    pub fn from_map(graphs: BTreeMap<T, PolygonGraph>) -> Self {
        Self::from_ordered(
            graphs
                .into_iter()
                .map(|(timestamp, graph)| (timestamp, Arc::new(graph)))
                .collect(),
        )
    }

    fn from_ordered(graphs: BTreeMap<T, Arc<PolygonGraph>>) -> Self {
        info!(graphs = graphs.len(), "timeline loaded");
        Self {
            graphs,
            cache: DashMap::new(),
            options: TimelineOptions::default(),
            counters: Counters::default(),
        }
    }

    pub fn with_options(mut self, options: TimelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &TimelineOptions {
        &self.options
    }

    pub fn times(&self) -> impl Iterator<Item = &T> {
        self.graphs.keys()
    }

    pub fn get(&self, timestamp: &T) -> Option<&Arc<PolygonGraph>> {
        self.graphs.get(timestamp)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&T, &Arc<PolygonGraph>)> {
        self.graphs.iter()
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    fn graph_at(&self, timestamp: &T) -> Result<&Arc<PolygonGraph>, TimelineError> {
        self.graphs
            .get(timestamp)
            .ok_or_else(|| TimelineError::UnknownTimestamp(format!("{timestamp:?}")))
    }

    /// Probe the cache for `(t1, t2)`, deriving it from a cached `(t2, t1)`
    /// by inversion when needed. Derived maps are stored.
    pub fn lookup(&self, t1: &T, t2: &T) -> CacheLookup {
        let key = (t1.clone(), t2.clone());
        if let Some(found) = self.cache.get(&key).map(|entry| Arc::clone(entry.value())) {
            self.counters.direct_hits.fetch_add(1, Ordering::Relaxed);
            debug!(t1 = ?t1, t2 = ?t2, "node map cache hit");
            return CacheLookup::Found(found);
        }

        let reverse = (t2.clone(), t1.clone());
        let Some(reversed) = self.cache.get(&reverse).map(|entry| Arc::clone(entry.value())) else {
            return CacheLookup::Absent;
        };
        let inverted = Arc::new(reversed.invert());
        self.cache.insert(key, Arc::clone(&inverted));
        self.counters.inverted_hits.fetch_add(1, Ordering::Relaxed);
        debug!(t1 = ?t1, t2 = ?t2, "node map derived by inversion");
        CacheLookup::Found(inverted)
    }

    /// Node map from the graph at `t1` to the graph at `t2`.
    ///
    /// With `use_cached`, a cached entry or the inverse of the reverse entry is
    /// returned when present. Fresh results always replace the cache slot.
    pub fn identify_graphs(
        &self,
        t1: &T,
        t2: &T,
        use_cached: bool,
    ) -> Result<Arc<NodeMap>, TimelineError> {
        let src = self.graph_at(t1)?;
        let trg = self.graph_at(t2)?;

        if use_cached {
            if let CacheLookup::Found(map) = self.lookup(t1, t2) {
                return Ok(map);
            }
        }

        let options = IdentifyOptions {
            mode: self.options.mode,
            parallel: self.options.parallel,
        };
        let map = Arc::new(identify_graphs_with(src, trg, options));
        self.cache.insert((t1.clone(), t2.clone()), Arc::clone(&map));
        self.counters.fresh_computations.fetch_add(1, Ordering::Relaxed);
        Ok(map)
    }

    /// [`Timeline::identify_graphs`] with the configured cache policy.
    pub fn identify(&self, t1: &T, t2: &T) -> Result<Arc<NodeMap>, TimelineError> {
        self.identify_graphs(t1, t2, self.options.use_cached)
    }

    /// Node maps between every pair of consecutive graphs, oldest first.
    pub fn timestack(&self) -> Result<Vec<Arc<NodeMap>>, TimelineError> {
        let times: Vec<&T> = self.graphs.keys().collect();
        times
            .windows(2)
            .map(|pair| self.identify(pair[0], pair[1]))
            .collect()
    }

    pub fn empty_node_map_cache(&self) {
        self.cache.clear();
        debug!("node map cache emptied");
    }

    pub fn cached_pairs(&self) -> usize {
        self.cache.len()
    }

    pub fn stats(&self) -> TimelineStats {
        TimelineStats {
            fresh_computations: self.counters.fresh_computations.load(Ordering::Relaxed),
            direct_hits: self.counters.direct_hits.load(Ordering::Relaxed),
            inverted_hits: self.counters.inverted_hits.load(Ordering::Relaxed),
        }
    }

    /// Differences across the whole timeline. Not available.
    pub fn timediff(&self) -> Result<(), TimelineError> {
        Err(TimelineError::NotImplemented("timediff"))
    }

    /// Per-node differences between two timestamps. Not available.
    pub fn node_diff_cache(&self, _t1: &T, _t2: &T) -> Result<(), TimelineError> {
        Err(TimelineError::NotImplemented("node_diff_cache"))
    }
}
