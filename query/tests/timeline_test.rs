use chrono::NaiveDate;
use geo::{polygon, Polygon};
use geograph_core::config::AppConfig;
use geograph_core::error::{ErrorCode, GeoGraphError};
use geograph_core::model::{IdentificationMode, NodeIndex, PolygonTable};
use query::{
    CacheLookup, NodeMap, TimedGraph, Timeline, TimelineError, TimelineOptions, TimelineStats,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use storage::{GraphOptions, PolygonGraph};

fn rect(min_x: f64, max_x: f64) -> Polygon<f64> {
    polygon![
        (x: min_x, y: 0.0),
        (x: max_x, y: 0.0),
        (x: max_x, y: 1.0),
        (x: min_x, y: 1.0),
    ]
}

/// Three fields drifting right by `shift`, the last one splitting in two.
fn survey(shift: f64, split: bool) -> PolygonGraph {
    let mut rows = vec![(rect(shift, 2.0 + shift), 1), (rect(2.0 + shift, 4.0 + shift), 2)];
    if split {
        rows.push((rect(4.0 + shift, 5.0 + shift), 1));
        rows.push((rect(5.0 + shift, 6.0 + shift), 1));
    } else {
        rows.push((rect(4.0 + shift, 6.0 + shift), 1));
    }
    PolygonGraph::from_table(PolygonTable::from_rows(rows), GraphOptions::default()).unwrap()
}

fn date(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 6, 1).unwrap()
}

fn timeline() -> Timeline<NaiveDate> {
    Timeline::from_graphs([
        TimedGraph::new(date(2020), survey(0.5, true)),
        TimedGraph::new(date(2010), survey(0.0, false)),
        TimedGraph::new(date(2015), survey(0.25, false)),
    ])
    .unwrap()
}

fn as_sets(map: &NodeMap) -> BTreeMap<NodeIndex, BTreeSet<NodeIndex>> {
    map.iter()
        .map(|(src, targets)| (*src, targets.iter().copied().collect()))
        .collect()
}

#[test]
fn test_graphs_sorted_by_timestamp() {
    let timeline = timeline();
    assert_eq!(timeline.len(), 3);
    assert_eq!(
        timeline.times().copied().collect::<Vec<_>>(),
        vec![date(2010), date(2015), date(2020)]
    );
    assert_eq!(timeline.get(&date(2020)).unwrap().node_count(), 4);
    assert!(timeline.get(&date(2011)).is_none());
}

#[test]
fn test_reverse_request_is_served_by_inversion() {
    let timeline = timeline();
    let (t1, t2) = (date(2010), date(2020));

    let forward = timeline.identify_graphs(&t1, &t2, true).unwrap();
    let backward = timeline.identify_graphs(&t2, &t1, true).unwrap();

    assert_eq!(*backward, forward.invert());
    assert_eq!(
        timeline.stats(),
        TimelineStats {
            fresh_computations: 1,
            direct_hits: 0,
            inverted_hits: 1,
        }
    );

    let again = timeline.identify_graphs(&t2, &t1, true).unwrap();
    assert!(Arc::ptr_eq(&again, &backward));
    assert_eq!(timeline.stats().direct_hits, 1);
    assert_eq!(timeline.stats().fresh_computations, 1);
}

#[test]
fn test_inverted_entry_matches_fresh_computation() {
    let timeline = timeline();
    let (t1, t2) = (date(2015), date(2020));

    timeline.identify_graphs(&t1, &t2, true).unwrap();
    let derived = timeline.identify_graphs(&t2, &t1, true).unwrap();
    let fresh = timeline.identify_graphs(&t2, &t1, false).unwrap();

    assert_eq!(as_sets(&derived), as_sets(&fresh));
    assert_eq!(timeline.stats().fresh_computations, 2);
}

#[test]
fn test_split_field_maps_to_both_parts() {
    let timeline = timeline();
    let map = timeline.identify_graphs(&date(2015), &date(2020), true).unwrap();

    assert_eq!(map.get(0), Some(&[0][..]));
    assert_eq!(map.get(1), Some(&[1][..]));
    let parts: BTreeSet<NodeIndex> = map.get(2).unwrap().iter().copied().collect();
    assert_eq!(parts, BTreeSet::from([2, 3]));
}

#[test]
fn test_timestack_links_consecutive_graphs() {
    let timeline = timeline();
    let stack = timeline.timestack().unwrap();

    assert_eq!(stack.len(), 2);
    let times: Vec<NaiveDate> = timeline.times().copied().collect();
    for (map, pair) in stack.iter().zip(times.windows(2)) {
        assert!(Arc::ptr_eq(map.src_graph(), timeline.get(&pair[0]).unwrap()));
        assert!(Arc::ptr_eq(map.trg_graph(), timeline.get(&pair[1]).unwrap()));
    }
    assert_eq!(timeline.cached_pairs(), 2);
}

#[test]
fn test_emptied_cache_forces_recomputation() {
    let timeline = timeline();
    let (t1, t2) = (date(2010), date(2015));

    timeline.identify(&t1, &t2).unwrap();
    assert!(matches!(timeline.lookup(&t1, &t2), CacheLookup::Found(_)));

    timeline.empty_node_map_cache();
    assert_eq!(timeline.cached_pairs(), 0);
    assert!(matches!(timeline.lookup(&t2, &t1), CacheLookup::Absent));

    timeline.identify(&t1, &t2).unwrap();
    assert_eq!(timeline.stats().fresh_computations, 2);
}

#[test]
fn test_unknown_timestamp_is_not_found() {
    let timeline = timeline();
    let err = timeline
        .identify_graphs(&date(2010), &date(1999), true)
        .unwrap_err();
    assert!(matches!(err, TimelineError::UnknownTimestamp(_)));
    assert_eq!(err.error_code(), ErrorCode::NotFound);
}

#[test]
fn test_diffs_are_not_implemented() {
    let timeline = timeline();
    assert_eq!(timeline.timediff().unwrap_err().error_code(), ErrorCode::NotImplemented);
    assert_eq!(
        timeline
            .node_diff_cache(&date(2010), &date(2015))
            .unwrap_err()
            .error_code(),
        ErrorCode::NotImplemented
    );
}

#[test]
fn test_integer_timestamps_from_map() {
    let timeline =
        Timeline::from_map(BTreeMap::from([(2, survey(0.5, true)), (1, survey(0.0, false))]));
    assert_eq!(timeline.times().copied().collect::<Vec<i64>>(), vec![1, 2]);
    assert_eq!(timeline.timestack().unwrap().len(), 1);
}

#[test]
fn test_options_follow_configuration() {
    let config = AppConfig::from_toml_str(
        r#"
        [timeline]
        mode = "corner"
        use_cached = false
        "#,
    )
    .unwrap();
    let options = TimelineOptions::from(&config.timeline);
    assert_eq!(options.mode, IdentificationMode::Corner);
    assert!(!options.use_cached);

    let graphs = BTreeMap::from([(1, survey(0.0, false)), (2, survey(0.0, false))]);
    let timeline = Timeline::from_map(graphs).with_options(options);
    timeline.identify(&1, &2).unwrap();
    timeline.identify(&1, &2).unwrap();
    assert_eq!(timeline.stats().fresh_computations, 2);
    assert_eq!(timeline.stats().direct_hits, 0);
}
