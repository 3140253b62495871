use geo::{polygon, Polygon};
use geograph_core::error::{ErrorCode, GeoGraphError};
use geograph_core::model::PolygonTable;
use storage::{ComponentSource, GraphError, GraphOptions, PolygonGraph};

fn rect(min_x: f64, max_x: f64) -> Polygon<f64> {
    polygon![
        (x: min_x, y: 0.0),
        (x: max_x, y: 0.0),
        (x: max_x, y: 1.0),
        (x: min_x, y: 1.0),
    ]
}

/// A and B touch, C sits 6 units past B, D is another class between them and
/// E is 1.5 units past C.
fn landscape() -> PolygonGraph {
    let table = PolygonTable::from_rows([
        (rect(0.0, 1.0), 1),
        (rect(1.0, 2.0), 1),
        (rect(8.0, 9.0), 1),
        (rect(3.0, 4.0), 2),
        (rect(10.5, 11.5), 1),
    ]);
    PolygonGraph::from_table(table, GraphOptions::default()).unwrap()
}

#[test]
fn test_habitat_edges_are_pairwise() {
    let mut graph = landscape();
    let habitat = graph.add_habitat("meadow", [1], 5.0).unwrap();
    let hgraph = habitat.graph();

    assert_eq!(hgraph.edge(0, 1).map(|edge| edge.distance), Some(0.0));
    assert!(!hgraph.has_edge(1, 2));
    assert!(!hgraph.has_edge(0, 2));
    assert!(!hgraph.contains_node(3));
    assert_eq!(hgraph.node_count(), 4);

    let gap = hgraph.edge(2, 4).map(|edge| edge.distance).unwrap();
    assert!((gap - 1.5).abs() < 1e-9);
}

#[test]
fn test_habitat_invariants_hold() {
    let mut graph = landscape();
    let habitat = graph.add_habitat("wide", [1, 2], 5.0).unwrap();

    for (_, attrs) in habitat.graph().nodes() {
        assert!(habitat.valid_classes().contains(&attrs.class_label));
    }
    for (_, _, edge) in habitat.graph().edges() {
        assert!(edge.distance >= 0.0);
        assert!(edge.distance <= habitat.max_travel_distance());
    }
    // B to D is 1 unit, D to C is 4 units.
    assert!(habitat.graph().has_edge(1, 3));
    assert!(habitat.graph().has_edge(2, 3));
    assert_eq!(habitat.origin(), graph.id());
}

#[test]
fn test_zero_travel_distance_keeps_direct_contact_only() {
    let mut graph = landscape();
    let habitat = graph.add_habitat("contact", [1], 0.0).unwrap();
    assert_eq!(habitat.graph().edge_count(), 1);
    assert!(habitat.graph().has_edge(0, 1));
}

#[test]
fn test_habitat_rejects_negative_distance() {
    let mut graph = landscape();
    let err = graph.add_habitat("bad", [1], -1.0).unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::InvalidInput);
    assert!(graph.habitat("bad").is_none());
}

#[test]
fn test_habitat_replaced_by_name() {
    let mut graph = landscape();
    graph.add_habitat("meadow", [1], 0.0).unwrap();
    graph.add_habitat("meadow", [2], 0.0).unwrap();

    assert_eq!(graph.habitats().len(), 1);
    assert_eq!(graph.habitat("meadow").unwrap().graph().node_count(), 1);
    // the main graph is left alone
    assert_eq!(graph.node_count(), 5);
    assert_eq!(graph.edge_count(), 1);
}

#[test]
fn test_habitat_components() {
    let mut graph = landscape();
    graph.add_habitat("meadow", [1], 5.0).unwrap();

    let components = graph.habitat_components("meadow").unwrap();
    let sets: Vec<Vec<u64>> = components
        .components
        .iter()
        .map(|set| set.iter().copied().collect())
        .collect();
    assert_eq!(sets, vec![vec![0, 1], vec![2, 4]]);
    assert!((components.rows[1].area - 2.0).abs() < 1e-9);
    assert_eq!(components.rows[1].geometry.0.len(), 2);

    assert!(matches!(
        graph.habitat_components("missing"),
        Err(GraphError::UnknownHabitat(_))
    ));
}

#[test]
fn test_components_reject_foreign_habitat() {
    let mut first = landscape();
    let second = landscape();
    let habitat = first.add_habitat("meadow", [1], 5.0).unwrap();

    let err = second
        .get_graph_components(ComponentSource::Habitat(habitat))
        .unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::InvalidInput);
}

#[test]
fn test_components_reject_habitat_built_before_merge() {
    let mut graph = landscape();
    let habitat = graph.add_habitat("meadow", [1], 5.0).unwrap().clone();
    graph.merge_nodes(&[0, 1], 1, None).unwrap();

    assert!(graph
        .get_graph_components(ComponentSource::Habitat(&habitat))
        .is_err());
    assert!(graph.habitat_components("meadow").is_err());
}

#[test]
fn test_components_reject_habitat_after_merge_reuses_index() {
    let mut graph = landscape();
    graph.add_habitat("meadow", [1], 5.0).unwrap();
    let merged = graph.merge_nodes(&[0, 1], 2, Some(0)).unwrap();
    assert_eq!(merged, 0);
    assert_eq!(graph.node(0).unwrap().class_label, 2);

    let err = graph.habitat_components("meadow").unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::InvalidInput);
}

#[test]
fn test_components_reject_habitat_after_same_class_merge_in_place() {
    let mut graph = landscape();
    graph.add_habitat("meadow", [1], 5.0).unwrap();
    graph.merge_nodes(&[0, 1], 1, Some(1)).unwrap();

    assert!(graph.habitat_components("meadow").is_err());

    // rebuilding the habitat clears the error
    graph.add_habitat("meadow", [1], 5.0).unwrap();
    let components = graph.habitat_components("meadow").unwrap();
    assert_eq!(components.components[0].iter().copied().collect::<Vec<_>>(), vec![1]);
}
