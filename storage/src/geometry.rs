use geo::{coord, BooleanOps, Buffer, Distance, Euclidean, Length, MultiPolygon, Polygon, Rect};

pub fn to_multi(polygon: Polygon<f64>) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![polygon])
}

/// Length of every ring, exterior and holes.
pub fn perimeter(geometry: &MultiPolygon<f64>) -> f64 {
    geometry
        .iter()
        .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
        .map(|ring| Euclidean.length(ring))
        .sum()
}

/// Smallest gap between any part of `a` and any part of `b`.
pub fn distance(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> f64 {
    a.iter()
        .flat_map(|left| b.iter().map(move |right| Euclidean.distance(left, right)))
        .fold(f64::INFINITY, f64::min)
}

pub fn expand(bbox: &Rect<f64>, distance: f64) -> Rect<f64> {
    Rect::new(
        coord! { x: bbox.min().x - distance, y: bbox.min().y - distance },
        coord! { x: bbox.max().x + distance, y: bbox.max().y + distance },
    )
}

pub fn buffer(geometry: &MultiPolygon<f64>, distance: f64) -> MultiPolygon<f64> {
    geometry.buffer(distance)
}

/// Union of all geometries, dissolving shared boundaries.
pub fn union_all<'a>(
    geometries: impl IntoIterator<Item = &'a MultiPolygon<f64>>,
) -> MultiPolygon<f64> {
    geometries
        .into_iter()
        .fold(MultiPolygon::new(Vec::new()), |acc, geometry| {
            if acc.0.is_empty() {
                geometry.clone()
            } else {
                acc.union(geometry)
            }
        })
}
