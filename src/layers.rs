use geo_types::{Geometry, LineString, MultiLineString, MultiPoint, Point};
use serde_json::Value;
use std::collections::HashMap;

/// Coordinate reference frame of a feature table. Input tables are always
/// geodetic NAD83; everything written out must be in the NY State Plane
/// Long Island frame (feet).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    Nad83,
    StatePlane,
}

impl Crs {
    pub fn epsg(&self) -> u32 {
        match self {
            Crs::Nad83 => 4269,
            Crs::StatePlane => 2263,
        }
    }
}

/// One geometry plus its ordered attribute columns. Attributes keep
/// insertion order so every layer is written with a stable schema.
#[derive(Debug, Clone)]
pub struct Feature {
    pub geometry: Geometry<f64>,
    attrs: Vec<(String, Value)>,
}

impl Feature {
    pub fn new<G: Into<Geometry<f64>>>(geometry: G) -> Self {
        Self {
            geometry: geometry.into(),
            attrs: Vec::new(),
        }
    }

    pub fn with_attr<V: Into<Value>>(mut self, name: &str, value: V) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Replaces the named column in place, or appends it.
    pub fn set_attr<V: Into<Value>>(&mut self, name: &str, value: V) {
        let value = value.into();
        if let Some(slot) = self.attrs.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
        } else {
            self.attrs.push((name.to_string(), value));
        }
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attr(name).and_then(Value::as_str)
    }

    pub fn attrs(&self) -> &[(String, Value)] {
        &self.attrs
    }
}

/// An in-memory vector layer: a CRS tag and a list of features.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub crs: Crs,
    pub features: Vec<Feature>,
}

impl FeatureTable {
    pub fn new(crs: Crs) -> Self {
        Self {
            crs,
            features: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Explicitly reassert the reference frame. Dissolve rebuilds
    /// geometries, so callers re-tag the result rather than trusting
    /// whatever survived the rebuild.
    pub fn set_crs(&mut self, crs: Crs) {
        self.crs = crs;
    }

    /// Append all features of `tables` into one table tagged `crs`.
    pub fn concat<I: IntoIterator<Item = FeatureTable>>(crs: Crs, tables: I) -> Self {
        let mut out = Self::new(crs);
        for table in tables {
            out.features.extend(table.features);
        }
        out
    }

    /// Merge all features sharing the same value in `key` into a single
    /// feature whose geometry is the union of the members' geometries.
    /// Attributes are taken from the first member row. Group order follows
    /// first appearance of each key.
    ///
    /// Dissolving an already-dissolved table by the same key is a no-op:
    /// every group has one member and the union of one multi-geometry is
    /// itself.
    pub fn dissolve(self, key: &str) -> Self {
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<Feature>> = HashMap::new();
        for feature in self.features {
            let group_key = feature
                .attr(key)
                .map(value_key)
                .unwrap_or_default();
            if !groups.contains_key(&group_key) {
                order.push(group_key.clone());
            }
            groups.entry(group_key).or_default().push(feature);
        }

        let mut out = Self::new(self.crs);
        for group_key in order {
            let members = groups.remove(&group_key).unwrap_or_default();
            let Some(first) = members.first() else {
                continue;
            };
            let attrs = first.attrs.clone();
            let geometry = union_geometries(members.iter().map(|f| &f.geometry));
            out.features.push(Feature { geometry, attrs });
        }
        out
    }

    /// Reduce every feature to exactly the given columns, in the given
    /// order. Columns a feature does not carry come out null, so the
    /// written schema is identical across the whole layer.
    pub fn select_columns(&mut self, columns: &[&str]) {
        for feature in &mut self.features {
            let attrs = columns
                .iter()
                .map(|name| {
                    let value = feature.attr(name).cloned().unwrap_or(Value::Null);
                    (name.to_string(), value)
                })
                .collect();
            feature.attrs = attrs;
        }
    }

    /// Drop the named columns from every feature.
    pub fn drop_columns(&mut self, columns: &[&str]) {
        for feature in &mut self.features {
            feature.attrs.retain(|(name, _)| !columns.contains(&name.as_str()));
        }
    }
}

fn value_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Union a group of line or point geometries into one multi-part
/// geometry. Line groups come out as a `MultiLineString`, point groups as
/// a `MultiPoint`; sub-segments are kept as parts rather than welded.
fn union_geometries<'a, I: Iterator<Item = &'a Geometry<f64>>>(geometries: I) -> Geometry<f64> {
    let mut lines: Vec<LineString<f64>> = Vec::new();
    let mut points: Vec<Point<f64>> = Vec::new();
    let mut other: Option<Geometry<f64>> = None;
    for geometry in geometries {
        match geometry {
            Geometry::LineString(line) => lines.push(line.clone()),
            Geometry::MultiLineString(multi) => lines.extend(multi.0.iter().cloned()),
            Geometry::Point(point) => points.push(*point),
            Geometry::MultiPoint(multi) => points.extend(multi.0.iter().cloned()),
            geometry => other = Some(geometry.clone()),
        }
    }
    if !lines.is_empty() {
        Geometry::MultiLineString(MultiLineString(lines))
    } else if !points.is_empty() {
        Geometry::MultiPoint(MultiPoint(points))
    } else {
        other.expect("dissolve group cannot be empty")
    }
}

/// Normalize a raw feed color (`EE352E`) to a displayable hex color
/// (`#EE352E`). Missing colors stay null.
pub fn display_color(raw: Option<&str>) -> Value {
    match raw {
        Some(color) if !color.is_empty() => Value::String(format!("#{color}")),
        _ => Value::Null,
    }
}

/// The directional dissolve key used by the bus layers: `route_id`
/// joined to `direction_id` with an underscore (`Q12_0`).
pub fn dissolve_key(route_id: Option<&str>, direction_id: Option<u8>) -> String {
    let route = route_id.unwrap_or_default();
    match direction_id {
        Some(direction) => format!("{route}_{direction}"),
        None => format!("{route}_"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{Coord, LineString};

    fn line(points: &[(f64, f64)]) -> LineString<f64> {
        LineString::new(points.iter().map(|&(x, y)| Coord { x, y }).collect())
    }

    fn table_with_segments() -> FeatureTable {
        let mut table = FeatureTable::new(Crs::Nad83);
        table.features.push(
            Feature::new(line(&[(0.0, 0.0), (1.0, 1.0)]))
                .with_attr("route_id", "A")
                .with_attr("color", "2850AD"),
        );
        table.features.push(
            Feature::new(line(&[(1.0, 1.0), (2.0, 2.0)])).with_attr("route_id", "A"),
        );
        table
            .features
            .push(Feature::new(line(&[(5.0, 5.0), (6.0, 6.0)])).with_attr("route_id", "B"));
        table
    }

    #[test]
    fn dissolve_merges_by_key() {
        let dissolved = table_with_segments().dissolve("route_id");
        assert_eq!(dissolved.len(), 2);
        let first = &dissolved.features[0];
        assert_eq!(first.attr_str("route_id"), Some("A"));
        // attributes come from the first member row
        assert_eq!(first.attr_str("color"), Some("2850AD"));
        match &first.geometry {
            Geometry::MultiLineString(multi) => assert_eq!(multi.0.len(), 2),
            other => panic!("expected MultiLineString, got {other:?}"),
        }
    }

    #[test]
    fn dissolve_is_idempotent() {
        let once = table_with_segments().dissolve("route_id");
        let keys: Vec<_> = once
            .features
            .iter()
            .map(|f| f.attr_str("route_id").unwrap().to_string())
            .collect();
        let twice = once.clone().dissolve("route_id");
        assert_eq!(twice.len(), once.len());
        for (feature, key) in twice.features.iter().zip(&keys) {
            assert_eq!(feature.attr_str("route_id"), Some(key.as_str()));
        }
        for (a, b) in once.features.iter().zip(&twice.features) {
            assert_eq!(&a.geometry, &b.geometry);
        }
    }

    #[test]
    fn select_columns_fixes_schema() {
        let mut table = table_with_segments();
        table.select_columns(&["route_id", "route_long", "color"]);
        let feature = &table.features[1];
        let names: Vec<_> = feature.attrs().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["route_id", "route_long", "color"]);
        assert_eq!(feature.attr("route_long"), Some(&Value::Null));
    }

    #[test]
    fn color_normalization() {
        assert_eq!(
            display_color(Some("EE352E")),
            Value::String("#EE352E".into())
        );
        assert_eq!(display_color(None), Value::Null);
        assert_eq!(display_color(Some("")), Value::Null);
    }

    #[test]
    fn directional_key() {
        assert_eq!(dissolve_key(Some("Q12"), Some(0)), "Q12_0");
        assert_eq!(dissolve_key(None, Some(1)), "_1");
    }
}
