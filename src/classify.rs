use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

use crate::{
    gtfs::BusFamily,
    layers::FeatureTable,
};

lazy_static! {
    /// Bus-company locals look like `Q12` or `BX2`: one word character
    /// followed by digits, or the `BX` prefix followed by digits.
    static ref COMPANY_LOCAL: Regex = Regex::new(r"^(\w\d+|BX\d+)").expect("valid regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceClass {
    Local,
    Express,
}

/// Classify one route identifier. Total and deterministic: the same id
/// always lands in the same bucket, and a missing or empty id falls into
/// the express bucket rather than being dropped.
///
/// Borough feeds mark express runs with an `X` or `SIM` prefix, so the
/// borough rule is prefix exclusion. (The historical scripts also carried
/// a `[^X]` character-class variant, which matches any id whose first
/// character is not `X` and therefore misclassifies `SIM` ids; that
/// variant is a bug, not an alternative rule.)
pub fn classify(family: BusFamily, route_id: Option<&str>) -> ServiceClass {
    let Some(id) = route_id.filter(|id| !id.is_empty()) else {
        return ServiceClass::Express;
    };
    let local = match family {
        BusFamily::Company => COMPANY_LOCAL.is_match(id),
        BusFamily::Borough => !(id.starts_with('X') || id.starts_with("SIM")),
    };
    if local {
        ServiceClass::Local
    } else {
        ServiceClass::Express
    }
}

/// Partition a route-tagged table into (local, express).
///
/// Classification is evaluated once per distinct route_id; every feature
/// carrying that id follows its bucket.
pub fn split_local_express(
    table: FeatureTable,
    family: BusFamily,
) -> (FeatureTable, FeatureTable) {
    let mut classes: HashMap<Option<String>, ServiceClass> = HashMap::new();
    for feature in &table.features {
        let route_id = feature.attr_str("route_id").map(str::to_string);
        classes
            .entry(route_id.clone())
            .or_insert_with(|| classify(family, route_id.as_deref()));
    }

    let crs = table.crs;
    let mut local = FeatureTable::new(crs);
    let mut express = FeatureTable::new(crs);
    for feature in table.features {
        let route_id = feature.attr_str("route_id").map(str::to_string);
        match classes.get(&route_id) {
            Some(ServiceClass::Local) => local.features.push(feature),
            _ => express.features.push(feature),
        }
    }
    (local, express)
}
