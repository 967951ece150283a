//! Route census across the bus feeds of a snapshot, for comparing one
//! month's service against another before publishing.

use std::collections::BTreeSet;

use crate::{
    Error,
    gtfs::{FeedLoader, Service},
};

/// The set of bus route_ids with scheduled trips in one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteCensus {
    routes: BTreeSet<String>,
}

impl RouteCensus {
    pub fn collect(loader: &FeedLoader) -> Result<Self, Error> {
        let mut routes = BTreeSet::new();
        for service in Service::BUSES {
            for trip in loader.load_trips(service)? {
                if let Some(route_id) = trip.route_id {
                    routes.insert(route_id);
                }
            }
        }
        Ok(Self { routes })
    }

    pub fn routes(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routes present here but absent from `other`. Run both ways to see
    /// what a new snapshot added and what it dropped.
    pub fn missing_from<'a>(&'a self, other: &RouteCensus) -> Vec<&'a str> {
        self.routes
            .iter()
            .filter(|route| !other.routes.contains(*route))
            .map(String::as_str)
            .collect()
    }
}
