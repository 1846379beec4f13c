use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::definition::Definitions;

/// Summary of reference graph structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceGraphSummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Report for reference ordering between collections.
///
/// `insert_order` lists referenced collections before the collections that
/// point at them; it is absent when references form a cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceGraphReport {
    pub summary: ReferenceGraphSummary,
    pub insert_order: Option<Vec<String>>,
    pub cycle: Option<Vec<String>>,
}

impl ReferenceGraphReport {
    pub fn has_cycle(&self) -> bool {
        self.cycle.is_some()
    }
}

/// Build a deterministic reference report for collection definitions.
pub fn build_reference_report(definitions: &Definitions) -> ReferenceGraphReport {
    let graph = build_adjacency(definitions);
    let nodes = graph.len();
    let edges = graph.values().map(|targets| targets.len()).sum();
    let summary = ReferenceGraphSummary { nodes, edges };

    match toposort(&graph) {
        Ok(order) => ReferenceGraphReport {
            summary,
            insert_order: Some(order),
            cycle: None,
        },
        Err(cycle) => ReferenceGraphReport {
            summary,
            insert_order: None,
            cycle: Some(cycle),
        },
    }
}

/// Edges run from a referenced collection to the collections referencing it.
fn build_adjacency(definitions: &Definitions) -> BTreeMap<String, BTreeSet<String>> {
    let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for collection in &definitions.collections {
        graph.entry(collection.name.clone()).or_default();
        for referenced in collection.referenced_collections() {
            graph
                .entry(referenced.to_string())
                .or_default()
                .insert(collection.name.clone());
        }
    }

    graph
}

fn toposort(graph: &BTreeMap<String, BTreeSet<String>>) -> Result<Vec<String>, Vec<String>> {
    let mut indegree: BTreeMap<String, usize> = graph.keys().map(|node| (node.clone(), 0)).collect();

    for targets in graph.values() {
        for target in targets {
            *indegree.entry(target.clone()).or_insert(0) += 1;
        }
    }

    let mut ready: BTreeSet<String> = indegree
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(node, _)| node.clone())
        .collect();

    let mut order = Vec::with_capacity(graph.len());

    while let Some(node) = ready.pop_first() {
        if let Some(targets) = graph.get(&node) {
            for target in targets {
                if let Some(count) = indegree.get_mut(target) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(target.clone());
                    }
                }
            }
        }
        order.push(node);
    }

    if order.len() == graph.len() {
        Ok(order)
    } else {
        Err(indegree
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(node, _)| node)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definitions(value: serde_json::Value) -> Definitions {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn orders_referenced_collections_first() {
        let defs = definitions(json!({
            "collections": [
                {"name": "comments", "fields": [
                    {"name": "post", "kind": "foreign_key", "target_collection": "posts"}
                ]},
                {"name": "posts", "fields": [
                    {"name": "categories", "kind": "id_array", "target_collection": "categories"}
                ]},
                {"name": "categories", "fields": []}
            ]
        }));

        let report = build_reference_report(&defs);
        let order = report.insert_order.expect("expected order");
        assert_eq!(order, vec!["categories", "posts", "comments"]);
        assert_eq!(report.summary.edges, 2);
    }

    #[test]
    fn reports_cycle_members() {
        let defs = definitions(json!({
            "collections": [
                {"name": "users", "fields": [
                    {"name": "invited_by", "kind": "foreign_key", "target_collection": "users", "optional_key": true}
                ]},
                {"name": "posts", "fields": []}
            ]
        }));

        let report = build_reference_report(&defs);
        assert!(report.has_cycle());
        assert_eq!(report.cycle.unwrap(), vec!["users"]);
    }
}
