use std::collections::{HashMap, HashSet, VecDeque};

use chrono::Utc;
use onionwatch_core::{Edge, Entity, MAX_EDGE_EVIDENCE};
use onionwatch_extractor::ExtractedEntity;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::ingest::canonical_entity_type;

/// In-memory adjacency structure plus the three indices spec.md §4.4
/// names. The whole aggregate sits behind one writer lock; reads may
/// overlap (spec.md §5's custodian table).
#[derive(Default)]
struct Inner {
    entities: HashMap<String, Entity>,
    edges: HashMap<String, Edge>,
    type_index: HashMap<String, HashSet<String>>,
    domain_index: HashMap<String, HashSet<String>>,
    adjacency: HashMap<String, HashSet<String>>,
}

#[derive(Default)]
pub struct EntityGraph {
    inner: RwLock<Inner>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GraphStats {
    pub entity_count: usize,
    pub edge_count: usize,
    pub domain_count: usize,
    pub by_type: HashMap<String, usize>,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent on `(type, lowercased(value))`: creates on first
    /// sighting, otherwise bumps `occurrence_count`/`last_seen`/source
    /// sets. Returns the node id.
    pub async fn add_entity(
        &self,
        entity_type: &str,
        value: &str,
        source_domain: &str,
        source_url: &str,
    ) -> String {
        let node_id = Entity::node_id(entity_type, value);
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let entry = inner.entities.entry(node_id.clone()).or_insert_with(|| Entity {
            entity_type: entity_type.to_string(),
            value: value.to_lowercase(),
            first_seen: now,
            last_seen: now,
            occurrence_count: 0,
            source_domains: HashSet::new(),
            source_urls: HashSet::new(),
            risk_score: 0.0,
            tags: HashSet::new(),
            confidence: 0.5,
        });
        entry.occurrence_count += 1;
        entry.last_seen = now;
        if !source_domain.is_empty() {
            entry.source_domains.insert(source_domain.to_string());
        }
        if !source_url.is_empty() {
            entry.source_urls.insert(source_url.to_string());
        }

        inner
            .type_index
            .entry(entity_type.to_string())
            .or_default()
            .insert(node_id.clone());
        if !source_domain.is_empty() {
            inner
                .domain_index
                .entry(source_domain.to_string())
                .or_default()
                .insert(node_id.clone());
        }
        inner.adjacency.entry(node_id.clone()).or_default();
        node_id
    }

    /// Add every extracted entity from one page, then add a co-occurrence
    /// edge for every unordered pair found on that page. Entity ingestion
    /// and its edges land atomically: the whole batch runs under one
    /// writer-lock acquisition (spec.md §5's "within one page" guarantee).
    pub async fn ingest_page(&self, entities: &[ExtractedEntity], domain: &str, url: &str) -> Vec<String> {
        let mut node_ids = Vec::with_capacity(entities.len());
        for e in entities {
            let entity_type = canonical_entity_type(&e.subtype, &e.group);
            let node_id = self.add_entity(entity_type, &e.value, domain, url).await;
            node_ids.push(node_id);
        }
        node_ids.sort();
        node_ids.dedup();

        for i in 0..node_ids.len() {
            for j in (i + 1)..node_ids.len() {
                self.add_edge(&node_ids[i], &node_ids[j], "co-occurrence", url).await;
            }
        }
        node_ids
    }

    /// Bump (or create) the co-occurrence/relation edge between `a` and
    /// `b`. Weight increments by 0.1 per resighting; evidence is a bounded
    /// last-N URL list.
    pub async fn add_edge(&self, a: &str, b: &str, relationship: &str, evidence_url: &str) {
        if a == b {
            return;
        }
        let edge_id = Edge::edge_id(a, b);
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let is_new = !inner.edges.contains_key(&edge_id);
        let edge = inner.edges.entry(edge_id).or_insert_with(|| Edge {
            entity_id_a: a.to_string(),
            entity_id_b: b.to_string(),
            relationship: relationship.to_string(),
            weight: 1.0,
            first_seen: now,
            last_seen: now,
            occurrence_count: 0,
            evidence: Vec::new(),
        });
        if !is_new {
            edge.weight += 0.1;
        }
        edge.occurrence_count += 1;
        edge.last_seen = now;
        if !evidence_url.is_empty() && !edge.evidence.iter().any(|e| e == evidence_url) {
            edge.evidence.push(evidence_url.to_string());
            if edge.evidence.len() > MAX_EDGE_EVIDENCE {
                edge.evidence.remove(0);
            }
        }

        inner.adjacency.entry(a.to_string()).or_default().insert(b.to_string());
        inner.adjacency.entry(b.to_string()).or_default().insert(a.to_string());
    }

    pub async fn get_entity(&self, node_id: &str) -> Option<Entity> {
        self.inner.read().await.entities.get(node_id).cloned()
    }

    pub async fn get_edge(&self, a: &str, b: &str) -> Option<Edge> {
        self.inner.read().await.edges.get(&Edge::edge_id(a, b)).cloned()
    }

    pub async fn neighbors(&self, node_id: &str) -> HashSet<String> {
        self.inner.read().await.adjacency.get(node_id).cloned().unwrap_or_default()
    }

    /// BFS up to `max_depth`, optionally filtered by entity type.
    pub async fn connected(&self, node_id: &str, type_filter: Option<&str>, max_depth: usize) -> Vec<String> {
        let inner = self.inner.read().await;
        if !inner.entities.contains_key(node_id) {
            return Vec::new();
        }
        let mut visited = HashSet::new();
        visited.insert(node_id.to_string());
        let mut frontier = VecDeque::new();
        frontier.push_back((node_id.to_string(), 0usize));
        let mut out = Vec::new();

        while let Some((current, depth)) = frontier.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let Some(neighbors) = inner.adjacency.get(&current) else {
                continue;
            };
            for n in neighbors {
                if visited.insert(n.clone()) {
                    let keep = type_filter
                        .map(|t| inner.entities.get(n).map(|e| e.entity_type == t).unwrap_or(false))
                        .unwrap_or(true);
                    if keep {
                        out.push(n.clone());
                    }
                    frontier.push_back((n.clone(), depth + 1));
                }
            }
        }
        out
    }

    /// Entities whose `source_domains` cardinality is >= `min_domains`,
    /// sorted descending by that cardinality (spec.md §4.4).
    pub async fn cross_domain(&self, min_domains: usize) -> Vec<Entity> {
        let inner = self.inner.read().await;
        let mut out: Vec<Entity> = inner
            .entities
            .values()
            .filter(|e| e.source_domains.len() >= min_domains)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.source_domains.len().cmp(&a.source_domains.len()));
        out
    }

    /// Connected-component enumeration, optionally filtered to nodes of a
    /// given type; components smaller than `min_size` are dropped.
    pub async fn clusters(&self, type_filter: Option<&str>, min_size: usize) -> Vec<Vec<String>> {
        let inner = self.inner.read().await;
        let candidates: Vec<&String> = inner
            .entities
            .iter()
            .filter(|(_, e)| type_filter.map(|t| e.entity_type == t).unwrap_or(true))
            .map(|(id, _)| id)
            .collect();
        let candidate_set: HashSet<&String> = candidates.iter().copied().collect();

        let mut seen = HashSet::new();
        let mut clusters = Vec::new();
        for &start in &candidates {
            if seen.contains(start) {
                continue;
            }
            let mut component = Vec::new();
            let mut queue = VecDeque::new();
            queue.push_back(start.clone());
            seen.insert(start.clone());
            while let Some(node) = queue.pop_front() {
                component.push(node.clone());
                if let Some(neighbors) = inner.adjacency.get(&node) {
                    for n in neighbors {
                        if candidate_set.contains(n) && seen.insert(n.clone()) {
                            queue.push_back(n.clone());
                        }
                    }
                }
            }
            if component.len() >= min_size {
                clusters.push(component);
            }
        }
        clusters
    }

    pub async fn get_entities_by_domain(&self, domain: &str) -> Vec<Entity> {
        let inner = self.inner.read().await;
        inner
            .domain_index
            .get(domain)
            .map(|ids| ids.iter().filter_map(|id| inner.entities.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    pub async fn get_entities_by_type(&self, entity_type: &str) -> Vec<Entity> {
        let inner = self.inner.read().await;
        inner
            .type_index
            .get(entity_type)
            .map(|ids| ids.iter().filter_map(|id| inner.entities.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    pub async fn stats(&self) -> GraphStats {
        let inner = self.inner.read().await;
        let mut by_type = HashMap::new();
        for (t, ids) in &inner.type_index {
            by_type.insert(t.clone(), ids.len());
        }
        GraphStats {
            entity_count: inner.entities.len(),
            edge_count: inner.edges.len(),
            domain_count: inner.domain_index.len(),
            by_type,
        }
    }

    pub async fn to_dict(&self) -> (Vec<Entity>, Vec<Edge>) {
        let inner = self.inner.read().await;
        (
            inner.entities.values().cloned().collect(),
            inner.edges.values().cloned().collect(),
        )
    }

    /// Reload from a Store's persisted pages on startup (the Graph is a
    /// volatile projection; the Store is the durable source of truth).
    pub async fn reload_from_entities(&self, rows: Vec<(String, String, Vec<String>, Vec<String>, u64)>) {
        let mut inner = self.inner.write().await;
        *inner = Inner::default();
        for (entity_type, value, domains, urls, occurrence_count) in rows {
            let node_id = Entity::node_id(&entity_type, &value);
            let now = Utc::now();
            let entity = Entity {
                entity_type: entity_type.clone(),
                value: value.to_lowercase(),
                first_seen: now,
                last_seen: now,
                occurrence_count,
                source_domains: domains.into_iter().collect(),
                source_urls: urls.into_iter().collect(),
                risk_score: 0.0,
                tags: HashSet::new(),
                confidence: 0.5,
            };
            inner
                .type_index
                .entry(entity_type)
                .or_default()
                .insert(node_id.clone());
            for d in &entity.source_domains {
                inner.domain_index.entry(d.clone()).or_default().insert(node_id.clone());
            }
            inner.adjacency.entry(node_id.clone()).or_default();
            inner.entities.insert(node_id, entity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onionwatch_extractor::extract_entities;

    #[tokio::test]
    async fn add_entity_is_idempotent_case_insensitive() {
        let graph = EntityGraph::new();
        graph.add_entity("email", "Alice@Example.com", "a.onion", "http://a.onion/").await;
        graph.add_entity("email", "alice@example.com", "b.onion", "http://b.onion/").await;
        let node_id = Entity::node_id("email", "alice@example.com");
        let entity = graph.get_entity(&node_id).await.unwrap();
        assert_eq!(entity.occurrence_count, 2);
        assert_eq!(entity.source_domains.len(), 2);
    }

    #[tokio::test]
    async fn ingest_page_creates_co_occurrence_edge() {
        let graph = EntityGraph::new();
        let text = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq alice@example.com";
        let entities = extract_entities(text);
        let node_ids = graph.ingest_page(&entities, "a.onion", "http://a.onion/").await;
        assert_eq!(node_ids.len(), 2);
        let edge = graph.get_edge(&node_ids[0], &node_ids[1]).await.unwrap();
        assert_eq!(edge.occurrence_count, 1);
        assert!((edge.weight - 1.0).abs() < 1e-9);
        assert!(edge.evidence.contains(&"http://a.onion/".to_string()));
    }

    #[tokio::test]
    async fn edge_weight_increments_by_point_one_on_resighting() {
        let graph = EntityGraph::new();
        graph.add_edge("a", "b", "co-occurrence", "u1").await;
        graph.add_edge("a", "b", "co-occurrence", "u2").await;
        let edge = graph.get_edge("a", "b").await.unwrap();
        assert_eq!(edge.occurrence_count, 2);
        assert!((edge.weight - 1.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn edge_lookup_is_symmetric() {
        let graph = EntityGraph::new();
        graph.add_edge("a", "b", "co-occurrence", "u").await;
        assert!(graph.get_edge("a", "b").await.is_some());
        assert!(graph.get_edge("b", "a").await.is_some());
        assert!(graph.neighbors("a").await.contains("b"));
        assert!(graph.neighbors("b").await.contains("a"));
    }

    #[tokio::test]
    async fn cross_domain_filters_by_min_domains() {
        let graph = EntityGraph::new();
        graph.add_entity("email", "x@y.com", "d1.onion", "u1").await;
        graph.add_entity("email", "x@y.com", "d2.onion", "u2").await;
        let results = graph.cross_domain(2).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source_domains.len(), 2);
    }

    #[tokio::test]
    async fn clusters_drops_components_below_min_size() {
        let graph = EntityGraph::new();
        let a = graph.add_entity("username", "alice", "d", "u").await;
        let b = graph.add_entity("username", "bob", "d", "u").await;
        graph.add_edge(&a, &b, "co-occurrence", "").await;
        graph.add_entity("username", "lonely", "d", "u").await;
        let clusters = graph.clusters(None, 2).await;
        assert_eq!(clusters.len(), 1);
        assert!(clusters[0].contains(&a));
    }
}
