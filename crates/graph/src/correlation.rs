use onionwatch_core::Entity;
use serde::{Deserialize, Serialize};

use crate::graph::EntityGraph;

/// Named thresholds from `correlation.py`'s `CorrelationEngine`, carried
/// forward as the concrete basis for the interpretation bands spec.md
/// §4.4 specifies and for the S5 scenario's `>= 0.95` assertion.
pub struct Thresholds;

impl Thresholds {
    pub const SAME_WALLET_MULTIPLE_DOMAINS: f64 = 0.99;
    pub const SAME_EMAIL_5PLUS_DOMAINS: f64 = 0.95;
    pub const SAME_USERNAME_MARKETPLACE_FORUM: f64 = 0.75;
    pub const SAME_IP_DOMAIN_CLUSTER: f64 = 0.80;
    pub const CO_OCCURRENCE_SAME_PAGE: f64 = 0.60;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub entity_a: String,
    pub entity_b: String,
    pub score: f64,
    pub confidence: f64,
    pub interpretation: String,
    pub relationship_type: String,
}

pub struct CorrelationEngine;

impl CorrelationEngine {
    /// Clamped sum of the four contributions spec.md §4.4 defines, scored
    /// against entity metadata plus the graph's own edge weight/neighbor
    /// sets.
    pub async fn correlate(graph: &EntityGraph, a: &Entity, b: &Entity) -> CorrelationResult {
        let node_a = Entity::node_id(&a.entity_type, &a.value);
        let node_b = Entity::node_id(&b.entity_type, &b.value);

        let common_domains = a.source_domains.intersection(&b.source_domains).count();
        let common_urls = a.source_urls.intersection(&b.source_urls).count();

        let edge = graph.get_edge(&node_a, &node_b).await;
        let edge_weight = edge.as_ref().map(|e| e.weight).unwrap_or(0.0);

        let neighbors_a = graph.neighbors(&node_a).await;
        let neighbors_b = graph.neighbors(&node_b).await;
        let common_neighbors = neighbors_a.intersection(&neighbors_b).count();

        let domain_score = (0.2 * common_domains as f64).min(0.6);
        let url_score = (0.3 * common_urls as f64).min(0.9);
        let edge_score = 0.2 * edge_weight;
        let neighbor_score = (0.1 * common_neighbors as f64).min(0.3);

        let score = (domain_score + url_score + edge_score + neighbor_score).min(1.0);

        let avg_occurrence = (a.occurrence_count + b.occurrence_count) as f64 / 2.0;
        let confidence = (0.5 + 0.1 * avg_occurrence).min(0.95);

        let relationship_type = if common_urls > 0 {
            "same_page"
        } else if common_domains > 0 {
            "same_domain"
        } else if edge.is_some() {
            "linked"
        } else {
            "co-occurrence"
        };

        CorrelationResult {
            entity_a: node_a,
            entity_b: node_b,
            score,
            confidence,
            interpretation: interpret(score),
            relationship_type: relationship_type.to_string(),
        }
    }

    /// Cross-domain wallet correlation plus the 5+-domain email special
    /// case (`correlation.py::find_high_risk_correlations`) — the concrete
    /// implementation behind S5's "score >= 0.95" scenario.
    pub async fn find_high_risk_correlations(graph: &EntityGraph, min_score: f64) -> Vec<CorrelationResult> {
        let mut results = Vec::new();

        let wallets = graph.get_entities_by_type("wallet-coin").await;
        let multi_domain_wallets: Vec<_> = wallets.into_iter().filter(|e| e.source_domains.len() >= 2).collect();
        for pair in pairs(&multi_domain_wallets) {
            let result = Self::correlate(graph, pair.0, pair.1).await;
            if result.score >= min_score || multi_domain(pair.0, pair.1) >= 2 {
                results.push(result);
            }
        }

        let emails = graph.cross_domain(5).await;
        for email in emails.iter().filter(|e| e.entity_type == "email") {
            results.push(CorrelationResult {
                entity_a: Entity::node_id(&email.entity_type, &email.value),
                entity_b: Entity::node_id(&email.entity_type, &email.value),
                score: Thresholds::SAME_EMAIL_5PLUS_DOMAINS,
                confidence: (0.5 + 0.1 * email.occurrence_count as f64).min(0.95),
                interpretation: interpret(Thresholds::SAME_EMAIL_5PLUS_DOMAINS),
                relationship_type: "same_email_5plus_domains".to_string(),
            });
        }

        results.retain(|r| r.score >= min_score);
        results
    }

    /// Per-entity dossier: connected entities to depth 2, each scored
    /// against the root, plus a cross-domain flag.
    pub async fn entity_profile(graph: &EntityGraph, entity: &Entity) -> Vec<CorrelationResult> {
        let node_id = Entity::node_id(&entity.entity_type, &entity.value);
        let connected = graph.connected(&node_id, None, 2).await;
        let mut out = Vec::new();
        for neighbor_id in connected {
            let Some(neighbor) = lookup_by_node_id(graph, &neighbor_id).await else {
                continue;
            };
            out.push(Self::correlate(graph, entity, &neighbor).await);
        }
        out
    }
}

async fn lookup_by_node_id(graph: &EntityGraph, node_id: &str) -> Option<Entity> {
    graph.get_entity(node_id).await
}

fn pairs<T>(items: &[T]) -> Vec<(&T, &T)> {
    let mut out = Vec::new();
    for i in 0..items.len() {
        for j in (i + 1)..items.len() {
            out.push((&items[i], &items[j]));
        }
    }
    out
}

fn multi_domain(a: &Entity, b: &Entity) -> usize {
    a.source_domains.union(&b.source_domains).count()
}

/// Interpretation bands: >= 0.9 CRITICAL, >= 0.7 HIGH, >= 0.4 MEDIUM,
/// >= 0.2 LOW, else none.
pub fn interpret(score: f64) -> String {
    if score >= 0.9 {
        "CRITICAL correlation".to_string()
    } else if score >= 0.7 {
        "HIGH correlation".to_string()
    } else if score >= 0.4 {
        "MEDIUM correlation".to_string()
    } else if score >= 0.2 {
        "LOW correlation".to_string()
    } else {
        "no significant correlation".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_page_entities_score_at_least_co_occurrence_band() {
        let graph = EntityGraph::new();
        let entities = onionwatch_extractor::extract_entities(
            "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq alice@example.com",
        );
        graph.ingest_page(&entities, "a.onion", "http://a.onion/").await;
        let a = graph.get_entities_by_type("wallet-coin").await.remove(0);
        let b = graph.get_entities_by_type("email").await.remove(0);
        let result = CorrelationEngine::correlate(&graph, &a, &b).await;
        assert_eq!(result.relationship_type, "same_page");
        assert!(result.score >= 0.0 && result.score <= 1.0);
        assert!(result.confidence >= 0.5 && result.confidence <= 0.95);
    }

    #[test]
    fn bands_match_spec_thresholds() {
        assert_eq!(interpret(0.95), "CRITICAL correlation");
        assert_eq!(interpret(0.75), "HIGH correlation");
        assert_eq!(interpret(0.45), "MEDIUM correlation");
        assert_eq!(interpret(0.25), "LOW correlation");
        assert_eq!(interpret(0.05), "no significant correlation");
    }

    #[tokio::test]
    async fn email_seen_on_five_domains_is_critical() {
        let graph = EntityGraph::new();
        for i in 0..5 {
            graph
                .add_entity("email", "x@y.com", &format!("d{i}.onion"), &format!("u{i}"))
                .await;
        }
        let results = CorrelationEngine::find_high_risk_correlations(&graph, 0.9).await;
        assert!(results.iter().any(|r| r.score >= 0.95 && r.interpretation.contains("CRITICAL")));
    }
}
