use super::LinkGraph;
use std::collections::HashMap;

/// Probability of following a link rather than jumping
pub const DAMPING: f64 = 0.85;

/// Fixed number of propagation rounds
pub const ITERATIONS: usize = 10;

/// Computes link equity for every node, scaled so the best page scores 100
///
/// Each round applies `score(u) = (1 - d) + d * sum(score(v) / outdegree(v))`
/// over the pages `v` linking to `u`. Pages without outlinks pass nothing on:
/// their mass leaves the graph and is not redistributed, so raw values sum to
/// less than the page count.
pub fn compute_equity(graph: &LinkGraph) -> HashMap<String, f64> {
    let raw = propagate(graph, DAMPING, ITERATIONS);
    let max = raw.iter().copied().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return HashMap::new();
    }

    graph
        .nodes()
        .iter()
        .zip(raw)
        .map(|(url, score)| (url.clone(), score / max * 100.0))
        .collect()
}

fn propagate(graph: &LinkGraph, damping: f64, iterations: usize) -> Vec<f64> {
    let n = graph.len();
    let mut scores = vec![1.0; n];

    for _ in 0..iterations {
        let next: Vec<f64> = (0..n)
            .map(|node| {
                let inflow: f64 = graph
                    .inbound(node)
                    .iter()
                    .map(|&source| scores[source] / graph.outbound(source).len() as f64)
                    .sum();
                (1.0 - damping) + damping * inflow
            })
            .collect();
        scores = next;
    }

    scores
}
