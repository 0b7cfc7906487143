//! # Route Graph Builder
//!
//! Reconstructs the token-to-token hop graph described by a raw quote and
//! enumerates every acyclic path from a source token to a destination token.
//!
//! ## Overview
//!
//! The builder is a pure function of its inputs:
//!
//! 1. Build an adjacency map from the edge list, preserving the edge order the
//!    quoting source returned (deterministic DFS visit order). Pools are
//!    tradable in both directions, so adjacency is undirected.
//! 2. Depth-first search with backtracking from source to destination,
//!    recording each complete path; a token never repeats within a path.
//! 3. Resolve the concrete [`PoolEdge`] for every consecutive token pair by
//!    exact directed lookup. A walkable pair the quote never priced in that
//!    direction drops that path only (fail soft); sibling paths still proceed.
//!
//! An empty result is a valid non-error outcome ("no route"), never a failure.
//! Complexity is combinatorial in the branching factor, which is acceptable
//! because a quoting source returns at most a few dozen edges.

use crate::pools::PoolEdge;
use crate::tokens::Token;
use log::warn;
use std::collections::{HashMap, HashSet};

/// An ordered, acyclic sequence of tokens with the pool edges connecting them.
///
/// Invariant: `tokens.len() == edges.len() + 1` and no token repeats.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePath {
    pub tokens: Vec<Token>,
    pub edges: Vec<PoolEdge>,
}

impl RoutePath {
    /// First token of the path (the input side).
    pub fn input(&self) -> &Token {
        &self.tokens[0]
    }

    /// Last token of the path (the output side).
    pub fn output(&self) -> &Token {
        &self.tokens[self.tokens.len() - 1]
    }

    pub fn hop_count(&self) -> usize {
        self.edges.len()
    }
}

/// Enumerates all acyclic routes from `source` to `destination` over `edges`.
///
/// `tokens` is the node set the quote declared; edges referencing tokens
/// outside it still route (the adjacency map is derived solely from `edges`),
/// the node list exists so callers can pass the quote through unmodified.
pub fn build_paths(
    tokens: &[Token],
    edges: &[PoolEdge],
    source: &Token,
    destination: &Token,
) -> Vec<RoutePath> {
    let _ = tokens;
    if edges.is_empty() || source == destination {
        return Vec::new();
    }

    // Adjacency in first-seen edge order keeps DFS deterministic. Both
    // directions are reachable; the resolver below enforces direction.
    let mut adjacency: HashMap<&Token, Vec<&Token>> = HashMap::new();
    for edge in edges {
        for (from, to) in [
            (&edge.token_in, &edge.token_out),
            (&edge.token_out, &edge.token_in),
        ] {
            let neighbors = adjacency.entry(from).or_default();
            if !neighbors.contains(&to) {
                neighbors.push(to);
            }
        }
    }

    let mut token_paths: Vec<Vec<Token>> = Vec::new();
    let mut discovered: HashSet<&Token> = HashSet::new();
    let mut stack: Vec<&Token> = Vec::new();
    dfs(
        source,
        destination,
        &adjacency,
        &mut discovered,
        &mut stack,
        &mut token_paths,
    );

    token_paths
        .into_iter()
        .filter_map(|path| resolve_edges(path, edges))
        .collect()
}

/// Recursive DFS with backtracking. `discovered` and `stack` are local to one
/// `build_paths` call; popping and un-marking on return lets a token be
/// reached again via a different path.
fn dfs<'a>(
    current: &'a Token,
    destination: &Token,
    adjacency: &HashMap<&'a Token, Vec<&'a Token>>,
    discovered: &mut HashSet<&'a Token>,
    stack: &mut Vec<&'a Token>,
    out: &mut Vec<Vec<Token>>,
) {
    discovered.insert(current);
    stack.push(current);

    if current == destination {
        out.push(stack.iter().map(|t| (*t).clone()).collect());
    } else if let Some(neighbors) = adjacency.get(current) {
        for next in neighbors {
            if !discovered.contains(next) {
                dfs(next, destination, adjacency, discovered, stack, out);
            }
        }
    }

    stack.pop();
    discovered.remove(current);
}

/// Resolves the pool edge for every consecutive token pair by exact directed
/// lookup. Returns `None` (path dropped) when any pair has no matching edge.
fn resolve_edges(tokens: Vec<Token>, edges: &[PoolEdge]) -> Option<RoutePath> {
    let mut resolved = Vec::with_capacity(tokens.len().saturating_sub(1));
    for pair in tokens.windows(2) {
        match edges.iter().find(|e| e.connects(&pair[0], &pair[1])) {
            Some(edge) => resolved.push(edge.clone()),
            None => {
                warn!(
                    "dropping inconsistent path: no edge {} -> {}",
                    pair[0], pair[1]
                );
                return None;
            }
        }
    }
    Some(RoutePath {
        tokens,
        edges: resolved,
    })
}
