//! Consistent-hash ring.
//!
//! Node ids are placed on a circular 64-bit key space at a fixed number
//! of virtual points; a key is owned by the first node point at or after
//! its hash, wrapping around. The placement is deterministic for a given
//! node list, approximately balanced for uniformly distributed keys, and
//! minimally disruptive when membership changes.

use std::hash::Hasher;

use fnv::FnvHasher;

/// Virtual points placed per node.
const REPLICAS: usize = 160;

/// An immutable ring over a fixed set of node identifiers.
#[derive(Debug, Clone)]
pub struct HashRing {
    nodes: Vec<String>,
    /// (position, node index), sorted by position.
    points: Vec<(u64, usize)>,
}

impl HashRing {
    pub fn new(nodes: &[String]) -> Self {
        let nodes = nodes.to_vec();
        let mut points = Vec::with_capacity(nodes.len() * REPLICAS);
        for (idx, node) in nodes.iter().enumerate() {
            for replica in 0..REPLICAS {
                points.push((hash(&format!("{}-{}", node, replica)), idx));
            }
        }
        points.sort_unstable();
        Self { nodes, points }
    }

    /// The node responsible for the key; `None` only for an empty ring.
    pub fn node(&self, key: &str) -> Option<&str> {
        if self.points.is_empty() {
            return None;
        }
        let position = hash(key);
        let idx = self.points.partition_point(|&(point, _)| point < position);
        let (_, node_idx) = self.points[idx % self.points.len()];
        Some(&self.nodes[node_idx])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn hash(key: &str) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(key.as_bytes());
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn nodes(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn should_return_none_for_empty_ring() {
        let ring = HashRing::new(&[]);
        assert!(ring.node("anything").is_none());
    }

    #[test]
    fn should_route_keys_deterministically() {
        // given two rings built from the same node list
        let a = HashRing::new(&nodes(&["h1:9092", "h2:9092", "h3:9092"]));
        let b = HashRing::new(&nodes(&["h1:9092", "h2:9092", "h3:9092"]));

        // then every key routes identically
        for i in 0..500 {
            let key = format!("key-{}", i);
            assert_eq!(a.node(&key), b.node(&key));
        }
    }

    #[test]
    fn should_route_every_key_to_a_member() {
        let members = nodes(&["h1", "h2", "h3"]);
        let ring = HashRing::new(&members);

        for i in 0..500 {
            let node = ring.node(&format!("key-{}", i)).unwrap();
            assert!(members.iter().any(|m| m == node));
        }
    }

    #[test]
    fn should_spread_uniform_keys_across_members() {
        // given
        let ring = HashRing::new(&nodes(&["h1", "h2", "h3"]));

        // when
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for i in 0..3000 {
            *counts.entry(ring.node(&format!("key-{}", i)).unwrap()).or_default() += 1;
        }

        // then no member is starved or dominant
        for (&node, &count) in &counts {
            assert!(count > 300, "{} only owns {} of 3000 keys", node, count);
            assert!(count < 2000, "{} owns {} of 3000 keys", node, count);
        }
        assert_eq!(counts.len(), 3);
    }

    #[test]
    fn should_only_remap_keys_of_a_removed_node() {
        // given a ring and the same ring without one member
        let full = HashRing::new(&nodes(&["h1", "h2", "h3"]));
        let reduced = HashRing::new(&nodes(&["h1", "h2"]));

        // then keys not owned by the removed member stay put
        for i in 0..500 {
            let key = format!("key-{}", i);
            let owner = full.node(&key).unwrap();
            if owner != "h3" {
                assert_eq!(reduced.node(&key).unwrap(), owner);
            }
        }
    }

    #[test]
    fn should_route_empty_key() {
        let ring = HashRing::new(&nodes(&["h1", "h2"]));
        assert!(ring.node("").is_some());
        assert_eq!(ring.node(""), ring.node(""));
    }
}
