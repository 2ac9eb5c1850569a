//! Candidate ordering for scale decisions.
//!
//! Scale-up wakes the cheapest-to-run nodes first: lowest power envelope,
//! with benchmark scores breaking ties so that among equally frugal nodes
//! the fastest one wins. Scale-down is the mirror image: the most
//! power-hungry node is powered off first.

use std::cmp::Ordering;

use ironpool_state::Node;

/// Scale-up order: ascending power envelope, descending benchmark scores.
pub fn boot_order(a: &Node, b: &Node) -> Ordering {
    a.max_power_mw
        .cmp(&b.max_power_mw)
        .then(a.min_power_mw.cmp(&b.min_power_mw))
        .then(b.multi_thread_score.cmp(&a.multi_thread_score))
        .then(b.single_thread_score.cmp(&a.single_thread_score))
        // Stable final tie-break so repeated requests pick the same node.
        .then(a.id.cmp(&b.id))
}

/// Scale-down order: the reverse of `boot_order`.
pub fn shutdown_order(a: &Node, b: &Node) -> Ordering {
    boot_order(b, a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironpool_state::NodeRole;

    fn node(id: &str, max_mw: u32, min_mw: u32, multi: u32, single: u32) -> Node {
        Node {
            id: id.to_string(),
            name: id.to_string(),
            roles: vec![NodeRole::Worker],
            address: "10.0.0.1".to_string(),
            memory_bytes: 8 << 30,
            cpu_cores: 8,
            single_thread_score: single,
            multi_thread_score: multi,
            min_power_mw: min_mw,
            max_power_mw: max_mw,
            interfaces: Vec::new(),
            pool_id: Some("p1".to_string()),
            pool_assigned: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn boot_order_prefers_low_power_envelope() {
        let frugal = node("a", 20_000, 2_000, 4_000, 800);
        let hungry = node("b", 65_000, 5_000, 9_000, 1_500);

        let mut nodes = vec![hungry.clone(), frugal.clone()];
        nodes.sort_by(boot_order);
        assert_eq!(nodes[0].id, "a");

        // Shutdown picks the hungry node first.
        nodes.sort_by(shutdown_order);
        assert_eq!(nodes[0].id, "b");
    }

    #[test]
    fn boot_order_breaks_power_ties_on_scores() {
        let slow = node("a", 20_000, 2_000, 4_000, 800);
        let fast = node("b", 20_000, 2_000, 9_000, 800);

        let mut nodes = vec![slow, fast];
        nodes.sort_by(boot_order);
        assert_eq!(nodes[0].id, "b");
    }

    #[test]
    fn boot_order_is_deterministic_on_full_ties() {
        let first = node("a", 20_000, 2_000, 4_000, 800);
        let second = node("b", 20_000, 2_000, 4_000, 800);

        let mut nodes = vec![second, first];
        nodes.sort_by(boot_order);
        assert_eq!(nodes[0].id, "a");
    }
}
