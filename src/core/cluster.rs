use crate::core::hash::EntryId;
use crate::core::signature::{combined_distance, SignatureIndex};

/// Result of one clustering pass: groups of mutually similar entries plus
/// everything that ended up alone. Both sides preserve the input listing
/// order. A roster is a derived, transient view and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClusterRoster {
    /// Groups of size >= 2, each led by its anchor entry.
    pub clusters: Vec<Vec<EntryId>>,
    /// Entries that joined no group, including entries without a signature.
    pub ungrouped: Vec<EntryId>,
}

impl ClusterRoster {
    pub fn grouped_count(&self) -> usize {
        self.clusters.iter().map(|c| c.len()).sum()
    }
}

/// Partition `order` into clusters of visually similar entries.
///
/// Grouping is anchor-first and single-hop: walking the list in order, each
/// not-yet-grouped entry anchors a cluster of every *later* not-yet-grouped
/// entry whose combined distance to the anchor is within `threshold`.
/// Members join on their link to the anchor alone; no transitive closure
/// through intermediate members, and a grouped entry is never reconsidered
/// as anchor or candidate. Entries without a signature are never compared.
///
/// Output is fully determined by the input order, the signatures, and the
/// threshold.
pub fn cluster(order: &[EntryId], signatures: &SignatureIndex, threshold: u32) -> ClusterRoster {
    let mut assigned = vec![false; order.len()];
    let mut roster = ClusterRoster::default();

    for i in 0..order.len() {
        if assigned[i] {
            continue;
        }
        let Some(anchor_sig) = signatures.signature_of(&order[i]) else {
            continue;
        };

        let mut members = vec![i];
        for j in (i + 1)..order.len() {
            if assigned[j] {
                continue;
            }
            let Some(candidate_sig) = signatures.signature_of(&order[j]) else {
                continue;
            };
            if combined_distance(anchor_sig, candidate_sig) <= threshold {
                members.push(j);
            }
        }

        if members.len() > 1 {
            for &m in &members {
                assigned[m] = true;
            }
            roster
                .clusters
                .push(members.into_iter().map(|m| order[m].clone()).collect());
        }
    }

    roster.ungrouped = order
        .iter()
        .enumerate()
        .filter(|(i, _)| !assigned[*i])
        .map(|(_, id)| id.clone())
        .collect();

    roster
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::signature::Signature;
    use image_hasher::ImageHash;

    fn hash_from(bytes: [u8; 8]) -> ImageHash {
        ImageHash::from_bytes(&bytes).unwrap()
    }

    fn sig(structural: [u8; 8]) -> Signature {
        Signature {
            structural: hash_from(structural),
            intensity: hash_from([0; 8]),
        }
    }

    fn id(name: &str) -> EntryId {
        EntryId::from_hex(name)
    }

    fn index_of(entries: &[(EntryId, Option<Signature>)]) -> SignatureIndex {
        let mut index = SignatureIndex::new();
        for (entry_id, signature) in entries {
            index.insert(entry_id.clone(), signature.clone());
        }
        index
    }

    #[test]
    fn test_anchor_first_single_hop() {
        // dist(a,b) = 5, dist(a,c) = 10, dist(b,c) = 15
        let a = sig([0; 8]);
        let b = sig([0b0001_1111, 0, 0, 0, 0, 0, 0, 0]);
        let c = sig([0, 0xFF, 0b11, 0, 0, 0, 0, 0]);

        let order = [id("a"), id("b"), id("c")];
        let index = index_of(&[
            (id("a"), Some(a)),
            (id("b"), Some(b)),
            (id("c"), Some(c)),
        ]);

        // b and c are not linked to each other, but both link to anchor a:
        // one cluster, not two.
        let roster = cluster(&order, &index, 10);
        assert_eq!(roster.clusters, vec![vec![id("a"), id("b"), id("c")]]);
        assert!(roster.ungrouped.is_empty());
    }

    #[test]
    fn test_grouped_entry_never_reanchors() {
        // b links to a; d links to b but not to a. With b consumed by a's
        // cluster, d must stay ungrouped.
        let a = sig([0; 8]);
        let b = sig([0b0011, 0, 0, 0, 0, 0, 0, 0]);
        let d = sig([0b0011, 0b0011, 0, 0, 0, 0, 0, 0]);

        let order = [id("a"), id("b"), id("d")];
        let index = index_of(&[
            (id("a"), Some(a)),
            (id("b"), Some(b)),
            (id("d"), Some(d)),
        ]);

        let roster = cluster(&order, &index, 2);
        assert_eq!(roster.clusters, vec![vec![id("a"), id("b")]]);
        assert_eq!(roster.ungrouped, vec![id("d")]);
    }

    #[test]
    fn test_unsigned_entries_stay_ungrouped() {
        let a = sig([0; 8]);
        let order = [id("a"), id("broken"), id("b")];
        let index = index_of(&[
            (id("a"), Some(a.clone())),
            (id("broken"), None),
            (id("b"), Some(a)),
        ]);

        let roster = cluster(&order, &index, 0);
        assert_eq!(roster.clusters, vec![vec![id("a"), id("b")]]);
        assert_eq!(roster.ungrouped, vec![id("broken")]);
    }

    #[test]
    fn test_singletons_surface_as_ungrouped_in_order() {
        let far_apart = [
            (id("x"), Some(sig([0x00; 8]))),
            (id("y"), Some(sig([0xFF; 8]))),
        ];
        let order = [id("x"), id("y")];
        let roster = cluster(&order, &index_of(&far_apart), 3);

        assert!(roster.clusters.is_empty());
        assert_eq!(roster.ungrouped, vec![id("x"), id("y")]);
    }

    #[test]
    fn test_clustering_is_deterministic() {
        let entries = [
            (id("a"), Some(sig([0; 8]))),
            (id("b"), Some(sig([1, 0, 0, 0, 0, 0, 0, 0]))),
            (id("c"), Some(sig([0xF0, 0x0F, 0, 0, 0, 0, 0, 0]))),
            (id("d"), None),
        ];
        let order = [id("a"), id("b"), id("c"), id("d")];
        let index = index_of(&entries);

        let first = cluster(&order, &index, 8);
        let second = cluster(&order, &index, 8);
        assert_eq!(first, second);
    }
}
