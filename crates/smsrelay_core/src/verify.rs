//! Queue chain verification.

use crate::log::ChainSnapshot;
use crate::notification::NotificationId;
use std::collections::HashSet;
use std::fmt;

/// One broken invariant found in a device's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainViolation {
    /// Empty length with set pointers, or the reverse.
    EmptinessMismatch,
    /// More entries than the queue allows.
    OverCapacity {
        /// Stored length.
        length: u64,
        /// Stored limit.
        max_length: u64,
    },
    /// A pointer names a node that isn't stored.
    MissingNode {
        /// The dangling id.
        id: NotificationId,
    },
    /// A node's back pointer disagrees with the forward walk.
    BrokenBackLink {
        /// Node whose `previous` is wrong.
        id: NotificationId,
        /// What it should be.
        expected: Option<NotificationId>,
        /// What it is.
        found: Option<NotificationId>,
    },
    /// A walk revisited a node.
    Cycle {
        /// First repeated id.
        id: NotificationId,
    },
    /// The forward walk from the oldest entry didn't end at the newest.
    WrongHead {
        /// Newest id per queue metadata.
        expected: Option<NotificationId>,
        /// Where the walk ended.
        found: Option<NotificationId>,
    },
    /// Walk length differs from the stored length.
    LengthMismatch {
        /// Stored length.
        stored: u64,
        /// Nodes walked.
        walked: u64,
    },
    /// The backward walk from the newest entry didn't end at the oldest.
    BackwardMismatch,
    /// A stored node of this device isn't in the chain.
    Orphan {
        /// Unreachable node.
        id: NotificationId,
    },
}

impl fmt::Display for ChainViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptinessMismatch => write!(f, "length and first/last pointers disagree on emptiness"),
            Self::OverCapacity { length, max_length } => {
                write!(f, "length {length} exceeds max length {max_length}")
            }
            Self::MissingNode { id } => write!(f, "pointer to missing node {id}"),
            Self::BrokenBackLink {
                id,
                expected,
                found,
            } => write!(
                f,
                "node {id} has previous {} but follows {}",
                display_opt(found),
                display_opt(expected)
            ),
            Self::Cycle { id } => write!(f, "cycle through node {id}"),
            Self::WrongHead { expected, found } => write!(
                f,
                "forward walk ended at {} instead of first {}",
                display_opt(found),
                display_opt(expected)
            ),
            Self::LengthMismatch { stored, walked } => {
                write!(f, "stored length {stored} but walked {walked} nodes")
            }
            Self::BackwardMismatch => write!(f, "backward walk does not mirror forward walk"),
            Self::Orphan { id } => write!(f, "node {id} is not reachable from the queue"),
        }
    }
}

fn display_opt(id: &Option<NotificationId>) -> &str {
    id.as_ref().map_or("<none>", NotificationId::as_str)
}

/// Outcome of checking one device's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    /// Device checked.
    pub device_id: String,
    /// Stored length.
    pub length: u64,
    /// Stored limit.
    pub max_length: u64,
    /// Ids in oldest-to-newest order as reached by the forward walk.
    pub order: Vec<NotificationId>,
    /// Problems found.
    pub violations: Vec<ChainViolation>,
}

impl ChainReport {
    /// A report for a device without a queue.
    #[must_use]
    pub fn empty(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            length: 0,
            max_length: 0,
            order: Vec::new(),
            violations: Vec::new(),
        }
    }

    /// Returns true if no invariant is broken.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Checks every linkage invariant of a queue snapshot.
#[must_use]
pub fn check_chain(snapshot: &ChainSnapshot) -> ChainReport {
    let info = &snapshot.info;
    let mut report = ChainReport {
        device_id: info.device_id.clone(),
        length: info.length,
        max_length: info.max_length,
        order: Vec::new(),
        violations: Vec::new(),
    };

    let empty_len = info.length == 0;
    let empty_ptrs = info.first_id.is_none() && info.last_id.is_none();
    let half_set = info.first_id.is_none() != info.last_id.is_none();
    if empty_len != empty_ptrs || half_set {
        report.violations.push(ChainViolation::EmptinessMismatch);
    }
    if info.length > info.max_length {
        report.violations.push(ChainViolation::OverCapacity {
            length: info.length,
            max_length: info.max_length,
        });
    }

    // Forward: last -> first via next.
    let mut seen = HashSet::new();
    let mut previous: Option<NotificationId> = None;
    let mut cursor = info.last_id.clone();
    while let Some(id) = cursor {
        if !seen.insert(id.clone()) {
            report.violations.push(ChainViolation::Cycle { id });
            break;
        }
        let Some(links) = snapshot.nodes.get(&id) else {
            report.violations.push(ChainViolation::MissingNode { id });
            break;
        };
        if links.previous != previous {
            report.violations.push(ChainViolation::BrokenBackLink {
                id: id.clone(),
                expected: previous.clone(),
                found: links.previous.clone(),
            });
        }
        report.order.push(id.clone());
        previous = Some(id);
        cursor = links.next.clone();
    }

    if previous != info.first_id {
        report.violations.push(ChainViolation::WrongHead {
            expected: info.first_id.clone(),
            found: previous,
        });
    }
    let walked = report.order.len() as u64;
    if walked != info.length {
        report.violations.push(ChainViolation::LengthMismatch {
            stored: info.length,
            walked,
        });
    }

    // Backward: first -> last via previous must mirror the forward walk.
    let mut backward = Vec::new();
    let mut cursor = info.first_id.clone();
    while let Some(id) = cursor {
        if backward.len() > snapshot.nodes.len() {
            break;
        }
        let Some(links) = snapshot.nodes.get(&id) else {
            break;
        };
        backward.push(id);
        cursor = links.previous.clone();
    }
    backward.reverse();
    if backward != report.order {
        report.violations.push(ChainViolation::BackwardMismatch);
    }

    let mut orphans: Vec<_> = snapshot
        .nodes
        .keys()
        .filter(|id| !seen.contains(*id))
        .cloned()
        .collect();
    orphans.sort();
    report
        .violations
        .extend(orphans.into_iter().map(|id| ChainViolation::Orphan { id }));

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{NodeLinks, QueueInfo};
    use std::collections::HashMap;

    fn id(s: &str) -> NotificationId {
        NotificationId::new(s)
    }

    fn link(prev: Option<&str>, next: Option<&str>) -> NodeLinks {
        NodeLinks {
            previous: prev.map(id),
            next: next.map(id),
        }
    }

    fn snapshot(first: Option<&str>, last: Option<&str>, length: u64, nodes: &[(&str, NodeLinks)]) -> ChainSnapshot {
        ChainSnapshot {
            info: QueueInfo {
                device_id: "dev".into(),
                first_id: first.map(id),
                last_id: last.map(id),
                length,
                max_length: 3,
            },
            nodes: nodes.iter().map(|(k, v)| (id(k), v.clone())).collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn healthy_chain() {
        let snap = snapshot(
            Some("c"),
            Some("a"),
            3,
            &[
                ("a", link(None, Some("b"))),
                ("b", link(Some("a"), Some("c"))),
                ("c", link(Some("b"), None)),
            ],
        );
        let report = check_chain(&snap);
        assert!(report.is_ok(), "{:?}", report.violations);
        assert_eq!(report.order, vec![id("a"), id("b"), id("c")]);
    }

    #[test]
    fn empty_queue_is_healthy() {
        let report = check_chain(&snapshot(None, None, 0, &[]));
        assert!(report.is_ok());
    }

    #[test]
    fn stale_back_link_on_tail() {
        let snap = snapshot(
            Some("c"),
            Some("b"),
            2,
            &[
                ("b", link(Some("a"), Some("c"))),
                ("c", link(Some("b"), None)),
            ],
        );
        let report = check_chain(&snap);
        assert!(report.violations.contains(&ChainViolation::BrokenBackLink {
            id: id("b"),
            expected: None,
            found: Some(id("a")),
        }));
    }

    #[test]
    fn dangling_pointer_and_orphan() {
        let snap = snapshot(
            Some("c"),
            Some("a"),
            3,
            &[
                ("a", link(None, Some("b"))),
                ("c", link(Some("b"), None)),
            ],
        );
        let report = check_chain(&snap);
        assert!(report
            .violations
            .contains(&ChainViolation::MissingNode { id: id("b") }));
        assert!(report
            .violations
            .contains(&ChainViolation::Orphan { id: id("c") }));
        assert!(report
            .violations
            .iter()
            .any(|v| matches!(v, ChainViolation::LengthMismatch { .. })));
    }

    #[test]
    fn cycle_is_detected() {
        let snap = snapshot(
            Some("b"),
            Some("a"),
            2,
            &[("a", link(None, Some("b"))), ("b", link(Some("a"), Some("a")))],
        );
        let report = check_chain(&snap);
        assert!(report
            .violations
            .contains(&ChainViolation::Cycle { id: id("a") }));
    }

    #[test]
    fn length_and_pointers_disagree() {
        let report = check_chain(&snapshot(None, None, 1, &[]));
        assert!(report
            .violations
            .contains(&ChainViolation::EmptinessMismatch));
        assert!(!report.violations[0].to_string().is_empty());
    }
}
