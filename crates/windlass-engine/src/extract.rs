//! Recursive window-tree extraction.
//!
//! Walks the tree depth-first. Each edge aggregates predicate counts from
//! the parent boundary to the child boundary, filters by the child's
//! constraints, and recurses with the surviving child anchors; on return
//! the child realizations are joined back to this level's anchors, and
//! sibling branches intersect (a realization survives only if every branch
//! succeeds).

use chrono::Duration;
use rustc_hash::FxHashMap;
use tracing::debug;

use windlass_config::{TreeNode, WindowTree};
use windlass_core::KernelBounds;

use crate::aggregate::{aggregate_event_bound, aggregate_temporal, Anchor, WindowAggregate};
use crate::constraints::filter_constraints;
use crate::error::EngineResult;
use crate::frame::PredicateFrame;

/// The resolved boundaries and predicate counts of one window edge.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSnapshot {
    pub start: chrono::DateTime<chrono::Utc>,
    pub end: chrono::DateTime<chrono::Utc>,
    /// Counts in frame column order.
    pub counts: Vec<i64>,
}

/// One complete assignment of timestamps to every tree node for one
/// subject, keyed by the trigger anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct Realization {
    pub anchor: Anchor,
    /// Window snapshots by tree-node name.
    pub windows: FxHashMap<String, WindowSnapshot>,
}

/// Extract every realization of the window tree over the given trigger
/// anchors.
pub fn extract_tree(
    tree: &WindowTree,
    frame: &PredicateFrame,
    trigger_anchors: Vec<Anchor>,
) -> EngineResult<Vec<Realization>> {
    let realizations = extract_subtree(&tree.roots, &trigger_anchors, frame, Duration::zero())?;
    let mut rows: Vec<Realization> = realizations.into_values().collect();
    rows.sort_by_key(|realization| realization.anchor);
    Ok(rows)
}

fn snapshot_of(aggregate: &WindowAggregate) -> WindowSnapshot {
    WindowSnapshot {
        start: aggregate.window_start,
        end: aggregate.window_end,
        counts: aggregate.counts.clone(),
    }
}

/// Recursive step: realize every child branch for the given subtree
/// anchors. `offset` is the fixed temporal shift between each anchor row
/// and the subtree root boundary, accumulated along chains of temporal
/// edges.
fn extract_subtree(
    children: &[TreeNode],
    anchors: &[Anchor],
    frame: &PredicateFrame,
    offset: Duration,
) -> EngineResult<FxHashMap<Anchor, Realization>> {
    if children.is_empty() || anchors.is_empty() {
        return Ok(anchors
            .iter()
            .map(|anchor| {
                (
                    *anchor,
                    Realization {
                        anchor: *anchor,
                        windows: FxHashMap::default(),
                    },
                )
            })
            .collect());
    }

    let mut joined: Option<FxHashMap<Anchor, Realization>> = None;

    for child in children {
        debug!("summarizing subtree rooted at '{}'", child.name);

        // Step 1: aggregate the edge from the subtree root to this child.
        // Temporal edges keep the anchor row and push the accumulated
        // offset further; event-bound edges land on a real row, which
        // becomes the new anchor with no residual offset.
        let (aggregates, child_offset, event_bound) = match &child.bounds {
            KernelBounds::Temporal(bounds) => {
                let shifted = bounds.shifted(offset);
                let aggregates = aggregate_temporal(frame, &shifted, anchors);
                (aggregates, offset + bounds.window_size, false)
            }
            KernelBounds::Event(bounds) => {
                let shifted = bounds.shifted(offset);
                let aggregates = aggregate_event_bound(frame, &shifted, anchors);
                (aggregates, Duration::zero(), true)
            }
        };

        // Step 2: drop candidates violating the child's count constraints.
        let aggregates = filter_constraints(&child.name, &child.constraints, frame, aggregates)?;

        // Step 3: the child subtree anchors at the far boundary of this
        // edge for event-bound windows, at the same row for temporal ones.
        let child_anchor = |aggregate: &WindowAggregate| -> Anchor {
            if event_bound {
                Anchor {
                    subject_id: aggregate.anchor.subject_id,
                    timestamp: aggregate.window_end,
                }
            } else {
                aggregate.anchor
            }
        };
        let mut child_anchors: Vec<Anchor> = aggregates.iter().map(&child_anchor).collect();
        child_anchors.sort();
        child_anchors.dedup();

        // Step 4: recurse.
        let descendants = extract_subtree(&child.children, &child_anchors, frame, child_offset)?;

        // Step 5: join the recursive result back onto this level's anchors
        // and attach this edge's snapshot.
        let mut branch: FxHashMap<Anchor, Realization> = FxHashMap::default();
        for aggregate in &aggregates {
            let Some(descendant) = descendants.get(&child_anchor(aggregate)) else {
                continue;
            };
            let mut windows = descendant.windows.clone();
            windows.insert(child.name.clone(), snapshot_of(aggregate));
            branch.insert(
                aggregate.anchor,
                Realization {
                    anchor: aggregate.anchor,
                    windows,
                },
            );
        }

        // Step 6: intersect with sibling branches; every branch must
        // realize for an anchor to survive.
        joined = Some(match joined {
            None => branch,
            Some(mut accumulated) => {
                accumulated.retain(|anchor, _| branch.contains_key(anchor));
                for (anchor, realization) in accumulated.iter_mut() {
                    if let Some(other) = branch.get(anchor) {
                        realization.windows.extend(
                            other
                                .windows
                                .iter()
                                .map(|(name, snapshot)| (name.clone(), snapshot.clone())),
                        );
                    }
                }
                accumulated
            }
        });
    }

    Ok(joined.unwrap_or_default())
}
