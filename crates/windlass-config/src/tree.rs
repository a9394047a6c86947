//! Window tree synthesis.
//!
//! Every window contributes its two boundary nodes; nodes whose boundary is
//! a pure identity reference merge into their referent, so shared
//! boundaries (`target.start = gap.end`) collapse to a single node. The
//! trigger is the root, and the result must be a tree in which every
//! surviving node is reachable from it.

use std::fmt;

use indexmap::IndexMap;

use windlass_core::{ConfigError, ConfigResult, CountBounds, KernelBounds, Reference, Side};

use crate::window::WindowConfig;

pub const TRIGGER_NODE: &str = "trigger";

/// One boundary node of the window tree. The bounds describe the edge from
/// this node's parent to this node; the constraints apply to the predicate
/// counts aggregated along that edge.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub name: String,
    pub bounds: KernelBounds,
    pub constraints: IndexMap<String, CountBounds>,
    pub children: Vec<TreeNode>,
}

/// The compiled window dependency tree, rooted at the trigger.
#[derive(Debug, Clone)]
pub struct WindowTree {
    pub roots: Vec<TreeNode>,
}

fn node_name(window: &str, side: Side) -> String {
    format!("{window}.{side}")
}

struct PendingNode {
    parent: String,
    bounds: Option<KernelBounds>,
    constraints: IndexMap<String, CountBounds>,
}

impl WindowTree {
    pub fn build(windows: &IndexMap<String, WindowConfig>) -> ConfigResult<Self> {
        let mut pending: IndexMap<String, PendingNode> = IndexMap::new();

        for (name, window) in windows {
            let anchor_side = window.anchor_side();
            let anchor_spec = window.boundary_spec(anchor_side);
            let parent = match anchor_spec.reference() {
                Some(Reference::Trigger) => TRIGGER_NODE.to_string(),
                Some(Reference::Window {
                    name: referenced,
                    side,
                }) => {
                    if !windows.contains_key(referenced) {
                        return Err(ConfigError::UnknownWindow {
                            name: referenced.clone(),
                            referenced_by: name.clone(),
                        });
                    }
                    node_name(referenced, *side)
                }
                None => {
                    return Err(ConfigError::InvalidBoundary {
                        boundary: "NULL".to_string(),
                        reason: format!("window '{name}' has no external anchor"),
                    })
                }
            };

            pending.insert(
                node_name(name, anchor_side),
                PendingNode {
                    parent,
                    bounds: window.anchor_bounds(),
                    constraints: IndexMap::new(),
                },
            );
            pending.insert(
                node_name(name, anchor_side.opposite()),
                PendingNode {
                    parent: node_name(name, anchor_side),
                    bounds: window.constrained_bounds(),
                    constraints: window.has.clone(),
                },
            );
        }

        // Identity nodes merge into their referent: the effective parent of
        // a surviving node is the nearest ancestor that carries bounds (or
        // the trigger). Chains longer than the node count mean a reference
        // cycle.
        let resolve = |start: &str| -> ConfigResult<String> {
            let mut current = start.to_string();
            for _ in 0..=pending.len() {
                if current == TRIGGER_NODE {
                    return Ok(current);
                }
                let node = pending.get(&current).ok_or_else(|| {
                    ConfigError::WindowReferenceCycle(current.clone())
                })?;
                if node.bounds.is_some() {
                    return Ok(current);
                }
                current = node.parent.clone();
            }
            Err(ConfigError::WindowReferenceCycle(start.to_string()))
        };

        let mut children_of: IndexMap<String, Vec<String>> = IndexMap::new();
        let mut live: IndexMap<String, (KernelBounds, IndexMap<String, CountBounds>)> =
            IndexMap::new();

        for (name, node) in &pending {
            let Some(bounds) = node.bounds.clone() else {
                continue;
            };
            let parent = resolve(&node.parent)?;
            children_of.entry(parent).or_default().push(name.clone());
            live.insert(name.clone(), (bounds, node.constraints.clone()));
        }

        fn assemble(
            name: &str,
            children_of: &IndexMap<String, Vec<String>>,
            live: &IndexMap<String, (KernelBounds, IndexMap<String, CountBounds>)>,
            depth: usize,
        ) -> ConfigResult<Vec<TreeNode>> {
            if depth > live.len() {
                return Err(ConfigError::WindowReferenceCycle(name.to_string()));
            }
            let mut nodes = Vec::new();
            for child in children_of.get(name).map(Vec::as_slice).unwrap_or(&[]) {
                let (bounds, constraints) = live
                    .get(child)
                    .cloned()
                    .ok_or_else(|| ConfigError::WindowReferenceCycle(child.clone()))?;
                nodes.push(TreeNode {
                    name: child.clone(),
                    bounds,
                    constraints,
                    children: assemble(child, children_of, live, depth + 1)?,
                });
            }
            Ok(nodes)
        }

        let tree = WindowTree {
            roots: assemble(TRIGGER_NODE, &children_of, &live, 0)?,
        };

        // Every surviving node must hang off the trigger.
        let reachable = tree.preorder_names();
        if reachable.len() != live.len() {
            let missing = live
                .keys()
                .find(|name| !reachable.iter().any(|n| &n == name))
                .cloned()
                .unwrap_or_default();
            return Err(ConfigError::WindowReferenceCycle(missing));
        }

        Ok(tree)
    }

    /// Node names in pre-order, excluding the trigger root. This is the
    /// column order of the result table.
    pub fn preorder_names(&self) -> Vec<String> {
        fn walk(node: &TreeNode, out: &mut Vec<String>) {
            out.push(node.name.clone());
            for child in &node.children {
                walk(child, out);
            }
        }
        let mut out = Vec::new();
        for root in &self.roots {
            walk(root, &mut out);
        }
        out
    }

}

impl fmt::Display for WindowTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn walk(
            f: &mut fmt::Formatter<'_>,
            node: &TreeNode,
            prefix: &str,
            last: bool,
        ) -> fmt::Result {
            let connector = if last { "└── " } else { "├── " };
            writeln!(f, "{prefix}{connector}{}", node.name)?;
            let child_prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
            for (i, child) in node.children.iter().enumerate() {
                walk(f, child, &child_prefix, i + 1 == node.children.len())?;
            }
            Ok(())
        }

        writeln!(f, "{TRIGGER_NODE}")?;
        for (i, root) in self.roots.iter().enumerate() {
            walk(f, root, "", i + 1 == self.roots.len())?;
        }
        Ok(())
    }
}
