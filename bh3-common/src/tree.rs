//! Generic traversals over single-parent trees of owned children.
//!
//! Bones and bone tracks are both stored as plain `children: Vec<Self>`
//! trees; everything here works on any type exposing its child list.

use crate::error::{Error, Result};

/// A node that owns its children in order.
pub trait TreeNode: Sized {
    fn children(&self) -> &[Self];

    fn children_mut(&mut self) -> &mut Vec<Self>;

    /// Root, then each child subtree left to right.
    fn pre_order(&self) -> PreOrder<'_, Self> {
        PreOrder { stack: vec![self] }
    }

    /// Children right to left, each subtree fully before its root; the node comes last.
    fn post_order_rev(&self) -> Vec<&Self> {
        let mut out = Vec::new();
        collect_post_order_rev(self, &mut out, false);
        out
    }

    /// Same order as [`post_order_rev`](Self::post_order_rev) restricted to nodes with children.
    fn parents_post_order_rev(&self) -> Vec<&Self> {
        let mut out = Vec::new();
        collect_post_order_rev(self, &mut out, true);
        out
    }

    /// Visit every node that has children, bottom-up, children right to left.
    ///
    /// The callback may freely edit the child list of the node it receives:
    /// all of those children have already been visited.
    fn visit_parents_post_order_rev_mut<F: FnMut(&mut Self)>(&mut self, f: &mut F) {
        if self.children().is_empty() {
            return;
        }
        for child in self.children_mut().iter_mut().rev() {
            child.visit_parents_post_order_rev_mut(f);
        }
        f(self);
    }

    fn node_count(&self) -> usize {
        self.pre_order().count()
    }
}

/// Iterator returned by [`TreeNode::pre_order`].
pub struct PreOrder<'a, T> {
    stack: Vec<&'a T>,
}

impl<'a, T: TreeNode> Iterator for PreOrder<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().iter().rev());
        Some(node)
    }
}

fn collect_post_order_rev<'a, T: TreeNode>(node: &'a T, out: &mut Vec<&'a T>, parents_only: bool) {
    for child in node.children().iter().rev() {
        collect_post_order_rev(child, out, parents_only);
    }
    if !parents_only || !node.children().is_empty() {
        out.push(node);
    }
}

/// Walk two trees in lock-step pre-order; any differing child count is an error.
pub fn zip_exact<'a, 'b, A: TreeNode, B: TreeNode>(
    a: &'a A,
    b: &'b B,
) -> Result<Vec<(&'a A, &'b B)>> {
    let mut out = Vec::new();
    zip_exact_into(a, b, &mut out)?;
    Ok(out)
}

fn zip_exact_into<'a, 'b, A: TreeNode, B: TreeNode>(
    a: &'a A,
    b: &'b B,
    out: &mut Vec<(&'a A, &'b B)>,
) -> Result<()> {
    if a.children().len() != b.children().len() {
        return Err(Error::StructuralMismatch {
            node: out.len(),
            left: a.children().len(),
            right: b.children().len(),
        });
    }

    out.push((a, b));
    for (child_a, child_b) in a.children().iter().zip(b.children()) {
        zip_exact_into(child_a, child_b, out)?;
    }
    Ok(())
}

/// Walk `a` in pre-order pairing each node with its counterpart in `b`.
///
/// `b` may be absent, shallower or narrower; once a counterpart is missing,
/// the whole remaining subtree is paired with `None`. `a` is never extended.
pub fn zip_tolerant<'a, 'b, A: TreeNode, B: TreeNode>(
    a: &'a A,
    b: Option<&'b B>,
) -> Vec<(&'a A, Option<&'b B>)> {
    let mut out = Vec::new();
    zip_tolerant_into(a, b, &mut out);
    out
}

fn zip_tolerant_into<'a, 'b, A: TreeNode, B: TreeNode>(
    a: &'a A,
    b: Option<&'b B>,
    out: &mut Vec<(&'a A, Option<&'b B>)>,
) {
    out.push((a, b));
    for (i, child) in a.children().iter().enumerate() {
        let counterpart = b.and_then(|b| b.children().get(i));
        zip_tolerant_into(child, counterpart, out);
    }
}
