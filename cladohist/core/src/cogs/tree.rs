/// A rooted, time-calibrated tree with nodes indexed by `0..num_nodes()`.
///
/// Every node except the root owns the branch above it, so branch indices
/// and node indices coincide.
pub trait Tree: core::fmt::Debug {
    #[must_use]
    fn num_nodes(&self) -> usize;

    #[must_use]
    fn num_tips(&self) -> usize;

    #[must_use]
    fn root(&self) -> usize;

    #[must_use]
    fn parent(&self, node: usize) -> Option<usize>;

    #[must_use]
    fn children(&self, node: usize) -> &[usize];

    /// Age of the node before the present.
    #[must_use]
    fn age(&self, node: usize) -> f64;

    #[must_use]
    fn is_sampled_ancestor(&self, _node: usize) -> bool {
        false
    }

    /// Length of the branch above `node`, which is zero for the root. The
    /// length can be negative for an invalid tree.
    #[must_use]
    fn branch_length(&self, node: usize) -> f64 {
        self.parent(node)
            .map_or(0.0_f64, |parent| self.age(parent) - self.age(node))
    }

    #[must_use]
    fn is_tip(&self, node: usize) -> bool {
        self.children(node).is_empty()
    }

    #[must_use]
    fn is_root(&self, node: usize) -> bool {
        self.parent(node).is_none()
    }

    /// Nodes ordered such that all children precede their parent.
    #[must_use]
    fn postorder(&self) -> Vec<usize> {
        let mut order = self.preorder();
        order.reverse();
        order
    }

    /// Nodes ordered such that every parent precedes its children.
    #[must_use]
    fn preorder(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.num_nodes());
        let mut stack = vec![self.root()];

        while let Some(node) = stack.pop() {
            order.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }

        order
    }
}
