use serde::{Deserialize, Serialize};

use cladohist_core::cogs::{RngCore, RngSampler, Tree};
use cladohist_core_bond::PositiveF64;

#[derive(thiserror::Error, displaydoc::Display, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// a tree needs at least one node
    Empty,
    /// {parents} parent entries were given for {ages} node ages
    LengthMismatch { parents: usize, ages: usize },
    /// node {node} has the out-of-range parent {parent}
    ParentOutOfRange { node: usize, parent: usize },
    /// the tree has no root
    NoRoot,
    /// both node {0} and node {1} are roots
    MultipleRoots(usize, usize),
    /// node {0} is not connected to the root
    Disconnected(usize),
    /// the tips must occupy the first node indices, but node {0} is an internal node
    TipsNotFirst(usize),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct TimeTreeNode {
    parent: Option<usize>,
    children: Vec<usize>,
    age: f64,
    sampled_ancestor: bool,
    taxon: Option<String>,
}

/// An arena-allocated, time-calibrated rooted tree in which the tips occupy
/// the first node indices.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeTree {
    nodes: Vec<TimeTreeNode>,
    root: usize,
    num_tips: usize,
}

impl TimeTree {
    /// Builds a tree from the parent of every node, where the root is the
    /// single node without a parent.
    ///
    /// # Errors
    ///
    /// Returns `TreeError` if the parents do not describe a single rooted
    /// tree with its tips indexed first.
    pub fn from_parents(parents: &[Option<usize>], ages: &[f64]) -> Result<Self, TreeError> {
        if parents.is_empty() {
            return Err(TreeError::Empty);
        }

        if parents.len() != ages.len() {
            return Err(TreeError::LengthMismatch {
                parents: parents.len(),
                ages: ages.len(),
            });
        }

        let mut nodes: Vec<TimeTreeNode> = parents
            .iter()
            .zip(ages)
            .map(|(parent, age)| TimeTreeNode {
                parent: *parent,
                children: Vec::new(),
                age: *age,
                sampled_ancestor: false,
                taxon: None,
            })
            .collect();

        let mut root = None;

        for (node, parent) in parents.iter().enumerate() {
            match (*parent, root) {
                (Some(parent), _) if parent >= parents.len() || parent == node => {
                    return Err(TreeError::ParentOutOfRange { node, parent });
                },
                (Some(parent), _) => nodes[parent].children.push(node),
                (None, Some(other)) => return Err(TreeError::MultipleRoots(other, node)),
                (None, None) => root = Some(node),
            }
        }

        let root = root.ok_or(TreeError::NoRoot)?;

        let num_tips = nodes.iter().filter(|node| node.children.is_empty()).count();

        if let Some(internal) = (0..num_tips).find(|node| !nodes[*node].children.is_empty()) {
            return Err(TreeError::TipsNotFirst(internal));
        }

        let tree = Self {
            nodes,
            root,
            num_tips,
        };

        let mut reached = vec![false; tree.num_nodes()];
        for node in tree.preorder() {
            reached[node] = true;
        }

        if let Some(node) = reached.iter().position(|reached| !reached) {
            return Err(TreeError::Disconnected(node));
        }

        Ok(tree)
    }

    /// Simulates a uniformly random labelled binary history over
    /// `num_tips` contemporaneous tips, with the internal ages drawn
    /// uniformly below `root_age`.
    #[must_use]
    #[debug_requires(num_tips > 0, "at least one tip")]
    #[debug_ensures(ret.num_tips() == num_tips)]
    pub fn simulate_random<G: RngCore>(
        rng: &mut G,
        num_tips: usize,
        root_age: PositiveF64,
    ) -> Self {
        let num_nodes = 2 * num_tips - 1;

        // Internal ages in increasing order, with the root as the oldest
        let mut internal_ages: Vec<f64> = (0..num_tips.saturating_sub(2))
            .map(|_| rng.sample_uniform_closed_open().get() * root_age.get())
            .collect();
        internal_ages.sort_by(f64::total_cmp);
        if num_tips > 1 {
            internal_ages.push(root_age.get());
        }

        let mut parents = vec![None; num_nodes];
        let mut ages = vec![0.0_f64; num_nodes];
        let mut lineages: Vec<usize> = (0..num_tips).collect();

        for (offset, age) in internal_ages.into_iter().enumerate() {
            let node = num_tips + offset;

            let left = lineages.swap_remove(rng.sample_index(lineages.len()));
            let right = lineages.swap_remove(rng.sample_index(lineages.len()));

            parents[left] = Some(node);
            parents[right] = Some(node);
            ages[node] = age;

            lineages.push(node);
        }

        let mut nodes: Vec<TimeTreeNode> = parents
            .iter()
            .zip(&ages)
            .map(|(parent, age)| TimeTreeNode {
                parent: *parent,
                children: Vec::new(),
                age: *age,
                sampled_ancestor: false,
                taxon: None,
            })
            .collect();

        for (node, parent) in parents.iter().enumerate() {
            if let Some(parent) = parent {
                nodes[*parent].children.push(node);
            }
        }

        Self {
            nodes,
            root: num_nodes - 1,
            num_tips,
        }
    }

    pub fn set_age(&mut self, node: usize, age: f64) {
        self.nodes[node].age = age;
    }

    pub fn set_sampled_ancestor(&mut self, node: usize, sampled_ancestor: bool) {
        self.nodes[node].sampled_ancestor = sampled_ancestor;
    }

    pub fn set_taxon(&mut self, node: usize, taxon: impl Into<String>) {
        self.nodes[node].taxon = Some(taxon.into());
    }

    #[must_use]
    pub fn taxon(&self, node: usize) -> Option<&str> {
        self.nodes[node].taxon.as_deref()
    }

    pub fn tips(&self) -> impl Iterator<Item = usize> {
        0..self.num_tips
    }
}

impl Tree for TimeTree {
    fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn num_tips(&self) -> usize {
        self.num_tips
    }

    fn root(&self) -> usize {
        self.root
    }

    fn parent(&self, node: usize) -> Option<usize> {
        self.nodes[node].parent
    }

    fn children(&self, node: usize) -> &[usize] {
        &self.nodes[node].children
    }

    fn age(&self, node: usize) -> f64 {
        self.nodes[node].age
    }

    fn is_sampled_ancestor(&self, node: usize) -> bool {
        self.nodes[node].sampled_ancestor
    }
}
