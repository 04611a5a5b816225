/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Tree traversal for the inspector.
//!
//! [`DocumentWalker`] behaves like a DOM `TreeWalker` rooted at the document of
//! its current node, except that it descends into the documents loaded in frames
//! and climbs from a subdocument to the frame embedding it. Whitespace only text
//! nodes are always skipped.

use devtools_traits::dom::{DOCUMENT_NODE, DocumentTree, NodeId, WhatToShow};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum FilterResult {
    Accept,
    Skip,
}

/// The document owning a node, or the node itself when it is a document.
pub(crate) fn node_document(tree: &dyn DocumentTree, node: NodeId) -> Option<NodeId> {
    if let Some(document) = tree.owner_document(node) {
        return Some(document);
    }
    tree.node_info(node)
        .filter(|info| info.node_type == DOCUMENT_NODE)
        .map(|_| node)
}

/// A standard tree walker with a filter that skips whitespace text and the node
/// types not covered by `what_to_show`.
struct TreeWalker<'a> {
    tree: &'a dyn DocumentTree,
    root: NodeId,
    what_to_show: WhatToShow,
    current: NodeId,
}

impl TreeWalker<'_> {
    fn filter(&self, node: NodeId) -> FilterResult {
        match self.tree.node_info(node) {
            Some(info) if self.what_to_show.shows(info.node_type) && !info.is_whitespace_text() => {
                FilterResult::Accept
            },
            _ => FilterResult::Skip,
        }
    }

    fn parent_node(&mut self) -> Option<NodeId> {
        let mut node = self.current;
        while node != self.root {
            node = self.tree.parent_node(node)?;
            if self.filter(node) == FilterResult::Accept {
                self.current = node;
                return Some(node);
            }
        }
        None
    }

    fn first_child(&mut self) -> Option<NodeId> {
        self.traverse_children(true)
    }

    fn last_child(&mut self) -> Option<NodeId> {
        self.traverse_children(false)
    }

    fn next_sibling(&mut self) -> Option<NodeId> {
        self.traverse_siblings(true)
    }

    fn previous_sibling(&mut self) -> Option<NodeId> {
        self.traverse_siblings(false)
    }

    fn child(&self, node: NodeId, first: bool) -> Option<NodeId> {
        if first {
            self.tree.first_child(node)
        } else {
            self.tree.last_child(node)
        }
    }

    fn sibling(&self, node: NodeId, next: bool) -> Option<NodeId> {
        if next {
            self.tree.next_sibling(node)
        } else {
            self.tree.previous_sibling(node)
        }
    }

    /// <https://dom.spec.whatwg.org/#concept-traverse-children>
    fn traverse_children(&mut self, first: bool) -> Option<NodeId> {
        let mut node = self.child(self.current, first)?;
        loop {
            if self.filter(node) == FilterResult::Accept {
                self.current = node;
                return Some(node);
            }
            // Skipped nodes still have their children considered.
            if let Some(child) = self.child(node, first) {
                node = child;
                continue;
            }
            loop {
                if let Some(sibling) = self.sibling(node, first) {
                    node = sibling;
                    break;
                }
                let parent = self.tree.parent_node(node)?;
                if parent == self.root || parent == self.current {
                    return None;
                }
                node = parent;
            }
        }
    }

    /// <https://dom.spec.whatwg.org/#concept-traverse-siblings>
    fn traverse_siblings(&mut self, next: bool) -> Option<NodeId> {
        let mut node = self.current;
        if node == self.root {
            return None;
        }
        loop {
            let mut sibling = self.sibling(node, next);
            while let Some(candidate) = sibling {
                node = candidate;
                if self.filter(node) == FilterResult::Accept {
                    self.current = node;
                    return Some(node);
                }
                sibling = if next {
                    self.tree.first_child(node)
                } else {
                    self.tree.last_child(node)
                };
                if sibling.is_none() {
                    sibling = self.sibling(node, next);
                }
            }
            node = self.tree.parent_node(node)?;
            if node == self.root || self.filter(node) == FilterResult::Accept {
                return None;
            }
        }
    }
}

/// A tree walker that crosses document boundaries at frames.
pub(crate) struct DocumentWalker<'a> {
    walker: TreeWalker<'a>,
}

impl<'a> DocumentWalker<'a> {
    pub fn new(tree: &'a dyn DocumentTree, node: NodeId, what_to_show: WhatToShow) -> Self {
        DocumentWalker {
            walker: TreeWalker {
                tree,
                root: node_document(tree, node).unwrap_or(node),
                what_to_show,
                current: node,
            },
        }
    }

    pub fn current_node(&self) -> NodeId {
        self.walker.current
    }

    /// Continue the walk in the document of `node`.
    fn reparent_walker(&mut self, node: NodeId) -> NodeId {
        let tree = self.walker.tree;
        self.walker.root = node_document(tree, node).unwrap_or(node);
        self.walker.current = node;
        node
    }

    pub fn parent_node(&mut self) -> Option<NodeId> {
        let current = self.walker.current;
        if let Some(parent) = self.walker.parent_node() {
            return Some(parent);
        }
        let tree = self.walker.tree;
        let is_document = tree
            .node_info(current)
            .is_some_and(|info| info.node_type == DOCUMENT_NODE);
        if !is_document {
            return None;
        }
        let frame = tree.embedding_frame(current)?;
        Some(self.reparent_walker(frame))
    }

    pub fn first_child(&mut self) -> Option<NodeId> {
        if let Some(document) = self.walker.tree.content_document(self.walker.current) {
            return Some(self.reparent_walker(document));
        }
        self.walker.first_child()
    }

    pub fn last_child(&mut self) -> Option<NodeId> {
        if let Some(document) = self.walker.tree.content_document(self.walker.current) {
            return Some(self.reparent_walker(document));
        }
        self.walker.last_child()
    }

    pub fn next_sibling(&mut self) -> Option<NodeId> {
        self.walker.next_sibling()
    }

    pub fn previous_sibling(&mut self) -> Option<NodeId> {
        self.walker.previous_sibling()
    }
}
