/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The view of a live document tree that the inspector relies on.

use core::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Identity of one node in the host's document tree. Stable for the lifetime of the node.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node{}", self.0)
    }
}

pub const ELEMENT_NODE: u16 = 1;
pub const ATTRIBUTE_NODE: u16 = 2;
pub const TEXT_NODE: u16 = 3;
pub const CDATA_SECTION_NODE: u16 = 4;
pub const PROCESSING_INSTRUCTION_NODE: u16 = 7;
pub const COMMENT_NODE: u16 = 8;
pub const DOCUMENT_NODE: u16 = 9;
pub const DOCUMENT_TYPE_NODE: u16 = 10;
pub const DOCUMENT_FRAGMENT_NODE: u16 = 11;

bitflags! {
    /// The node type filter of a tree walker, as in `NodeFilter.SHOW_*`.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct WhatToShow: u32 {
        const SHOW_ELEMENT = 0x1;
        const SHOW_ATTRIBUTE = 0x2;
        const SHOW_TEXT = 0x4;
        const SHOW_CDATA_SECTION = 0x8;
        const SHOW_PROCESSING_INSTRUCTION = 0x40;
        const SHOW_COMMENT = 0x80;
        const SHOW_DOCUMENT = 0x100;
        const SHOW_DOCUMENT_TYPE = 0x200;
        const SHOW_DOCUMENT_FRAGMENT = 0x400;
        const SHOW_ALL = 0xFFFF_FFFF;
    }
}

impl WhatToShow {
    /// Whether nodes of the given type pass this filter.
    pub fn shows(&self, node_type: u16) -> bool {
        if node_type == 0 || node_type > 32 {
            return false;
        }
        self.bits() & (1 << (node_type - 1)) != 0
    }
}

impl Default for WhatToShow {
    fn default() -> Self {
        WhatToShow::SHOW_ALL
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct AttrInfo {
    pub namespace: Option<String>,
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctypeInfo {
    pub name: String,
    pub public_id: String,
    pub system_id: String,
}

/// A snapshot of the properties of one node.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeInfo {
    pub node_type: u16,
    pub node_name: String,
    pub namespace_uri: Option<String>,
    pub node_value: Option<String>,
    /// The number of children in the real tree, whitespace text included.
    pub num_children: usize,
    pub attrs: Vec<AttrInfo>,
    pub doctype: Option<DoctypeInfo>,
}

impl NodeInfo {
    pub fn is_whitespace_text(&self) -> bool {
        self.node_type == TEXT_NODE &&
            self.node_value
                .as_deref()
                .is_some_and(|value| value.chars().all(char::is_whitespace))
    }
}

/// Which changes a mutation observer is notified about.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MutationObserverInit {
    pub attributes: bool,
    pub character_data: bool,
    pub child_list: bool,
    pub subtree: bool,
}

impl MutationObserverInit {
    pub fn everything() -> Self {
        MutationObserverInit {
            attributes: true,
            character_data: true,
            child_list: true,
            subtree: true,
        }
    }
}

/// One change observed in the tree. Values are not captured: observers read the
/// current state of the target when they handle the record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DomMutation {
    Attributes {
        target: NodeId,
        attribute_name: String,
        attribute_namespace: Option<String>,
    },
    CharacterData {
        target: NodeId,
    },
    ChildList {
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
}

impl DomMutation {
    pub fn target(&self) -> NodeId {
        match *self {
            DomMutation::Attributes { target, .. } |
            DomMutation::CharacterData { target } |
            DomMutation::ChildList { target, .. } => target,
        }
    }
}

pub type MutationCallback = Box<dyn Fn(Vec<DomMutation>) + Send + Sync>;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ObserverId(pub u64);

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SelectorError(pub String);

impl fmt::Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a valid selector", self.0)
    }
}

/// Read access to a live document tree, plus the few writes the inspector performs.
///
/// All methods answer for the current state of the tree. A `None` from any
/// navigation method means either a boundary or a node that no longer exists.
pub trait DocumentTree: Send + Sync {
    /// The top level document of the page.
    fn root_document(&self) -> NodeId;
    fn node_info(&self, node: NodeId) -> Option<NodeInfo>;
    fn parent_node(&self, node: NodeId) -> Option<NodeId>;
    fn first_child(&self, node: NodeId) -> Option<NodeId>;
    fn last_child(&self, node: NodeId) -> Option<NodeId>;
    fn next_sibling(&self, node: NodeId) -> Option<NodeId>;
    fn previous_sibling(&self, node: NodeId) -> Option<NodeId>;
    /// The document owning the node. Documents have no owner.
    fn owner_document(&self, node: NodeId) -> Option<NodeId>;
    fn document_element(&self, document: NodeId) -> Option<NodeId>;
    /// The document currently loaded in a frame element.
    fn content_document(&self, frame: NodeId) -> Option<NodeId>;
    /// The frame element embedding a subdocument.
    fn embedding_frame(&self, document: NodeId) -> Option<NodeId>;
    fn get_attribute(&self, node: NodeId, name: &str) -> Option<String>;
    fn query_selector(&self, base: NodeId, selector: &str)
    -> Result<Option<NodeId>, SelectorError>;
    fn query_selector_all(&self, base: NodeId, selector: &str)
    -> Result<Vec<NodeId>, SelectorError>;
    /// Replace the value of a text, comment or processing instruction node.
    fn set_node_value(&self, node: NodeId, value: &str) -> bool;
    /// Start observing changes below `target`. The callback may run on any thread.
    fn observe(
        &self,
        target: NodeId,
        options: MutationObserverInit,
        callback: MutationCallback,
    ) -> ObserverId;
    fn disconnect(&self, observer: ObserverId);
}
