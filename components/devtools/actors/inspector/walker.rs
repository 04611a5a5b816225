/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The walker actor is the client's view of the debuggee's document tree. It hands
//! out node actors on demand and makes sure the client always knows the parent of
//! every node it receives.
//!
//! Liberally derived from the [Firefox JS implementation](http://mxr.mozilla.org/mozilla-central/source/toolkit/devtools/server/actors/inspector.js).

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use devtools_traits::dom::{
    DOCUMENT_NODE, DocumentTree, DomMutation, MutationObserverInit, NodeId, WhatToShow,
};
use log::{debug, warn};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::EmptyReplyMsg;
use crate::actor::{Actor, ActorEncode, ActorError, ActorRegistry};
use crate::actors::inspector::document_walker::{DocumentWalker, node_document};
use crate::actors::inspector::node::{NodeActor, NodeActorMsg, summarize_value};
use crate::actors::inspector::node_list::{NodeListActor, NodeListActorMsg};
use crate::connection::ConnectionEvent;
use crate::protocol::ClientRequest;
use crate::schema::{
    ActorSchema, DOMNODE, DictType, EventSchema, NODE_ARRAY, NULLABLE_NUMBER, ProtocolType, arg,
    field, method, option, release_method,
};

/// A mutation record. Nodes are named by actor ID, never sent as forms, so
/// the client resolves them against the fronts it already holds.
pub(crate) static DOMMUTATION: DictType = DictType {
    name: "dommutation",
    fields: &[
        field("type", ProtocolType::String),
        field("target", DOMNODE),
        field("added", NODE_ARRAY),
        field("removed", NODE_ARRAY),
    ],
};

pub(crate) static WALKER_SCHEMA: ActorSchema = ActorSchema {
    type_name: "domwalker",
    methods: &[
        method("document", &[option("node", DOMNODE)], &[field("node", DOMNODE)]),
        method(
            "documentElement",
            &[option("node", DOMNODE)],
            &[field("node", DOMNODE)],
        ),
        method(
            "parents",
            &[arg("node", DOMNODE), option("sameDocument", ProtocolType::Boolean)],
            &[field("nodes", NODE_ARRAY)],
        ),
        method(
            "children",
            &[
                arg("node", DOMNODE),
                option("maxNodes", NULLABLE_NUMBER),
                option("center", DOMNODE),
                option("start", DOMNODE),
                option("whatToShow", ProtocolType::Number),
            ],
            &[
                field("hasFirst", ProtocolType::Boolean),
                field("hasLast", ProtocolType::Boolean),
                field("nodes", NODE_ARRAY),
            ],
        ),
        method(
            "siblings",
            &[
                arg("node", DOMNODE),
                option("maxNodes", NULLABLE_NUMBER),
                option("center", DOMNODE),
                option("start", DOMNODE),
                option("whatToShow", ProtocolType::Number),
            ],
            &[
                field("hasFirst", ProtocolType::Boolean),
                field("hasLast", ProtocolType::Boolean),
                field("nodes", NODE_ARRAY),
            ],
        ),
        method(
            "nextSibling",
            &[arg("node", DOMNODE), option("whatToShow", ProtocolType::Number)],
            &[field("node", DOMNODE)],
        ),
        method(
            "previousSibling",
            &[arg("node", DOMNODE), option("whatToShow", ProtocolType::Number)],
            &[field("node", DOMNODE)],
        ),
        method(
            "querySelector",
            &[arg("node", DOMNODE), arg("selector", ProtocolType::String)],
            &[field("node", DOMNODE), field("newNodes", NODE_ARRAY)],
        ),
        method(
            "querySelectorAll",
            &[arg("node", DOMNODE), arg("selector", ProtocolType::String)],
            &[field("list", ProtocolType::Actor("domnodelist"))],
        ),
        method("releaseNode", &[arg("node", DOMNODE)], &[]),
        method(
            "getMutations",
            &[option("cleanup", ProtocolType::Boolean)],
            &[field(
                "mutations",
                ProtocolType::Array(&ProtocolType::Dict(&DOMMUTATION)),
            )],
        ),
        release_method("release"),
    ],
    events: &[EventSchema {
        name: "newMutations",
        fields: &[],
    }],
};

/// One change to the tree, in terms of the node actors the client knows.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MutationMsg {
    #[serde(rename_all = "camelCase")]
    Attributes {
        target: String,
        attribute_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attribute_namespace: Option<String>,
        new_value: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    CharacterData {
        target: String,
        new_value: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        incomplete_value: bool,
    },
    /// `added` and `removed` only name nodes the client has already seen.
    #[serde(rename_all = "camelCase")]
    ChildList {
        target: String,
        added: Vec<String>,
        removed: Vec<String>,
        num_children: usize,
    },
    FrameLoad {
        target: String,
        added: Vec<String>,
        removed: Vec<String>,
    },
    DocumentUnload {
        target: String,
    },
}

#[derive(Serialize)]
pub(crate) struct WalkerMsg {
    actor: String,
    root: Option<NodeActorMsg>,
}

#[derive(Serialize)]
struct NodeReply {
    from: String,
    node: Option<NodeActorMsg>,
}

#[derive(Serialize)]
struct NodesReply {
    from: String,
    nodes: Vec<NodeActorMsg>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChildrenReply {
    from: String,
    has_first: bool,
    has_last: bool,
    nodes: Vec<NodeActorMsg>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QuerySelectorReply {
    from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    node: Option<NodeActorMsg>,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_nodes: Option<Vec<NodeActorMsg>>,
}

#[derive(Serialize)]
struct QuerySelectorAllReply {
    from: String,
    list: NodeListActorMsg,
}

#[derive(Serialize)]
struct GetMutationsReply {
    from: String,
    mutations: Vec<MutationMsg>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewMutationsEvent {
    from: String,
    #[serde(rename = "type")]
    type_: &'static str,
}

/// Paging options of `children` and `siblings`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TraversalOptions {
    pub max_nodes: usize,
    pub center: Option<NodeId>,
    pub start: Option<NodeId>,
    pub what_to_show: WhatToShow,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        TraversalOptions {
            max_nodes: usize::MAX,
            center: None,
            start: None,
            what_to_show: WhatToShow::SHOW_ALL,
        }
    }
}

#[derive(Debug, PartialEq)]
pub(crate) struct ChildrenResult {
    pub has_first: bool,
    pub has_last: bool,
    pub nodes: Vec<NodeId>,
}

pub(crate) struct WalkerActor {
    name: String,
    document: Arc<dyn DocumentTree>,
    root: NodeId,
    /// Every node the client has been told about, and the actor standing for it.
    ref_map: RefCell<FxHashMap<NodeId, String>>,
    /// Node actors removed from the tree the client knows, waiting for cleanup.
    orphaned: RefCell<Vec<String>>,
    pending_mutations: RefCell<Vec<MutationMsg>>,
}

impl Actor for WalkerActor {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn schema(&self) -> Option<&'static ActorSchema> {
        Some(&WALKER_SCHEMA)
    }

    fn handle_message(
        &self,
        request: ClientRequest,
        registry: &ActorRegistry,
        msg_type: &str,
        msg: &Map<String, Value>,
    ) -> Result<(), ActorError> {
        match msg_type {
            "document" => {
                let document = match node_arg(registry, msg, "node")? {
                    Some(node) => node_document(&*self.document, node),
                    None => Some(self.root),
                };
                let node = document.map(|document| self.ref_node(registry, document));
                let msg = NodeReply {
                    from: self.name(),
                    node: self.node_form(registry, node),
                };
                request.reply_final(&msg)?
            },

            "documentElement" => {
                let document = match node_arg(registry, msg, "node")? {
                    Some(node) => node_document(&*self.document, node),
                    None => Some(self.root),
                };
                let node = document
                    .and_then(|document| self.document.document_element(document))
                    .map(|element| self.ref_node(registry, element));
                let msg = NodeReply {
                    from: self.name(),
                    node: self.node_form(registry, node),
                };
                request.reply_final(&msg)?
            },

            "parents" => {
                let node = required_node_arg(registry, msg, "node")?;
                let same_document = msg
                    .get("sameDocument")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let parents = self.parents(registry, node, same_document);
                let msg = NodesReply {
                    from: self.name(),
                    nodes: self.node_forms(registry, &parents),
                };
                request.reply_final(&msg)?
            },

            "children" => {
                let node = required_node_arg(registry, msg, "node")?;
                let options = traversal_options(registry, msg)?;
                let result = self.children(node, &options)?;
                self.reply_children(request, registry, result)?
            },

            "siblings" => {
                let node = required_node_arg(registry, msg, "node")?;
                let options = traversal_options(registry, msg)?;
                let result = self.siblings(node, options)?;
                self.reply_children(request, registry, result)?
            },

            "nextSibling" | "previousSibling" => {
                let node = required_node_arg(registry, msg, "node")?;
                let mut walker =
                    DocumentWalker::new(&*self.document, node, what_to_show_arg(msg));
                let sibling = if msg_type == "nextSibling" {
                    walker.next_sibling()
                } else {
                    walker.previous_sibling()
                };
                let sibling = sibling.map(|sibling| self.ref_node(registry, sibling));
                let msg = NodeReply {
                    from: self.name(),
                    node: self.node_form(registry, sibling),
                };
                request.reply_final(&msg)?
            },

            "querySelector" => {
                let base = required_node_arg(registry, msg, "node")?;
                let selector = string_arg(msg, "selector")?;
                let found = self
                    .document
                    .query_selector(base, selector)
                    .map_err(|error| ActorError::InvalidSelector(error.to_string()))?;
                let msg = match found {
                    Some(found) => {
                        let node = self.ref_node(registry, found);
                        let mut new_nodes = vec![];
                        self.ensure_path_to_root(registry, found, &mut new_nodes);
                        QuerySelectorReply {
                            from: self.name(),
                            node: self.node_form(registry, Some(node)),
                            new_nodes: Some(self.node_forms(registry, &new_nodes)),
                        }
                    },
                    None => QuerySelectorReply {
                        from: self.name(),
                        node: None,
                        new_nodes: None,
                    },
                };
                request.reply_final(&msg)?
            },

            "querySelectorAll" => {
                let base = required_node_arg(registry, msg, "node")?;
                let selector = string_arg(msg, "selector")?;
                let nodes = self
                    .document
                    .query_selector_all(base, selector)
                    .map_err(|error| ActorError::InvalidSelector(error.to_string()))?;
                let list = NodeListActor::register(registry, &self.name, nodes);
                let msg = QuerySelectorAllReply {
                    from: self.name(),
                    list,
                };
                request.reply_final(&msg)?
            },

            "releaseNode" => {
                let name = msg
                    .get("node")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ActorError::MissingParameter("node".to_owned()))?;
                let node = registry.lookup::<NodeActor>(name)?;
                self.release_node(registry, &node.name());
                request.reply_final(&EmptyReplyMsg { from: self.name() })?
            },

            "getMutations" => {
                let cleanup = msg.get("cleanup").and_then(Value::as_bool).unwrap_or(false);
                let msg = GetMutationsReply {
                    from: self.name(),
                    mutations: self.take_mutations(registry, cleanup),
                };
                request.reply_final(&msg)?
            },

            "release" => request.reply_final(&EmptyReplyMsg { from: self.name() })?,

            _ => return Err(ActorError::UnrecognizedPacketType),
        };
        Ok(())
    }
}

fn string_arg<'m>(msg: &'m Map<String, Value>, name: &str) -> Result<&'m str, ActorError> {
    msg.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ActorError::MissingParameter(name.to_owned()))
}

/// Resolve an optional node argument, given as the ID of a node actor.
fn node_arg(
    registry: &ActorRegistry,
    msg: &Map<String, Value>,
    name: &str,
) -> Result<Option<NodeId>, ActorError> {
    match msg.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(actor)) => Ok(Some(registry.lookup::<NodeActor>(actor)?.node())),
        Some(_) => Err(ActorError::BadParameterType(format!(
            "Parameter '{name}' should be of type domnode"
        ))),
    }
}

fn required_node_arg(
    registry: &ActorRegistry,
    msg: &Map<String, Value>,
    name: &str,
) -> Result<NodeId, ActorError> {
    node_arg(registry, msg, name)?.ok_or_else(|| ActorError::MissingParameter(name.to_owned()))
}

fn what_to_show_arg(msg: &Map<String, Value>) -> WhatToShow {
    msg.get("whatToShow")
        .and_then(Value::as_u64)
        .map(|bits| WhatToShow::from_bits_truncate(bits as u32))
        .unwrap_or(WhatToShow::SHOW_ALL)
}

fn traversal_options(
    registry: &ActorRegistry,
    msg: &Map<String, Value>,
) -> Result<TraversalOptions, ActorError> {
    let max_nodes = match msg.get("maxNodes").and_then(Value::as_u64) {
        None | Some(0) => usize::MAX,
        Some(max_nodes) => max_nodes as usize,
    };
    Ok(TraversalOptions {
        max_nodes,
        center: node_arg(registry, msg, "center")?,
        start: node_arg(registry, msg, "start")?,
        what_to_show: what_to_show_arg(msg),
    })
}

/// Read up to `count` siblings before the walker's current node, in tree order.
/// The walker is left on the earliest node read.
fn read_backward(walker: &mut DocumentWalker, count: usize) -> Vec<NodeId> {
    let mut nodes = vec![];
    while nodes.len() < count {
        match walker.previous_sibling() {
            Some(node) => nodes.push(node),
            None => break,
        }
    }
    nodes.reverse();
    nodes
}

/// Read up to `count` nodes starting with the walker's current node.
fn read_forward(walker: &mut DocumentWalker, count: usize) -> Vec<NodeId> {
    let mut nodes = vec![];
    if count == 0 {
        return nodes;
    }
    nodes.push(walker.current_node());
    while nodes.len() < count {
        match walker.next_sibling() {
            Some(node) => nodes.push(node),
            None => break,
        }
    }
    nodes
}

impl WalkerActor {
    pub fn register(
        registry: &ActorRegistry,
        owner: &str,
        document: Arc<dyn DocumentTree>,
    ) -> Rc<WalkerActor> {
        let root = document.root_document();
        let walker = registry.manage(
            owner,
            WalkerActor {
                name: registry.new_name("domwalker"),
                document,
                root,
                ref_map: RefCell::default(),
                orphaned: RefCell::default(),
                pending_mutations: RefCell::default(),
            },
        );
        // The root document is always known to the client.
        walker.ref_node(registry, root);
        walker
    }

    /// The actor for `node`, creating it if the client has not seen the node yet.
    pub fn ref_node(&self, registry: &ActorRegistry, node: NodeId) -> String {
        if let Some(name) = self.ref_map.borrow().get(&node) {
            return name.clone();
        }

        let is_document = self
            .document
            .node_info(node)
            .is_some_and(|info| info.node_type == DOCUMENT_NODE);
        let observer = is_document.then(|| {
            let events = registry.events();
            let walker = self.name.clone();
            self.document.observe(
                node,
                MutationObserverInit::everything(),
                Box::new(move |mutations| {
                    let event = ConnectionEvent::Mutations {
                        walker: walker.clone(),
                        mutations,
                    };
                    if events.send(event).is_err() {
                        debug!("Dropping mutations for {walker}, its connection is gone");
                    }
                }),
            )
        });

        let name = registry.new_name("domnode");
        registry.manage(
            &self.name,
            NodeActor::new(
                name.clone(),
                self.name.clone(),
                node,
                self.document.clone(),
                observer,
            ),
        );
        self.ref_map.borrow_mut().insert(node, name.clone());
        name
    }

    pub fn known_node(&self, node: NodeId) -> Option<String> {
        self.ref_map.borrow().get(&node).cloned()
    }

    /// Called by a node actor being destroyed.
    pub fn forget(&self, node: NodeId, name: &str) {
        let mut ref_map = self.ref_map.borrow_mut();
        if ref_map.get(&node).is_some_and(|known| known == name) {
            ref_map.remove(&node);
        }
        self.orphaned.borrow_mut().retain(|orphan| orphan != name);
    }

    pub fn root_form(&self, registry: &ActorRegistry) -> Option<NodeActorMsg> {
        let root = self.ref_node(registry, self.root);
        self.node_form(registry, Some(root))
    }

    /// The actor of the parent of `node`, crossing frame boundaries.
    pub fn parent_actor(&self, registry: &ActorRegistry, node: NodeId) -> Option<String> {
        let parent = DocumentWalker::new(&*self.document, node, WhatToShow::SHOW_ALL).parent_node()?;
        Some(self.ref_node(registry, parent))
    }

    pub fn node_form(&self, registry: &ActorRegistry, name: Option<String>) -> Option<NodeActorMsg> {
        registry.encode::<NodeActor, _>(&name?)
    }

    pub fn node_forms(&self, registry: &ActorRegistry, names: &[String]) -> Vec<NodeActorMsg> {
        names
            .iter()
            .filter_map(|name| registry.encode::<NodeActor, _>(name))
            .collect()
    }

    fn parents(&self, registry: &ActorRegistry, node: NodeId, same_document: bool) -> Vec<String> {
        let owner = self.document.owner_document(node);
        let mut walker = DocumentWalker::new(&*self.document, node, WhatToShow::SHOW_ALL);
        let mut parents = vec![];
        while let Some(parent) = walker.parent_node() {
            if same_document && self.document.owner_document(parent) != owner {
                break;
            }
            parents.push(self.ref_node(registry, parent));
        }
        parents
    }

    /// Reference the ancestors of `node` the client has not seen, from the
    /// closest one up to the first ancestor it already knows.
    pub fn ensure_path_to_root(
        &self,
        registry: &ActorRegistry,
        node: NodeId,
        new_parents: &mut Vec<String>,
    ) {
        let mut walker = DocumentWalker::new(&*self.document, node, WhatToShow::SHOW_ALL);
        while let Some(parent) = walker.parent_node() {
            if self.known_node(parent).is_some() {
                return;
            }
            new_parents.push(self.ref_node(registry, parent));
        }
    }

    /// A page of the children of `node`, optionally starting at or centered on
    /// one child. When centering near either end, the page is filled up from
    /// the other side.
    pub fn children(
        &self,
        node: NodeId,
        options: &TraversalOptions,
    ) -> Result<ChildrenResult, ActorError> {
        if options.center.is_some() && options.start.is_some() {
            return Err(ActorError::BadParameterType(
                "Can't specify both 'center' and 'start' options.".to_owned(),
            ));
        }
        let tree = &*self.document;
        let walker = |node| DocumentWalker::new(tree, node, options.what_to_show);

        let Some(first_child) = walker(node).first_child() else {
            return Ok(ChildrenResult {
                has_first: true,
                has_last: true,
                nodes: vec![],
            });
        };
        let last_child = walker(node).last_child();
        let start = options.center.or(options.start).unwrap_or(first_child);
        let max_nodes = options.max_nodes;

        let mut backward = walker(start);
        let mut before = match options.center {
            Some(_) => read_backward(&mut backward, max_nodes / 2),
            None => vec![],
        };
        let after = read_forward(&mut walker(start), max_nodes - before.len());

        let remaining = max_nodes - before.len() - after.len();
        if options.center.is_some() && remaining > 0 {
            let mut earlier = read_backward(&mut backward, remaining);
            earlier.append(&mut before);
            before = earlier;
        }

        let mut nodes = before;
        nodes.extend(after);
        Ok(ChildrenResult {
            has_first: nodes.first() == Some(&first_child),
            has_last: nodes.last() == last_child.as_ref(),
            nodes,
        })
    }

    /// The siblings of `node`, centered on it unless told otherwise.
    pub fn siblings(
        &self,
        node: NodeId,
        mut options: TraversalOptions,
    ) -> Result<ChildrenResult, ActorError> {
        let Some(parent) = DocumentWalker::new(&*self.document, node, WhatToShow::SHOW_ALL).parent_node()
        else {
            return Ok(ChildrenResult {
                has_first: true,
                has_last: true,
                nodes: vec![node],
            });
        };
        if options.start.is_none() && options.center.is_none() {
            options.center = Some(node);
        }
        self.children(parent, &options)
    }

    fn reply_children(
        &self,
        request: ClientRequest,
        registry: &ActorRegistry,
        result: ChildrenResult,
    ) -> Result<(), ActorError> {
        let names: Vec<String> = result
            .nodes
            .iter()
            .map(|node| self.ref_node(registry, *node))
            .collect();
        let msg = ChildrenReply {
            from: self.name(),
            has_first: result.has_first,
            has_last: result.has_last,
            nodes: self.node_forms(registry, &names),
        };
        request.reply_final(&msg)
    }

    /// Release a node actor and the actors of all of its children the client knows.
    pub fn release_node(&self, registry: &ActorRegistry, name: &str) {
        let Some(actor) = registry.find::<NodeActor>(name) else {
            return;
        };
        let mut walker = DocumentWalker::new(&*self.document, actor.node(), WhatToShow::SHOW_ALL);
        let mut child = walker.first_child();
        while let Some(node) = child {
            if let Some(child_actor) = self.known_node(node) {
                self.release_node(registry, &child_actor);
            }
            child = walker.next_sibling();
        }
        registry.release(name);
    }

    fn take_mutations(&self, registry: &ActorRegistry, cleanup: bool) -> Vec<MutationMsg> {
        let pending = std::mem::take(&mut *self.pending_mutations.borrow_mut());
        if cleanup {
            let orphaned = std::mem::take(&mut *self.orphaned.borrow_mut());
            for orphan in orphaned {
                self.release_node(registry, &orphan);
            }
        }
        pending
    }

    /// Queue records and notify the client if the queue was empty before.
    fn queue_mutations(&self, registry: &ActorRegistry, records: Vec<MutationMsg>) {
        if records.is_empty() {
            return;
        }
        let need_event = {
            let mut pending = self.pending_mutations.borrow_mut();
            let was_empty = pending.is_empty();
            pending.extend(records);
            was_empty
        };
        if need_event {
            registry.send_event(&NewMutationsEvent {
                from: self.name(),
                type_: "newMutations",
            });
        }
    }

    pub fn on_mutations(&self, registry: &ActorRegistry, mutations: Vec<DomMutation>) {
        let summary_length = registry.prefs().value_summary_length;
        let mut records = vec![];
        for change in mutations {
            let Some(target) = self.known_node(change.target()) else {
                continue;
            };
            let target_node = change.target();
            let record = match change {
                DomMutation::Attributes {
                    attribute_name,
                    attribute_namespace,
                    ..
                } => MutationMsg::Attributes {
                    target,
                    new_value: self.document.get_attribute(target_node, &attribute_name),
                    attribute_name,
                    attribute_namespace,
                },
                DomMutation::CharacterData { .. } => {
                    let value = self
                        .document
                        .node_info(target_node)
                        .and_then(|info| info.node_value)
                        .unwrap_or_default();
                    let (new_value, incomplete_value) = summarize_value(&value, summary_length);
                    MutationMsg::CharacterData {
                        target,
                        new_value,
                        incomplete_value,
                    }
                },
                DomMutation::ChildList { added, removed, .. } => {
                    let mut removed_actors = vec![];
                    let mut added_actors = vec![];
                    for node in removed {
                        // Nodes the client never saw need no mention.
                        let Some(actor) = self.known_node(node) else {
                            continue;
                        };
                        let mut orphaned = self.orphaned.borrow_mut();
                        if !orphaned.contains(&actor) {
                            orphaned.push(actor.clone());
                        }
                        removed_actors.push(actor);
                    }
                    for node in added {
                        let Some(actor) = self.known_node(node) else {
                            continue;
                        };
                        // Back in the known tree.
                        self.orphaned.borrow_mut().retain(|orphan| *orphan != actor);
                        added_actors.push(actor);
                    }
                    let num_children = self
                        .document
                        .node_info(target_node)
                        .map(|info| info.num_children)
                        .unwrap_or(0);
                    MutationMsg::ChildList {
                        target,
                        added: added_actors,
                        removed: removed_actors,
                        num_children,
                    }
                },
            };
            records.push(record);
        }
        self.queue_mutations(registry, records);
    }

    /// A frame element loaded a new document.
    pub fn on_frame_load(&self, registry: &ActorRegistry, frame: NodeId) {
        let Some(target) = self.known_node(frame) else {
            return;
        };
        self.queue_mutations(
            registry,
            vec![MutationMsg::FrameLoad {
                target,
                added: vec![],
                removed: vec![],
            }],
        );
    }

    /// A document is going away: tell the client, then drop everything below it.
    pub fn on_document_unload(&self, registry: &ActorRegistry, document: NodeId) {
        let Some(target) = self.known_node(document) else {
            return;
        };
        if document == self.root {
            warn!("Root document of walker {} unloaded", self.name);
        }
        debug!("Releasing unloaded document {target}");
        self.queue_mutations(
            registry,
            vec![MutationMsg::DocumentUnload {
                target: target.clone(),
            }],
        );
        self.release_node(registry, &target);
    }
}

impl ActorEncode<WalkerMsg> for WalkerActor {
    fn encode(&self, registry: &ActorRegistry) -> WalkerMsg {
        WalkerMsg {
            actor: self.name(),
            root: self.root_form(registry),
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::WALKER_SCHEMA;

    #[test]
    fn mutation_records_carry_ids_not_forms() {
        let method = WALKER_SCHEMA.method("getMutations").unwrap();
        let reply = json!({
            "from": "conn0.domwalker1",
            "mutations": [
                {"type": "childList", "target": "conn0.domnode2", "added": ["conn0.domnode3"],
                 "removed": [], "numChildren": 1},
                {"type": "attributes", "target": "conn0.domnode3", "attributeName": "id",
                 "newValue": "x"},
            ],
        });
        let mut visited = 0;
        method.visit_reply_forms(reply.as_object().unwrap(), &mut |_, _| visited += 1);
        assert_eq!(visited, 0);

        let description = serde_json::to_value(WALKER_SCHEMA.description()).unwrap();
        let methods = description["methods"].as_array().unwrap();
        let get_mutations = methods
            .iter()
            .find(|method| method["name"] == json!("getMutations"))
            .unwrap();
        assert_eq!(
            get_mutations["response"]["mutations"],
            json!({"_retval": "array:dommutation"})
        );
    }
}
