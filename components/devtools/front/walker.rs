/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Client side of the DOM walker. Every node form the walker receives becomes a
//! [`NodeFront`], linked into a partial copy of the server's ownership tree.
//!
//! Liberally derived from the [Firefox JS implementation](http://mxr.mozilla.org/mozilla-central/source/toolkit/devtools/server/actors/inspector.js).

use std::time::Duration;

use crossbeam_channel::Receiver;
use devtools_traits::dom::DOCUMENT_NODE;
use log::warn;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::front::client::wait_for;
use crate::front::inspector::NodeListFront;
use crate::front::{ClientError, DevtoolsClient, Front, Mutation, Packet, args, string_value};

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Attr {
    #[serde(default)]
    pub namespace: Option<String>,
    pub name: String,
    pub value: String,
}

/// A node as described by the server.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeForm {
    pub actor: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub node_type: u16,
    #[serde(default, rename = "namespaceURI")]
    pub namespace_uri: Option<String>,
    #[serde(default)]
    pub node_name: String,
    #[serde(default)]
    pub num_children: usize,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub public_id: Option<String>,
    #[serde(default)]
    pub system_id: Option<String>,
    #[serde(default)]
    pub attrs: Vec<Attr>,
    #[serde(default)]
    pub short_value: Option<String>,
    #[serde(default)]
    pub incomplete_value: bool,
}

/// The client's copy of a node actor. The children linked to a node are only
/// the ones the client has seen, in no particular order; use a `children`
/// request to list them properly.
#[derive(Clone, Debug)]
pub struct NodeFront {
    form: NodeForm,
    /// Created to stand for a parent whose form has not been read yet.
    standin: bool,
    parent: Option<String>,
    child: Option<String>,
    next: Option<String>,
    prev: Option<String>,
}

impl NodeFront {
    fn new(form: NodeForm, standin: bool) -> NodeFront {
        NodeFront {
            form,
            standin,
            parent: None,
            child: None,
            next: None,
            prev: None,
        }
    }

    pub fn actor_id(&self) -> &str {
        &self.form.actor
    }

    pub fn form(&self) -> &NodeForm {
        &self.form
    }

    pub fn is_standin(&self) -> bool {
        self.standin
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn node_type(&self) -> u16 {
        self.form.node_type
    }

    pub fn node_name(&self) -> &str {
        &self.form.node_name
    }

    pub fn namespace_uri(&self) -> Option<&str> {
        self.form.namespace_uri.as_deref()
    }

    pub fn num_children(&self) -> usize {
        self.form.num_children
    }

    pub fn has_children(&self) -> bool {
        self.form.num_children > 0
    }

    pub fn short_value(&self) -> Option<&str> {
        self.form.short_value.as_deref()
    }

    pub fn incomplete_value(&self) -> bool {
        self.form.incomplete_value
    }

    pub fn attributes(&self) -> &[Attr] {
        &self.form.attrs
    }

    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.form
            .attrs
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.get_attribute(name).is_some()
    }

    pub fn id(&self) -> Option<&str> {
        self.get_attribute("id")
    }

    pub fn class_name(&self) -> &str {
        self.get_attribute("class").unwrap_or_default()
    }

    /// Apply an attribute or character data change to the form.
    fn update_mutation(&mut self, change: &Mutation) {
        match change {
            Mutation::Attributes {
                attribute_name,
                attribute_namespace,
                new_value,
                ..
            } => {
                let index = self.form.attrs.iter().position(|attr| {
                    attr.name == *attribute_name && attr.namespace == *attribute_namespace
                });
                match (index, new_value) {
                    (Some(index), Some(value)) => self.form.attrs[index].value = value.clone(),
                    (Some(index), None) => {
                        self.form.attrs.remove(index);
                    },
                    (None, Some(value)) => self.form.attrs.push(Attr {
                        namespace: attribute_namespace.clone(),
                        name: attribute_name.clone(),
                        value: value.clone(),
                    }),
                    (None, None) => {},
                }
            },
            Mutation::CharacterData {
                new_value,
                incomplete_value,
                ..
            } => {
                self.form.short_value = Some(new_value.clone());
                self.form.incomplete_value = *incomplete_value;
            },
            _ => {},
        }
    }
}

/// Paging options for `children` and `siblings`.
#[derive(Clone, Debug, Default)]
pub struct ChildrenOptions {
    pub max_nodes: Option<usize>,
    pub center: Option<String>,
    pub start: Option<String>,
    pub what_to_show: Option<u32>,
}

impl ChildrenOptions {
    fn args(&self, node: &str) -> Map<String, Value> {
        args([
            ("node", Some(Value::from(node))),
            ("maxNodes", self.max_nodes.map(Value::from)),
            ("center", self.center.as_deref().map(Value::from)),
            ("start", self.start.as_deref().map(Value::from)),
            ("whatToShow", self.what_to_show.map(Value::from)),
        ])
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChildrenPage {
    pub has_first: bool,
    pub has_last: bool,
    pub nodes: Vec<String>,
}

pub struct WalkerFront {
    front: Front,
    events: Receiver<Packet>,
    nodes: FxHashMap<String, NodeFront>,
    /// Nodes removed from the tree that may come back in a later mutation.
    orphaned: Vec<String>,
    root: Option<String>,
    /// Ask the server to release orphaned nodes whenever mutations are fetched.
    pub auto_cleanup: bool,
}

impl WalkerFront {
    /// A walker front for the `{actor, root}` form returned by `getWalker`.
    pub fn new(client: &DevtoolsClient, form: &Value) -> Result<WalkerFront, ClientError> {
        let front = Front::from_form(client, form, "domwalker")?;
        let events = client.subscribe(front.actor_id());
        let mut walker = WalkerFront {
            front,
            events,
            nodes: FxHashMap::default(),
            orphaned: vec![],
            root: None,
            auto_cleanup: true,
        };
        if let Some(root) = form.get("root").filter(|root| root.is_object()) {
            walker.root = Some(walker.read_node(root)?);
        }
        Ok(walker)
    }

    pub fn actor_id(&self) -> &str {
        self.front.actor_id()
    }

    pub fn client(&self) -> &DevtoolsClient {
        self.front.client()
    }

    pub fn root(&self) -> Option<&NodeFront> {
        self.nodes.get(self.root.as_deref()?)
    }

    pub fn get(&self, actor: &str) -> Option<&NodeFront> {
        self.nodes.get(actor)
    }

    pub fn known_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn parent_node(&self, actor: &str) -> Option<&NodeFront> {
        self.nodes.get(self.nodes.get(actor)?.parent.as_deref()?)
    }

    /// The children of `actor` the client knows about.
    pub fn tree_children(&self, actor: &str) -> Vec<String> {
        let mut children = vec![];
        let mut child = self.nodes.get(actor).and_then(|node| node.child.clone());
        while let Some(current) = child {
            child = self.nodes.get(&current).and_then(|node| node.next.clone());
            children.push(current);
        }
        children
    }

    pub fn orphans(&self) -> &[String] {
        &self.orphaned
    }

    pub fn is_orphaned(&self, actor: &str) -> bool {
        self.orphaned.iter().any(|orphan| orphan == actor)
    }

    /// Create or update the front for a node form and hook it up to its parent.
    pub(crate) fn read_node(&mut self, form: &Value) -> Result<String, ClientError> {
        let form: NodeForm = serde_json::from_value(form.clone())
            .map_err(|error| ClientError::Marshal(format!("bad node form: {error}")))?;
        let actor = form.actor.clone();
        let parent = form.parent.clone();
        match self.nodes.get_mut(&actor) {
            Some(node) => {
                node.form = form;
                node.standin = false;
            },
            None => {
                self.nodes.insert(actor.clone(), NodeFront::new(form, false));
            },
        }
        if let Some(parent) = parent {
            self.ensure_parent_front(&parent);
            self.reparent(&actor, Some(&parent));
        }
        Ok(actor)
    }

    /// Read every node form in a reply. Forms come in an order where a parent is
    /// always sent in the same or an earlier reply, but not necessarily before
    /// its children.
    pub(crate) fn read_forms(&mut self, forms: Vec<(&'static str, Value)>) -> Result<(), ClientError> {
        for (type_name, form) in forms {
            if type_name == "domnode" {
                self.read_node(&form)?;
            }
        }
        Ok(())
    }

    /// The front for `id`, or a stand-in to be filled in by a form read later.
    fn ensure_parent_front(&mut self, id: &str) {
        if !self.nodes.contains_key(id) {
            let form = NodeForm {
                actor: id.to_owned(),
                ..NodeForm::default()
            };
            self.nodes.insert(id.to_owned(), NodeFront::new(form, true));
        }
    }

    /// Move `actor` under `parent`, at the front of its child list.
    fn reparent(&mut self, actor: &str, parent: Option<&str>) {
        let Some(node) = self.nodes.get(actor) else {
            return;
        };
        if node.parent.as_deref() == parent {
            return;
        }
        let (old_parent, prev, next) = (node.parent.clone(), node.prev.clone(), node.next.clone());

        if let Some(old_parent) = old_parent.and_then(|old_parent| self.nodes.get_mut(&old_parent)) {
            if old_parent.child.as_deref() == Some(actor) {
                old_parent.child = next.clone();
            }
        }
        if let Some(prev) = prev.as_ref().and_then(|prev| self.nodes.get_mut(prev)) {
            prev.next = next.clone();
        }
        if let Some(next) = next.as_ref().and_then(|next| self.nodes.get_mut(next)) {
            next.prev = prev.clone();
        }

        let first_child = parent
            .and_then(|parent| self.nodes.get(parent))
            .and_then(|parent| parent.child.clone());
        if let Some(node) = self.nodes.get_mut(actor) {
            node.prev = None;
            node.next = first_child.clone();
            node.parent = parent.map(str::to_owned);
        }
        let Some(parent) = parent else {
            // The subtree is disconnected.
            return;
        };
        if let Some(first_child) = first_child.and_then(|first| self.nodes.get_mut(&first)) {
            first_child.prev = Some(actor.to_owned());
        }
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.child = Some(actor.to_owned());
        }
    }

    /// Forget a node and everything below it.
    fn destroy_node(&mut self, actor: &str) {
        self.reparent(actor, None);
        for child in self.tree_children(actor) {
            self.destroy_node(&child);
        }
        self.nodes.remove(actor);
        self.orphaned.retain(|orphan| orphan != actor);
        if self.root.as_deref() == Some(actor) {
            self.root = None;
        }
    }

    fn call(&mut self, method: &str, args: Map<String, Value>) -> Result<Packet, ClientError> {
        let reply = self.front.call(method, args)?;
        let forms = self.front.reply_forms(method, &reply);
        self.read_forms(forms)?;
        Ok(reply)
    }

    fn node_field(reply: &Packet, field: &str) -> Option<String> {
        reply
            .get(field)?
            .get("actor")?
            .as_str()
            .map(str::to_owned)
    }

    fn node_list(reply: &Packet, field: &str) -> Vec<String> {
        reply
            .get(field)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|form| form.get("actor")?.as_str().map(str::to_owned))
            .collect()
    }

    fn page(reply: &Packet) -> ChildrenPage {
        ChildrenPage {
            has_first: reply.get("hasFirst").and_then(Value::as_bool).unwrap_or(false),
            has_last: reply.get("hasLast").and_then(Value::as_bool).unwrap_or(false),
            nodes: WalkerFront::node_list(reply, "nodes"),
        }
    }

    /// The document `node` belongs to, or the walker's root document.
    pub fn document(&mut self, node: Option<&str>) -> Result<Option<String>, ClientError> {
        let reply = self.call("document", args([("node", node.map(Value::from))]))?;
        Ok(WalkerFront::node_field(&reply, "node"))
    }

    pub fn document_element(&mut self, node: Option<&str>) -> Result<Option<String>, ClientError> {
        let reply = self.call("documentElement", args([("node", node.map(Value::from))]))?;
        Ok(WalkerFront::node_field(&reply, "node"))
    }

    /// The ancestors of `node`, closest first.
    pub fn parents(&mut self, node: &str, same_document: bool) -> Result<Vec<String>, ClientError> {
        let reply = self.call(
            "parents",
            args([
                ("node", Some(Value::from(node))),
                ("sameDocument", Some(Value::from(same_document))),
            ]),
        )?;
        Ok(WalkerFront::node_list(&reply, "nodes"))
    }

    pub fn children(
        &mut self,
        node: &str,
        options: &ChildrenOptions,
    ) -> Result<ChildrenPage, ClientError> {
        let reply = self.call("children", options.args(node))?;
        Ok(WalkerFront::page(&reply))
    }

    pub fn siblings(
        &mut self,
        node: &str,
        options: &ChildrenOptions,
    ) -> Result<ChildrenPage, ClientError> {
        let reply = self.call("siblings", options.args(node))?;
        Ok(WalkerFront::page(&reply))
    }

    pub fn next_sibling(
        &mut self,
        node: &str,
        what_to_show: Option<u32>,
    ) -> Result<Option<String>, ClientError> {
        let reply = self.call(
            "nextSibling",
            args([
                ("node", Some(Value::from(node))),
                ("whatToShow", what_to_show.map(Value::from)),
            ]),
        )?;
        Ok(WalkerFront::node_field(&reply, "node"))
    }

    pub fn previous_sibling(
        &mut self,
        node: &str,
        what_to_show: Option<u32>,
    ) -> Result<Option<String>, ClientError> {
        let reply = self.call(
            "previousSibling",
            args([
                ("node", Some(Value::from(node))),
                ("whatToShow", what_to_show.map(Value::from)),
            ]),
        )?;
        Ok(WalkerFront::node_field(&reply, "node"))
    }

    /// The first match of `selector` below `node`. Any ancestors the client has not
    /// seen come along with it.
    pub fn query_selector(&mut self, node: &str, selector: &str) -> Result<Option<String>, ClientError> {
        let reply = self.call(
            "querySelector",
            args([
                ("node", Some(Value::from(node))),
                ("selector", Some(Value::from(selector))),
            ]),
        )?;
        Ok(WalkerFront::node_field(&reply, "node"))
    }

    pub fn query_selector_all(
        &mut self,
        node: &str,
        selector: &str,
    ) -> Result<NodeListFront, ClientError> {
        let reply = self.call(
            "querySelectorAll",
            args([
                ("node", Some(Value::from(node))),
                ("selector", Some(Value::from(selector))),
            ]),
        )?;
        let list = reply
            .get("list")
            .ok_or_else(|| ClientError::Marshal("querySelectorAll without a list".to_owned()))?;
        NodeListFront::from_form(self.front.client(), list)
    }

    /// Release a node and its known descendants, on the server and then here.
    /// A failed release leaves the local tree as it was.
    pub fn release_node(&mut self, node: &str) -> Result<(), ClientError> {
        self.call("releaseNode", args([("node", Some(Value::from(node)))]))?;
        self.destroy_node(node);
        Ok(())
    }

    /// Fetch the pending mutation records and apply them to the known tree.
    /// Records naming nodes the client never saw are skipped.
    pub fn get_mutations(&mut self, cleanup: bool) -> Result<Vec<Mutation>, ClientError> {
        let reply = self.call("getMutations", args([("cleanup", Some(Value::from(cleanup)))]))?;
        let records = reply.get("mutations").cloned().unwrap_or(Value::Array(vec![]));
        let records: Vec<Mutation> = serde_json::from_value(records)
            .map_err(|error| ClientError::Marshal(format!("bad mutation record: {error}")))?;

        let mut mutations = vec![];
        for mut change in records {
            let target = mutation_target(&change).to_owned();
            if !self.nodes.contains_key(&target) {
                warn!("Got a mutation for an unexpected actor: {target}");
                continue;
            }

            match &mut change {
                Mutation::ChildList {
                    added,
                    removed,
                    num_children,
                    ..
                } => {
                    removed.retain(|removed| {
                        let known = self.nodes.contains_key(removed);
                        if !known {
                            warn!("Got a removal of an actor we didn't know about: {removed}");
                        }
                        known
                    });
                    for removed in removed.iter() {
                        self.reparent(removed, None);
                        if !self.is_orphaned(removed) {
                            self.orphaned.push(removed.clone());
                        }
                    }
                    added.retain(|added| {
                        let known = self.nodes.contains_key(added);
                        if !known {
                            warn!("Got an addition of an actor we didn't know about: {added}");
                        }
                        known
                    });
                    for added in added.iter() {
                        self.reparent(added, Some(&target));
                        self.orphaned.retain(|orphan| orphan != added);
                    }
                    if let Some(target) = self.nodes.get_mut(&target) {
                        target.form.num_children = *num_children;
                    }
                },
                Mutation::FrameLoad { .. } => {
                    let documents = self
                        .tree_children(&target)
                        .iter()
                        .filter_map(|child| self.nodes.get(child))
                        .any(|child| child.node_type() == DOCUMENT_NODE);
                    if documents {
                        warn!("Got a frameLoad for {target} before its document unloaded");
                    }
                },
                Mutation::DocumentUnload { .. } => self.destroy_node(&target),
                Mutation::Attributes { .. } | Mutation::CharacterData { .. } => {
                    if let Some(target) = self.nodes.get_mut(&target) {
                        target.update_mutation(&change);
                    }
                },
            }
            mutations.push(change);
        }

        if cleanup {
            for orphan in std::mem::take(&mut self.orphaned) {
                self.destroy_node(&orphan);
            }
        }
        Ok(mutations)
    }

    /// Fetch mutations if the server announced any since the last call.
    pub fn process_events(&mut self) -> Result<Vec<Mutation>, ClientError> {
        let announced = self
            .events
            .try_iter()
            .filter(|event| event.get("type").and_then(Value::as_str) == Some("newMutations"))
            .count();
        if announced == 0 {
            return Ok(vec![]);
        }
        self.get_mutations(self.auto_cleanup)
    }

    /// Wait until the server announces mutations, then fetch them.
    pub fn wait_for_mutations(&mut self, timeout: Duration) -> Result<Vec<Mutation>, ClientError> {
        if wait_for(&self.events, "newMutations", timeout).is_none() {
            return Ok(vec![]);
        }
        self.get_mutations(self.auto_cleanup)
    }

    /// The full value of a node. Complete values come from the form; truncated
    /// ones are fetched from the server.
    pub fn get_node_value(&self, node: &str) -> Result<String, ClientError> {
        let front = self
            .nodes
            .get(node)
            .ok_or_else(|| ClientError::Marshal(format!("unknown node {node}")))?;
        if !front.incomplete_value() {
            return Ok(front.short_value().unwrap_or_default().to_owned());
        }
        let node = Front::new(self.front.client(), node, "domnode")?;
        let reply = node.call("getNodeValue", Map::new())?;
        string_value(self.front.client(), reply.get("value").unwrap_or(&Value::Null))
    }

    pub fn set_node_value(&self, node: &str, value: &str) -> Result<(), ClientError> {
        let node = Front::new(self.front.client(), node, "domnode")?;
        node.call("setNodeValue", args([("value", Some(Value::from(value)))]))?;
        Ok(())
    }

    /// Release the walker and every node actor it handed out.
    pub fn release(mut self) -> Result<(), ClientError> {
        self.front.client().unsubscribe(self.front.actor_id());
        self.nodes.clear();
        self.orphaned.clear();
        self.front.call("release", Map::new())?;
        Ok(())
    }
}

fn mutation_target(change: &Mutation) -> &str {
    match change {
        Mutation::Attributes { target, .. } |
        Mutation::CharacterData { target, .. } |
        Mutation::ChildList { target, .. } |
        Mutation::FrameLoad { target, .. } |
        Mutation::DocumentUnload { target } => target,
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::{NodeForm, NodeFront};
    use crate::front::Mutation;

    fn element(attrs: serde_json::Value) -> NodeFront {
        let form: NodeForm = serde_json::from_value(json!({
            "actor": "conn0.domnode1",
            "nodeType": 1,
            "nodeName": "DIV",
            "namespaceURI": null,
            "numChildren": 0,
            "attrs": attrs,
        }))
        .unwrap();
        NodeFront::new(form, false)
    }

    #[test]
    fn attribute_mutations_update_the_form() {
        let mut node = element(json!([{ "namespace": null, "name": "id", "value": "a" }]));
        assert_eq!(node.id(), Some("a"));

        node.update_mutation(&Mutation::Attributes {
            target: "conn0.domnode1".to_owned(),
            attribute_name: "class".to_owned(),
            attribute_namespace: None,
            new_value: Some("big".to_owned()),
        });
        assert_eq!(node.class_name(), "big");

        node.update_mutation(&Mutation::Attributes {
            target: "conn0.domnode1".to_owned(),
            attribute_name: "id".to_owned(),
            attribute_namespace: None,
            new_value: None,
        });
        assert!(!node.has_attribute("id"));
        assert_eq!(node.attributes().len(), 1);
    }

    #[test]
    fn character_data_mutations_replace_the_short_value() {
        let mut node = element(json!([]));
        node.update_mutation(&Mutation::CharacterData {
            target: "conn0.domnode1".to_owned(),
            new_value: "hello".to_owned(),
            incomplete_value: true,
        });
        assert_eq!(node.short_value(), Some("hello"));
        assert!(node.incomplete_value());
    }
}
