/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The result of a `querySelectorAll`. Nodes are only turned into actors when the
//! client asks for them.

use devtools_traits::dom::NodeId;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::EmptyReplyMsg;
use crate::actor::{Actor, ActorError, ActorRegistry};
use crate::actors::inspector::node::NodeActorMsg;
use crate::actors::inspector::walker::WalkerActor;
use crate::protocol::ClientRequest;
use crate::schema::{
    ActorSchema, DOMNODE, NODE_ARRAY, NULLABLE_NUMBER, ProtocolType, arg, field, method, option,
    release_method,
};

pub(crate) static NODE_LIST_SCHEMA: ActorSchema = ActorSchema {
    type_name: "domnodelist",
    methods: &[
        method(
            "item",
            &[arg("item", ProtocolType::Number)],
            &[field("node", DOMNODE), field("newNodes", NODE_ARRAY)],
        ),
        method(
            "items",
            &[option("start", NULLABLE_NUMBER), option("end", NULLABLE_NUMBER)],
            &[field("nodes", NODE_ARRAY), field("newNodes", NODE_ARRAY)],
        ),
        release_method("release"),
    ],
    events: &[],
};

#[derive(Serialize)]
pub(crate) struct NodeListActorMsg {
    actor: String,
    length: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemReply {
    from: String,
    node: Option<NodeActorMsg>,
    new_nodes: Vec<NodeActorMsg>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemsReply {
    from: String,
    nodes: Vec<NodeActorMsg>,
    new_nodes: Vec<NodeActorMsg>,
}

pub(crate) struct NodeListActor {
    name: String,
    walker: String,
    nodes: Vec<NodeId>,
}

impl Actor for NodeListActor {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn schema(&self) -> Option<&'static ActorSchema> {
        Some(&NODE_LIST_SCHEMA)
    }

    fn handle_message(
        &self,
        request: ClientRequest,
        registry: &ActorRegistry,
        msg_type: &str,
        msg: &Map<String, Value>,
    ) -> Result<(), ActorError> {
        let walker = registry.lookup::<WalkerActor>(&self.walker)?;
        match msg_type {
            "item" => {
                let index = msg.get("item").and_then(Value::as_u64).unwrap_or(u64::MAX);
                let Some(node) = self.nodes.get(index as usize) else {
                    return Err(ActorError::BadParameterType(format!(
                        "Index {index} is out of range for a list of {} nodes",
                        self.nodes.len()
                    )));
                };
                let mut new_nodes = vec![];
                walker.ensure_path_to_root(registry, *node, &mut new_nodes);
                let actor = walker.ref_node(registry, *node);
                let msg = ItemReply {
                    from: self.name(),
                    node: walker.node_form(registry, Some(actor)),
                    new_nodes: walker.node_forms(registry, &new_nodes),
                };
                request.reply_final(&msg)?
            },

            "items" => {
                let (start, end) = self.range(msg);
                let mut new_nodes = vec![];
                let mut names = vec![];
                for node in &self.nodes[start..end] {
                    walker.ensure_path_to_root(registry, *node, &mut new_nodes);
                    names.push(walker.ref_node(registry, *node));
                }
                let msg = ItemsReply {
                    from: self.name(),
                    nodes: walker.node_forms(registry, &names),
                    new_nodes: walker.node_forms(registry, &new_nodes),
                };
                request.reply_final(&msg)?
            },

            "release" => request.reply_final(&EmptyReplyMsg { from: self.name() })?,

            _ => return Err(ActorError::UnrecognizedPacketType),
        };
        Ok(())
    }
}

impl NodeListActor {
    pub fn register(registry: &ActorRegistry, walker: &str, nodes: Vec<NodeId>) -> NodeListActorMsg {
        let actor = registry.manage(
            walker,
            NodeListActor {
                name: registry.new_name("domnodelist"),
                walker: walker.to_owned(),
                nodes,
            },
        );
        NodeListActorMsg {
            actor: actor.name(),
            length: actor.nodes.len(),
        }
    }

    /// The `start..end` window of an `items` request, clamped to the list.
    fn range(&self, msg: &Map<String, Value>) -> (usize, usize) {
        let len = self.nodes.len();
        let bound = |name: &str, default: usize| {
            msg.get(name)
                .and_then(Value::as_u64)
                .map_or(default, |value| (value as usize).min(len))
        };
        let start = bound("start", 0);
        let end = bound("end", len).max(start);
        (start, end)
    }
}
