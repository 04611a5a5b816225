/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! This actor represents one DOM node. It is created by the Walker actor when it is traversing the
//! document tree.

use std::cell::Cell;
use std::sync::Arc;

use devtools_traits::dom::{DocumentTree, ELEMENT_NODE, NodeId, ObserverId};
use log::debug;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::EmptyReplyMsg;
use crate::actor::{Actor, ActorEncode, ActorError, ActorRegistry};
use crate::actors::inspector::walker::WalkerActor;
use crate::actors::string::LongStringActor;
use crate::protocol::ClientRequest;
use crate::schema::{ActorSchema, LONGSTRING, ProtocolType, arg, field, method};

pub(crate) static NODE_SCHEMA: ActorSchema = ActorSchema {
    type_name: "domnode",
    methods: &[
        method("getNodeValue", &[], &[field("value", LONGSTRING)]),
        method("setNodeValue", &[arg("value", ProtocolType::String)], &[]),
    ],
    events: &[],
};

#[derive(Clone, Debug, Serialize)]
pub(crate) struct AttrMsg {
    namespace: Option<String>,
    name: String,
    value: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NodeActorMsg {
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<String>,
    node_type: u16,
    #[serde(rename = "namespaceURI")]
    namespace_uri: Option<String>,
    node_name: String,
    num_children: usize,

    // Doctype attributes
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    public_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    attrs: Option<Vec<AttrMsg>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    short_value: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    incomplete_value: bool,
}

#[derive(Serialize)]
struct GetNodeValueReply {
    from: String,
    value: Value,
}

pub(crate) struct NodeActor {
    name: String,
    walker: String,
    node: NodeId,
    document: Arc<dyn DocumentTree>,
    /// Set for document nodes, which are watched for mutations while referenced.
    observer: Cell<Option<ObserverId>>,
}

impl Actor for NodeActor {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn schema(&self) -> Option<&'static ActorSchema> {
        Some(&NODE_SCHEMA)
    }

    fn handle_message(
        &self,
        request: ClientRequest,
        registry: &ActorRegistry,
        msg_type: &str,
        msg: &Map<String, Value>,
    ) -> Result<(), ActorError> {
        match msg_type {
            "getNodeValue" => {
                let value = self
                    .document
                    .node_info(self.node)
                    .and_then(|info| info.node_value)
                    .unwrap_or_default();
                let msg = GetNodeValueReply {
                    from: self.name(),
                    value: LongStringActor::string_or_grip(registry, &self.name, &value),
                };
                request.reply_final(&msg)?
            },

            "setNodeValue" => {
                let value = msg
                    .get("value")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ActorError::MissingParameter("value".to_owned()))?;
                if !self.document.set_node_value(self.node, value) {
                    debug!("Node {} does not take a value", self.node);
                }
                request.reply_final(&EmptyReplyMsg { from: self.name() })?
            },

            _ => return Err(ActorError::UnrecognizedPacketType),
        };
        Ok(())
    }

    fn destroy(&self, registry: &ActorRegistry) {
        if let Some(observer) = self.observer.take() {
            self.document.disconnect(observer);
        }
        if let Some(walker) = registry.find::<WalkerActor>(&self.walker) {
            walker.forget(self.node, &self.name);
        }
    }
}

impl NodeActor {
    pub fn new(
        name: String,
        walker: String,
        node: NodeId,
        document: Arc<dyn DocumentTree>,
        observer: Option<ObserverId>,
    ) -> NodeActor {
        NodeActor {
            name,
            walker,
            node,
            document,
            observer: Cell::new(observer),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn walker(&self) -> &str {
        &self.walker
    }
}

/// Cut a node value down to the summary length. Returns the summary and whether
/// anything was cut.
pub(crate) fn summarize_value(value: &str, summary_length: usize) -> (String, bool) {
    if value.chars().count() > summary_length {
        (value.chars().take(summary_length).collect(), true)
    } else {
        (value.to_owned(), false)
    }
}

impl ActorEncode<NodeActorMsg> for NodeActor {
    fn encode(&self, registry: &ActorRegistry) -> NodeActorMsg {
        let parent = registry
            .find::<WalkerActor>(&self.walker)
            .and_then(|walker| walker.parent_actor(registry, self.node));
        let info = self.document.node_info(self.node);

        let (short_value, incomplete_value) = match info
            .as_ref()
            .and_then(|info| info.node_value.as_deref())
            .filter(|value| !value.is_empty())
        {
            Some(value) => {
                let (summary, incomplete) =
                    summarize_value(value, registry.prefs().value_summary_length);
                (Some(summary), incomplete)
            },
            None => (None, false),
        };

        let Some(info) = info else {
            // The node is gone from the host. Keep the actor addressable.
            return NodeActorMsg {
                actor: self.name(),
                parent,
                node_type: 0,
                namespace_uri: None,
                node_name: String::new(),
                num_children: 0,
                name: None,
                public_id: None,
                system_id: None,
                attrs: None,
                short_value,
                incomplete_value,
            };
        };

        let attrs = (info.node_type == ELEMENT_NODE).then(|| {
            info.attrs
                .iter()
                .map(|attr| AttrMsg {
                    namespace: attr.namespace.clone(),
                    name: attr.name.clone(),
                    value: attr.value.clone(),
                })
                .collect()
        });

        NodeActorMsg {
            actor: self.name(),
            parent,
            node_type: info.node_type,
            namespace_uri: info.namespace_uri,
            node_name: info.node_name,
            num_children: info.num_children,
            name: info.doctype.as_ref().map(|doctype| doctype.name.clone()),
            public_id: info.doctype.as_ref().map(|doctype| doctype.public_id.clone()),
            system_id: info.doctype.as_ref().map(|doctype| doctype.system_id.clone()),
            attrs,
            short_value,
            incomplete_value,
        }
    }
}
