/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Actors for debuggee objects handed out by the console. Each object has at most
//! one actor per connection; asking for a grip of the same object again reuses it.

use std::sync::Arc;

use devtools_traits::debugger::DebuggeeObject;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::EmptyReplyMsg;
use crate::actor::{Actor, ActorEncode, ActorError, ActorRegistry};
use crate::grip::{self, ActorGripper, ObjectGripper, null_grip};
use crate::protocol::ClientRequest;
use crate::schema::{ActorSchema, ProtocolType, arg, field, method, release_method};

pub(crate) static OBJECT_SCHEMA: ActorSchema = ActorSchema {
    type_name: "object",
    methods: &[
        method(
            "prototypeAndProperties",
            &[],
            &[
                field("prototype", ProtocolType::Json),
                field("ownProperties", ProtocolType::Json),
                field("safeGetterValues", ProtocolType::Json),
            ],
        ),
        method("prototype", &[], &[field("prototype", ProtocolType::Json)]),
        method(
            "property",
            &[arg("name", ProtocolType::String)],
            &[field("descriptor", ProtocolType::Json)],
        ),
        method(
            "ownPropertyNames",
            &[],
            &[field("ownPropertyNames", ProtocolType::Json)],
        ),
        release_method("release"),
    ],
    events: &[],
};

#[derive(Serialize)]
pub(crate) struct ObjectActorMsg {
    #[serde(rename = "type")]
    type_: &'static str,
    actor: String,
    class: String,
    extensible: bool,
    frozen: bool,
    sealed: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrototypeAndPropertiesReply {
    from: String,
    prototype: Value,
    own_properties: Map<String, Value>,
    safe_getter_values: Map<String, Value>,
}

#[derive(Serialize)]
struct PrototypeReply {
    from: String,
    prototype: Value,
}

#[derive(Serialize)]
struct PropertyReply {
    from: String,
    descriptor: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OwnPropertyNamesReply {
    from: String,
    own_property_names: Vec<String>,
}

pub(crate) struct ObjectActor {
    name: String,
    /// The actor that grips found while inspecting this object are released with.
    owner: String,
    object: Arc<dyn DebuggeeObject>,
}

impl Actor for ObjectActor {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn schema(&self) -> Option<&'static ActorSchema> {
        Some(&OBJECT_SCHEMA)
    }

    fn handle_message(
        &self,
        request: ClientRequest,
        registry: &ActorRegistry,
        msg_type: &str,
        msg: &Map<String, Value>,
    ) -> Result<(), ActorError> {
        let mut gripper = ActorGripper::new(registry, &self.owner);
        match msg_type {
            "prototypeAndProperties" => {
                let own_properties = grip::own_properties(&self.object, &mut gripper);
                let safe_getter_values =
                    grip::safe_getter_values(&self.object, &own_properties, &mut gripper);
                let msg = PrototypeAndPropertiesReply {
                    from: self.name(),
                    prototype: self.prototype_grip(&mut gripper),
                    own_properties,
                    safe_getter_values,
                };
                request.reply_final(&msg)?
            },

            "prototype" => {
                let msg = PrototypeReply {
                    from: self.name(),
                    prototype: self.prototype_grip(&mut gripper),
                };
                request.reply_final(&msg)?
            },

            "property" => {
                let name = msg
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ActorError::MissingParameter("name".to_owned()))?;
                let msg = PropertyReply {
                    from: self.name(),
                    descriptor: grip::property_descriptor(&self.object, name, &mut gripper)
                        .unwrap_or(Value::Null),
                };
                request.reply_final(&msg)?
            },

            "ownPropertyNames" => {
                let msg = OwnPropertyNamesReply {
                    from: self.name(),
                    own_property_names: self.object.own_property_names().unwrap_or_default(),
                };
                request.reply_final(&msg)?
            },

            "release" => request.reply_final(&EmptyReplyMsg { from: self.name() })?,

            _ => return Err(ActorError::UnrecognizedPacketType),
        };
        Ok(())
    }
}

impl ObjectActor {
    /// The actor for `object`, registering one managed by `owner` if the
    /// connection has none yet.
    pub fn register(
        registry: &ActorRegistry,
        owner: &str,
        object: &Arc<dyn DebuggeeObject>,
    ) -> String {
        let id = object.id().0;
        if let Some(name) = registry.script_to_actor(id) {
            if registry.contains(&name) {
                return name;
            }
        }

        let name = registry.new_name("obj");
        registry.manage(
            owner,
            ObjectActor {
                name: name.clone(),
                owner: owner.to_owned(),
                object: object.clone(),
            },
        );
        registry.register_script_actor(id, name.clone());
        name
    }

    pub fn grip(registry: &ActorRegistry, owner: &str, object: &Arc<dyn DebuggeeObject>) -> Value {
        let name = ObjectActor::register(registry, owner, object);
        registry
            .encode::<ObjectActor, _>(&name)
            .and_then(|msg| serde_json::to_value(msg).ok())
            .unwrap_or_else(null_grip)
    }

    pub fn object(&self) -> &Arc<dyn DebuggeeObject> {
        &self.object
    }

    fn prototype_grip(&self, gripper: &mut ActorGripper) -> Value {
        if self.object.own_property_names().is_err() {
            return null_grip();
        }
        match self.object.proto() {
            Some(proto) => gripper.object_grip(&proto),
            None => null_grip(),
        }
    }
}

impl ActorEncode<ObjectActorMsg> for ObjectActor {
    fn encode(&self, _: &ActorRegistry) -> ObjectActorMsg {
        ObjectActorMsg {
            type_: "object",
            actor: self.name(),
            class: self.object.class(),
            extensible: self.object.is_extensible(),
            frozen: self.object.is_frozen(),
            sealed: self.object.is_sealed(),
        }
    }
}
