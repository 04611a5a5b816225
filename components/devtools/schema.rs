/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Declarative descriptions of the remote methods of each actor type.
//!
//! The same tables validate requests on the server, marshal arguments on the
//! client, locate actor forms inside replies and answer `protocolDescription`.

use serde_json::{Map, Value, json};

use crate::actor::ActorError;
use crate::protocol::{ActorDescription, Method};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ProtocolType {
    /// Any JSON value that is not an object or an array.
    Primitive,
    Boolean,
    Number,
    String,
    /// Passed through untouched.
    Json,
    Nullable(&'static ProtocolType),
    Array(&'static ProtocolType),
    Dict(&'static DictType),
    /// An actor, sent as its form in replies and as its ID in requests.
    Actor(&'static str),
}

#[derive(Debug, PartialEq)]
pub struct DictType {
    pub name: &'static str,
    pub fields: &'static [Field],
}

#[derive(Debug, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub type_: ProtocolType,
}

#[derive(Debug, PartialEq)]
pub struct Arg {
    pub name: &'static str,
    pub type_: ProtocolType,
    pub optional: bool,
}

#[derive(Debug, PartialEq)]
pub struct MethodSchema {
    pub name: &'static str,
    pub request: &'static [Arg],
    pub response: &'static [Field],
    /// The actor is released once the reply has been sent.
    pub release: bool,
}

#[derive(Debug, PartialEq)]
pub struct EventSchema {
    pub name: &'static str,
    pub fields: &'static [Field],
}

#[derive(Debug, PartialEq)]
pub struct ActorSchema {
    pub type_name: &'static str,
    pub methods: &'static [MethodSchema],
    pub events: &'static [EventSchema],
}

pub const DOMNODE: ProtocolType = ProtocolType::Actor("domnode");
pub const LONGSTRING: ProtocolType = ProtocolType::Actor("longstring");
pub const NULLABLE_STRING: ProtocolType = ProtocolType::Nullable(&ProtocolType::String);
pub const NULLABLE_NUMBER: ProtocolType = ProtocolType::Nullable(&ProtocolType::Number);
pub const NULLABLE_BOOLEAN: ProtocolType = ProtocolType::Nullable(&ProtocolType::Boolean);
pub const NODE_ARRAY: ProtocolType = ProtocolType::Array(&DOMNODE);
pub const STRING_ARRAY: ProtocolType = ProtocolType::Array(&ProtocolType::String);

pub const fn arg(name: &'static str, type_: ProtocolType) -> Arg {
    Arg {
        name,
        type_,
        optional: false,
    }
}

pub const fn option(name: &'static str, type_: ProtocolType) -> Arg {
    Arg {
        name,
        type_,
        optional: true,
    }
}

pub const fn field(name: &'static str, type_: ProtocolType) -> Field {
    Field { name, type_ }
}

pub const fn method(
    name: &'static str,
    request: &'static [Arg],
    response: &'static [Field],
) -> MethodSchema {
    MethodSchema {
        name,
        request,
        response,
        release: false,
    }
}

pub const fn release_method(name: &'static str) -> MethodSchema {
    MethodSchema {
        name,
        request: &[],
        response: &[],
        release: true,
    }
}

impl ProtocolType {
    pub fn type_name(&self) -> String {
        match self {
            ProtocolType::Primitive => "primitive".to_owned(),
            ProtocolType::Boolean => "boolean".to_owned(),
            ProtocolType::Number => "number".to_owned(),
            ProtocolType::String => "string".to_owned(),
            ProtocolType::Json => "json".to_owned(),
            ProtocolType::Nullable(inner) => format!("nullable:{}", inner.type_name()),
            ProtocolType::Array(inner) => format!("array:{}", inner.type_name()),
            ProtocolType::Dict(dict) => dict.name.to_owned(),
            ProtocolType::Actor(name) => (*name).to_owned(),
        }
    }

    /// Whether a request value has the shape of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ProtocolType::Primitive => !value.is_object() && !value.is_array(),
            ProtocolType::Boolean => value.is_boolean(),
            ProtocolType::Number => value.is_number(),
            ProtocolType::String => value.is_string(),
            ProtocolType::Json => true,
            ProtocolType::Nullable(inner) => value.is_null() || inner.accepts(value),
            ProtocolType::Array(inner) => value
                .as_array()
                .is_some_and(|items| items.iter().all(|item| inner.accepts(item))),
            ProtocolType::Dict(_) => value.is_object(),
            ProtocolType::Actor(_) => value.is_string(),
        }
    }

    /// Turn a client side value into its wire form: actors travel as their ID.
    fn write(&self, value: Value) -> Value {
        match (self, value) {
            (ProtocolType::Actor(_), Value::Object(form)) => {
                form.get("actor").cloned().unwrap_or(Value::Null)
            },
            (ProtocolType::Nullable(inner), value) if !value.is_null() => inner.write(value),
            (ProtocolType::Array(inner), Value::Array(items)) => {
                Value::Array(items.into_iter().map(|item| inner.write(item)).collect())
            },
            (_, value) => value,
        }
    }

    /// Call `visit` for every actor form found in a reply value, in document order.
    pub fn visit_forms<'v>(&self, value: &'v Value, visit: &mut dyn FnMut(&'static str, &'v Value)) {
        match self {
            ProtocolType::Actor(name) => {
                if value.is_object() {
                    visit(name, value);
                }
            },
            ProtocolType::Nullable(inner) => inner.visit_forms(value, visit),
            ProtocolType::Array(inner) => {
                for item in value.as_array().into_iter().flatten() {
                    inner.visit_forms(item, visit);
                }
            },
            ProtocolType::Dict(dict) => {
                for field in dict.fields {
                    if let Some(value) = value.get(field.name) {
                        field.type_.visit_forms(value, visit);
                    }
                }
            },
            _ => {},
        }
    }
}

impl ActorSchema {
    pub fn method(&self, name: &str) -> Option<&'static MethodSchema> {
        self.methods.iter().find(|method| method.name == name)
    }

    /// Check a request against the declared method, reporting the first problem.
    pub fn validate_request(
        &self,
        msg_type: &str,
        msg: &Map<String, Value>,
    ) -> Result<&'static MethodSchema, ActorError> {
        let method = self
            .method(msg_type)
            .ok_or(ActorError::UnrecognizedPacketType)?;
        method.check_args(msg)?;
        Ok(method)
    }

    pub fn description(&self) -> ActorDescription {
        ActorDescription {
            category: "actor",
            type_name: self.type_name,
            methods: self.methods.iter().map(MethodSchema::description).collect(),
        }
    }
}

impl MethodSchema {
    fn check_args(&self, msg: &Map<String, Value>) -> Result<(), ActorError> {
        for arg in self.request {
            match msg.get(arg.name) {
                None | Some(Value::Null) if arg.optional => {},
                None | Some(Value::Null) => {
                    return Err(ActorError::MissingParameter(arg.name.to_owned()));
                },
                Some(value) if !arg.type_.accepts(value) => {
                    return Err(ActorError::BadParameterType(format!(
                        "Parameter '{}' should be of type {}",
                        arg.name,
                        arg.type_.type_name()
                    )));
                },
                Some(_) => {},
            }
        }
        Ok(())
    }

    /// Build the request packet for this method from client side arguments.
    pub fn write_request(
        &self,
        to: &str,
        mut args: Map<String, Value>,
    ) -> Result<Map<String, Value>, ActorError> {
        if let Some(unknown) = args
            .keys()
            .find(|key| !self.request.iter().any(|arg| arg.name == key.as_str()))
        {
            return Err(ActorError::BadParameterType(format!(
                "Method '{}' has no parameter '{unknown}'",
                self.name
            )));
        }

        let mut packet = Map::new();
        packet.insert("to".to_owned(), Value::from(to));
        packet.insert("type".to_owned(), Value::from(self.name));
        for arg in self.request {
            if let Some(value) = args.remove(arg.name) {
                packet.insert(arg.name.to_owned(), arg.type_.write(value));
            }
        }
        self.check_args(&packet)?;
        Ok(packet)
    }

    /// Call `visit` for every actor form in a reply to this method.
    pub fn visit_reply_forms<'v>(
        &self,
        reply: &'v Map<String, Value>,
        visit: &mut dyn FnMut(&'static str, &'v Value),
    ) {
        for field in self.response {
            if let Some(value) = reply.get(field.name) {
                field.type_.visit_forms(value, visit);
            }
        }
    }

    fn description(&self) -> Method {
        let mut request = Map::new();
        request.insert("type".to_owned(), Value::from(self.name));
        for (index, arg) in self.request.iter().enumerate() {
            let placeholder = if arg.optional { "_option" } else { "_arg" };
            request.insert(
                arg.name.to_owned(),
                json!({ placeholder: index, "type": arg.type_.type_name() }),
            );
        }

        let mut response = Map::new();
        for field in self.response {
            response.insert(
                field.name.to_owned(),
                json!({ "_retval": field.type_.type_name() }),
            );
        }

        Method {
            name: self.name,
            request: Value::Object(request),
            response: Value::Object(response),
        }
    }
}
