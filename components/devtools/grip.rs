/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Serialization of debuggee values into grips.
//!
//! Primitives are inlined. Objects and long strings are handed to an
//! [`ObjectGripper`], which either describes them in a per call pool (the
//! tracer) or registers actors for them (the console).

use std::sync::Arc;

use devtools_traits::debugger::{
    Completion, DebuggeeObject, DebuggeeValue, ObjectId, PropertyKind,
};
use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Map, Value, json};

use crate::actor::ActorRegistry;
use crate::actors::object::ObjectActor;
use crate::actors::string::LongStringActor;
use crate::prefs::DevtoolsPrefs;

#[derive(Clone, Copy, Debug)]
pub(crate) struct StringLimits {
    pub long_string_length: usize,
    pub initial_length: usize,
}

impl From<&DevtoolsPrefs> for StringLimits {
    fn from(prefs: &DevtoolsPrefs) -> Self {
        StringLimits {
            long_string_length: prefs.long_string_length,
            initial_length: prefs.long_string_initial_length,
        }
    }
}

impl StringLimits {
    pub fn is_long(&self, value: &str) -> bool {
        value.chars().count() >= self.long_string_length
    }

    pub fn initial(&self, value: &str) -> String {
        value.chars().take(self.initial_length).collect()
    }
}

pub(crate) trait ObjectGripper {
    fn limits(&self) -> StringLimits;
    fn object_grip(&mut self, object: &Arc<dyn DebuggeeObject>) -> Value;
    fn long_string_grip(&mut self, value: &str) -> Value;
}

pub(crate) fn null_grip() -> Value {
    json!({ "type": "null" })
}

pub(crate) fn undefined_grip() -> Value {
    json!({ "type": "undefined" })
}

fn number_grip(number: f64) -> Value {
    if number.is_nan() {
        json!({ "type": "NaN" })
    } else if number == f64::INFINITY {
        json!({ "type": "Infinity" })
    } else if number == f64::NEG_INFINITY {
        json!({ "type": "-Infinity" })
    } else if number == 0.0 && number.is_sign_negative() {
        json!({ "type": "-0" })
    } else if number.fract() == 0.0 && number.abs() < 9007199254740992.0 {
        Value::from(number as i64)
    } else {
        Value::from(number)
    }
}

/// Create a grip for the given debuggee value.
pub(crate) fn value_grip(value: &DebuggeeValue, gripper: &mut dyn ObjectGripper) -> Value {
    match value {
        DebuggeeValue::Undefined => undefined_grip(),
        DebuggeeValue::Null => null_grip(),
        DebuggeeValue::Boolean(value) => Value::Bool(*value),
        DebuggeeValue::Number(value) => number_grip(*value),
        DebuggeeValue::String(value) if gripper.limits().is_long(value) => {
            gripper.long_string_grip(value)
        },
        DebuggeeValue::String(value) => Value::String(value.clone()),
        DebuggeeValue::Object(object) => gripper.object_grip(object),
    }
}

/// The descriptor of one own property, or `None` if the property vanished.
pub(crate) fn property_descriptor(
    object: &Arc<dyn DebuggeeObject>,
    name: &str,
    gripper: &mut dyn ObjectGripper,
) -> Option<Value> {
    let descriptor = match object.own_property_descriptor(name) {
        Ok(Some(descriptor)) => descriptor,
        Ok(None) => return None,
        Err(error) => {
            // Dead objects and the like cannot be introspected.
            return Some(json!({
                "configurable": false,
                "writable": false,
                "enumerable": false,
                "value": error.0,
            }));
        },
    };

    let mut result = Map::new();
    result.insert("configurable".to_owned(), descriptor.configurable.into());
    result.insert("enumerable".to_owned(), descriptor.enumerable.into());
    match &descriptor.kind {
        PropertyKind::Data { value, writable } => {
            result.insert("writable".to_owned(), (*writable).into());
            result.insert("value".to_owned(), value_grip(value, gripper));
        },
        PropertyKind::Accessor { get, set } => {
            let undefined = DebuggeeValue::Undefined;
            result.insert(
                "get".to_owned(),
                value_grip(get.as_ref().unwrap_or(&undefined), gripper),
            );
            result.insert(
                "set".to_owned(),
                value_grip(set.as_ref().unwrap_or(&undefined), gripper),
            );
        },
    }
    Some(Value::Object(result))
}

/// Descriptors of all own properties. A dead object has none.
pub(crate) fn own_properties(
    object: &Arc<dyn DebuggeeObject>,
    gripper: &mut dyn ObjectGripper,
) -> Map<String, Value> {
    let names = match object.own_property_names() {
        Ok(names) => names,
        Err(error) => {
            debug!("Cannot list properties of object: {}", error.0);
            return Map::new();
        },
    };
    names
        .into_iter()
        .filter_map(|name| {
            let descriptor = property_descriptor(object, &name, gripper)?;
            Some((name, descriptor))
        })
        .collect()
}

/// A getter can run during introspection only if it is native code.
fn is_safe_getter(getter: &Arc<dyn DebuggeeObject>) -> bool {
    getter.is_callable() && getter.class() == "Function" && !getter.has_script()
}

/// Run the safe getters found on the object and its prototype chain, and
/// describe the values they produce. Getters shadowed by own properties or by a
/// getter closer to the object are skipped.
pub(crate) fn safe_getter_values(
    object: &Arc<dyn DebuggeeObject>,
    own_properties: &Map<String, Value>,
    gripper: &mut dyn ObjectGripper,
) -> Map<String, Value> {
    let receiver = DebuggeeValue::Object(object.clone());
    let mut result = Map::new();
    let mut visited = FxHashSet::default();
    let mut level = 0;
    let mut current = Some(object.clone());

    while let Some(target) = current {
        if !visited.insert(target.id()) {
            break;
        }
        let Ok(names) = target.own_property_names() else {
            break;
        };

        for name in names {
            if result.contains_key(&name) || (level > 0 && own_properties.contains_key(&name)) {
                continue;
            }
            let Ok(Some(descriptor)) = target.own_property_descriptor(&name) else {
                continue;
            };
            let PropertyKind::Accessor {
                get: Some(DebuggeeValue::Object(getter)),
                ..
            } = &descriptor.kind
            else {
                continue;
            };
            if !is_safe_getter(getter) {
                continue;
            }

            let value = match getter.call(&receiver) {
                Completion::Return(value) | Completion::Yield(value) => value,
                Completion::Throw(_) | Completion::Terminated => continue,
            };
            if value.is_undefined() {
                continue;
            }

            let entry = json!({
                "getterValue": value_grip(&value, gripper),
                "getterPrototypeLevel": level,
                "enumerable": descriptor.enumerable,
                "writable": level != 0,
            });
            result.insert(name, entry);
        }

        current = target.proto();
        level += 1;
    }

    result
}

/// Describe an object: its class, flags, prototype and properties.
fn describe_object(object: &Arc<dyn DebuggeeObject>, gripper: &mut dyn ObjectGripper) -> Value {
    let mut descriptor = Map::new();
    descriptor.insert("class".to_owned(), object.class().into());
    descriptor.insert("extensible".to_owned(), object.is_extensible().into());
    descriptor.insert("frozen".to_owned(), object.is_frozen().into());
    descriptor.insert("sealed".to_owned(), object.is_sealed().into());
    if object.is_callable() {
        if let Some(name) = object.name() {
            descriptor.insert("name".to_owned(), name.into());
        }
        if let Some(display_name) = object.display_name() {
            descriptor.insert("displayName".to_owned(), display_name.into());
        }
    }

    if object.own_property_names().is_err() {
        descriptor.insert("prototype".to_owned(), null_grip());
        descriptor.insert("ownProperties".to_owned(), Value::Object(Map::new()));
        descriptor.insert("safeGetterValues".to_owned(), Value::Object(Map::new()));
        return Value::Object(descriptor);
    }

    let prototype = match object.proto() {
        Some(proto) => gripper.object_grip(&proto),
        None => null_grip(),
    };
    let properties = own_properties(object, gripper);
    let safe_getters = safe_getter_values(object, &properties, gripper);
    descriptor.insert("prototype".to_owned(), prototype);
    descriptor.insert("ownProperties".to_owned(), Value::Object(properties));
    descriptor.insert("safeGetterValues".to_owned(), Value::Object(safe_getters));
    Value::Object(descriptor)
}

/// The objects described while serializing one batch of values. Each object is
/// described once and referenced by its index afterwards, so cycles terminate.
pub(crate) struct ObjectPool {
    descriptors: Vec<Value>,
    indices: FxHashMap<ObjectId, usize>,
    limits: StringLimits,
}

impl ObjectPool {
    pub fn new(limits: StringLimits) -> ObjectPool {
        ObjectPool {
            descriptors: vec![],
            indices: FxHashMap::default(),
            limits,
        }
    }

    fn object_index(&mut self, object: &Arc<dyn DebuggeeObject>) -> usize {
        if let Some(index) = self.indices.get(&object.id()) {
            return *index;
        }
        let index = self.descriptors.len();
        self.descriptors.push(Value::Null);
        self.indices.insert(object.id(), index);
        let descriptor = describe_object(object, self);
        self.descriptors[index] = descriptor;
        index
    }

    pub fn into_descriptors(self) -> Vec<Value> {
        self.descriptors
    }
}

impl ObjectGripper for ObjectPool {
    fn limits(&self) -> StringLimits {
        self.limits
    }

    fn object_grip(&mut self, object: &Arc<dyn DebuggeeObject>) -> Value {
        json!({ "type": "object", "objectId": self.object_index(object) })
    }

    fn long_string_grip(&mut self, value: &str) -> Value {
        json!({
            "type": "longString",
            "initial": self.limits.initial(value),
            "length": value.chars().count(),
        })
    }
}

/// Grips backed by actors that the client can query later. They are released
/// together with `owner`.
pub(crate) struct ActorGripper<'a> {
    pub registry: &'a ActorRegistry,
    pub owner: String,
}

impl<'a> ActorGripper<'a> {
    pub fn new(registry: &'a ActorRegistry, owner: &str) -> ActorGripper<'a> {
        ActorGripper {
            registry,
            owner: owner.to_owned(),
        }
    }
}

impl ObjectGripper for ActorGripper<'_> {
    fn limits(&self) -> StringLimits {
        StringLimits::from(self.registry.prefs())
    }

    fn object_grip(&mut self, object: &Arc<dyn DebuggeeObject>) -> Value {
        ObjectActor::grip(self.registry, &self.owner, object)
    }

    fn long_string_grip(&mut self, value: &str) -> Value {
        LongStringActor::grip(self.registry, &self.owner, value)
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use devtools_traits::debugger::{
        Completion, DebuggeeError, DebuggeeObject, DebuggeeValue, ObjectId, PropertyDescriptor,
        PropertyKind,
    };
    use serde_json::json;

    use super::{ObjectPool, StringLimits, value_grip};

    struct TestObject {
        id: u64,
        class: &'static str,
        native: bool,
        result: Option<DebuggeeValue>,
        properties: Mutex<Vec<(String, PropertyKind)>>,
        proto: Mutex<Option<Arc<dyn DebuggeeObject>>>,
        dead: bool,
    }

    impl TestObject {
        fn new(id: u64) -> Arc<TestObject> {
            Arc::new(TestObject {
                id,
                class: "Object",
                native: false,
                result: None,
                properties: Mutex::new(vec![]),
                proto: Mutex::new(None),
                dead: false,
            })
        }

        fn getter(id: u64, native: bool, result: DebuggeeValue) -> Arc<TestObject> {
            Arc::new(TestObject {
                id,
                class: "Function",
                native,
                result: Some(result),
                properties: Mutex::new(vec![]),
                proto: Mutex::new(None),
                dead: false,
            })
        }

        fn set(&self, name: &str, kind: PropertyKind) {
            self.properties.lock().unwrap().push((name.to_owned(), kind));
        }
    }

    impl DebuggeeObject for TestObject {
        fn id(&self) -> ObjectId {
            ObjectId(self.id)
        }
        fn class(&self) -> String {
            self.class.to_owned()
        }
        fn is_extensible(&self) -> bool {
            true
        }
        fn is_frozen(&self) -> bool {
            false
        }
        fn is_sealed(&self) -> bool {
            false
        }
        fn is_callable(&self) -> bool {
            self.result.is_some()
        }
        fn has_script(&self) -> bool {
            !self.native
        }
        fn own_property_names(&self) -> Result<Vec<String>, DebuggeeError> {
            if self.dead {
                return Err(DebuggeeError("TypeError".to_owned()));
            }
            Ok(self
                .properties
                .lock()
                .unwrap()
                .iter()
                .map(|(name, _)| name.clone())
                .collect())
        }
        fn own_property_descriptor(
            &self,
            name: &str,
        ) -> Result<Option<PropertyDescriptor>, DebuggeeError> {
            Ok(self
                .properties
                .lock()
                .unwrap()
                .iter()
                .find(|(property, _)| property == name)
                .map(|(_, kind)| PropertyDescriptor {
                    configurable: true,
                    enumerable: true,
                    kind: kind.clone(),
                }))
        }
        fn proto(&self) -> Option<Arc<dyn DebuggeeObject>> {
            self.proto.lock().unwrap().clone()
        }
        fn call(&self, _receiver: &DebuggeeValue) -> Completion {
            Completion::Return(self.result.clone().unwrap_or(DebuggeeValue::Undefined))
        }
    }

    fn limits() -> StringLimits {
        StringLimits {
            long_string_length: 10,
            initial_length: 4,
        }
    }

    fn data(value: DebuggeeValue) -> PropertyKind {
        PropertyKind::Data {
            value,
            writable: true,
        }
    }

    #[test]
    fn cyclic_objects_are_described_once() {
        let a = TestObject::new(1);
        a.set("self", data(DebuggeeValue::Object(a.clone())));

        let mut pool = ObjectPool::new(limits());
        let grip = value_grip(&DebuggeeValue::Object(a.clone()), &mut pool);
        assert_eq!(grip, json!({"type": "object", "objectId": 0}));

        let descriptors = pool.into_descriptors();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(
            descriptors[0]["ownProperties"]["self"]["value"],
            json!({"type": "object", "objectId": 0})
        );
        assert_eq!(descriptors[0]["prototype"], json!({"type": "null"}));
    }

    #[test]
    fn shared_objects_keep_one_index() {
        let shared = TestObject::new(7);
        let holder = TestObject::new(8);
        holder.set("first", data(DebuggeeValue::Object(shared.clone())));
        holder.set("second", data(DebuggeeValue::Object(shared.clone())));

        let mut pool = ObjectPool::new(limits());
        value_grip(&DebuggeeValue::Object(holder), &mut pool);
        let descriptors = pool.into_descriptors();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(
            descriptors[0]["ownProperties"]["first"]["value"],
            descriptors[0]["ownProperties"]["second"]["value"]
        );
    }

    #[test]
    fn primitives_and_long_strings() {
        let mut pool = ObjectPool::new(limits());
        assert_eq!(value_grip(&DebuggeeValue::Undefined, &mut pool), json!({"type": "undefined"}));
        assert_eq!(value_grip(&DebuggeeValue::Null, &mut pool), json!({"type": "null"}));
        assert_eq!(value_grip(&DebuggeeValue::Number(2.0), &mut pool), json!(2));
        assert_eq!(value_grip(&DebuggeeValue::Number(0.5), &mut pool), json!(0.5));
        assert_eq!(
            value_grip(&DebuggeeValue::Number(f64::NAN), &mut pool),
            json!({"type": "NaN"})
        );
        assert_eq!(value_grip(&"short".into(), &mut pool), json!("short"));
        assert_eq!(
            value_grip(&"0123456789abc".into(), &mut pool),
            json!({"type": "longString", "initial": "0123", "length": 13})
        );
    }

    #[test]
    fn only_native_getters_run() {
        let proto = TestObject::new(2);
        proto.set(
            "nativeLength",
            PropertyKind::Accessor {
                get: Some(DebuggeeValue::Object(TestObject::getter(
                    3,
                    true,
                    DebuggeeValue::Number(4.0),
                ))),
                set: None,
            },
        );
        proto.set(
            "scripted",
            PropertyKind::Accessor {
                get: Some(DebuggeeValue::Object(TestObject::getter(
                    4,
                    false,
                    DebuggeeValue::Number(5.0),
                ))),
                set: None,
            },
        );
        let object = TestObject::new(1);
        *object.proto.lock().unwrap() = Some(proto as Arc<dyn DebuggeeObject>);

        let mut pool = ObjectPool::new(limits());
        value_grip(&DebuggeeValue::Object(object), &mut pool);
        let descriptors = pool.into_descriptors();
        let safe = descriptors[0]["safeGetterValues"].as_object().unwrap();
        assert_eq!(safe.len(), 1);
        assert_eq!(safe["nativeLength"]["getterValue"], json!(4));
        assert_eq!(safe["nativeLength"]["getterPrototypeLevel"], json!(1));
    }

    #[test]
    fn dead_objects_have_no_properties() {
        let dead = Arc::new(TestObject {
            id: 9,
            class: "Window",
            native: false,
            result: None,
            properties: Mutex::new(vec![]),
            proto: Mutex::new(None),
            dead: true,
        });
        let mut pool = ObjectPool::new(limits());
        value_grip(&DebuggeeValue::Object(dead), &mut pool);
        let descriptors = pool.into_descriptors();
        assert_eq!(descriptors[0]["class"], json!("Window"));
        assert_eq!(descriptors[0]["ownProperties"], json!({}));
        assert_eq!(descriptors[0]["prototype"], json!({"type": "null"}));
    }
}
