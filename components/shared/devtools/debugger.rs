/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The reflection interface of the script engine: debuggee values, frames and hooks.

use core::fmt;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::dom::NodeId;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct GlobalId(pub u64);

/// Identity of a debuggee object, used to describe each object once.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ObjectId(pub u64);

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct FrameId(pub u64);

/// A value living in the debuggee.
#[derive(Clone)]
pub enum DebuggeeValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Object(Arc<dyn DebuggeeObject>),
}

impl DebuggeeValue {
    pub fn as_object(&self) -> Option<&Arc<dyn DebuggeeObject>> {
        match self {
            DebuggeeValue::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, DebuggeeValue::Undefined)
    }
}

impl fmt::Debug for DebuggeeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebuggeeValue::Undefined => write!(f, "undefined"),
            DebuggeeValue::Null => write!(f, "null"),
            DebuggeeValue::Boolean(value) => write!(f, "{value}"),
            DebuggeeValue::Number(value) => write!(f, "{value}"),
            DebuggeeValue::String(value) => write!(f, "{value:?}"),
            DebuggeeValue::Object(object) => {
                write!(f, "[object {} #{}]", object.class(), object.id().0)
            },
        }
    }
}

impl From<&str> for DebuggeeValue {
    fn from(value: &str) -> Self {
        DebuggeeValue::String(value.to_owned())
    }
}

impl From<f64> for DebuggeeValue {
    fn from(value: f64) -> Self {
        DebuggeeValue::Number(value)
    }
}

impl From<bool> for DebuggeeValue {
    fn from(value: bool) -> Self {
        DebuggeeValue::Boolean(value)
    }
}

/// The object went away (a nuked cross compartment wrapper, a closed window) and
/// can no longer be introspected. Carries the name of the error the engine raised.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DebuggeeError(pub String);

#[derive(Clone, Debug)]
pub enum PropertyKind {
    Data {
        value: DebuggeeValue,
        writable: bool,
    },
    Accessor {
        get: Option<DebuggeeValue>,
        set: Option<DebuggeeValue>,
    },
}

#[derive(Clone, Debug)]
pub struct PropertyDescriptor {
    pub configurable: bool,
    pub enumerable: bool,
    pub kind: PropertyKind,
}

/// The result of running debuggee code.
#[derive(Clone, Debug)]
pub enum Completion {
    Return(DebuggeeValue),
    Throw(DebuggeeValue),
    Yield(DebuggeeValue),
    /// Execution was killed without producing a value.
    Terminated,
}

/// Reflection over one debuggee object.
pub trait DebuggeeObject: Send + Sync {
    fn id(&self) -> ObjectId;
    fn class(&self) -> String;
    fn is_extensible(&self) -> bool;
    fn is_frozen(&self) -> bool;
    fn is_sealed(&self) -> bool;
    fn is_callable(&self) -> bool {
        false
    }
    /// Whether script source backs this function. Native functions have none.
    fn has_script(&self) -> bool {
        false
    }
    fn name(&self) -> Option<String> {
        None
    }
    fn display_name(&self) -> Option<String> {
        None
    }
    /// The global the object was created in.
    fn global(&self) -> Option<GlobalId> {
        None
    }
    fn own_property_names(&self) -> Result<Vec<String>, DebuggeeError>;
    fn own_property_descriptor(
        &self,
        name: &str,
    ) -> Result<Option<PropertyDescriptor>, DebuggeeError>;
    fn proto(&self) -> Option<Arc<dyn DebuggeeObject>>;
    /// Call this function with `this` bound to `receiver` and no arguments.
    fn call(&self, receiver: &DebuggeeValue) -> Completion;
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScriptLocation {
    pub url: String,
    pub line: u32,
    /// `None` when the engine cannot map the offset to a column.
    pub column: Option<u32>,
}

/// A live stack frame, as seen by frame hooks.
pub trait DebuggeeFrame {
    fn id(&self) -> FrameId;
    /// `"call"`, `"eval"` or `"global"`.
    fn frame_type(&self) -> String;
    fn callee(&self) -> Option<Arc<dyn DebuggeeObject>>;
    fn location(&self) -> Option<ScriptLocation>;
    fn parameter_names(&self) -> Option<Vec<String>>;
    fn arguments(&self) -> Option<Vec<DebuggeeValue>>;
}

/// Callbacks run by the engine on the thread executing debuggee code.
///
/// `on_pop_frame` is only called for frames `on_enter_frame` saw.
pub trait FrameHook: Send + Sync {
    fn on_enter_frame(&self, frame: &dyn DebuggeeFrame);
    fn on_pop_frame(&self, frame: &dyn DebuggeeFrame, completion: &Completion);
}

/// Decides whether a newly created global becomes a debuggee. Receives the new
/// global and the global that embeds it, if any.
pub type NewGlobalHook = Box<dyn Fn(GlobalId, Option<GlobalId>) -> bool + Send + Sync>;

/// A host function exposed to evaluated code for the duration of one evaluation.
pub type HelperFunction = Arc<dyn Fn(&[DebuggeeValue]) -> DebuggeeValue + Send + Sync>;

#[derive(Clone)]
pub enum Binding {
    Value(DebuggeeValue),
    Function(HelperFunction),
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Value(value) => write!(f, "Value({value:?})"),
            Binding::Function(_) => write!(f, "Function"),
        }
    }
}

/// Extra names visible to evaluated code on top of the target's own scope.
pub type Bindings = BTreeMap<String, Binding>;

/// A paused frame, as listed by the thread actor.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameInfo {
    pub id: FrameId,
    pub frame_type: String,
    pub display_name: String,
    pub url: String,
    pub line: u32,
    pub column: u32,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AutocompleteResult {
    pub matches: Vec<String>,
    pub match_prop: String,
}

/// One debugger attached to the engine. Dropping the session removes its hooks
/// and debuggees.
pub trait DebuggerSession: Send {
    fn add_debuggee(&mut self, global: GlobalId) -> Result<(), DebuggeeError>;
    fn remove_debuggee(&mut self, global: GlobalId);
    fn set_frame_hook(&mut self, hook: Option<Arc<dyn FrameHook>>);
    fn set_new_global_hook(&mut self, hook: Option<NewGlobalHook>);
    /// Hooks only run while the session is enabled.
    fn set_enabled(&mut self, enabled: bool);
    fn eval_in_global(&mut self, global: GlobalId, source: &str, bindings: &Bindings)
    -> Completion;
    fn eval_in_frame(&mut self, frame: FrameId, source: &str, bindings: &Bindings) -> Completion;
    /// Whether the global already defines `name` itself.
    fn global_has_binding(&self, global: GlobalId, name: &str) -> bool;
    fn frame_has_binding(&self, frame: FrameId, name: &str) -> bool;
    /// The string conversion of a thrown value, when it has one.
    fn error_message(&self, value: &DebuggeeValue) -> Option<String>;
    fn autocomplete(&self, global: GlobalId, input: &str) -> Option<AutocompleteResult>;
}

/// The script engine of one tab.
pub trait ScriptEngine: Send + Sync {
    fn content_global(&self) -> GlobalId;
    /// Globals of same origin frames embedded by `global`, recursively.
    fn child_globals(&self, global: GlobalId) -> Vec<GlobalId>;
    fn new_debugger(&self) -> Box<dyn DebuggerSession>;
    /// Frames of the currently paused stack, youngest first.
    fn paused_frames(&self) -> Vec<FrameInfo>;
    /// The debuggee object that reflects a DOM node.
    fn node_value(&self, node: NodeId) -> DebuggeeValue;
    /// A new debuggee array holding the given elements.
    fn make_array(&self, elements: Vec<DebuggeeValue>) -> DebuggeeValue;
}
