/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! In-memory stand-ins for the document and script engine of a tab.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use devtools_traits::debugger::{
    AutocompleteResult, Binding, Bindings, Completion, DebuggeeError, DebuggeeFrame,
    DebuggeeObject, DebuggeeValue, DebuggerSession, FrameHook, FrameId, FrameInfo, GlobalId,
    NewGlobalHook, ObjectId, PropertyDescriptor, PropertyKind, ScriptEngine, ScriptLocation,
};
use devtools_traits::dom::{
    AttrInfo, DOCUMENT_NODE, DocumentTree, DomMutation, ELEMENT_NODE, MutationCallback,
    MutationObserverInit, NodeId, NodeInfo, ObserverId, SelectorError, TEXT_NODE,
};

struct MockNode {
    node_type: u16,
    name: String,
    value: Option<String>,
    attrs: Vec<AttrInfo>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

type Observer = Arc<dyn Fn(Vec<DomMutation>) + Send + Sync>;

#[derive(Default)]
struct Tree {
    nodes: BTreeMap<NodeId, MockNode>,
    next_node: u64,
    observers: Vec<(ObserverId, NodeId, Observer)>,
    next_observer: u64,
}

impl Tree {
    fn insert(&mut self, node: MockNode) -> NodeId {
        self.next_node += 1;
        let id = NodeId(self.next_node);
        if let Some(parent) = node.parent {
            if let Some(parent) = self.nodes.get_mut(&parent) {
                parent.children.push(id);
            }
        }
        self.nodes.insert(id, node);
        id
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.nodes.get(&node).and_then(|node| node.parent) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    fn sibling(&self, node: NodeId, offset: isize) -> Option<NodeId> {
        let parent = self.nodes.get(&node)?.parent?;
        let siblings = &self.nodes.get(&parent)?.children;
        let index = siblings.iter().position(|sibling| *sibling == node)? as isize + offset;
        usize::try_from(index)
            .ok()
            .and_then(|index| siblings.get(index))
            .copied()
    }

    fn descendants(&self, base: NodeId) -> Vec<NodeId> {
        let mut found = vec![];
        let mut stack: Vec<NodeId> = self
            .nodes
            .get(&base)
            .map(|node| node.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(node) = stack.pop() {
            found.push(node);
            if let Some(node) = self.nodes.get(&node) {
                stack.extend(node.children.iter().rev());
            }
        }
        found
    }

    fn matches(&self, node: NodeId, selector: &str) -> bool {
        let Some(node) = self.nodes.get(&node) else {
            return false;
        };
        if node.node_type != ELEMENT_NODE {
            return false;
        }
        let attr = |name: &str| {
            node.attrs
                .iter()
                .find(|attr| attr.name == name)
                .map(|attr| attr.value.as_str())
        };
        if let Some(id) = selector.strip_prefix('#') {
            attr("id") == Some(id)
        } else if let Some(class) = selector.strip_prefix('.') {
            attr("class").is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
        } else {
            node.name.eq_ignore_ascii_case(selector)
        }
    }
}

/// A single document made of elements and text nodes. Selectors are limited to
/// `#id`, `.class` and tag names.
pub struct MockDocument {
    root: NodeId,
    tree: Mutex<Tree>,
}

impl MockDocument {
    pub fn new() -> Arc<MockDocument> {
        let mut tree = Tree::default();
        let root = tree.insert(MockNode {
            node_type: DOCUMENT_NODE,
            name: "#document".to_owned(),
            value: None,
            attrs: vec![],
            parent: None,
            children: vec![],
        });
        Arc::new(MockDocument {
            root,
            tree: Mutex::new(tree),
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Append an element without telling observers, to build the initial page.
    pub fn element(&self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        self.tree.lock().unwrap().insert(MockNode {
            node_type: ELEMENT_NODE,
            name: tag.to_uppercase(),
            value: None,
            attrs: attrs
                .iter()
                .map(|(name, value)| AttrInfo {
                    namespace: None,
                    name: (*name).to_owned(),
                    value: (*value).to_owned(),
                })
                .collect(),
            parent: Some(parent),
            children: vec![],
        })
    }

    pub fn text(&self, parent: NodeId, value: &str) -> NodeId {
        self.tree.lock().unwrap().insert(MockNode {
            node_type: TEXT_NODE,
            name: "#text".to_owned(),
            value: Some(value.to_owned()),
            attrs: vec![],
            parent: Some(parent),
            children: vec![],
        })
    }

    pub fn node(&self, selector: &str) -> NodeId {
        self.query_selector(self.root, selector).unwrap().unwrap()
    }

    /// Detach `node` from its parent.
    pub fn remove(&self, node: NodeId) {
        let parent = {
            let mut tree = self.tree.lock().unwrap();
            let parent = tree.nodes.get_mut(&node).unwrap().parent.take().unwrap();
            tree.nodes
                .get_mut(&parent)
                .unwrap()
                .children
                .retain(|child| *child != node);
            parent
        };
        self.notify(DomMutation::ChildList {
            target: parent,
            added: vec![],
            removed: vec![node],
        });
    }

    /// Append a detached node to `parent`.
    pub fn append(&self, parent: NodeId, node: NodeId) {
        {
            let mut tree = self.tree.lock().unwrap();
            tree.nodes.get_mut(&node).unwrap().parent = Some(parent);
            tree.nodes.get_mut(&parent).unwrap().children.push(node);
        }
        self.notify(DomMutation::ChildList {
            target: parent,
            added: vec![node],
            removed: vec![],
        });
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: Option<&str>) {
        {
            let mut tree = self.tree.lock().unwrap();
            let attrs = &mut tree.nodes.get_mut(&node).unwrap().attrs;
            attrs.retain(|attr| attr.name != name);
            if let Some(value) = value {
                attrs.push(AttrInfo {
                    namespace: None,
                    name: name.to_owned(),
                    value: value.to_owned(),
                });
            }
        }
        self.notify(DomMutation::Attributes {
            target: node,
            attribute_name: name.to_owned(),
            attribute_namespace: None,
        });
    }

    pub fn set_text(&self, node: NodeId, value: &str) {
        self.tree.lock().unwrap().nodes.get_mut(&node).unwrap().value = Some(value.to_owned());
        self.notify(DomMutation::CharacterData { target: node });
    }

    pub fn observer_count(&self) -> usize {
        self.tree.lock().unwrap().observers.len()
    }

    fn notify(&self, mutation: DomMutation) {
        let observers: Vec<Observer> = {
            let tree = self.tree.lock().unwrap();
            tree.observers
                .iter()
                .filter(|(_, target, _)| tree.is_inclusive_ancestor(*target, mutation.target()))
                .map(|(_, _, callback)| callback.clone())
                .collect()
        };
        for observer in observers {
            observer(vec![mutation.clone()]);
        }
    }
}

impl DocumentTree for MockDocument {
    fn root_document(&self) -> NodeId {
        self.root
    }

    fn node_info(&self, node: NodeId) -> Option<NodeInfo> {
        let tree = self.tree.lock().unwrap();
        let node = tree.nodes.get(&node)?;
        Some(NodeInfo {
            node_type: node.node_type,
            node_name: node.name.clone(),
            namespace_uri: None,
            node_value: node.value.clone(),
            num_children: node.children.len(),
            attrs: node.attrs.clone(),
            doctype: None,
        })
    }

    fn parent_node(&self, node: NodeId) -> Option<NodeId> {
        self.tree.lock().unwrap().nodes.get(&node)?.parent
    }

    fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.tree.lock().unwrap().nodes.get(&node)?.children.first().copied()
    }

    fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.tree.lock().unwrap().nodes.get(&node)?.children.last().copied()
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.tree.lock().unwrap().sibling(node, 1)
    }

    fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.tree.lock().unwrap().sibling(node, -1)
    }

    fn owner_document(&self, node: NodeId) -> Option<NodeId> {
        if node == self.root {
            return None;
        }
        let tree = self.tree.lock().unwrap();
        tree.is_inclusive_ancestor(self.root, node).then_some(self.root)
    }

    fn document_element(&self, document: NodeId) -> Option<NodeId> {
        let tree = self.tree.lock().unwrap();
        tree.nodes
            .get(&document)?
            .children
            .iter()
            .copied()
            .find(|child| tree.nodes.get(child).is_some_and(|child| child.node_type == ELEMENT_NODE))
    }

    fn content_document(&self, _frame: NodeId) -> Option<NodeId> {
        None
    }

    fn embedding_frame(&self, _document: NodeId) -> Option<NodeId> {
        None
    }

    fn get_attribute(&self, node: NodeId, name: &str) -> Option<String> {
        let tree = self.tree.lock().unwrap();
        tree.nodes
            .get(&node)?
            .attrs
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.clone())
    }

    fn query_selector(&self, base: NodeId, selector: &str) -> Result<Option<NodeId>, SelectorError> {
        Ok(self.query_selector_all(base, selector)?.into_iter().next())
    }

    fn query_selector_all(&self, base: NodeId, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        let valid = selector
            .trim_start_matches(['#', '.'])
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if selector.is_empty() || !valid {
            return Err(SelectorError(selector.to_owned()));
        }
        let tree = self.tree.lock().unwrap();
        Ok(tree
            .descendants(base)
            .into_iter()
            .filter(|node| tree.matches(*node, selector))
            .collect())
    }

    fn set_node_value(&self, node: NodeId, value: &str) -> bool {
        let is_text = {
            let mut tree = self.tree.lock().unwrap();
            match tree.nodes.get_mut(&node) {
                Some(node) if node.node_type == TEXT_NODE => {
                    node.value = Some(value.to_owned());
                    true
                },
                _ => false,
            }
        };
        if is_text {
            self.notify(DomMutation::CharacterData { target: node });
        }
        is_text
    }

    fn observe(
        &self,
        target: NodeId,
        _options: MutationObserverInit,
        callback: MutationCallback,
    ) -> ObserverId {
        let mut tree = self.tree.lock().unwrap();
        tree.next_observer += 1;
        let id = ObserverId(tree.next_observer);
        tree.observers.push((id, target, Arc::from(callback)));
        id
    }

    fn disconnect(&self, observer: ObserverId) {
        self.tree
            .lock()
            .unwrap()
            .observers
            .retain(|(id, _, _)| *id != observer);
    }
}

/// An object with data properties only.
pub struct MockObject {
    id: ObjectId,
    class: String,
    global: Option<GlobalId>,
    properties: Mutex<Vec<(String, DebuggeeValue)>>,
}

impl MockObject {
    pub fn set(&self, name: &str, value: DebuggeeValue) {
        let mut properties = self.properties.lock().unwrap();
        properties.retain(|(existing, _)| existing != name);
        properties.push((name.to_owned(), value));
    }
}

impl DebuggeeObject for MockObject {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn class(&self) -> String {
        self.class.clone()
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

    fn global(&self) -> Option<GlobalId> {
        self.global
    }

    fn own_property_names(&self) -> Result<Vec<String>, DebuggeeError> {
        Ok(self
            .properties
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn own_property_descriptor(&self, name: &str) -> Result<Option<PropertyDescriptor>, DebuggeeError> {
        let properties = self.properties.lock().unwrap();
        Ok(properties
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| PropertyDescriptor {
                configurable: true,
                enumerable: true,
                kind: PropertyKind::Data {
                    value: value.clone(),
                    writable: true,
                },
            }))
    }

    fn proto(&self) -> Option<Arc<dyn DebuggeeObject>> {
        None
    }

    fn call(&self, _receiver: &DebuggeeValue) -> Completion {
        Completion::Return(DebuggeeValue::Undefined)
    }
}

/// A named function, used as the callee of traced frames.
struct MockFunction {
    id: ObjectId,
    name: String,
}

impl DebuggeeObject for MockFunction {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn class(&self) -> String {
        "Function".to_owned()
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
        true
    }

    fn has_script(&self) -> bool {
        true
    }

    fn name(&self) -> Option<String> {
        Some(self.name.clone())
    }

    fn display_name(&self) -> Option<String> {
        Some(self.name.clone())
    }

    fn own_property_names(&self) -> Result<Vec<String>, DebuggeeError> {
        Ok(vec![])
    }

    fn own_property_descriptor(&self, _name: &str) -> Result<Option<PropertyDescriptor>, DebuggeeError> {
        Ok(None)
    }

    fn proto(&self) -> Option<Arc<dyn DebuggeeObject>> {
        None
    }

    fn call(&self, _receiver: &DebuggeeValue) -> Completion {
        Completion::Return(DebuggeeValue::Undefined)
    }
}

struct MockFrame {
    id: FrameId,
    callee: Arc<dyn DebuggeeObject>,
    parameter_names: Vec<String>,
    arguments: Vec<DebuggeeValue>,
}

impl DebuggeeFrame for MockFrame {
    fn id(&self) -> FrameId {
        self.id
    }

    fn frame_type(&self) -> String {
        "call".to_owned()
    }

    fn callee(&self) -> Option<Arc<dyn DebuggeeObject>> {
        Some(self.callee.clone())
    }

    fn location(&self) -> Option<ScriptLocation> {
        Some(ScriptLocation {
            url: "http://test/script.js".to_owned(),
            line: 3,
            column: Some(7),
        })
    }

    fn parameter_names(&self) -> Option<Vec<String>> {
        Some(self.parameter_names.clone())
    }

    fn arguments(&self) -> Option<Vec<DebuggeeValue>> {
        Some(self.arguments.clone())
    }
}

#[derive(Default)]
struct SessionState {
    debuggees: Vec<GlobalId>,
    frame_hook: Option<Arc<dyn FrameHook>>,
    enabled: bool,
}

type Locals = BTreeMap<String, DebuggeeValue>;

#[derive(Default)]
struct EngineState {
    next_id: AtomicU64,
    globals: Mutex<Locals>,
    sessions: Mutex<Vec<Weak<Mutex<SessionState>>>>,
    /// The paused stack, youngest frame first.
    paused: Mutex<Vec<(FrameInfo, Locals)>>,
}

impl EngineState {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

pub const CONTENT_GLOBAL: GlobalId = GlobalId(1);

/// A script engine whose "scripts" are a handful of expression forms: number
/// and string literals, `throw <literal>`, names, and calls of bound helpers
/// with at most one argument.
#[derive(Clone, Default)]
pub struct MockEngine {
    state: Arc<EngineState>,
}

impl MockEngine {
    pub fn new() -> Arc<MockEngine> {
        Arc::new(MockEngine::default())
    }

    pub fn object(&self, class: &str) -> Arc<MockObject> {
        Arc::new(MockObject {
            id: ObjectId(self.state.next_id()),
            class: class.to_owned(),
            global: Some(CONTENT_GLOBAL),
            properties: Mutex::default(),
        })
    }

    pub fn define_global(&self, name: &str, value: DebuggeeValue) {
        self.state
            .globals
            .lock()
            .unwrap()
            .insert(name.to_owned(), value);
    }

    /// Pause inside a new youngest frame of `name` that binds `locals`.
    pub fn pause(&self, name: &str, locals: &[(&str, DebuggeeValue)]) -> FrameId {
        let id = FrameId(self.state.next_id());
        let info = FrameInfo {
            id,
            frame_type: "call".to_owned(),
            display_name: name.to_owned(),
            url: "http://test/script.js".to_owned(),
            line: 3,
            column: 7,
        };
        let locals = locals
            .iter()
            .map(|(name, value)| ((*name).to_owned(), value.clone()))
            .collect();
        self.state.paused.lock().unwrap().insert(0, (info, locals));
        id
    }

    pub fn resume(&self) {
        self.state.paused.lock().unwrap().clear();
    }

    fn frame_locals(&self, frame: FrameId) -> Option<Locals> {
        self.state
            .paused
            .lock()
            .unwrap()
            .iter()
            .find(|(info, _)| info.id == frame)
            .map(|(_, locals)| locals.clone())
    }

    /// Run a content function, reporting it to every enabled debugger watching
    /// the content global.
    pub fn call_function(
        &self,
        name: &str,
        parameter_names: &[&str],
        arguments: Vec<DebuggeeValue>,
        completion: Completion,
    ) {
        let frame = MockFrame {
            id: FrameId(self.state.next_id()),
            callee: Arc::new(MockFunction {
                id: ObjectId(self.state.next_id()),
                name: name.to_owned(),
            }),
            parameter_names: parameter_names.iter().map(|name| (*name).to_owned()).collect(),
            arguments,
        };
        let hooks: Vec<Arc<dyn FrameHook>> = {
            let mut sessions = self.state.sessions.lock().unwrap();
            sessions.retain(|session| session.strong_count() > 0);
            sessions
                .iter()
                .filter_map(Weak::upgrade)
                .filter_map(|session| {
                    let session = session.lock().unwrap();
                    let watching = session.enabled && session.debuggees.contains(&CONTENT_GLOBAL);
                    session.frame_hook.clone().filter(|_| watching)
                })
                .collect()
        };
        for hook in &hooks {
            hook.on_enter_frame(&frame);
        }
        for hook in &hooks {
            hook.on_pop_frame(&frame, &completion);
        }
    }

    fn eval(&self, source: &str, bindings: &Bindings, locals: &Locals) -> Completion {
        let source = source.trim();
        if let Some(thrown) = source.strip_prefix("throw ") {
            return match self.literal(thrown) {
                Some(value) => Completion::Throw(value),
                None => Completion::Throw(DebuggeeValue::from("SyntaxError")),
            };
        }
        if let Some(value) = self.literal(source) {
            return Completion::Return(value);
        }
        if let Some((name, rest)) = source.split_once('(') {
            let Some(argument) = rest.strip_suffix(')') else {
                return Completion::Throw(DebuggeeValue::from("SyntaxError"));
            };
            let arguments = match argument.trim() {
                "" => vec![],
                argument => match self.literal(argument).or_else(|| self.lookup(argument, bindings, locals)) {
                    Some(value) => vec![value],
                    None => return self.not_defined(argument),
                },
            };
            return match bindings.get(name.trim()) {
                Some(Binding::Function(function)) => Completion::Return(function(&arguments)),
                _ => Completion::Throw(DebuggeeValue::String(format!(
                    "TypeError: {} is not a function",
                    name.trim()
                ))),
            };
        }
        match self.lookup(source, bindings, locals) {
            Some(value) => Completion::Return(value),
            None => self.not_defined(source),
        }
    }

    fn literal(&self, source: &str) -> Option<DebuggeeValue> {
        let source = source.trim();
        if let Ok(number) = source.parse::<f64>() {
            return Some(DebuggeeValue::Number(number));
        }
        source
            .strip_prefix('\'')
            .and_then(|rest| rest.strip_suffix('\''))
            .map(DebuggeeValue::from)
    }

    fn lookup(&self, name: &str, bindings: &Bindings, locals: &Locals) -> Option<DebuggeeValue> {
        match bindings.get(name) {
            Some(Binding::Value(value)) => Some(value.clone()),
            Some(Binding::Function(_)) => Some(DebuggeeValue::Undefined),
            None => locals
                .get(name)
                .cloned()
                .or_else(|| self.state.globals.lock().unwrap().get(name).cloned()),
        }
    }

    fn not_defined(&self, name: &str) -> Completion {
        Completion::Throw(DebuggeeValue::String(format!(
            "ReferenceError: {name} is not defined"
        )))
    }
}

impl ScriptEngine for MockEngine {
    fn content_global(&self) -> GlobalId {
        CONTENT_GLOBAL
    }

    fn child_globals(&self, _global: GlobalId) -> Vec<GlobalId> {
        vec![]
    }

    fn new_debugger(&self) -> Box<dyn DebuggerSession> {
        let state = Arc::new(Mutex::new(SessionState::default()));
        self.state
            .sessions
            .lock()
            .unwrap()
            .push(Arc::downgrade(&state));
        Box::new(MockSession {
            engine: self.clone(),
            state,
        })
    }

    fn paused_frames(&self) -> Vec<FrameInfo> {
        self.state
            .paused
            .lock()
            .unwrap()
            .iter()
            .map(|(info, _)| info.clone())
            .collect()
    }

    fn node_value(&self, node: NodeId) -> DebuggeeValue {
        let object = Arc::new(MockObject {
            id: ObjectId(1_000_000 + node.0),
            class: "HTMLElement".to_owned(),
            global: Some(CONTENT_GLOBAL),
            properties: Mutex::default(),
        });
        DebuggeeValue::Object(object)
    }

    fn make_array(&self, elements: Vec<DebuggeeValue>) -> DebuggeeValue {
        let array = self.object("Array");
        let length = elements.len();
        for (index, element) in elements.into_iter().enumerate() {
            array.set(&index.to_string(), element);
        }
        array.set("length", DebuggeeValue::Number(length as f64));
        DebuggeeValue::Object(array)
    }
}

struct MockSession {
    engine: MockEngine,
    state: Arc<Mutex<SessionState>>,
}

impl DebuggerSession for MockSession {
    fn add_debuggee(&mut self, global: GlobalId) -> Result<(), DebuggeeError> {
        let mut state = self.state.lock().unwrap();
        if !state.debuggees.contains(&global) {
            state.debuggees.push(global);
        }
        Ok(())
    }

    fn remove_debuggee(&mut self, global: GlobalId) {
        self.state
            .lock()
            .unwrap()
            .debuggees
            .retain(|debuggee| *debuggee != global);
    }

    fn set_frame_hook(&mut self, hook: Option<Arc<dyn FrameHook>>) {
        self.state.lock().unwrap().frame_hook = hook;
    }

    fn set_new_global_hook(&mut self, _hook: Option<NewGlobalHook>) {}

    fn set_enabled(&mut self, enabled: bool) {
        self.state.lock().unwrap().enabled = enabled;
    }

    fn eval_in_global(&mut self, _global: GlobalId, source: &str, bindings: &Bindings) -> Completion {
        self.engine.eval(source, bindings, &Locals::new())
    }

    fn eval_in_frame(&mut self, frame: FrameId, source: &str, bindings: &Bindings) -> Completion {
        match self.engine.frame_locals(frame) {
            Some(locals) => self.engine.eval(source, bindings, &locals),
            None => Completion::Throw(DebuggeeValue::from("Error: Debugger.Frame is not live")),
        }
    }

    fn global_has_binding(&self, _global: GlobalId, name: &str) -> bool {
        self.engine.state.globals.lock().unwrap().contains_key(name)
    }

    fn frame_has_binding(&self, frame: FrameId, name: &str) -> bool {
        self.engine
            .frame_locals(frame)
            .is_some_and(|locals| locals.contains_key(name))
    }

    fn error_message(&self, value: &DebuggeeValue) -> Option<String> {
        match value {
            DebuggeeValue::String(message) => Some(message.clone()),
            _ => None,
        }
    }

    fn autocomplete(&self, _global: GlobalId, input: &str) -> Option<AutocompleteResult> {
        let prefix = input
            .rsplit(|c: char| !c.is_alphanumeric() && c != '_' && c != '$')
            .next()
            .unwrap_or_default();
        let matches = self
            .engine
            .state
            .globals
            .lock()
            .unwrap()
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect();
        Some(AutocompleteResult {
            matches,
            match_prop: prefix.to_owned(),
        })
    }
}
