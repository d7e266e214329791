//! Symbolic ZAPI trees.
//!
//! Attribute order is irrelevant; child order is significant and preserved.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One node of a ZAPI request or response document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ZapiElement {
    name: String,
    attributes: BTreeMap<String, String>,
    children: Vec<ZapiElement>,
    content: Option<String>,
}

impl ZapiElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builds `<name>` and translates `value` into its children.
    pub fn from_value(name: impl Into<String>, value: &Value) -> Self {
        let mut element = Self::new(name);
        element.translate_struct(value);
        element
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Sets the text of a leaf; an empty string clears it.
    pub fn set_content(&mut self, content: impl Into<String>) {
        let content = content.into();
        self.content = if content.is_empty() {
            None
        } else {
            Some(content)
        };
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.set_content(content);
        self
    }

    pub fn children(&self) -> &[ZapiElement] {
        &self.children
    }

    pub fn add_child(&mut self, child: ZapiElement) {
        self.children.push(child);
    }

    pub fn with_child(mut self, child: ZapiElement) -> Self {
        self.add_child(child);
        self
    }

    /// Appends `<name>content</name>`.
    pub fn add_new_child(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.add_child(ZapiElement::new(name).with_content(content));
    }

    pub fn with_child_content(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.add_new_child(name, content);
        self
    }

    /// First child with the given tag.
    pub fn child(&self, name: &str) -> Option<&ZapiElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Every child with the given tag, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ZapiElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text of the first child with the given tag.
    pub fn child_content(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(ZapiElement::content)
    }

    /// Follows a `/`-separated path of tags, e.g. `attributes-list/volume-attributes`.
    pub fn find(&self, path: &str) -> Option<&ZapiElement> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |element, segment| element.child(segment))
    }

    /// Translates a JSON value into children of this element.
    ///
    /// - a mapping adds one child per key
    /// - a list under a key adds sibling elements with that tag, in order
    /// - a scalar becomes element text; booleans render as `true`/`false`
    /// - nulls are skipped
    pub fn translate_struct(&mut self, value: &Value) {
        match value {
            Value::Object(map) => {
                for (key, item) in map {
                    match item {
                        Value::Null => {}
                        Value::Array(items) => {
                            for entry in items {
                                self.add_child(Self::element_for(key, entry));
                            }
                        }
                        other => self.add_child(Self::element_for(key, other)),
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.translate_struct(item);
                }
            }
            Value::Null => {}
            scalar => self.set_content(scalar_text(scalar)),
        }
    }

    fn element_for(name: &str, value: &Value) -> ZapiElement {
        let mut element = ZapiElement::new(name);
        match value {
            Value::Object(_) | Value::Array(_) => element.translate_struct(value),
            Value::Null => {}
            scalar => element.set_content(scalar_text(scalar)),
        }
        element
    }

    /// Converts the children of this element back into a JSON mapping.
    ///
    /// Repeated tags become lists; leaves become strings.
    pub fn to_value(&self) -> Value {
        if self.children.is_empty() {
            return Value::String(self.content.clone().unwrap_or_default());
        }
        let mut map = Map::new();
        for child in &self.children {
            let value = child.to_value();
            match map.get_mut(&child.name) {
                // child values are never arrays, so an array here is a repeated tag
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    map.insert(child.name.clone(), value);
                }
            }
        }
        Value::Object(map)
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}
