// src/instruction/json.rs

//! JSON form of an instruction set.
//!
//! Mapping (same as the usual XML <-> JSON conventions):
//! - the document is an object with a single key, the root element name;
//! - an element with only text becomes a string;
//! - attributes become `"@name"` keys, text next to attributes or children
//!   becomes `"#text"`;
//! - repeated children with the same name become an array.

use serde_json::{Map, Value};

use crate::errors::{AutomationError, Result};
use crate::instruction::element::Element;

const TEXT_KEY: &str = "#text";
const ATTRIBUTE_PREFIX: char = '@';

pub fn element_to_json(root: &Element) -> Value {
    let mut doc = Map::new();
    doc.insert(root.name.clone(), element_body(root));
    Value::Object(doc)
}

fn element_body(element: &Element) -> Value {
    if element.attributes.is_empty() && element.children.is_empty() {
        return Value::String(element.text.clone());
    }

    let mut map = Map::new();
    for (key, value) in &element.attributes {
        map.insert(format!("{ATTRIBUTE_PREFIX}{key}"), Value::String(value.clone()));
    }
    if !element.text.is_empty() {
        map.insert(TEXT_KEY.to_string(), Value::String(element.text.clone()));
    }

    let canonical = element.canonical();
    let mut i = 0;
    while i < canonical.children.len() {
        let name = &canonical.children[i].name;
        let group: Vec<&Element> = canonical.children[i..]
            .iter()
            .take_while(|c| &c.name == name)
            .collect();
        i += group.len();

        let value = match group.as_slice() {
            [single] => element_body(single),
            many => Value::Array(many.iter().map(|c| element_body(c)).collect()),
        };
        map.insert(name.clone(), value);
    }

    Value::Object(map)
}

pub fn json_to_element(doc: &Value) -> Result<Element> {
    let Value::Object(map) = doc else {
        return Err(json_shape("document must be a JSON object"));
    };
    let mut entries = map.iter();
    match (entries.next(), entries.next()) {
        (Some((name, body)), None) => element_from_json(name, body),
        _ => Err(json_shape("document must have exactly one root element")),
    }
}

fn element_from_json(name: &str, value: &Value) -> Result<Element> {
    let mut element = Element::new(name);

    match value {
        Value::Object(map) => {
            for (key, value) in map {
                if key == TEXT_KEY {
                    element.text = scalar_text(key, value)?;
                } else if let Some(attr) = key.strip_prefix(ATTRIBUTE_PREFIX) {
                    element
                        .attributes
                        .push((attr.to_string(), scalar_text(key, value)?));
                } else if let Value::Array(items) = value {
                    for item in items {
                        if item.is_array() {
                            return Err(json_shape(format!("nested array under '{key}'")));
                        }
                        element.children.push(element_from_json(key, item)?);
                    }
                } else {
                    element.children.push(element_from_json(key, value)?);
                }
            }
        }
        Value::Array(_) => return Err(json_shape(format!("unexpected array for element '{name}'"))),
        other => element.text = scalar_text(name, other)?,
    }

    Ok(element)
}

fn scalar_text(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(json_shape(format!("'{key}' must be a scalar value"))),
    }
}

fn json_shape(reason: impl Into<String>) -> AutomationError {
    AutomationError::Other(anyhow::anyhow!("invalid instruction set JSON: {}", reason.into()))
}
