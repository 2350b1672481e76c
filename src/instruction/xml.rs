// src/instruction/xml.rs

//! XML reading and writing for [`Element`] trees, via `quick-xml`.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::errors::{AutomationError, Result};
use crate::instruction::element::Element;

fn xml_err(e: impl std::fmt::Display) -> AutomationError {
    AutomationError::Xml(e.to_string())
}

/// Parse an XML document into its root element.
///
/// Text is trimmed; comments, processing instructions and the declaration
/// are dropped.
pub fn parse_xml(src: &str) -> Result<Element> {
    let mut reader = Reader::from_str(src);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(start) => stack.push(element_from_start(&start)?),
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(xml_err)?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| xml_err("unexpected closing tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(xml_err(format!("element <{}> is never closed", open.name)));
    }
    root.ok_or_else(|| xml_err("document has no root element"))
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));

    for attr in start.attributes() {
        let attr = attr.map_err(xml_err)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(xml_err)?.into_owned();
        element.attributes.push((key, value));
    }

    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(xml_err("document has more than one root element")),
    }
    Ok(())
}

/// Serialise `root` as an indented XML document with a UTF-8 declaration.
pub fn write_xml(root: &Element) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;
    write_element(&mut writer, root)?;

    String::from_utf8(writer.into_inner()).map_err(xml_err)
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.text.is_empty() && element.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(xml_err);
    }

    writer.write_event(Event::Start(start)).map_err(xml_err)?;
    if !element.text.is_empty() {
        writer
            .write_event(Event::Text(BytesText::new(&element.text)))
            .map_err(xml_err)?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(xml_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_attributes_and_entities() {
        let src = r#"<?xml version="1.0"?>
            <equinoxInput>
                <!-- comment -->
                <settings><runMode>parallel</runMode></settings>
                <addSpectrum note="a &amp; b">
                    <id>s1</id>
                    <specPath>/data/A&lt;1&gt;.spec</specPath>
                </addSpectrum>
                <empty/>
            </equinoxInput>"#;

        let root = parse_xml(src).unwrap();
        assert_eq!(root.name, "equinoxInput");
        assert_eq!(root.children.len(), 3);

        let add = root.child("addSpectrum").unwrap();
        assert_eq!(add.attribute("note"), Some("a & b"));
        assert_eq!(add.child_text("specPath"), Some("/data/A<1>.spec"));
        assert!(root.child("empty").unwrap().children.is_empty());
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(matches!(parse_xml("<a><b></a>"), Err(AutomationError::Xml(_))));
        assert!(matches!(parse_xml("<a>"), Err(AutomationError::Xml(_))));
        assert!(matches!(parse_xml(""), Err(AutomationError::Xml(_))));
    }

    #[test]
    fn written_document_parses_back_to_the_same_tree() {
        let root = Element::new("equinoxInput")
            .with_child(
                Element::new("saveSpectrum")
                    .with_attribute("kind", "x&y")
                    .with_text_child("id", "save1")
                    .with_text_child("outputPath", "/tmp/<out>.sp"),
            )
            .with_child(Element::new("settings"));

        let xml = write_xml(&root).unwrap();
        assert!(xml.starts_with("<?xml"));
        assert_eq!(parse_xml(&xml).unwrap(), root);
    }
}
