//! XML to report document, for validating documents produced elsewhere.
//!
//! Namespaces are resolved; character and predefined entity references are
//! expanded. Comments, processing instructions and the doctype are skipped.
//! Whitespace-only text is dropped.

use std::fs;
use std::path::Path;

use bankreg_model::{Attribute, Element, ReportDocument};
use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

use crate::error::ReportError;

pub fn read_document_file(path: &Path) -> Result<ReportDocument, ReportError> {
    let text = fs::read_to_string(path).map_err(|e| ReportError::io(path, e))?;
    read_document(&text)
}

pub fn read_document(xml: &str) -> Result<ReportDocument, ReportError> {
    let mut reader = NsReader::from_str(xml);
    let mut stack: Vec<Open> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let (resolved, event) = reader.read_resolved_event()?;
        let namespace = namespace_of(resolved)?;
        match event {
            Event::Start(start) => stack.push(Open::new(&start, namespace)?),
            Event::Empty(start) => {
                let element = Open::new(&start, namespace)?.finish();
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let open = stack
                    .pop()
                    .ok_or_else(|| ReportError::malformed("unexpected end tag"))?;
                attach(&mut stack, &mut root, open.finish())?;
            }
            Event::Text(text) => {
                let text = text.decode().map_err(quick_xml::Error::from)?;
                push_text(&mut stack, &text)?;
            }
            Event::CData(data) => {
                let text = data.decode().map_err(quick_xml::Error::from)?;
                push_text(&mut stack, &text)?;
            }
            Event::GeneralRef(reference) => {
                let text = resolve_reference(&reference)?;
                push_text(&mut stack, &text)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ReportError::malformed(format!(
            "element {} is not closed",
            open.element.name
        )));
    }
    root.map(ReportDocument::new)
        .ok_or_else(|| ReportError::malformed("document has no root element"))
}

/// An element whose end tag has not been read yet.
struct Open {
    element: Element,
    text: String,
}

impl Open {
    fn new(start: &BytesStart<'_>, namespace: Option<String>) -> Result<Self, ReportError> {
        let mut element = Element::new(utf8(start.local_name().as_ref())?);
        element.namespace = namespace;
        for attribute in start.attributes() {
            let attribute = attribute.map_err(quick_xml::Error::from)?;
            let key = attribute.key.as_ref();
            if key == b"xmlns" || key.starts_with(b"xmlns:") {
                continue;
            }
            let value = attribute
                .unescape_value()
                .map_err(quick_xml::Error::from)?
                .into_owned();
            element.attributes.push(Attribute {
                name: utf8(key)?,
                value,
            });
        }
        Ok(Self {
            element,
            text: String::new(),
        })
    }

    fn finish(mut self) -> Element {
        if !self.text.trim().is_empty() {
            self.element.text = Some(self.text);
        }
        self.element
    }
}

fn attach(
    stack: &mut [Open],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), ReportError> {
    match stack.last_mut() {
        Some(parent) => parent.element.children.push(element),
        None if root.is_some() => {
            return Err(ReportError::malformed("more than one root element"));
        }
        None => *root = Some(element),
    }
    Ok(())
}

fn push_text(stack: &mut [Open], text: &str) -> Result<(), ReportError> {
    match stack.last_mut() {
        Some(open) => open.text.push_str(text),
        None if text.trim().is_empty() => {}
        None => return Err(ReportError::malformed("text outside the root element")),
    }
    Ok(())
}

fn namespace_of(resolved: ResolveResult<'_>) -> Result<Option<String>, ReportError> {
    match resolved {
        ResolveResult::Bound(namespace) => Ok(Some(utf8(namespace.as_ref())?)),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(ReportError::malformed(format!(
            "undeclared namespace prefix '{}'",
            String::from_utf8_lossy(&prefix)
        ))),
    }
}

fn resolve_reference(reference: &BytesRef<'_>) -> Result<String, ReportError> {
    if let Some(ch) = reference
        .resolve_char_ref()
        .map_err(quick_xml::Error::from)?
    {
        return Ok(ch.to_string());
    }
    let name = reference.decode().map_err(quick_xml::Error::from)?;
    let text = match name.as_ref() {
        "lt" => "<",
        "gt" => ">",
        "amp" => "&",
        "apos" => "'",
        "quot" => "\"",
        other => {
            return Err(ReportError::malformed(format!(
                "unknown entity reference &{other};"
            )));
        }
    };
    Ok(text.to_string())
}

fn utf8(bytes: &[u8]) -> Result<String, ReportError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| ReportError::malformed(format!("invalid UTF-8 in name: {e}")))
}
