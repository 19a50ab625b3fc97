//! Report document to XML.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use bankreg_model::{Element, ReportDocument};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::ReportError;

/// Serialize `document` as UTF-8 XML with two-space indentation.
pub fn to_xml_string(document: &ReportDocument) -> Result<String, ReportError> {
    let mut buffer = Vec::new();
    write_xml(&mut buffer, document)?;
    String::from_utf8(buffer).map_err(|e| ReportError::malformed(e.to_string()))
}

/// Write `document` to `path`, creating parent directories.
pub fn write_document(path: &Path, document: &ReportDocument) -> Result<(), ReportError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| ReportError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| ReportError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    write_xml(&mut writer, document)?;
    writer.flush().map_err(|e| ReportError::io(path, e))
}

pub fn write_xml<W: Write>(output: W, document: &ReportDocument) -> Result<(), ReportError> {
    let mut xml = Writer::new_with_indent(output, b' ', 2);
    xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write_element(&mut xml, document.root(), None)?;
    xml.get_mut().write_all(b"\n")?;
    Ok(())
}

fn write_element<W: Write>(
    xml: &mut Writer<W>,
    element: &Element,
    parent_namespace: Option<&str>,
) -> Result<(), ReportError> {
    let mut start = BytesStart::new(element.name.as_str());
    let namespace = element.namespace.as_deref();
    if namespace != parent_namespace {
        start.push_attribute(("xmlns", namespace.unwrap_or_default()));
    }
    for attribute in &element.attributes {
        start.push_attribute((attribute.name.as_str(), attribute.value.as_str()));
    }

    let text = element.text.as_deref().filter(|text| !text.is_empty());
    if element.children.is_empty() && text.is_none() {
        xml.write_event(Event::Empty(start))?;
        return Ok(());
    }

    xml.write_event(Event::Start(start))?;
    if let Some(text) = text {
        xml.write_event(Event::Text(BytesText::new(text)))?;
    }
    for child in &element.children {
        write_element(xml, child, namespace)?;
    }
    xml.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}
