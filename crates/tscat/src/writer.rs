//! Canonical, byte-stable TS serialization.
//!
//! Translation-management tools read-modify-write these files repeatedly
//! and the results are hand-merged, so the writer's only job beyond
//! correctness is determinism: the same logical catalog must always
//! produce byte-identical output. Contexts and messages keep document
//! order; header entries are emitted sorted by key (the mapping is
//! order-irrelevant).

use std::io::Write;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::catalog::{Catalog, FormatError, Translation};

/// Serialize a catalog into canonical TS markup.
///
/// `parse(serialize(c))` reproduces `c` exactly, and re-serializing the
/// result is byte-stable.
///
/// # Errors
///
/// [`FormatError::Write`] if the underlying writer fails.
pub fn serialize(catalog: &Catalog) -> Result<Vec<u8>, FormatError> {
    write_catalog(catalog).map_err(|err| FormatError::Write(err.to_string()))
}

fn write_catalog(catalog: &Catalog) -> Result<Vec<u8>, quick_xml::Error> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer.write_event(Event::DocType(BytesText::new("TS")))?;

    let mut root = BytesStart::new("TS");
    if let Some(version) = &catalog.version {
        root.push_attribute(("version", version.as_str()));
    }
    if let Some(language) = &catalog.language {
        root.push_attribute(("language", language.as_str()));
    }
    writer.write_event(Event::Start(root))?;

    for (key, value) in &catalog.headers {
        text_element(&mut writer, key, value)?;
    }

    for context in &catalog.contexts {
        writer.write_event(Event::Start(BytesStart::new("context")))?;
        text_element(&mut writer, "name", &context.name)?;
        for message in &context.messages {
            writer.write_event(Event::Start(BytesStart::new("message")))?;
            text_element(&mut writer, "source", &message.source)?;
            if let Some(comment) = &message.comment {
                text_element(&mut writer, "comment", comment)?;
            }
            if let Some(extracomment) = &message.extracomment {
                text_element(&mut writer, "extracomment", extracomment)?;
            }
            match &message.translation {
                Translation::Finished(text) => {
                    text_element(&mut writer, "translation", text)?;
                }
                Translation::Unfinished => {
                    // The dialect writes a paired empty tag, not a
                    // self-closing one.
                    let mut start = BytesStart::new("translation");
                    start.push_attribute(("type", "unfinished"));
                    writer.write_event(Event::Start(start))?;
                    writer.write_event(Event::Text(BytesText::new("")))?;
                    writer.write_event(Event::End(BytesEnd::new("translation")))?;
                }
            }
            writer.write_event(Event::End(BytesEnd::new("message")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("context")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("TS")))?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

/// Write `<name>text</name>` on a single line.
///
/// The empty text event keeps the closing tag inline even when `text`
/// is empty, which the round-trip relies on.
fn text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
