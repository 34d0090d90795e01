//! Strict event-driven parser for TS markup.
//!
//! A deterministic state machine over the quick-xml event stream. The
//! grammar is small and fixed: a `<TS>` root, text-only header elements,
//! then `<context>` blocks holding `<message>` blocks. Anything outside
//! that shape is rejected outright; there is no partial recovery, since
//! these files are machine-regenerated and hand-merged and a silent
//! partial parse would corrupt translator work.
//!
//! Duplicate `(source, comment)` keys and duplicate context names are
//! legitimate transient merge artifacts: they parse fine and are logged
//! through `tracing::warn!`.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::catalog::{Catalog, Context, FormatError, Message, Translation};

/// Parse a TS document.
///
/// # Errors
///
/// [`FormatError::Xml`] for ill-formed markup or elements the TS grammar
/// does not allow; [`FormatError::MissingContextName`] and
/// [`FormatError::MissingSource`] for absent required fields.
pub fn parse(bytes: &[u8]) -> Result<Catalog, FormatError> {
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(false);

    let mut parser = TsParser::new();
    let mut buf = Vec::new();
    loop {
        let pos = reader.buffer_position();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(event) => parser.handle(&event, pos)?,
            Err(err) => {
                return Err(FormatError::Xml {
                    pos,
                    message: err.to_string(),
                });
            }
        }
        buf.clear();
    }
    parser.finish(reader.buffer_position())
}

/// Leaf fields of a `<message>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Source,
    Comment,
    ExtraComment,
    Translation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Before the `<TS>` root.
    Prolog,
    /// Directly inside `<TS>`.
    Document,
    /// Inside a text-only top-level header element.
    Header,
    /// Inside `<context>`.
    Context,
    /// Inside `<context><name>`.
    ContextName,
    /// Inside `<message>`.
    Message,
    /// Inside one of the message leaf fields.
    Field(Field),
    /// After `</TS>`.
    Done,
}

#[derive(Debug, Default)]
struct MessageDraft {
    source: Option<String>,
    comment: Option<String>,
    extracomment: Option<String>,
    translation: Option<Translation>,
    translation_unfinished: bool,
}

#[derive(Debug, Default)]
struct ContextDraft {
    name: Option<String>,
    messages: Vec<Message>,
}

/// TS parser state.
struct TsParser {
    state: State,
    catalog: Catalog,
    context: ContextDraft,
    message: MessageDraft,
    header_key: String,
    /// Accumulates text content of the current leaf element.
    text: String,
    /// Byte offset of the event being handled, for error reporting.
    pos: usize,
}

impl TsParser {
    fn new() -> Self {
        Self {
            state: State::Prolog,
            catalog: Catalog::default(),
            context: ContextDraft::default(),
            message: MessageDraft::default(),
            header_key: String::new(),
            text: String::new(),
            pos: 0,
        }
    }

    fn handle(&mut self, event: &Event<'_>, pos: usize) -> Result<(), FormatError> {
        self.pos = pos;
        match event {
            Event::Start(e) => self.on_start(e),
            Event::End(_) => self.on_end(),
            Event::Empty(e) => {
                // An empty element is a start immediately followed by an end,
                // e.g. <translation type="unfinished"/>.
                self.on_start(e)?;
                self.on_end()
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|err| self.malformed(err))?;
                self.on_text(&text)
            }
            Event::CData(c) => {
                let text = std::str::from_utf8(c.as_ref()).map_err(|err| self.malformed(err))?;
                self.on_text(text)
            }
            Event::Decl(_) | Event::DocType(_) | Event::PI(_) | Event::Comment(_) => Ok(()),
            Event::Eof => Ok(()),
        }
    }

    fn on_start(&mut self, e: &BytesStart<'_>) -> Result<(), FormatError> {
        let name = e.name();
        let name = name.as_ref();
        match self.state {
            State::Prolog => {
                if name != b"TS" {
                    return Err(self.unexpected("expected <TS> root element"));
                }
                self.catalog.version = self.attribute(e, "version")?;
                self.catalog.language = self.attribute(e, "language")?;
                self.state = State::Document;
                Ok(())
            }
            State::Document => {
                if name == b"context" {
                    self.context = ContextDraft::default();
                    self.state = State::Context;
                } else {
                    // Any other top-level element is a text-only header entry.
                    self.header_key = self.name_str(name)?.to_string();
                    self.text.clear();
                    self.state = State::Header;
                }
                Ok(())
            }
            State::Context => match name {
                b"name" => {
                    self.text.clear();
                    self.state = State::ContextName;
                    Ok(())
                }
                b"message" => {
                    self.message = MessageDraft::default();
                    self.state = State::Message;
                    Ok(())
                }
                _ => Err(self.unexpected("only <name> and <message> are allowed in a context")),
            },
            State::Message => {
                let field = match name {
                    b"source" => Field::Source,
                    b"comment" => Field::Comment,
                    b"extracomment" => Field::ExtraComment,
                    b"translation" => {
                        self.message.translation_unfinished =
                            match self.attribute(e, "type")?.as_deref() {
                                None => false,
                                Some("unfinished") => true,
                                Some(other) => {
                                    return Err(FormatError::Xml {
                                        pos: self.pos,
                                        message: format!(
                                            "unsupported translation type '{other}'"
                                        ),
                                    });
                                }
                            };
                        Field::Translation
                    }
                    _ => return Err(self.unexpected("unsupported element in message")),
                };
                self.text.clear();
                self.state = State::Field(field);
                Ok(())
            }
            State::Header | State::ContextName | State::Field(_) => {
                Err(self.unexpected("nested elements are not allowed here"))
            }
            State::Done => Err(self.unexpected("content after </TS>")),
        }
    }

    fn on_end(&mut self) -> Result<(), FormatError> {
        match self.state {
            State::Header => {
                let key = std::mem::take(&mut self.header_key);
                let value = std::mem::take(&mut self.text);
                self.catalog.headers.insert(key, value);
                self.state = State::Document;
                Ok(())
            }
            State::ContextName => {
                self.context.name = Some(std::mem::take(&mut self.text));
                self.state = State::Context;
                Ok(())
            }
            State::Field(field) => {
                let text = std::mem::take(&mut self.text);
                match field {
                    Field::Source => self.message.source = Some(text),
                    Field::Comment => self.message.comment = Some(text),
                    Field::ExtraComment => self.message.extracomment = Some(text),
                    Field::Translation => {
                        // Text inside an unfinished translation is not a
                        // meaningful payload and is dropped.
                        self.message.translation = if self.message.translation_unfinished {
                            Some(Translation::Unfinished)
                        } else {
                            Some(Translation::Finished(text))
                        };
                    }
                }
                self.state = State::Message;
                Ok(())
            }
            State::Message => {
                let draft = std::mem::take(&mut self.message);
                let source = draft.source.ok_or_else(|| FormatError::MissingSource {
                    context: self.context.name.clone().unwrap_or_default(),
                    pos: self.pos,
                })?;
                // An absent translation element counts as unfinished.
                let translation = draft.translation.unwrap_or(Translation::Unfinished);
                self.context.messages.push(Message {
                    source,
                    comment: draft.comment,
                    extracomment: draft.extracomment,
                    translation,
                });
                self.state = State::Context;
                Ok(())
            }
            State::Context => {
                let draft = std::mem::take(&mut self.context);
                let name = draft.name.ok_or(FormatError::MissingContextName {
                    pos: self.pos,
                })?;
                self.catalog.contexts.push(Context {
                    name,
                    messages: draft.messages,
                });
                self.state = State::Document;
                Ok(())
            }
            State::Document => {
                self.state = State::Done;
                Ok(())
            }
            State::Prolog | State::Done => Err(self.unexpected("unexpected closing tag")),
        }
    }

    fn on_text(&mut self, text: &str) -> Result<(), FormatError> {
        match self.state {
            State::Header | State::ContextName | State::Field(_) => {
                self.text.push_str(text);
                Ok(())
            }
            // Indentation between structural elements.
            _ if text.trim().is_empty() => Ok(()),
            _ => Err(self.unexpected("unexpected text content")),
        }
    }

    fn finish(self, pos: usize) -> Result<Catalog, FormatError> {
        if self.state != State::Done {
            return Err(FormatError::Xml {
                pos,
                message: "unexpected end of input".to_string(),
            });
        }
        let catalog = self.catalog;
        for dup in catalog.duplicate_keys() {
            tracing::warn!(
                context = %dup.context,
                source = %dup.source,
                count = dup.count,
                "duplicate message key"
            );
        }
        for dup in catalog.duplicate_contexts() {
            tracing::warn!(name = %dup.name, count = dup.count, "duplicate context name");
        }
        Ok(catalog)
    }

    fn attribute(&self, e: &BytesStart<'_>, name: &str) -> Result<Option<String>, FormatError> {
        let attr = e
            .try_get_attribute(name)
            .map_err(|err| self.malformed(err))?;
        match attr {
            Some(attr) => {
                let value = attr.unescape_value().map_err(|err| self.malformed(err))?;
                Ok(Some(value.into_owned()))
            }
            None => Ok(None),
        }
    }

    fn name_str<'n>(&self, name: &'n [u8]) -> Result<&'n str, FormatError> {
        std::str::from_utf8(name).map_err(|err| self.malformed(err))
    }

    fn malformed(&self, err: impl std::fmt::Display) -> FormatError {
        FormatError::Xml {
            pos: self.pos,
            message: err.to_string(),
        }
    }

    fn unexpected(&self, message: &str) -> FormatError {
        FormatError::Xml {
            pos: self.pos,
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE TS>
<TS version="2.1" language="ka_GE">
    <extra-po-header-language>ka</extra-po-header-language>
    <extra-po-header-language_team></extra-po-header-language_team>
    <context>
        <name>CloseButton</name>
        <message>
            <source>Close Tab</source>
            <translation>ჩანართის დახურვა</translation>
        </message>
        <message>
            <source>ZWSP Zero width space</source>
            <translation type="unfinished"></translation>
        </message>
    </context>
</TS>
"#;

    #[test]
    fn parses_minimal_document() {
        let catalog = parse(MINIMAL.as_bytes()).unwrap();
        assert_eq!(catalog.language.as_deref(), Some("ka_GE"));
        assert_eq!(catalog.version.as_deref(), Some("2.1"));
        assert_eq!(catalog.contexts.len(), 1);
        assert_eq!(catalog.contexts[0].name, "CloseButton");
        assert_eq!(catalog.contexts[0].messages.len(), 2);
    }

    #[test]
    fn header_entries_are_collected() {
        let catalog = parse(MINIMAL.as_bytes()).unwrap();
        assert_eq!(
            catalog.headers.get("extra-po-header-language").map(String::as_str),
            Some("ka")
        );
        // Empty header values survive.
        assert_eq!(
            catalog
                .headers
                .get("extra-po-header-language_team")
                .map(String::as_str),
            Some("")
        );
    }

    #[test]
    fn unfinished_state_is_parsed() {
        let catalog = parse(MINIMAL.as_bytes()).unwrap();
        let message = catalog
            .lookup("CloseButton", "ZWSP Zero width space", None)
            .unwrap();
        assert_eq!(message.translation, Translation::Unfinished);
    }

    #[test]
    fn self_closing_unfinished_translation() {
        let doc = r#"<TS version="2.1"><context><name>C</name><message><source>s</source><translation type="unfinished"/></message></context></TS>"#;
        let catalog = parse(doc.as_bytes()).unwrap();
        assert_eq!(
            catalog.contexts[0].messages[0].translation,
            Translation::Unfinished
        );
    }

    #[test]
    fn missing_translation_element_is_unfinished() {
        let doc = r#"<TS><context><name>C</name><message><source>s</source></message></context></TS>"#;
        let catalog = parse(doc.as_bytes()).unwrap();
        assert_eq!(
            catalog.contexts[0].messages[0].translation,
            Translation::Unfinished
        );
    }

    #[test]
    fn unfinished_payload_text_is_dropped() {
        let doc = r#"<TS><context><name>C</name><message><source>s</source><translation type="unfinished">stale</translation></message></context></TS>"#;
        let catalog = parse(doc.as_bytes()).unwrap();
        assert_eq!(
            catalog.contexts[0].messages[0].translation,
            Translation::Unfinished
        );
    }

    #[test]
    fn entities_are_unescaped() {
        let doc = r#"<TS><context><name>QAbstractSpinBox</name><message><source>&amp;Step up</source><translation>&lt;b&gt;&quot;x&quot;&apos;y&apos;</translation></message></context></TS>"#;
        let catalog = parse(doc.as_bytes()).unwrap();
        let message = &catalog.contexts[0].messages[0];
        assert_eq!(message.source, "&Step up");
        assert_eq!(message.translation.text(), Some("<b>\"x\"'y'"));
    }

    #[test]
    fn comment_and_extracomment_are_parsed() {
        let doc = r#"<TS><context><name>QPrintDialog</name><message><source>Top</source><comment>Banner page at start</comment><extracomment>guidance</extracomment><translation>t</translation></message></context></TS>"#;
        let catalog = parse(doc.as_bytes()).unwrap();
        let message = &catalog.contexts[0].messages[0];
        assert_eq!(message.comment.as_deref(), Some("Banner page at start"));
        assert_eq!(message.extracomment.as_deref(), Some("guidance"));
    }

    #[test]
    fn embedded_newlines_survive() {
        let doc = "<TS><context><name>C</name><message><source>line one\nline two</source><translation>a\nb</translation></message></context></TS>";
        let catalog = parse(doc.as_bytes()).unwrap();
        assert_eq!(catalog.contexts[0].messages[0].source, "line one\nline two");
    }

    #[test]
    fn missing_context_name_is_rejected() {
        let doc = r#"<TS><context><message><source>s</source></message></context></TS>"#;
        let err = parse(doc.as_bytes()).unwrap_err();
        assert!(matches!(err, FormatError::MissingContextName { .. }), "{err}");
    }

    #[test]
    fn missing_source_is_rejected() {
        let doc = r#"<TS><context><name>C</name><message><translation>t</translation></message></context></TS>"#;
        let err = parse(doc.as_bytes()).unwrap_err();
        match err {
            FormatError::MissingSource { context, .. } => assert_eq!(context, "C"),
            other => panic!("expected MissingSource, got {other}"),
        }
    }

    #[test]
    fn wrong_root_is_rejected() {
        let err = parse(b"<TSX></TSX>").unwrap_err();
        assert!(matches!(err, FormatError::Xml { .. }));
    }

    #[test]
    fn truncated_document_is_rejected() {
        let err = parse(b"<TS><context><name>C</name>").unwrap_err();
        assert!(matches!(err, FormatError::Xml { .. }));
    }

    #[test]
    fn mismatched_tags_are_rejected() {
        let err = parse(b"<TS><context></TS>").unwrap_err();
        assert!(matches!(err, FormatError::Xml { .. }));
    }

    #[test]
    fn stray_element_in_message_is_rejected() {
        let doc = r#"<TS><context><name>C</name><message><source>s</source><location filename="x"/></message></context></TS>"#;
        let err = parse(doc.as_bytes()).unwrap_err();
        assert!(matches!(err, FormatError::Xml { .. }));
    }

    #[test]
    fn unknown_translation_type_is_rejected() {
        let doc = r#"<TS><context><name>C</name><message><source>s</source><translation type="obsolete">t</translation></message></context></TS>"#;
        let err = parse(doc.as_bytes()).unwrap_err();
        assert!(matches!(err, FormatError::Xml { .. }));
    }

    #[test]
    fn missing_language_attribute_is_accepted() {
        let catalog = parse(b"<TS></TS>").unwrap();
        assert_eq!(catalog.language, None);
        assert_eq!(catalog.version, None);
        assert!(catalog.contexts.is_empty());
    }

    #[test]
    fn duplicate_keys_parse_without_error() {
        let doc = r#"<TS><context><name>C</name><message><source>s</source><translation>a</translation></message><message><source>s</source><translation>b</translation></message></context></TS>"#;
        let catalog = parse(doc.as_bytes()).unwrap();
        assert_eq!(catalog.duplicate_keys().len(), 1);
        // First occurrence wins for lookup.
        assert_eq!(
            catalog.lookup("C", "s", None).unwrap().translation.text(),
            Some("a")
        );
    }

    #[test]
    fn empty_finished_translation_stays_finished() {
        let doc = r#"<TS><context><name>C</name><message><source>s</source><translation></translation></message></context></TS>"#;
        let catalog = parse(doc.as_bytes()).unwrap();
        assert_eq!(
            catalog.contexts[0].messages[0].translation,
            Translation::Finished(String::new())
        );
    }
}
