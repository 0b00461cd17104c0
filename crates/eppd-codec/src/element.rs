//! Wire element tree and its XML serialization.

use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::{CodecError, CodecResult};

/// Element content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Rendered as a self-closing tag, `<x/>`.
    Empty,
    /// Rendered with start and end tags, even when the text is empty.
    Text(String),
    Children(Vec<Element>),
}

/// One XML element: qualified name, ordered attributes and content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub content: Content,
}

impl Element {
    /// Creates an empty element.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            content: Content::Empty,
        }
    }

    /// Creates an element holding text.
    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            content: Content::Text(text.into()),
        }
    }

    /// Adds an attribute.
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((key.into(), value.into()));
        self
    }

    /// Appends a child element.
    pub fn child(mut self, child: Element) -> Self {
        self.push(child);
        self
    }

    /// Appends a child element when present.
    pub fn maybe_child(self, child: Option<Element>) -> Self {
        match child {
            Some(child) => self.child(child),
            None => self,
        }
    }

    /// Appends every child.
    pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        for child in children {
            self.push(child);
        }
        self
    }

    /// Appends a child element in place. Any text content is replaced.
    pub fn push(&mut self, child: Element) {
        match &mut self.content {
            Content::Children(children) => children.push(child),
            content => *content = Content::Children(vec![child]),
        }
    }

    /// Returns the value of an attribute.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the child elements, empty for text or empty content.
    pub fn child_elements(&self) -> &[Element] {
        match &self.content {
            Content::Children(children) => children,
            _ => &[],
        }
    }

    /// Returns the first direct child with the given name.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.child_elements().iter().find(|c| c.name == name)
    }

    /// Returns every direct child with the given name.
    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.child_elements().iter().filter(move |c| c.name == name)
    }

    /// Follows a path of direct child names.
    pub fn path(&self, names: &[&str]) -> Option<&Element> {
        names.iter().try_fold(self, |el, name| el.find(name))
    }

    /// Returns the text content, if the element holds text.
    pub fn text_content(&self) -> Option<&str> {
        match &self.content {
            Content::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Serializes the element as a standalone document with an XML
    /// declaration.
    pub fn to_document(&self) -> CodecResult<String> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("no"))))
            .map_err(render_error)?;
        self.write(&mut writer)?;
        into_string(writer)
    }

    /// Serializes the element alone.
    pub fn to_xml(&self) -> CodecResult<String> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        self.write(&mut writer)?;
        into_string(writer)
    }

    fn write(&self, writer: &mut Writer<Cursor<Vec<u8>>>) -> CodecResult<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attrs {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        match &self.content {
            Content::Empty => {
                writer.write_event(Event::Empty(start)).map_err(render_error)?;
            }
            Content::Text(text) => {
                writer.write_event(Event::Start(start)).map_err(render_error)?;
                if !text.is_empty() {
                    writer
                        .write_event(Event::Text(BytesText::new(text)))
                        .map_err(render_error)?;
                }
                writer
                    .write_event(Event::End(BytesEnd::new(self.name.as_str())))
                    .map_err(render_error)?;
            }
            Content::Children(children) => {
                writer.write_event(Event::Start(start)).map_err(render_error)?;
                for child in children {
                    child.write(writer)?;
                }
                writer
                    .write_event(Event::End(BytesEnd::new(self.name.as_str())))
                    .map_err(render_error)?;
            }
        }
        Ok(())
    }
}

fn render_error(e: impl std::fmt::Display) -> CodecError {
    CodecError::Render(e.to_string())
}

fn into_string(writer: Writer<Cursor<Vec<u8>>>) -> CodecResult<String> {
    String::from_utf8(writer.into_inner().into_inner()).map_err(render_error)
}
