//! Whitespace-preserving XML tree for MSBuild project files
//!
//! Markup that is never edited is stored exactly as it was read, so a
//! document that goes through [`Document::parse`] and
//! [`Document::to_xml_string`] unchanged comes back byte for byte. Edited
//! elements keep their original start tag and only their content is
//! regenerated.

use quick_xml::{
    escape::{
        partial_escape,
        unescape,
    },
    events::{
        BytesCData,
        BytesEnd,
        BytesStart,
        BytesText,
        Event,
    },
    name::ResolveResult,
    NsReader,
    Writer,
};
use thiserror::Error;

const UTF8_BOM: char = '\u{feff}';

/// Location of an element: child indices from the document's top-level nodes
pub type NodePath = Vec<usize>;

/// Errors raised while reading or writing a [`Document`]
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The input is not well-formed XML
    #[error("malformed XML: {0}")]
    Parse(String),

    /// The input ended while elements were still open
    #[error("malformed XML: unclosed element <{0}>")]
    Unclosed(String),

    /// Serializing the tree failed
    #[error("failed to serialize XML: {0}")]
    Write(String),
}

/// One node of the tree
#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    /// Character data, kept escaped exactly as in the source
    Text(String),
    CData(String),
    /// Declaration, comment, processing instruction or doctype
    Markup(Event<'static>),
}

/// An element with its resolved namespace
#[derive(Debug, Clone)]
pub struct Element {
    start:     BytesStart<'static>,
    end:       Option<BytesEnd<'static>>,
    namespace: Option<String>,
    children:  Vec<Node>,
}

impl Element {
    fn new(name: String, namespace: Option<String>) -> Self {
        Self {
            start: BytesStart::new(name),
            end: None,
            namespace,
            children: Vec::new(),
        }
    }

    /// Qualified name as written, including any prefix
    pub fn name(&self) -> String {
        String::from_utf8_lossy(self.start.name().as_ref()).into_owned()
    }

    pub fn local_name(&self) -> String {
        String::from_utf8_lossy(self.start.local_name().as_ref()).into_owned()
    }

    pub fn prefix(&self) -> Option<String> {
        self.start
            .name()
            .prefix()
            .map(|prefix| String::from_utf8_lossy(prefix.as_ref()).into_owned())
    }

    /// Namespace URI the element's name resolved to
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Unescaped value of an unprefixed attribute
    pub fn attribute(&self, key: &str) -> Option<String> {
        self.start
            .attributes()
            .with_checks(false)
            .flatten()
            .find(|attr| attr.key.as_ref() == key.as_bytes())
            .map(|attr| {
                let raw = String::from_utf8_lossy(&attr.value).into_owned();
                match unescape(&raw) {
                    Ok(value) => value.into_owned(),
                    Err(_) => raw.clone(),
                }
            })
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// Concatenated character data of the element and all its descendants
    pub fn text(&self) -> String {
        let mut text = String::new();
        self.collect_text(&mut text);
        text
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(raw) => match unescape(raw) {
                    Ok(value) => out.push_str(&value),
                    Err(_) => out.push_str(raw),
                },
                Node::CData(data) => out.push_str(data),
                Node::Element(element) => element.collect_text(out),
                Node::Markup(_) => {},
            }
        }
    }

    /// Replace the element's content with `value`
    ///
    /// Returns `false` when the element already held exactly that text.
    pub fn set_text(&mut self, value: &str) -> bool {
        let plain = self
            .children
            .iter()
            .all(|child| matches!(child, Node::Text(_) | Node::CData(_)));
        if plain && self.text() == value {
            return false;
        }

        self.children.clear();
        if !value.is_empty() {
            self.children.push(Node::Text(partial_escape(value).into_owned()));
        }
        true
    }

    fn is_same_name(&self, other_local: &str, namespace: Option<&str>) -> bool {
        self.namespace.as_deref() == namespace && self.local_name() == other_local
    }

    fn child_position(&self, local_name: &str) -> Option<usize> {
        let namespace = self.namespace.as_deref();
        self.children.iter().position(|child| match child {
            Node::Element(element) => element.is_same_name(local_name, namespace),
            _ => false,
        })
    }

    /// First child element with this local name in the element's namespace
    pub fn child(&self, local_name: &str) -> Option<&Element> {
        let namespace = self.namespace.as_deref();
        self.child_elements()
            .find(|element| element.is_same_name(local_name, namespace))
    }

    /// Locate a child element, inserting an empty one when it is missing
    ///
    /// The new element takes the parent's namespace and prefix and the
    /// indentation of its existing siblings. The flag reports whether it was
    /// created.
    pub fn find_or_create_child(&mut self, local_name: &str) -> (&mut Element, bool) {
        self.find_or_create_indented(local_name, None)
    }

    /// Like [`Element::find_or_create_child`]; `own_indent` is the whitespace
    /// in front of this element and lays out a child inserted into an
    /// element that has no indented children yet.
    fn find_or_create_indented(
        &mut self,
        local_name: &str,
        own_indent: Option<&str>,
    ) -> (&mut Element, bool) {
        let (index, created) = match self.child_position(local_name) {
            Some(index) => (index, false),
            None => {
                let child = self.new_child(local_name);
                (self.insert_child(child, own_indent), true)
            },
        };

        let Node::Element(child) = &mut self.children[index] else {
            unreachable!("child position always refers to an element");
        };
        (child, created)
    }

    /// Insert an empty child ahead of the existing child elements
    fn prepend_child(&mut self, local_name: &str, own_indent: Option<&str>) -> &mut Element {
        let child = self.new_child(local_name);
        let first = self
            .children
            .iter()
            .position(|node| matches!(node, Node::Element(_)));

        let indent = first
            .and_then(|at| at.checked_sub(1))
            .and_then(|before| match &self.children[before] {
                Node::Text(raw) if is_blank(raw) => Some(raw.clone()),
                _ => None,
            });

        let index = match (first, indent) {
            (Some(at), Some(indent)) => {
                self.children.insert(at, Node::Text(indent));
                self.children.insert(at, Node::Element(child));
                at
            },
            (Some(at), None) => {
                self.children.insert(at, Node::Element(child));
                at
            },
            (None, _) => self.insert_child(child, own_indent),
        };

        let Node::Element(child) = &mut self.children[index] else {
            unreachable!("inserted node is an element");
        };
        child
    }

    fn new_child(&self, local_name: &str) -> Element {
        let name = match self.prefix() {
            Some(prefix) => format!("{}:{}", prefix, local_name),
            None => local_name.to_string(),
        };
        Element::new(name, self.namespace.clone())
    }

    /// Remove the first child element with this local name
    pub fn remove_child(&mut self, local_name: &str) -> bool {
        match self.child_position(local_name) {
            Some(index) => remove_with_indent(&mut self.children, index),
            None => false,
        }
    }

    fn insert_child(&mut self, child: Element, own_indent: Option<&str>) -> usize {
        let indent = self.children.windows(2).find_map(|pair| match pair {
            [Node::Text(raw), Node::Element(_)] if is_blank(raw) => Some(raw.clone()),
            _ => None,
        });
        let trailing_blank = matches!(self.children.last(), Some(Node::Text(raw)) if is_blank(raw));
        let only_blank = self
            .children
            .iter()
            .all(|node| matches!(node, Node::Text(raw) if is_blank(raw)));

        match (indent, own_indent) {
            (Some(indent), _) if trailing_blank => {
                let at = self.children.len() - 1;
                self.children.insert(at, Node::Text(indent));
                self.children.insert(at + 1, Node::Element(child));
                at + 1
            },
            (None, Some(own)) if only_blank && own.contains('\n') => {
                let newline = if own.contains("\r\n") { "\r\n" } else { "\n" };
                let base = &own[own.rfind('\n').map_or(0, |at| at + 1)..];
                let unit = if base.contains('\t') { "\t" } else { "  " };
                self.children = vec![
                    Node::Text(format!("{}{}{}", newline, base, unit)),
                    Node::Element(child),
                    Node::Text(format!("{}{}", newline, base)),
                ];
                1
            },
            _ => {
                self.children.push(Node::Element(child));
                self.children.len() - 1
            },
        }
    }

    fn write(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), DocumentError> {
        if self.children.is_empty() && self.end.is_none() {
            return write_event(writer, Event::Empty(self.start.clone()));
        }

        if self.end.is_none() {
            // Self-closed in the source: drop the space that preceded `/>`
            write_event(writer, Event::Start(trim_start_tag(&self.start)))?;
        } else {
            write_event(writer, Event::Start(self.start.clone()))?;
        }
        for child in &self.children {
            write_node(writer, child)?;
        }
        let end = match &self.end {
            Some(end) => end.clone(),
            None => BytesEnd::new(self.name()),
        };
        write_event(writer, Event::End(end))
    }
}

/// A parsed project file
#[derive(Debug, Clone)]
pub struct Document {
    bom:   bool,
    nodes: Vec<Node>,
}

impl Document {
    /// Parse XML text, resolving every element's namespace
    pub fn parse(source: &str) -> Result<Self, DocumentError> {
        let (bom, body) = match source.strip_prefix(UTF8_BOM) {
            Some(rest) => (true, rest),
            None => (false, source),
        };

        let mut reader = NsReader::from_str(body);
        reader.config_mut().trim_text(false);

        let mut nodes = Vec::new();
        let mut open: Vec<Element> = Vec::new();

        loop {
            let (resolved, event) = reader
                .read_resolved_event()
                .map_err(|e| DocumentError::Parse(e.to_string()))?;
            let namespace = match resolved {
                ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
                _ => None,
            };

            let node = match event {
                Event::Start(start) => {
                    open.push(Element {
                        start: start.into_owned(),
                        end: None,
                        namespace,
                        children: Vec::new(),
                    });
                    continue;
                },
                Event::End(end) => {
                    let mut element = open.pop().ok_or_else(|| {
                        DocumentError::Parse(format!(
                            "unexpected closing tag </{}>",
                            String::from_utf8_lossy(end.name().as_ref())
                        ))
                    })?;
                    element.end = Some(end.into_owned());
                    Node::Element(element)
                },
                Event::Empty(start) => Node::Element(Element {
                    start: start.into_owned(),
                    end: None,
                    namespace,
                    children: Vec::new(),
                }),
                Event::Text(text) => Node::Text(String::from_utf8_lossy(&text).into_owned()),
                Event::CData(data) => Node::CData(String::from_utf8_lossy(&data).into_owned()),
                Event::Eof => break,
                other => Node::Markup(other.into_owned()),
            };

            match open.last_mut() {
                Some(parent) => parent.children.push(node),
                None => nodes.push(node),
            }
        }

        if let Some(element) = open.last() {
            return Err(DocumentError::Unclosed(element.name()));
        }

        Ok(Self { bom, nodes })
    }

    /// Top-level nodes: prolog, root element and trailing markup
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn root(&self) -> Option<&Element> {
        self.nodes.iter().find_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn element(&self, path: &[usize]) -> Option<&Element> {
        let (first, rest) = path.split_first()?;
        let mut element = match self.nodes.get(*first)? {
            Node::Element(element) => element,
            _ => return None,
        };
        for index in rest {
            element = match element.children.get(*index)? {
                Node::Element(child) => child,
                _ => return None,
            };
        }
        Some(element)
    }

    pub fn element_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let (first, rest) = path.split_first()?;
        let mut element = match self.nodes.get_mut(*first)? {
            Node::Element(element) => element,
            _ => return None,
        };
        for index in rest {
            element = match element.children.get_mut(*index)? {
                Node::Element(child) => child,
                _ => return None,
            };
        }
        Some(element)
    }

    /// Remove the element at `path` together with the indentation before it
    pub fn remove(&mut self, path: &[usize]) -> bool {
        let Some((index, parent)) = path.split_last() else {
            return false;
        };
        let siblings = if parent.is_empty() {
            &mut self.nodes
        } else {
            match self.element_mut(parent) {
                Some(element) => &mut element.children,
                None => return false,
            }
        };
        remove_with_indent(siblings, *index)
    }

    /// Whitespace text directly in front of the element at `path`
    fn leading_whitespace(&self, path: &[usize]) -> Option<String> {
        let (index, parent) = path.split_last()?;
        let siblings = if parent.is_empty() {
            &self.nodes
        } else {
            &self.element(parent)?.children
        };
        match siblings.get(index.checked_sub(1)?)? {
            Node::Text(raw) if is_blank(raw) => Some(raw.clone()),
            _ => None,
        }
    }

    /// Find or create a child of the element at `path`
    ///
    /// A child created inside an element without indented content is laid
    /// out one level deeper than the element itself.
    pub fn find_or_create_child(
        &mut self,
        path: &[usize],
        local_name: &str,
    ) -> Option<(&mut Element, bool)> {
        let indent = self.leading_whitespace(path);
        let element = self.element_mut(path)?;
        Some(element.find_or_create_indented(local_name, indent.as_deref()))
    }

    /// Insert an empty child in front of the existing children of the
    /// element at `path`
    pub fn prepend_child(&mut self, path: &[usize], local_name: &str) -> Option<&mut Element> {
        let indent = self.leading_whitespace(path);
        let element = self.element_mut(path)?;
        Some(element.prepend_child(local_name, indent.as_deref()))
    }

    /// Serialize the tree, restoring the byte-order mark if the source had one
    pub fn to_xml_string(&self) -> Result<String, DocumentError> {
        let mut writer = Writer::new(Vec::new());
        for node in &self.nodes {
            write_node(&mut writer, node)?;
        }

        let body = String::from_utf8(writer.into_inner())
            .map_err(|e| DocumentError::Write(e.to_string()))?;
        if self.bom {
            let mut out = String::with_capacity(body.len() + UTF8_BOM.len_utf8());
            out.push(UTF8_BOM);
            out.push_str(&body);
            Ok(out)
        } else {
            Ok(body)
        }
    }
}

fn is_blank(raw: &str) -> bool {
    raw.chars().all(char::is_whitespace)
}

fn remove_with_indent(siblings: &mut Vec<Node>, index: usize) -> bool {
    if !matches!(siblings.get(index), Some(Node::Element(_))) {
        return false;
    }
    siblings.remove(index);
    if index > 0 && matches!(&siblings[index - 1], Node::Text(raw) if is_blank(raw)) {
        siblings.remove(index - 1);
    }
    true
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<(), DocumentError> {
    match node {
        Node::Element(element) => element.write(writer),
        Node::Text(raw) => write_event(writer, Event::Text(BytesText::from_escaped(raw.as_str()))),
        Node::CData(data) => write_event(writer, Event::CData(BytesCData::new(data.as_str()))),
        Node::Markup(event) => write_event(writer, event.clone()),
    }
}

fn trim_start_tag(start: &BytesStart<'_>) -> BytesStart<'static> {
    let content = String::from_utf8_lossy(start).trim_end().to_string();
    BytesStart::from_content(content, start.name().as_ref().len())
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), DocumentError> {
    writer
        .write_event(event)
        .map_err(|e| DocumentError::Write(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MSBUILD_NS: &str = "http://schemas.microsoft.com/developer/msbuild/2003";

    const SAMPLE: &str = "\u{feff}<?xml version=\"1.0\" encoding=\"utf-8\"?>\r\n\
<Project DefaultTargets=\"Build\" ToolsVersion=\"15.0\" xmlns=\"http://schemas.microsoft.com/developer/msbuild/2003\">\r\n\
  <!-- generated -->\r\n\
  <ItemGroup Label=\"ProjectConfigurations\">\r\n\
    <ProjectConfiguration Include=\"Debug|x64\" />\r\n\
  </ItemGroup>\r\n\
  <PropertyGroup>\r\n\
    <PreprocessorDefinitions>A&amp;B;%(PreprocessorDefinitions)</PreprocessorDefinitions>\r\n\
  </PropertyGroup>\r\n\
</Project>\r\n";

    #[test]
    fn test_round_trip_is_byte_identical() {
        let doc = Document::parse(SAMPLE).unwrap();
        assert_eq!(doc.to_xml_string().unwrap(), SAMPLE);
    }

    #[test]
    fn test_namespace_is_resolved_for_descendants() {
        let doc = Document::parse(SAMPLE).unwrap();
        let root = doc.root().unwrap();
        assert_eq!(root.local_name(), "Project");
        assert_eq!(root.namespace(), Some(MSBUILD_NS));

        let group = root.child("PropertyGroup").unwrap();
        assert_eq!(group.namespace(), Some(MSBUILD_NS));
        assert_eq!(
            group.child("PreprocessorDefinitions").unwrap().text(),
            "A&B;%(PreprocessorDefinitions)"
        );
    }

    #[test]
    fn test_attribute_lookup() {
        let doc = Document::parse(SAMPLE).unwrap();
        let root = doc.root().unwrap();
        let item = root
            .child("ItemGroup")
            .and_then(|group| group.child("ProjectConfiguration"))
            .unwrap();
        assert_eq!(item.attribute("Include").as_deref(), Some("Debug|x64"));
        assert_eq!(item.attribute("Condition"), None);
    }

    #[test]
    fn test_set_text_reports_changes_only() {
        let mut doc = Document::parse("<A><B>one</B></A>").unwrap();
        let b = doc.element_mut(&[0, 0]).unwrap();
        assert!(!b.set_text("one"));
        assert!(b.set_text("two & three"));
        assert_eq!(doc.to_xml_string().unwrap(), "<A><B>two &amp; three</B></A>");
    }

    #[test]
    fn test_find_or_create_child_uses_sibling_indentation() {
        let source = "<A xmlns=\"urn:x\">\n  <Group>\n    <One>1</One>\n  </Group>\n</A>";
        let mut doc = Document::parse(source).unwrap();
        let group = doc.element_mut(&[0, 1]).unwrap();

        let (child, created) = group.find_or_create_child("Two");
        assert!(created);
        assert_eq!(child.namespace(), Some("urn:x"));
        child.set_text("2");

        let (_, created_again) = group.find_or_create_child("Two");
        assert!(!created_again);

        assert_eq!(
            doc.to_xml_string().unwrap(),
            "<A xmlns=\"urn:x\">\n  <Group>\n    <One>1</One>\n    <Two>2</Two>\n  </Group>\n</A>"
        );
    }

    #[test]
    fn test_child_of_self_closed_element_is_indented() {
        let source = "<A xmlns=\"urn:x\">\r\n  <Group>\r\n    <Item Include=\"a.cpp\" />\r\n  </Group>\r\n</A>";
        let mut doc = Document::parse(source).unwrap();

        let (child, created) = doc.find_or_create_child(&[0, 1, 1], "Options").unwrap();
        assert!(created);
        child.set_text("-Wall");

        assert_eq!(
            doc.to_xml_string().unwrap(),
            "<A xmlns=\"urn:x\">\r\n  <Group>\r\n    <Item Include=\"a.cpp\">\r\n      \
             <Options>-Wall</Options>\r\n    </Item>\r\n  </Group>\r\n</A>"
        );
    }

    #[test]
    fn test_prepend_child_goes_before_existing_elements() {
        let source = "<A>\n  <B/>\n</A>";
        let mut doc = Document::parse(source).unwrap();
        assert!(doc.prepend_child(&[0], "First").is_some());
        assert_eq!(doc.to_xml_string().unwrap(), "<A>\n  <First/>\n  <B/>\n</A>");
        assert!(doc.prepend_child(&[0, 9], "Missing").is_none());
    }

    #[test]
    fn test_created_child_keeps_parent_prefix() {
        let mut doc = Document::parse("<m:A xmlns:m=\"urn:x\"><m:B/></m:A>").unwrap();
        let b = doc.element_mut(&[0, 0]).unwrap();
        let (child, _) = b.find_or_create_child("C");
        assert_eq!(child.name(), "m:C");
        child.set_text("v");
        assert_eq!(
            doc.to_xml_string().unwrap(),
            "<m:A xmlns:m=\"urn:x\"><m:B><m:C>v</m:C></m:B></m:A>"
        );
    }

    #[test]
    fn test_remove_drops_preceding_indentation() {
        let source = "<A>\n  <B/>\n  <C/>\n</A>";
        let mut doc = Document::parse(source).unwrap();
        assert!(doc.remove(&[0, 1]));
        assert_eq!(doc.to_xml_string().unwrap(), "<A>\n  <C/>\n</A>");
        assert!(!doc.remove(&[0, 7]));
    }

    #[test]
    fn test_malformed_input_is_rejected() {
        assert!(matches!(
            Document::parse("<A><B></A>"),
            Err(DocumentError::Parse(_))
        ));
        assert!(Document::parse("<A><B>").is_err());
    }
}
