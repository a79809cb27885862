//! Nested-element XML storage for solutions.
//! 以巢狀 XML 元素儲存解決方案。
//!
//! ```xml
//! <SolutionModel Version="1" MinorVersion="0">
//!   <RootItem name="..." id="0">
//!     <Items>
//!       <Folder name="..." id="1"><Items>...</Items></Folder>
//!       <File name="..." id="2"/>
//!     </Items>
//!   </RootItem>
//! </SolutionModel>
//! ```

use std::fs;
use std::io;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;
use tracing::debug;

use crate::item::{ItemId, ItemType};
use crate::solution::{FormatVersion, SolutionModel};
use crate::tree::{ItemTree, NodeHandle, TreeError};
use crate::util::write_atomic;

const DOCUMENT_ELEMENT: &str = "SolutionModel";
const ITEMS_ELEMENT: &str = "Items";

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("XML syntax error: {0}")]
    Syntax(#[from] quick_xml::Error),
    #[error("malformed solution XML at byte {position}: {reason}")]
    Malformed { position: usize, reason: String },
    #[error("unsupported solution format version {major}.{minor}")]
    UnsupportedVersion { major: u32, minor: u32 },
    #[error("invalid solution tree: {0}")]
    Tree(#[from] TreeError),
    #[error("solution XML IO error: {0}")]
    Io(#[from] io::Error),
}

/// Serializes `model` into an indented XML string.
/// 將解決方案序列化為縮排的 XML 字串。
///
/// Ids are reassigned in level order before writing, so they match what
/// the SQLite store would record for the same tree.
pub fn write_string(model: &mut SolutionModel) -> Result<String, XmlError> {
    model.tree_mut().assign_level_order_ids();

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let version = model.version();
    let major = version.major.to_string();
    let minor = version.minor.to_string();
    let mut document = BytesStart::new(DOCUMENT_ELEMENT);
    document.push_attribute(("Version", major.as_str()));
    document.push_attribute(("MinorVersion", minor.as_str()));
    writer.write_event(Event::Start(document))?;

    let tree = model.tree();
    write_item(&mut writer, tree, tree.root())?;

    writer.write_event(Event::End(BytesEnd::new(DOCUMENT_ELEMENT)))?;

    String::from_utf8(writer.into_inner()).map_err(|err| XmlError::Malformed {
        position: err.utf8_error().valid_up_to(),
        reason: err.to_string(),
    })
}

fn write_item(writer: &mut Writer<Vec<u8>>, tree: &ItemTree, handle: NodeHandle) -> Result<(), XmlError> {
    let Some(node) = tree.get(handle) else {
        return Ok(());
    };
    let element = node.item_type().name();
    let id = node.id().map(|id| id.to_string());

    let mut start = BytesStart::new(element);
    start.push_attribute(("name", node.name()));
    if let Some(id) = id.as_deref() {
        start.push_attribute(("id", id));
    }

    if !node.is_container() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    if node.child_count() == 0 {
        writer.write_event(Event::Empty(BytesStart::new(ITEMS_ELEMENT)))?;
    } else {
        writer.write_event(Event::Start(BytesStart::new(ITEMS_ELEMENT)))?;
        for child in tree.children(handle) {
            write_item(writer, tree, child)?;
        }
        writer.write_event(Event::End(BytesEnd::new(ITEMS_ELEMENT)))?;
    }
    writer.write_event(Event::End(BytesEnd::new(element)))?;
    Ok(())
}

/// Writes `model` to `path` atomically.
/// 以原子方式將解決方案寫入檔案。
pub fn write_file(path: &Path, model: &mut SolutionModel) -> Result<(), XmlError> {
    let payload = write_string(model)?;
    write_atomic(path, payload.as_bytes())?;
    debug!(path = %path.display(), items = model.tree().len(), "wrote solution XML");
    Ok(())
}

/// Reads a solution from `path`.
pub fn read_file(path: &Path) -> Result<SolutionModel, XmlError> {
    let contents = fs::read_to_string(path)?;
    let model = read_str(&contents)?;
    debug!(path = %path.display(), items = model.tree().len(), "read solution XML");
    Ok(model)
}

/// Parses a solution document.
/// 解析解決方案 XML 文件。
pub fn read_str(input: &str) -> Result<SolutionModel, XmlError> {
    let mut parser = TreeParser::new(input);
    parser.read_document()
}

/// Structural elements the parser cares about.
enum Element {
    Start(String, Attributes),
    Empty(String, Attributes),
    End(String),
    Eof,
}

#[derive(Default)]
struct Attributes {
    name: Option<String>,
    id: Option<String>,
    version: Option<String>,
    minor_version: Option<String>,
}

/// Strict pull parser: each `read_*` method consumes exactly the element it
/// was handed, up to and including its closing tag.
struct TreeParser<'a> {
    reader: Reader<&'a [u8]>,
}

impl<'a> TreeParser<'a> {
    fn new(input: &'a str) -> Self {
        let mut reader = Reader::from_str(input);
        reader.trim_text(true);
        Self { reader }
    }

    fn malformed(&self, reason: impl Into<String>) -> XmlError {
        XmlError::Malformed {
            position: self.reader.buffer_position(),
            reason: reason.into(),
        }
    }

    fn next_element(&mut self) -> Result<Element, XmlError> {
        loop {
            match self.reader.read_event()? {
                Event::Start(start) => {
                    let name = element_name(&start);
                    let attributes = read_attributes(&start, &self.reader)?;
                    return Ok(Element::Start(name, attributes));
                }
                Event::Empty(start) => {
                    let name = element_name(&start);
                    let attributes = read_attributes(&start, &self.reader)?;
                    return Ok(Element::Empty(name, attributes));
                }
                Event::End(end) => {
                    let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                    return Ok(Element::End(name));
                }
                Event::Eof => return Ok(Element::Eof),
                Event::Text(text) => {
                    let text = text.unescape()?;
                    if !text.trim().is_empty() {
                        return Err(self.malformed(format!("unexpected text '{}'", text.trim())));
                    }
                }
                Event::CData(_) => return Err(self.malformed("unexpected CDATA section")),
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
            }
        }
    }

    fn read_document(&mut self) -> Result<SolutionModel, XmlError> {
        let attributes = match self.next_element()? {
            Element::Start(name, attributes) if name == DOCUMENT_ELEMENT => attributes,
            _ => return Err(self.malformed(format!("expected <{DOCUMENT_ELEMENT}>"))),
        };
        let version = FormatVersion {
            major: self.parse_number(attributes.version.as_deref(), 1, "Version")?,
            minor: self.parse_number(attributes.minor_version.as_deref(), 0, "MinorVersion")?,
        };
        if !version.is_supported() {
            return Err(XmlError::UnsupportedVersion {
                major: version.major,
                minor: version.minor,
            });
        }

        let root_type = ItemType::RootItem.name();
        let (attributes, empty) = match self.next_element()? {
            Element::Start(name, attributes) if name == root_type => (attributes, false),
            Element::Empty(name, attributes) if name == root_type => (attributes, true),
            _ => return Err(self.malformed(format!("expected <{root_type}>"))),
        };
        let name = self.required_name(attributes.name)?;
        let mut tree = ItemTree::new(name)?;
        let root = tree.root();
        if let Some(id) = self.parse_id(attributes.id.as_deref())? {
            tree.set_id(root, id)?;
        }
        if !empty {
            self.read_item_body(&mut tree, root, root_type)?;
        }

        match self.next_element()? {
            Element::End(name) if name == DOCUMENT_ELEMENT => {}
            _ => return Err(self.malformed(format!("expected </{DOCUMENT_ELEMENT}>"))),
        }
        match self.next_element()? {
            Element::Eof => {}
            _ => return Err(self.malformed("trailing content after document element")),
        }

        let mut model = SolutionModel::from_tree(tree);
        model.set_version(version);
        Ok(model)
    }

    /// Consumes the content of an already-opened item element, through its end tag.
    fn read_item_body(&mut self, tree: &mut ItemTree, handle: NodeHandle, element: &str) -> Result<(), XmlError> {
        loop {
            match self.next_element()? {
                Element::Start(name, _) if name == ITEMS_ELEMENT => self.read_items(tree, handle)?,
                Element::Empty(name, _) if name == ITEMS_ELEMENT => {}
                Element::End(name) if name == element => return Ok(()),
                Element::Eof => return Err(self.malformed(format!("unterminated <{element}>"))),
                _ => return Err(self.malformed(format!("unexpected content in <{element}>"))),
            }
        }
    }

    /// Consumes children up to and including `</Items>`.
    fn read_items(&mut self, tree: &mut ItemTree, parent: NodeHandle) -> Result<(), XmlError> {
        loop {
            match self.next_element()? {
                Element::Start(name, attributes) => {
                    let child = self.add_item(tree, parent, &name, attributes)?;
                    self.read_item_body(tree, child, &name)?;
                }
                Element::Empty(name, attributes) => {
                    self.add_item(tree, parent, &name, attributes)?;
                }
                Element::End(name) if name == ITEMS_ELEMENT => return Ok(()),
                _ => return Err(self.malformed(format!("unterminated <{ITEMS_ELEMENT}>"))),
            }
        }
    }

    fn add_item(
        &self,
        tree: &mut ItemTree,
        parent: NodeHandle,
        element: &str,
        attributes: Attributes,
    ) -> Result<NodeHandle, XmlError> {
        let item_type = ItemType::ALL
            .into_iter()
            .find(|kind| kind.name() == element)
            .ok_or_else(|| self.malformed(format!("unknown item element <{element}>")))?;
        let name = self.required_name(attributes.name)?;
        let handle = tree.add_child(parent, name, item_type)?;
        if let Some(id) = self.parse_id(attributes.id.as_deref())? {
            tree.set_id(handle, id)?;
        }
        Ok(handle)
    }

    fn required_name(&self, name: Option<String>) -> Result<String, XmlError> {
        name.ok_or_else(|| self.malformed("item without a name attribute"))
    }

    fn parse_id(&self, value: Option<&str>) -> Result<Option<ItemId>, XmlError> {
        value
            .map(|raw| {
                raw.trim()
                    .parse::<i64>()
                    .map(ItemId)
                    .map_err(|_| self.malformed(format!("invalid id '{raw}'")))
            })
            .transpose()
    }

    fn parse_number(&self, value: Option<&str>, default: u32, attribute: &str) -> Result<u32, XmlError> {
        match value {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| self.malformed(format!("invalid {attribute} '{raw}'"))),
        }
    }
}

fn element_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

fn read_attributes(start: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Attributes, XmlError> {
    let mut attributes = Attributes::default();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        let value = attribute.decode_and_unescape_value(reader)?.into_owned();
        match attribute.key.as_ref() {
            b"name" => attributes.name = Some(value),
            b"id" => attributes.id = Some(value),
            b"Version" => attributes.version = Some(value),
            b"MinorVersion" => attributes.minor_version = Some(value),
            _ => {}
        }
    }
    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> SolutionModel {
        let mut model = SolutionModel::new("S").unwrap();
        let folder = model.add_root_child("F", ItemType::Folder).unwrap();
        model.add_child("a.txt", ItemType::File, folder).unwrap();
        let project = model.add_root_child("P & Q", ItemType::Project).unwrap();
        model.add_child("empty", ItemType::Folder, project).unwrap();
        model
    }

    #[test]
    fn writes_nested_layout() {
        let mut model = sample();
        let xml = write_string(&mut model).unwrap();
        assert!(xml.contains(r#"<SolutionModel Version="1" MinorVersion="0">"#));
        assert!(xml.contains(r#"<RootItem name="S" id="0">"#));
        assert!(xml.contains(r#"<Folder name="F" id="1">"#));
        assert!(xml.contains(r#"<Project name="P &amp; Q" id="2">"#));
        assert!(xml.contains(r#"<File name="a.txt" id="3"/>"#));
        assert!(xml.contains("<Items/>"));
    }

    #[test]
    fn round_trip_preserves_structure() {
        let mut model = sample();
        let xml = write_string(&mut model).unwrap();
        let loaded = read_str(&xml).unwrap();
        let tree = loaded.tree();

        let file = tree.resolve_path("/S/F/a.txt").expect("file survives");
        assert_eq!(tree.get(file).unwrap().item_type(), ItemType::File);
        assert_eq!(tree.get(file).unwrap().id(), Some(ItemId(3)));
        let empty = tree.resolve_path("/S/P & Q/empty").expect("folder survives");
        assert_eq!(tree.get(empty).unwrap().item_type(), ItemType::Folder);
        assert_eq!(tree.len(), model.tree().len());
    }

    #[test]
    fn sibling_parsing_continues_after_nested_items() {
        let xml = r#"<?xml version="1.0"?>
<SolutionModel Version="1" MinorVersion="0">
  <RootItem name="S" id="0">
    <Items>
      <Folder name="A"><Items><File name="a1"/><Folder name="deep"><Items/></Folder></Items></Folder>
      <!-- comment between siblings -->
      <File name="b"></File>
      <Project name="C"/>
    </Items>
  </RootItem>
</SolutionModel>"#;
        let model = read_str(xml).unwrap();
        let tree = model.tree();
        assert_eq!(tree.child_count(tree.root()), 3);
        assert!(tree.resolve_path("/S/A/deep").is_some());
        assert!(tree.resolve_path("/S/b").is_some());
        assert!(tree.resolve_path("/S/C").is_some());
    }

    #[test]
    fn missing_version_reads_as_one_zero() {
        let model = read_str(r#"<SolutionModel><RootItem name="S"/></SolutionModel>"#).unwrap();
        assert_eq!(model.version(), FormatVersion { major: 1, minor: 0 });
        assert_eq!(model.tree().len(), 1);
    }

    #[test]
    fn escaped_attribute_values_are_decoded() {
        let xml = r#"<SolutionModel><RootItem name="S"><Items><File name="a &amp; &lt;b&gt;" id="1"/></Items></RootItem></SolutionModel>"#;
        let model = read_str(xml).unwrap();
        let tree = model.tree();
        let file = tree.child_at(tree.root(), 0).unwrap();
        assert_eq!(tree.get(file).unwrap().name(), "a & <b>");
    }

    #[test]
    fn newer_major_version_is_rejected() {
        let err = read_str(r#"<SolutionModel Version="2" MinorVersion="0"><RootItem name="S"/></SolutionModel>"#)
            .unwrap_err();
        assert!(matches!(err, XmlError::UnsupportedVersion { major: 2, .. }));
    }

    #[test]
    fn duplicate_siblings_fail() {
        let xml = r#"<SolutionModel><RootItem name="S"><Items><File name="x"/><Folder name="x"/></Items></RootItem></SolutionModel>"#;
        assert!(matches!(
            read_str(xml),
            Err(XmlError::Tree(TreeError::DuplicateName { .. }))
        ));
    }

    #[test]
    fn structural_errors_are_reported() {
        let unterminated = r#"<SolutionModel><RootItem name="S"><Items><File name="x"/></RootItem></SolutionModel>"#;
        assert!(read_str(unterminated).is_err());

        let unknown = r#"<SolutionModel><RootItem name="S"><Items><Widget name="x"/></Items></RootItem></SolutionModel>"#;
        assert!(matches!(read_str(unknown), Err(XmlError::Malformed { .. })));

        let nameless = r#"<SolutionModel><RootItem/></SolutionModel>"#;
        assert!(matches!(read_str(nameless), Err(XmlError::Malformed { .. })));

        let file_children = r#"<SolutionModel><RootItem name="S"><Items><File name="f"><Items><File name="g"/></Items></File></Items></RootItem></SolutionModel>"#;
        assert!(matches!(
            read_str(file_children),
            Err(XmlError::Tree(TreeError::NotAContainer(_)))
        ));
    }

    #[test]
    fn file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("demo.solxml");
        let mut model = sample();
        write_file(&path, &mut model).unwrap();
        let loaded = read_file(&path).unwrap();
        assert!(loaded.tree().resolve_path("/S/F/a.txt").is_some());
    }
}
