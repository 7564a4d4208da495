/*!
# XML-map tree (L4c)

A restricted XPath grammar over element/attribute paths, and a tree that
accumulates cell and range links built from those paths, driving the XML
mapping engine's import/export passes.
*/
pub mod tree;
pub mod xpath;

pub use tree::{ElementId, ElementNode, RangeInfo, Sink, XmlMapTree};
pub use xpath::{parse as parse_xpath, Segment, XPath};
