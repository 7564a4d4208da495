//! Short static strings used to annotate error variants with the production
//! being parsed when the error was raised. These are rendered as part of the
//! error `Display` impl and are not meant to be interpreted by calling code.

pub const ERRCTX_UNKNOWN: &'static str = "in an unknown context";
pub const ERRCTX_DOCBEGIN: &'static str = "at the start of the document";
pub const ERRCTX_DOCEND: &'static str = "at the end of the document";
pub const ERRCTX_XML_DECL_START: &'static str = "at the start of the XML declaration";
pub const ERRCTX_XML_DECL: &'static str = "inside the XML declaration";
pub const ERRCTX_XML_DECL_END: &'static str = "at the end of the XML declaration";
pub const ERRCTX_ELEMENT: &'static str = "in an element header";
pub const ERRCTX_ELEMENT_CLOSE: &'static str = "in an element closing tag";
pub const ERRCTX_ELEMENT_FOOT: &'static str = "at the end of an element";
pub const ERRCTX_NAME: &'static str = "in a name";
pub const ERRCTX_NAMESTART: &'static str = "at the start of a name";
pub const ERRCTX_ATTNAME: &'static str = "in an attribute name";
pub const ERRCTX_ATTVAL: &'static str = "in an attribute value";
pub const ERRCTX_TEXT: &'static str = "in text content";
pub const ERRCTX_REF: &'static str = "in a character or entity reference";
pub const ERRCTX_CDATA_SECTION_START: &'static str = "at the start of a CDATA section";
pub const ERRCTX_CDATA_SECTION: &'static str = "inside a CDATA section";
