use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;
use thiserror::Error;

/// SEC-003: Maximum allowed nesting depth for OPML outline elements.
/// Prevents stack overflow attacks from maliciously crafted deeply nested OPMLs.
pub const MAX_OPML_DEPTH: usize = 50;

/// Errors that can occur while loading a subscription file.
#[derive(Debug, Error)]
pub enum OpmlError {
    /// SEC-003: OPML nesting depth exceeds safety limit.
    #[error("OPML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    /// XML parsing failed.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// Well-formed XML whose root element is not `<opml>`.
    #[error("Document is not OPML (root element: {0})")]
    NotOpml(String),

    /// File I/O error.
    #[error("Failed to read OPML file: {0}")]
    Io(#[from] std::io::Error),
}

/// A parsed subscription file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpmlDocument {
    /// Contents of `<head><title>`, if present.
    pub title: Option<String>,
    /// Top-level outlines of `<body>`, in document order.
    pub outlines: Vec<Outline>,
}

/// One `<outline>` element and its nested children.
///
/// Attributes are kept as they appear in the file; deciding whether a node
/// is a feed or a folder is the extractor's job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outline {
    /// The `type` attribute (`rss` for feed subscriptions).
    pub kind: Option<String>,
    pub text: Option<String>,
    pub title: Option<String>,
    pub xml_url: Option<String>,
    pub outlines: Vec<Outline>,
}

/// Reads the OPML file at `path` and parses it into an outline tree.
///
/// # Errors
///
/// Returns [`OpmlError::Io`] when the file cannot be read, and the parse
/// errors of [`parse_document`] otherwise.
pub async fn load(path: &Path) -> Result<OpmlDocument, OpmlError> {
    let content = tokio::fs::read_to_string(path).await?;
    let document = parse_document(&content)?;
    tracing::debug!(
        path = %path.display(),
        top_level = document.outlines.len(),
        "Loaded OPML document"
    );
    Ok(document)
}

/// Parses OPML content into an [`OpmlDocument`].
///
/// Outlines are attached to their parent when their end tag (or the
/// self-closing tag) is read, so sibling order matches document order.
///
/// # Security
///
/// SEC-002: quick-xml (0.37) never parses `<!ENTITY>` declarations. Entity
/// references other than the five XML builtins fail with
/// `EscapeError::UnrecognizedEntity` in `decode_and_unescape_value()`, so
/// external entities can never be expanded into feed data.
pub fn parse_document(content: &str) -> Result<OpmlDocument, OpmlError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut document = OpmlDocument::default();
    // Open outlines, innermost last. Its length is the current nesting depth.
    let mut open: Vec<Outline> = Vec::new();
    let mut root_seen = false;
    // All open elements, so a truncated document is rejected at EOF
    let mut element_depth: usize = 0;
    let mut in_head = false;
    let mut in_head_title = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                element_depth += 1;
                let name = e.name();
                if !root_seen {
                    check_root(name.as_ref())?;
                    root_seen = true;
                }
                match name.as_ref() {
                    b"outline" => {
                        // SEC-003: Reject excessively nested OPMLs
                        if open.len() >= MAX_OPML_DEPTH {
                            return Err(OpmlError::MaxDepthExceeded(MAX_OPML_DEPTH));
                        }
                        open.push(parse_outline_attributes(&e, &reader)?);
                    }
                    b"head" => in_head = true,
                    b"title" if in_head => in_head_title = true,
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                if !root_seen {
                    check_root(e.name().as_ref())?;
                    root_seen = true;
                }
                if e.name().as_ref() == b"outline" {
                    // Self-closing outline doesn't affect depth
                    let outline = parse_outline_attributes(&e, &reader)?;
                    attach(&mut open, &mut document.outlines, outline);
                }
            }
            Ok(Event::Text(t)) if in_head_title => {
                let text = t
                    .unescape()
                    .map_err(|e| OpmlError::XmlParse(e.to_string()))?;
                document.title = Some(text.into_owned());
            }
            Ok(Event::End(e)) => {
                element_depth = element_depth.saturating_sub(1);
                match e.name().as_ref() {
                    b"outline" => {
                        if let Some(outline) = open.pop() {
                            attach(&mut open, &mut document.outlines, outline);
                        }
                    }
                    b"head" => in_head = false,
                    b"title" => in_head_title = false,
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(OpmlError::XmlParse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if !root_seen {
        return Err(OpmlError::NotOpml("<none>".to_string()));
    }
    if element_depth > 0 {
        return Err(OpmlError::XmlParse(format!(
            "{} unclosed element(s) at end of document",
            element_depth
        )));
    }

    Ok(document)
}

fn check_root(name: &[u8]) -> Result<(), OpmlError> {
    if name == b"opml" {
        Ok(())
    } else {
        Err(OpmlError::NotOpml(String::from_utf8_lossy(name).into_owned()))
    }
}

/// Appends a finished outline to its parent, or to the document body when no
/// outline is open.
fn attach(open: &mut [Outline], top_level: &mut Vec<Outline>, outline: Outline) {
    match open.last_mut() {
        Some(parent) => parent.outlines.push(outline),
        None => top_level.push(outline),
    }
}

fn parse_outline_attributes(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
) -> Result<Outline, OpmlError> {
    let mut outline = Outline::default();

    for attr_result in e.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed OPML attribute");
                continue;
            }
        };
        let slot = match attr.key.as_ref() {
            b"type" => &mut outline.kind,
            b"text" => &mut outline.text,
            b"title" => &mut outline.title,
            b"xmlUrl" => &mut outline.xml_url,
            _ => continue,
        };
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|e| OpmlError::XmlParse(e.to_string()))?;
        *slot = Some(value.into_owned());
    }

    Ok(outline)
}
