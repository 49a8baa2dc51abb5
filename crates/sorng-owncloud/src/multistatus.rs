// ──────────────────────────────────────────────────────────────────────────────
// sorng-owncloud · multistatus
// ──────────────────────────────────────────────────────────────────────────────
// WebDAV multistatus parser.
//
// Elements are matched on their local name only. Servers disagree on prefixes
// (`d:`, `D:`, none) and on where they declare the DAV: namespace, so the
// prefix is never consulted.
// ──────────────────────────────────────────────────────────────────────────────

use crate::error::{OwnCloudError, OwnCloudResult};
use crate::paths;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use std::collections::BTreeMap;

/// Resource kind derived from `resourcetype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResourceKind {
    File,
    Directory,
}

/// One `response` element of a multistatus document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DavEntry {
    /// Percent-decoded href.
    pub href: String,
    pub kind: ResourceKind,
    /// Text of every other property under `propstat/prop`, by local name.
    pub properties: BTreeMap<String, String>,
}

impl DavEntry {
    fn new() -> Self {
        Self {
            href: String::new(),
            kind: ResourceKind::File,
            properties: BTreeMap::new(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == ResourceKind::Directory
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

// Depths in the element stack: multistatus / response / propstat / prop / <property>.
const RESPONSE_DEPTH: usize = 2;
const PROPERTY_DEPTH: usize = 5;

/// Parse a multistatus body into its `response` entries, in document order.
///
/// An empty, truncated or unparsable body yields an `EmptyResponse` error. A
/// well-formed document with no `response` under the `multistatus` root
/// yields an empty list.
pub fn parse_multistatus(xml: &str) -> OwnCloudResult<Vec<DavEntry>> {
    if xml.trim().is_empty() {
        return Err(OwnCloudError::empty_response("empty multistatus body"));
    }

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<DavEntry> = None;
    let mut stack: Vec<String> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let name = local(e.local_name().as_ref());
                open_element(&stack, &name, &mut current);
                stack.push(name);
            }
            Event::Empty(ref e) => {
                let name = local(e.local_name().as_ref());
                open_element(&stack, &name, &mut current);
            }
            Event::Text(ref e) => {
                let text = e.unescape()?;
                push_text(&stack, &text, current.as_mut());
            }
            Event::CData(e) => {
                let raw = e.into_inner();
                push_text(&stack, &String::from_utf8_lossy(&raw), current.as_mut());
            }
            Event::End(_) => {
                if stack.len() == RESPONSE_DEPTH && in_response(&stack) {
                    if let Some(mut entry) = current.take() {
                        entry.href = paths::decode(entry.href.trim());
                        entries.push(entry);
                    }
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(OwnCloudError::empty_response(format!(
            "truncated multistatus body (unclosed <{}>)",
            stack.join("/")
        )));
    }

    Ok(entries)
}

fn local(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn in_response(stack: &[String]) -> bool {
    stack.len() >= RESPONSE_DEPTH && stack[0] == "multistatus" && stack[1] == "response"
}

fn in_prop(stack: &[String]) -> bool {
    stack.len() >= PROPERTY_DEPTH - 1 && in_response(stack) && stack[2] == "propstat" && stack[3] == "prop"
}

/// Handle an opening (or self-closing) element whose parent chain is `stack`.
fn open_element(stack: &[String], name: &str, current: &mut Option<DavEntry>) {
    if stack.len() == RESPONSE_DEPTH - 1 && stack[0] == "multistatus" && name == "response" {
        *current = Some(DavEntry::new());
        return;
    }
    let Some(entry) = current.as_mut() else {
        return;
    };
    if stack.len() == PROPERTY_DEPTH && in_prop(stack) && stack[4] == "resourcetype" && name == "collection" {
        entry.kind = ResourceKind::Directory;
    }
}

fn push_text(stack: &[String], text: &str, current: Option<&mut DavEntry>) {
    let Some(entry) = current else {
        return;
    };
    if stack.len() == RESPONSE_DEPTH + 1 && in_response(stack) && stack[2] == "href" {
        entry.href.push_str(text);
    } else if stack.len() == PROPERTY_DEPTH && in_prop(stack) && stack[4] != "resourcetype" {
        entry
            .properties
            .entry(stack[4].clone())
            .or_default()
            .push_str(text);
    }
}
