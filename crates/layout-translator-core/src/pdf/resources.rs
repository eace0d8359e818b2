//! Resolution of page resources through indirect references and the
//! inherited attributes of the page tree.

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::{Error, Result};

/// Maximum depth when walking up `/Parent` links, guards against cycles.
const MAX_PARENT_DEPTH: usize = 10;

/// US Letter, used when a page has no usable `/MediaBox`.
pub const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Read a numeric operand or array entry.
pub fn number(obj: &Object) -> Option<f32> {
    match obj {
        #[allow(clippy::cast_precision_loss)]
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Decode a PDF text string: UTF-16BE with a BOM, UTF-8 with a BOM,
/// otherwise one byte per character.
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        String::from_utf8_lossy(rest).into_owned()
    } else {
        bytes.iter().copied().map(char::from).collect()
    }
}

/// Follow a reference if `obj` is one.
pub fn deref<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Resolve an object that should be a Dictionary (handles References).
pub fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match deref(doc, obj)? {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

fn page_dict(doc: &Document, page_id: ObjectId) -> Result<&Dictionary> {
    match doc.get_object(page_id) {
        Ok(Object::Dictionary(dict)) => Ok(dict),
        Ok(_) => Err(Error::Lopdf(format!("Object {page_id:?} is not a page"))),
        Err(e) => Err(Error::Lopdf(format!("Failed to get page: {e}"))),
    }
}

/// Look up a page attribute, walking up the page tree for inheritable ones.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Result<Option<&'a Object>> {
    let mut dict = page_dict(doc, page_id)?;

    for _ in 0..MAX_PARENT_DEPTH {
        if let Ok(value) = dict.get(key) {
            return Ok(Some(value));
        }
        match dict.get(b"Parent").ok().and_then(|p| resolve_dict(doc, p)) {
            Some(parent) => dict = parent,
            None => return Ok(None),
        }
    }

    Ok(None)
}

/// Resolve the Resources dictionary for a page.
///
/// Resources may be inline, an indirect reference, or inherited from a
/// parent Pages node. A page without resources gets an empty dictionary.
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    Ok(inherited(doc, page_id, b"Resources")?
        .and_then(|obj| resolve_dict(doc, obj))
        .cloned()
        .unwrap_or_default())
}

/// The page's `/MediaBox` as `[x0, y0, x1, y1]`.
pub fn media_box(doc: &Document, page_id: ObjectId) -> Result<[f32; 4]> {
    let Some(Object::Array(arr)) = inherited(doc, page_id, b"MediaBox")?.and_then(|o| deref(doc, o))
    else {
        return Ok(DEFAULT_MEDIA_BOX);
    };

    let values: Vec<f32> = arr.iter().filter_map(number).collect();
    match values.as_slice() {
        &[x0, y0, x1, y1] => Ok([x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)]),
        _ => Ok(DEFAULT_MEDIA_BOX),
    }
}

/// Entries of a named sub-dictionary of the resources (e.g. `/Font`),
/// resolving the sub-dictionary itself if it is indirect.
pub fn resource_entries<'a>(
    doc: &'a Document,
    resources: &'a Dictionary,
    category: &[u8],
) -> Vec<(&'a [u8], &'a Object)> {
    resources
        .get(category)
        .ok()
        .and_then(|obj| resolve_dict(doc, obj))
        .map(|dict| dict.iter().map(|(k, v)| (k.as_slice(), v)).collect())
        .unwrap_or_default()
}
