//! Form field name disambiguation.
//!
//! Field names must be unique across the merged document. When a top-level
//! field from a later source carries a name that an earlier source already
//! claimed, the field is wrapped in a synthetic parent with a numeric name:
//! `Name` becomes `1.Name`. Widgets stay attached to the same field object.

use super::copy::CopyContext;
use crate::dictionary::Dictionary;
use crate::document::ObjectSource;
use crate::error::Result;
use crate::object::{Object, ObjectRef, RefKey};
use crate::pdf_string::PdfString;
use std::collections::{HashMap, HashSet};

/// Names claimed by all sources of one merge.
pub(crate) type GlobalNames = HashSet<String>;

/// Field names claimed by one source document.
#[derive(Debug, Default)]
pub(crate) struct FieldRegistry {
    seen_top: HashSet<String>,
    seen_paths: HashSet<String>,
    /// Synthetic parent name to its source-side key
    synthetic: HashMap<String, RefKey>,
}

impl FieldRegistry {
    pub fn has_seen(&self, top_name: &str) -> bool {
        self.seen_top.contains(top_name)
    }

    pub fn has_path(&self, path: &str) -> bool {
        self.seen_paths.contains(path)
    }

    /// Whether `key` is a parent field created by a rename.
    pub fn is_synthetic(&self, key: RefKey) -> bool {
        self.synthetic.values().any(|&k| k == key)
    }
}

/// Path from a widget up to its topmost field.
#[derive(Debug, Clone, PartialEq)]
struct FieldPath {
    top: RefKey,
    top_name: String,
    qualified: String,
    /// Some partial name was a UTF-16 string
    unicode: bool,
}

/// Give every field on the page a name no earlier source has used.
///
/// Colliding fields are re-parented in the context's overlay, so the page
/// copy that follows picks up the new hierarchy.
pub(crate) fn disambiguate(
    ctx: &mut CopyContext,
    source: &dyn ObjectSource,
    page: &Dictionary,
    global: &mut GlobalNames,
) -> Result<()> {
    for widget in widget_refs(ctx, source, page)? {
        let Some(path) = field_path(ctx, source, widget)? else {
            continue;
        };
        if path.top_name.is_empty()
            || ctx.fields.is_synthetic(path.top)
            || ctx.fields.has_seen(&path.top_name)
            || ctx.fields.has_path(&path.qualified)
        {
            continue;
        }

        if global.contains(&path.qualified) || global.contains(&path.top_name) {
            rename(ctx, source, &path, global)?;
        } else {
            ctx.fields.seen_top.insert(path.top_name.clone());
            ctx.fields.seen_paths.insert(path.qualified.clone());
            global.insert(path.top_name);
            global.insert(path.qualified);
        }
    }
    Ok(())
}

/// Wrap the colliding top-level field in a new numeric parent.
fn rename(
    ctx: &mut CopyContext,
    source: &dyn ObjectSource,
    path: &FieldPath,
    global: &mut GlobalNames,
) -> Result<()> {
    let Some(mut top) = ctx.resolve(source, path.top)? else {
        return Ok(());
    };
    let name = next_synthetic_name(&ctx.fields, global);
    let title = if path.unicode {
        PdfString::unicode(&name)
    } else {
        PdfString::text(&name)
    };
    let parent = ctx.synthesize(
        Dictionary::new()
            .with("T", title)
            .with("Kids", Object::Array(vec![Object::Reference(path.top)]))
            .into(),
    );

    if let Some(dict) = top.as_dict_mut() {
        dict.put("Parent", parent);
    }
    ctx.rewrite(path.top, top);

    let qualified = format!("{}.{}", name, path.qualified);
    log::info!("Field '{}' already exists, renamed to '{}'", path.qualified, qualified);

    ctx.fields.seen_top.insert(name.clone());
    ctx.fields.seen_paths.insert(qualified.clone());
    ctx.fields.synthetic.insert(name.clone(), parent);
    global.insert(name);
    global.insert(qualified);
    Ok(())
}

/// Smallest positive integer not yet used as a field name anywhere.
fn next_synthetic_name(fields: &FieldRegistry, global: &GlobalNames) -> String {
    (1u64..)
        .map(|n| n.to_string())
        .find(|name| {
            !fields.synthetic.contains_key(name) && !fields.has_seen(name) && !global.contains(name)
        })
        .unwrap_or_default()
}

/// Source-side keys of the topmost fields of every widget on the page, deduplicated.
pub(crate) fn top_fields(
    ctx: &CopyContext,
    source: &dyn ObjectSource,
    page: &Dictionary,
) -> Result<Vec<RefKey>> {
    let mut tops = Vec::new();
    for widget in widget_refs(ctx, source, page)? {
        if let Some(path) = field_path(ctx, source, widget)? {
            if !path.top_name.is_empty() && !tops.contains(&path.top) {
                tops.push(path.top);
            }
        }
    }
    Ok(tops)
}

/// Indirect /Widget annotations listed in the page's /Annots.
fn widget_refs(
    ctx: &CopyContext,
    source: &dyn ObjectSource,
    page: &Dictionary,
) -> Result<Vec<ObjectRef>> {
    let annots = match page.get("Annots") {
        Some(Object::Reference(r)) => ctx.resolve(source, *r)?,
        Some(other) => Some(other.clone()),
        None => None,
    };
    let Some(Object::Array(annots)) = annots else {
        return Ok(Vec::new());
    };

    let mut widgets = Vec::new();
    for annot_ref in annots.iter().filter_map(Object::as_reference) {
        let Some(annot) = ctx.resolve(source, annot_ref)? else {
            continue;
        };
        if annot.as_dict().and_then(|d| d.get_name("Subtype")) == Some("Widget") {
            widgets.push(annot_ref);
        }
    }
    Ok(widgets)
}

/// Walk /Parent links from `widget` to the topmost field, collecting /T names.
fn field_path(
    ctx: &CopyContext,
    source: &dyn ObjectSource,
    widget: ObjectRef,
) -> Result<Option<FieldPath>> {
    let Some(Object::Dictionary(mut dict)) = ctx.resolve(source, widget)? else {
        return Ok(None);
    };
    let decryptor = source.decryptor();
    let mut current = widget;
    let mut visited = HashSet::from([widget]);
    let mut names = Vec::new();
    let mut unicode = false;

    loop {
        if let Some(t) = dict.get("T").and_then(Object::as_string) {
            let t = t.decrypted(decryptor);
            unicode |= t.is_unicode();
            names.push(t.to_text());
        }
        let Some(parent) = dict.get_reference("Parent") else {
            break;
        };
        if !visited.insert(parent) {
            log::warn!("Field hierarchy of {} loops at {}", widget, parent);
            break;
        }
        match ctx.resolve(source, parent)? {
            Some(Object::Dictionary(parent_dict)) => {
                current = parent;
                dict = parent_dict;
            },
            _ => break,
        }
    }

    names.reverse();
    Ok(Some(FieldPath {
        top: current,
        top_name: names.first().cloned().unwrap_or_default(),
        qualified: names.join("."),
        unicode,
    }))
}
