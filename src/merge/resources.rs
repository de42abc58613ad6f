//! Page attribute inheritance and the target's interactive form.

use super::copy::CopyContext;
use crate::dictionary::Dictionary;
use crate::document::{Document, ObjectSource};
use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef, RefKey};
use std::collections::HashSet;

/// Page attributes a page may inherit from its page tree ancestors.
const INHERITABLE: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// AcroForm entries carried over from the first source that has them.
const FORM_DEFAULTS: [&str; 3] = ["DR", "DA", "NeedAppearances"];

/// The page dictionary at `page_ref` with inherited attributes made explicit.
///
/// Copied pages hang directly under the target root, so attributes that
/// came from a source ancestor would otherwise be lost.
pub(crate) fn inherited_page(
    ctx: &CopyContext,
    source: &dyn ObjectSource,
    page_ref: RefKey,
) -> Result<Dictionary> {
    let page = match ctx.resolve(source, page_ref)? {
        Some(Object::Dictionary(dict)) => dict,
        Some(other) => {
            return Err(Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: other.type_name().to_string(),
            })
        },
        None => return Err(Error::ObjectNotFound(page_ref)),
    };

    let mut missing: Vec<&str> = INHERITABLE
        .iter()
        .copied()
        .filter(|key| !page.contains_key(key))
        .collect();
    let mut out = page.clone();
    let mut visited = HashSet::from([page_ref]);
    let mut parent = page.get_reference("Parent");

    while let Some(node_ref) = parent {
        if missing.is_empty() || !visited.insert(node_ref) {
            break;
        }
        let Some(Object::Dictionary(node)) = ctx.resolve(source, node_ref)? else {
            break;
        };
        missing.retain(|key| match node.get(key) {
            Some(value) => {
                log::debug!("Page {} inherits /{} from {}", page_ref, key, node_ref);
                out.put(*key, value.clone());
                false
            },
            None => true,
        });
        parent = node.get_reference("Parent");
    }
    Ok(out)
}

/// The source's /AcroForm entries that the target adopts.
pub(crate) fn source_form_defaults(
    ctx: &CopyContext,
    source: &dyn ObjectSource,
) -> Result<Option<Dictionary>> {
    let catalog = source.catalog()?;
    let form = match catalog.get("AcroForm") {
        Some(Object::Reference(r)) => ctx.resolve(source, *r)?,
        Some(other) => Some(other.clone()),
        None => None,
    };
    let Some(Object::Dictionary(form)) = form else {
        return Ok(None);
    };

    let mut defaults = Dictionary::new();
    for key in FORM_DEFAULTS {
        let value = match form.get(key) {
            Some(Object::Reference(r)) if key == "DR" => ctx.resolve(source, *r)?,
            Some(value) => Some(value.clone()),
            None => None,
        };
        if let Some(value) = value {
            defaults.put(key, value);
        }
    }
    Ok(Some(defaults))
}

/// Reference of the target's AcroForm, creating an empty one on first use.
pub(crate) fn ensure_acroform(target: &mut Document) -> Result<ObjectRef> {
    let catalog_ref = target
        .catalog_ref()
        .ok_or_else(|| Error::InvalidPdf("Target has no catalog".to_string()))?;
    if let Some(existing) = target
        .get_dict(catalog_ref)
        .and_then(|c| c.get_reference("AcroForm"))
    {
        return Ok(existing);
    }

    let form = target.add_object(Dictionary::new().with("Fields", Object::Array(Vec::new())));
    target
        .get_dict_mut(catalog_ref)
        .ok_or(Error::ObjectNotFound(catalog_ref))?
        .put("AcroForm", form);
    Ok(form)
}

/// Append a top-level field to /Fields unless it is already listed.
pub(crate) fn register_field(target: &mut Document, form_ref: ObjectRef, field: ObjectRef) -> Result<()> {
    let form = target
        .get_dict_mut(form_ref)
        .ok_or(Error::ObjectNotFound(form_ref))?;
    let entry = Object::Reference(field);
    match form.get_mut("Fields") {
        Some(Object::Array(fields)) => {
            if !fields.contains(&entry) {
                fields.push(entry);
            }
        },
        _ => {
            form.put("Fields", Object::Array(vec![entry]));
        },
    }
    Ok(())
}

/// Merge copied form defaults into the target AcroForm.
///
/// Entries already present in the target win. /DR is merged one level deep,
/// so font maps from different sources combine.
pub(crate) fn merge_form_defaults(
    target: &mut Document,
    form_ref: ObjectRef,
    incoming: &Dictionary,
) -> Result<()> {
    let mut form = target
        .get_dict(form_ref)
        .cloned()
        .ok_or(Error::ObjectNotFound(form_ref))?;

    for (key, value) in incoming {
        if key == "DR" {
            let Some(incoming_dr) = dict_value(target, value) else {
                continue;
            };
            let mut dr = form
                .get("DR")
                .and_then(|existing| dict_value(target, existing))
                .unwrap_or_default();
            merge_resources(target, &mut dr, &incoming_dr);
            form.put("DR", dr);
        } else if !form.contains_key(key) {
            form.put(key.clone(), value.clone());
        }
    }

    target.set_object(form_ref, form);
    Ok(())
}

/// Add the categories and names of `incoming` that `into` lacks.
fn merge_resources(target: &Document, into: &mut Dictionary, incoming: &Dictionary) {
    for (category, value) in incoming {
        match into.get(category) {
            None => {
                into.put(category.clone(), value.clone());
            },
            Some(existing) => {
                let (Some(mut merged), Some(extra)) =
                    (dict_value(target, existing), dict_value(target, value))
                else {
                    continue;
                };
                merged.merge_missing(&extra);
                into.put(category.clone(), merged);
            },
        }
    }
}

/// A direct dictionary, or the target dictionary a reference points at.
fn dict_value(target: &Document, value: &Object) -> Option<Dictionary> {
    match value {
        Object::Dictionary(dict) => Some(dict.clone()),
        Object::Reference(r) => target.get_dict(*r).cloned(),
        _ => None,
    }
}
