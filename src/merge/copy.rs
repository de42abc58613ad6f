//! Cross-document object copying.
//!
//! Walks an object graph of one source document and re-creates it inside the
//! target, renumbering indirect references. Every source keeps a memo from
//! source reference to target reference so shared subgraphs are copied once,
//! across all pages imported from that source.
//!
//! A slot is reserved in the target before an object's body is copied, so
//! cycles resolve to the reserved reference instead of recursing forever.

use super::fields::FieldRegistry;
use crate::dictionary::Dictionary;
use crate::document::{Document, ObjectSource};
use crate::error::{CopyWarning, Error, Result};
use crate::object::{Object, ObjectRef, RefKey, Stream};
use crate::pdf_string::Payload;
use std::collections::HashMap;

/// Where a source object lives in the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MemoEntry {
    pub target: ObjectRef,
    /// False while the slot is reserved but its body not yet written
    pub copied: bool,
}

/// Per-source state kept for the lifetime of one merge.
#[derive(Debug)]
pub(crate) struct CopyContext {
    memo: HashMap<RefKey, MemoEntry>,
    /// Source objects rewritten before copying, and synthetic objects
    overlay: HashMap<RefKey, Object>,
    next_synthetic: u32,
    pub fields: FieldRegistry,
    /// Set once the source's AcroForm defaults were merged into the target
    pub form_merged: bool,
}

impl CopyContext {
    pub fn new(source: &dyn ObjectSource) -> Self {
        Self {
            memo: HashMap::new(),
            overlay: HashMap::new(),
            next_synthetic: source.max_object_number().saturating_add(1),
            fields: FieldRegistry::default(),
            form_merged: false,
        }
    }

    /// Resolve `key`, preferring a rewritten copy over the source's own object.
    pub fn resolve(&self, source: &dyn ObjectSource, key: RefKey) -> Result<Option<Object>> {
        match self.overlay.get(&key) {
            Some(object) => Ok(Some(object.clone())),
            None => source.resolve(key),
        }
    }

    /// Replace the source object `key` for every later copy.
    pub fn rewrite(&mut self, key: RefKey, object: Object) {
        self.overlay.insert(key, object);
    }

    /// Add an object that does not exist in the source, returning its source-side key.
    ///
    /// Generation 65535 never names a live object, so the key cannot clash
    /// with one the source resolves.
    pub fn synthesize(&mut self, object: Object) -> RefKey {
        let key = ObjectRef::new(self.next_synthetic, u16::MAX);
        self.next_synthetic += 1;
        self.overlay.insert(key, object);
        key
    }

    pub fn memo(&self, key: RefKey) -> Option<MemoEntry> {
        self.memo.get(&key).copied()
    }

    /// Target reference of a source object whose body has been copied.
    pub fn copied_target(&self, key: RefKey) -> Option<ObjectRef> {
        self.memo(key).filter(|e| e.copied).map(|e| e.target)
    }
}

/// One traversal from a source document into the target.
pub(crate) struct Copier<'a> {
    target: &'a mut Document,
    source: &'a dyn ObjectSource,
    ctx: &'a mut CopyContext,
    warnings: &'a mut Vec<CopyWarning>,
    /// Page tree root every copied page is hung under
    pages_root: ObjectRef,
    max_depth: u32,
    depth: u32,
    /// Indirect object currently being copied
    owner: Option<ObjectRef>,
}

impl<'a> Copier<'a> {
    pub fn new(
        target: &'a mut Document,
        source: &'a dyn ObjectSource,
        ctx: &'a mut CopyContext,
        warnings: &'a mut Vec<CopyWarning>,
        pages_root: ObjectRef,
        max_depth: u32,
    ) -> Self {
        Self {
            target,
            source,
            ctx,
            warnings,
            pages_root,
            max_depth,
            depth: 0,
            owner: None,
        }
    }

    /// Copy a page dictionary reached through the page tree.
    ///
    /// Unlike [`copy_indirect`](Self::copy_indirect) this never defers. A slot
    /// reserved earlier through a link is populated in place; a page that was
    /// already copied gets a fresh slot so it appears twice.
    pub fn copy_page(&mut self, page_ref: RefKey, page: &Dictionary) -> Result<ObjectRef> {
        let existing = self.ctx.memo(page_ref);
        let target_ref = match existing {
            Some(entry) if !entry.copied => entry.target,
            Some(entry) => {
                log::debug!("Page {} imported again (first copy at {})", page_ref, entry.target);
                self.target.reserve()
            },
            None => self.target.reserve(),
        };
        let first_copy = !existing.is_some_and(|e| e.copied);
        if first_copy {
            self.mark(page_ref, target_ref, true);
        }

        let saved = self.owner.replace(page_ref);
        let copied = self.copy_dictionary(page);
        self.owner = saved;
        if copied.is_err() && first_copy {
            self.mark(page_ref, target_ref, false);
        }
        self.target.set_object(target_ref, copied?);
        log::debug!("Copied page {} -> {}", page_ref, target_ref);
        Ok(target_ref)
    }

    /// Copy any value, renumbering references it contains.
    pub fn copy_value(&mut self, value: &Object) -> Result<Object> {
        if self.depth >= self.max_depth {
            return Err(Error::RecursionLimitExceeded(self.max_depth));
        }
        self.depth += 1;
        let result = self.copy_value_inner(value);
        self.depth -= 1;
        result
    }

    fn copy_value_inner(&mut self, value: &Object) -> Result<Object> {
        match value {
            Object::Null
            | Object::Boolean(_)
            | Object::Integer(_)
            | Object::Real(_)
            | Object::Name(_) => Ok(value.clone()),
            Object::String(s) => Ok(Object::String(s.decrypted(self.source.decryptor()))),
            Object::Array(items) => items
                .iter()
                .map(|item| self.copy_value(item))
                .collect::<Result<Vec<_>>>()
                .map(Object::Array),
            Object::Dictionary(dict) => self.copy_dictionary(dict).map(Object::Dictionary),
            Object::Stream(stream) => self.copy_stream(stream).map(Object::Stream),
            Object::Reference(r) => self.copy_indirect(*r),
            Object::Literal(bytes) => Ok(match &bytes[..] {
                b"true" => Object::Boolean(true),
                b"false" => Object::Boolean(false),
                _ => Object::Literal(bytes.clone()),
            }),
            Object::Unknown(kind) => {
                self.warn(CopyWarning::UnsupportedObject {
                    owner: self.owner,
                    kind: kind.clone(),
                });
                Ok(Object::Null)
            },
        }
    }

    /// Copy every entry. Page dictionaries are re-parented under the target
    /// root and lose their /B array.
    pub fn copy_dictionary(&mut self, dict: &Dictionary) -> Result<Dictionary> {
        let is_page = dict.type_name() == Some("Page");
        let mut out = Dictionary::new();
        for (key, value) in dict {
            if is_page {
                match key.as_str() {
                    "Parent" => {
                        out.put("Parent", self.pages_root);
                        continue;
                    },
                    "B" => continue,
                    _ => {},
                }
            }
            out.put(key.clone(), self.copy_value(value)?);
        }
        Ok(out)
    }

    fn copy_stream(&mut self, stream: &Stream) -> Result<Stream> {
        let dict = self.copy_dictionary(&stream.dict)?;
        let data = stream.data(self.source.decryptor()).clone();
        Ok(Stream {
            dict,
            payload: Payload::new(data),
            filtered: stream.filtered,
        })
    }

    /// Copy the object behind `key`, or return its memoized target reference.
    ///
    /// A dangling reference becomes `null`.
    pub fn copy_indirect(&mut self, key: RefKey) -> Result<Object> {
        let existing = self.ctx.memo(key);
        if let Some(entry) = existing.filter(|e| e.copied) {
            return Ok(Object::Reference(entry.target));
        }

        let Some(object) = self.ctx.resolve(self.source, key)? else {
            self.warn(CopyWarning::DanglingReference(key));
            return Ok(Object::Null);
        };

        let target_ref = match existing {
            Some(entry) => entry.target,
            None => {
                let reserved = self.target.reserve();
                self.mark(key, reserved, false);
                reserved
            },
        };

        if self.should_defer(&object) {
            log::debug!("Deferring page {} until its page tree node is copied", key);
            return Ok(Object::Reference(target_ref));
        }

        self.mark(key, target_ref, true);
        let saved = self.owner.replace(key);
        let copied = self.copy_value(&object);
        self.owner = saved;
        if copied.is_err() {
            // Keep the slot for references already handed out; a later copy fills it
            self.mark(key, target_ref, false);
        }
        self.target.set_object(target_ref, copied?);
        Ok(Object::Reference(target_ref))
    }

    /// A page whose indirect /Parent has not been copied yet is left reserved.
    fn should_defer(&self, object: &Object) -> bool {
        let Some(dict) = object.as_dict() else {
            return false;
        };
        if object.as_stream().is_some() || dict.type_name() != Some("Page") {
            return false;
        }
        match dict.get_reference("Parent") {
            Some(parent) => self.ctx.copied_target(parent).is_none(),
            None => false,
        }
    }

    fn mark(&mut self, key: RefKey, target: ObjectRef, copied: bool) {
        self.ctx.memo.insert(key, MemoEntry { target, copied });
    }

    fn warn(&mut self, warning: CopyWarning) {
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }
}
