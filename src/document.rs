//! Documents as indirect object tables.
//!
//! [`ObjectSource`] is the seam to the tokenizer: anything that can resolve a
//! [`RefKey`] to a parsed object can act as a merge source. [`Document`] is the
//! in-memory implementation used for the merge target and for sources that
//! were parsed up front.
//!
//! Objects are only ever appended. A slot can be reserved before its body is
//! known so other objects can already point at it.

use crate::dictionary::Dictionary;
use crate::encryption::Decryptor;
use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef, RefKey};
use std::collections::{BTreeMap, HashSet};

/// Read access to a document's objects.
pub trait ObjectSource {
    /// Parse the object stored under `key`. `Ok(None)` if there is no such object.
    ///
    /// Strings and streams of an encrypted document come back tagged with
    /// their owner so they can be decrypted on access.
    fn resolve(&self, key: RefKey) -> Result<Option<Object>>;

    /// The trailer dictionary.
    fn trailer(&self) -> &Dictionary;

    /// Decryption state, if the document is encrypted and unlocked.
    fn decryptor(&self) -> Option<&Decryptor> {
        None
    }

    /// Highest object number the document may use.
    fn max_object_number(&self) -> u32 {
        self.trailer()
            .get("Size")
            .and_then(Object::as_integer)
            .map(|size| size.saturating_sub(1).clamp(0, u32::MAX as i64) as u32)
            .unwrap_or(0)
    }

    /// The document catalog.
    fn catalog(&self) -> Result<Dictionary> {
        let root_ref = self
            .trailer()
            .get_reference("Root")
            .ok_or_else(|| Error::InvalidPdf("Trailer missing /Root entry".to_string()))?;
        match self.resolve(root_ref)? {
            Some(Object::Dictionary(dict)) => Ok(dict),
            Some(other) => Err(Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: other.type_name().to_string(),
            }),
            None => Err(Error::ObjectNotFound(root_ref)),
        }
    }

    /// References of all page objects in document order.
    ///
    /// Kids that are not references, or that were already visited, are skipped.
    fn page_refs(&self) -> Result<Vec<ObjectRef>> {
        let catalog = self.catalog()?;
        let pages_ref = catalog
            .get_reference("Pages")
            .ok_or_else(|| Error::InvalidPdf("Catalog missing /Pages reference".to_string()))?;

        let mut pages = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![pages_ref];
        while let Some(node_ref) = stack.pop() {
            if !visited.insert(node_ref) {
                log::warn!("Page tree revisits {}, skipping", node_ref);
                continue;
            }
            let Some(node) = self.resolve(node_ref)? else {
                log::warn!("Page tree node {} is missing", node_ref);
                continue;
            };
            let Some(dict) = node.as_dict() else {
                continue;
            };
            match dict.get("Kids").and_then(Object::as_array) {
                Some(kids) if dict.type_name() != Some("Page") => {
                    // Reverse so the stack pops kids in document order
                    for kid in kids.iter().rev() {
                        if let Some(kid_ref) = kid.as_reference() {
                            stack.push(kid_ref);
                        }
                    }
                },
                _ => pages.push(node_ref),
            }
        }
        Ok(pages)
    }
}

/// One slot of the object table.
#[derive(Debug, Clone)]
struct Entry {
    gen: u16,
    /// `None` while reserved but not yet populated
    object: Option<Object>,
}

/// An in-memory PDF document.
#[derive(Debug, Clone, Default)]
pub struct Document {
    objects: BTreeMap<u32, Entry>,
    trailer: Dictionary,
    next_id: u32,
    decryptor: Option<Decryptor>,
}

impl Document {
    /// Create an empty document with no catalog.
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            trailer: Dictionary::new(),
            next_id: 1,
            decryptor: None,
        }
    }

    /// Create a document with a catalog and an empty page tree root.
    pub fn with_page_tree() -> Self {
        let mut doc = Self::new();
        let pages = doc.add_object(
            Dictionary::typed("Pages")
                .with("Kids", Object::Array(Vec::new()))
                .with("Count", 0),
        );
        let catalog = doc.add_object(Dictionary::typed("Catalog").with("Pages", pages));
        doc.trailer.put("Root", catalog);
        doc
    }

    /// Allocate a new slot without a body.
    pub fn reserve(&mut self) -> ObjectRef {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        self.objects.insert(id, Entry { gen: 0, object: None });
        ObjectRef::new(id, 0)
    }

    /// Store `object` under `r`, populating a reserved slot or creating a new one.
    pub fn set_object(&mut self, r: ObjectRef, object: impl Into<Object>) {
        self.objects.insert(
            r.id,
            Entry {
                gen: r.gen,
                object: Some(object.into()),
            },
        );
        if r.id >= self.next_id {
            self.next_id = r.id + 1;
        }
    }

    /// Append a new object and return its reference.
    pub fn add_object(&mut self, object: impl Into<Object>) -> ObjectRef {
        let r = self.reserve();
        self.set_object(r, object);
        r
    }

    /// Look up a populated object.
    pub fn get(&self, r: ObjectRef) -> Option<&Object> {
        self.objects
            .get(&r.id)
            .filter(|e| e.gen == r.gen)
            .and_then(|e| e.object.as_ref())
    }

    /// Look up a populated object mutably.
    pub fn get_mut(&mut self, r: ObjectRef) -> Option<&mut Object> {
        self.objects
            .get_mut(&r.id)
            .filter(|e| e.gen == r.gen)
            .and_then(|e| e.object.as_mut())
    }

    /// Look up a populated dictionary (or stream dictionary).
    pub fn get_dict(&self, r: ObjectRef) -> Option<&Dictionary> {
        self.get(r).and_then(Object::as_dict)
    }

    /// Mutable variant of [`get_dict`](Self::get_dict).
    pub fn get_dict_mut(&mut self, r: ObjectRef) -> Option<&mut Dictionary> {
        self.get_mut(r).and_then(Object::as_dict_mut)
    }

    /// True if `r` names an allocated slot, populated or not.
    pub fn contains(&self, r: ObjectRef) -> bool {
        self.objects.get(&r.id).is_some_and(|e| e.gen == r.gen)
    }

    /// True if `r` names a slot whose body has been written.
    pub fn is_populated(&self, r: ObjectRef) -> bool {
        self.get(r).is_some()
    }

    /// All slots in ascending object number; `None` marks a reserved slot.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectRef, Option<&Object>)> {
        self.objects
            .iter()
            .map(|(&id, e)| (ObjectRef::new(id, e.gen), e.object.as_ref()))
    }

    /// Number of allocated slots.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True if no slot is allocated.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Mutable trailer access.
    pub fn trailer_mut(&mut self) -> &mut Dictionary {
        &mut self.trailer
    }

    /// Install decryption state for an encrypted source.
    pub fn set_decryptor(&mut self, decryptor: Decryptor) {
        self.decryptor = Some(decryptor);
    }

    /// Reference of the catalog.
    pub fn catalog_ref(&self) -> Option<ObjectRef> {
        self.trailer.get_reference("Root")
    }

    /// Reference of the page tree root.
    pub fn pages_ref(&self) -> Option<ObjectRef> {
        self.catalog_ref()
            .and_then(|c| self.get_dict(c))
            .and_then(|c| c.get_reference("Pages"))
    }

    /// Append an existing page object under the page tree root.
    pub fn append_page(&mut self, page: ObjectRef) -> Result<()> {
        let pages_ref = self
            .pages_ref()
            .ok_or_else(|| Error::InvalidPdf("Document has no page tree".to_string()))?;
        if let Some(page_dict) = self.get_dict_mut(page) {
            page_dict.put("Parent", pages_ref);
        }
        let root = self
            .get_dict_mut(pages_ref)
            .ok_or_else(|| Error::ObjectNotFound(pages_ref))?;
        match root.get_mut("Kids") {
            Some(Object::Array(kids)) => kids.push(Object::Reference(page)),
            _ => {
                root.put("Kids", Object::Array(vec![Object::Reference(page)]));
            },
        }
        let count = root.get("Count").and_then(Object::as_integer).unwrap_or(0);
        root.put("Count", count + 1);
        Ok(())
    }

    /// Add a page dictionary under the page tree root.
    pub fn add_page(&mut self, page: Dictionary) -> Result<ObjectRef> {
        let mut page = page;
        if page.type_name().is_none() {
            page.put("Type", Object::name("Page"));
        }
        let r = self.add_object(page);
        self.append_page(r)?;
        Ok(r)
    }
}

impl ObjectSource for Document {
    fn resolve(&self, key: RefKey) -> Result<Option<Object>> {
        let Some(object) = self.get(key) else {
            return Ok(None);
        };
        let mut object = object.clone();
        if self.decryptor.is_some() && self.trailer.get_reference("Encrypt") != Some(key) {
            let is_xref = object.as_stream().and_then(|s| s.dict.type_name()) == Some("XRef");
            if !is_xref {
                object.tag_encrypted(key);
            }
        }
        Ok(Some(object))
    }

    fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    fn decryptor(&self) -> Option<&Decryptor> {
        self.decryptor.as_ref()
    }

    fn max_object_number(&self) -> u32 {
        let from_table = self.objects.keys().next_back().copied().unwrap_or(0);
        let from_size = self
            .trailer
            .get("Size")
            .and_then(Object::as_integer)
            .map(|size| size.saturating_sub(1).clamp(0, u32::MAX as i64) as u32)
            .unwrap_or(0);
        from_table.max(from_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::Algorithm;
    use crate::object::Stream;
    use crate::pdf_string::PdfString;

    #[test]
    fn test_reserve_then_populate() {
        let mut doc = Document::new();
        let r = doc.reserve();
        assert_eq!(r, ObjectRef::new(1, 0));
        assert!(doc.contains(r));
        assert!(!doc.is_populated(r));
        assert_eq!(doc.resolve(r).unwrap(), None);

        doc.set_object(r, Object::Integer(7));
        assert!(doc.is_populated(r));
        assert_eq!(doc.get(r), Some(&Object::Integer(7)));

        let next = doc.add_object(Object::Null);
        assert_eq!(next.id, 2);
    }

    #[test]
    fn test_generation_must_match() {
        let mut doc = Document::new();
        doc.set_object(ObjectRef::new(4, 2), Object::Boolean(true));
        assert!(doc.get(ObjectRef::new(4, 0)).is_none());
        assert!(doc.get(ObjectRef::new(4, 2)).is_some());
        assert_eq!(doc.add_object(Object::Null).id, 5);
    }

    #[test]
    fn test_page_tree_and_pages() {
        let mut doc = Document::with_page_tree();
        let p1 = doc.add_page(Dictionary::new()).unwrap();
        let p2 = doc.add_page(Dictionary::typed("Page")).unwrap();

        assert_eq!(doc.page_refs().unwrap(), vec![p1, p2]);
        let root = doc.get_dict(doc.pages_ref().unwrap()).unwrap();
        assert_eq!(root.get("Count"), Some(&Object::Integer(2)));
        assert_eq!(
            doc.get_dict(p1).unwrap().get_reference("Parent"),
            doc.pages_ref()
        );
    }

    #[test]
    fn test_nested_page_tree_order() {
        let mut doc = Document::new();
        let root = doc.reserve();
        let mid = doc.reserve();
        let a = doc.add_object(Dictionary::typed("Page").with("Parent", mid));
        let b = doc.add_object(Dictionary::typed("Page").with("Parent", mid));
        let c = doc.add_object(Dictionary::typed("Page").with("Parent", root));
        doc.set_object(
            mid,
            Dictionary::typed("Pages")
                .with("Parent", root)
                .with("Kids", vec![Object::Reference(a), Object::Reference(b)])
                .with("Count", 2),
        );
        doc.set_object(
            root,
            Dictionary::typed("Pages")
                .with("Kids", vec![Object::Reference(mid), Object::Reference(c)])
                .with("Count", 3),
        );
        let catalog = doc.add_object(Dictionary::typed("Catalog").with("Pages", root));
        doc.trailer_mut().put("Root", catalog);

        assert_eq!(doc.page_refs().unwrap(), vec![a, b, c]);
    }

    #[test]
    fn test_page_tree_cycle_is_skipped() {
        let mut doc = Document::new();
        let root = doc.reserve();
        let page = doc.add_object(Dictionary::typed("Page").with("Parent", root));
        doc.set_object(
            root,
            Dictionary::typed("Pages")
                .with("Kids", vec![Object::Reference(page), Object::Reference(root)])
                .with("Count", 1),
        );
        let catalog = doc.add_object(Dictionary::typed("Catalog").with("Pages", root));
        doc.trailer_mut().put("Root", catalog);

        assert_eq!(doc.page_refs().unwrap(), vec![page]);
    }

    #[test]
    fn test_missing_root() {
        let doc = Document::new();
        assert!(matches!(doc.page_refs(), Err(Error::InvalidPdf(_))));
    }

    #[test]
    fn test_resolve_tags_strings_when_encrypted() {
        let mut doc = Document::with_page_tree();
        let encrypt = doc.add_object(Dictionary::new().with("O", PdfString::new(b"o".to_vec())));
        doc.trailer_mut().put("Encrypt", encrypt);
        let info = doc.add_object(Dictionary::new().with("Title", PdfString::new(b"t".to_vec())));
        let xref = doc.add_object(Stream::new(Dictionary::typed("XRef"), b"x".to_vec()));
        doc.set_decryptor(Decryptor::new(Algorithm::Rc4_128, vec![0; 16]));

        let obj = doc.resolve(info).unwrap().unwrap();
        let title = obj.as_dict().unwrap().get("Title").unwrap().as_string().unwrap();
        assert_eq!(title.payload().owner(), Some(info));

        let obj = doc.resolve(encrypt).unwrap().unwrap();
        let o = obj.as_dict().unwrap().get("O").unwrap().as_string().unwrap();
        assert!(o.payload().owner().is_none());

        let obj = doc.resolve(xref).unwrap().unwrap();
        assert!(!obj.as_stream().unwrap().payload.needs_decryption());
    }

    #[test]
    fn test_max_object_number() {
        let mut doc = Document::with_page_tree();
        assert_eq!(doc.max_object_number(), 2);
        doc.trailer_mut().put("Size", 40);
        assert_eq!(doc.max_object_number(), 39);
    }
}
