//! Relocation of related parts for markup emitted from a non-base input.
//!
//! An image or hyperlink taken from a revised document refers to its part
//! through a relationship id that only exists in that document's package.
//! The target is copied into the output package (once per distinct
//! content), related from the output part, and the id rewritten.

use super::document::WmlDocument;
use crate::error::{CompareError, Result};
use crate::hash::sha256_hash_bytes;
use crate::package::{relative_target, resolve_target, Relationship, Relationships, TargetMode};
use crate::xml::namespaces::R;
use crate::xml::XmlFragment;
use log::debug;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
pub(crate) struct Relocator {
    /// sha256 of copied content -> output path
    copied: HashMap<String, String>,
}

impl Relocator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Rewrites every relationship attribute of `fragment` so it resolves
    /// from `target_part` of `output`.
    pub(crate) fn relocate(
        &mut self,
        output: &mut WmlDocument,
        fragment: &mut XmlFragment,
        source: &WmlDocument,
        source_part: &str,
        target_part: &str,
    ) -> Result<()> {
        let mut ids = Vec::new();
        fragment.walk(&mut |el| {
            for attr in el.node.attributes().unwrap_or_default() {
                if attr.name.in_namespace(R::NS) && !ids.contains(&attr.value) {
                    ids.push(attr.value.clone());
                }
            }
        });
        if ids.is_empty() {
            return Ok(());
        }

        let source_rels = source.package().relationships(source_part)?;
        let mut output_rels = output.package().relationships(target_part)?;
        let mut mapping: BTreeMap<String, String> = BTreeMap::new();
        for id in ids {
            let rel = source_rels.get(&id).ok_or_else(|| {
                CompareError::projection(
                    format!("r:{}", id),
                    source_part,
                    "relationship id does not resolve",
                )
            })?;
            let new_id = self.link(output, &mut output_rels, rel, source, source_part, target_part)?;
            mapping.insert(id, new_id);
        }
        output.package_mut().put_relationships(target_part, &output_rels)?;

        fragment.walk_mut(&mut |el| {
            if let Some(attrs) = el.node.attributes_mut() {
                for attr in attrs.iter_mut().filter(|a| a.name.in_namespace(R::NS)) {
                    if let Some(new_id) = mapping.get(&attr.value) {
                        attr.value = new_id.clone();
                    }
                }
            }
        });
        Ok(())
    }

    /// Id of a relationship in `rels` equivalent to `rel`, added if missing.
    fn link(
        &mut self,
        output: &mut WmlDocument,
        rels: &mut Relationships,
        rel: &Relationship,
        source: &WmlDocument,
        source_part: &str,
        target_part: &str,
    ) -> Result<String> {
        if rel.is_external() {
            let existing = rels
                .iter()
                .find(|r| r.is_external() && r.rel_type == rel.rel_type && r.target == rel.target);
            return Ok(match existing {
                Some(r) => r.id.clone(),
                None => rels.add(&rel.rel_type, &rel.target, TargetMode::External),
            });
        }

        let source_path = resolve_target(source_part, &rel.target);
        let path = self.copy_part(output, source, &source_path, source_part)?;
        let existing = rels.iter().find(|r| {
            !r.is_external() && r.rel_type == rel.rel_type && resolve_target(target_part, &r.target) == path
        });
        Ok(match existing {
            Some(r) => r.id.clone(),
            None => rels.add(&rel.rel_type, &relative_target(target_part, &path), TargetMode::Internal),
        })
    }

    /// Copies `path` of `source` into `output`, with its own relationships,
    /// and returns its path in the output.
    fn copy_part(
        &mut self,
        output: &mut WmlDocument,
        source: &WmlDocument,
        path: &str,
        referrer: &str,
    ) -> Result<String> {
        let bytes = source
            .package()
            .get_part(path)
            .ok_or_else(|| CompareError::projection(path, referrer, "relationship target is missing"))?
            .to_vec();
        let hash = sha256_hash_bytes(&bytes);
        if let Some(done) = self.copied.get(&hash) {
            return Ok(done.clone());
        }

        let out_path = free_path(output, path, &bytes);
        self.copied.insert(hash, out_path.clone());
        if output.package().get_part(&out_path).is_some() {
            return Ok(out_path);
        }
        debug!("copying {} to {}", path, out_path);
        output.package_mut().set_part(&out_path, bytes);
        self.register_content_type(output, source, path, &out_path)?;

        let part_rels = source.package().relationships(path)?;
        if part_rels.is_empty() {
            return Ok(out_path);
        }
        let mut copied_rels = Relationships::default();
        for rel in part_rels.iter() {
            if rel.is_external() {
                copied_rels.push(rel.clone());
                continue;
            }
            let child = self.copy_part(output, source, &resolve_target(path, &rel.target), path)?;
            copied_rels.push(Relationship::new(&rel.id, &rel.rel_type, &relative_target(&out_path, &child)));
        }
        output.package_mut().put_relationships(&out_path, &copied_rels)?;
        Ok(out_path)
    }

    fn register_content_type(
        &self,
        output: &mut WmlDocument,
        source: &WmlDocument,
        source_path: &str,
        out_path: &str,
    ) -> Result<()> {
        let source_types = source.package().content_types()?;
        let Some(content_type) = source_types.get_content_type(source_path) else {
            return Ok(());
        };
        let mut types = output.package().content_types()?;
        if types.get_content_type(out_path) == Some(content_type) {
            return Ok(());
        }
        let extension = out_path.rsplit_once('.').map(|(_, e)| e).unwrap_or_default();
        if !extension.is_empty() && !types.has_default(extension) {
            types.add_default(extension, content_type);
        } else {
            types.set_content_type(out_path, content_type);
        }
        output.package_mut().put_content_types(&types)
    }
}

/// `path` itself when free or already holding `bytes`, else the first
/// `stem_n.ext` that is.
fn free_path(output: &WmlDocument, path: &str, bytes: &[u8]) -> String {
    let usable = |candidate: &str| match output.package().get_part(candidate) {
        None => true,
        Some(existing) => existing == bytes,
    };
    if usable(path) {
        return path.to_string();
    }
    let (stem, ext) = match path.rsplit_once('.') {
        Some((stem, ext)) if !stem.ends_with('/') => (stem, format!(".{}", ext)),
        _ => (path, String::new()),
    };
    (1..)
        .map(|n| format!("{}_{}{}", stem, n, ext))
        .find(|candidate| usable(candidate))
        .unwrap_or_else(|| path.to_string())
}
