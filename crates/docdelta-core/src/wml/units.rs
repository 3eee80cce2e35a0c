//! Hash/grouping layer.
//!
//! Atoms are grouped into words, and words into paragraphs, cells, rows,
//! tables, text boxes and notes, so the aligner can match whole blocks by
//! hash before it ever looks at individual words. Hashes are content-only:
//! two blocks with the same text in different documents hash the same.

use super::atom::{normalize_text, Ancestor, ComparisonAtom};
use super::content::ContainerKind;
use super::settings::WmlComparerSettings;
use crate::hash::sha1_hash_parts;
use crate::util::{group_adjacent, Hashable};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    Paragraph,
    Table,
    Row,
    Cell,
    TextBox,
    Note,
}

impl GroupKind {
    pub fn of(kind: ContainerKind) -> Option<Self> {
        match kind {
            ContainerKind::Paragraph => Some(GroupKind::Paragraph),
            ContainerKind::Table => Some(GroupKind::Table),
            ContainerKind::Row => Some(GroupKind::Row),
            ContainerKind::Cell => Some(GroupKind::Cell),
            ContainerKind::TextBox => Some(GroupKind::TextBox),
            ContainerKind::Note(_) => Some(GroupKind::Note),
            _ => None,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            GroupKind::Paragraph => "P",
            GroupKind::Table => "T",
            GroupKind::Row => "R",
            GroupKind::Cell => "C",
            GroupKind::TextBox => "X",
            GroupKind::Note => "N",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordKind {
    /// One or more adjacent word-character text atoms.
    Word,
    Separator,
    ParagraphMark,
    /// Any non-text object.
    Object,
}

#[derive(Debug, Clone)]
pub struct WordUnit {
    /// Indices into the side's atom list.
    pub atoms: Vec<usize>,
    pub kind: WordKind,
    pub hash: String,
}

#[derive(Debug, Clone)]
pub struct GroupUnit {
    pub kind: GroupKind,
    pub ancestor: Arc<Ancestor>,
    pub children: Vec<ComparisonUnit>,
    pub hash: String,
    pub atom_count: usize,
}

impl GroupUnit {
    pub fn unid(&self) -> &str {
        &self.ancestor.unid
    }

    /// Number of `w:gridCol` entries of a table.
    pub fn grid_columns(&self) -> usize {
        self.ancestor
            .shell
            .child(crate::xml::namespaces::W::NS, "tblGrid")
            .map_or(0, |grid| grid.element_children().count())
    }

    pub fn child_groups(&self) -> impl Iterator<Item = &GroupUnit> {
        self.children.iter().filter_map(ComparisonUnit::as_group)
    }
}

#[derive(Debug, Clone)]
pub enum ComparisonUnit {
    Word(WordUnit),
    Group(GroupUnit),
}

impl ComparisonUnit {
    pub fn as_group(&self) -> Option<&GroupUnit> {
        match self {
            ComparisonUnit::Group(g) => Some(g),
            ComparisonUnit::Word(_) => None,
        }
    }

    pub fn group_kind(&self) -> Option<GroupKind> {
        self.as_group().map(|g| g.kind)
    }

    pub fn word_kind(&self) -> Option<WordKind> {
        match self {
            ComparisonUnit::Word(w) => Some(w.kind),
            ComparisonUnit::Group(_) => None,
        }
    }

    pub fn is_paragraph_mark(&self) -> bool {
        self.word_kind() == Some(WordKind::ParagraphMark)
    }

    pub fn is_separator(&self) -> bool {
        self.word_kind() == Some(WordKind::Separator)
    }

    pub fn atom_count(&self) -> usize {
        match self {
            ComparisonUnit::Word(w) => w.atoms.len(),
            ComparisonUnit::Group(g) => g.atom_count,
        }
    }

    /// Atom indices in document order.
    pub fn atoms(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.atom_count());
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms(&self, out: &mut Vec<usize>) {
        match self {
            ComparisonUnit::Word(w) => out.extend_from_slice(&w.atoms),
            ComparisonUnit::Group(g) => g.children.iter().for_each(|c| c.collect_atoms(out)),
        }
    }
}

impl Hashable for ComparisonUnit {
    fn hash(&self) -> &str {
        match self {
            ComparisonUnit::Word(w) => &w.hash,
            ComparisonUnit::Group(g) => &g.hash,
        }
    }
}

/// Builds the unit tree over a whole atom list.
pub fn build_units(atoms: &[ComparisonAtom], settings: &WmlComparerSettings) -> Vec<ComparisonUnit> {
    let indices: Vec<usize> = (0..atoms.len()).collect();
    build_level(atoms, &indices, 0, settings)
}

/// Grouping path of an atom: its grouping ancestors, outermost first.
fn group_path(atom: &ComparisonAtom) -> Vec<&Arc<Ancestor>> {
    atom.ancestors
        .iter()
        .filter(|a| GroupKind::of(a.kind).is_some())
        .collect()
}

fn build_level(
    atoms: &[ComparisonAtom],
    indices: &[usize],
    level: usize,
    settings: &WmlComparerSettings,
) -> Vec<ComparisonUnit> {
    let keyed: Vec<(Option<Arc<Ancestor>>, usize)> = indices
        .iter()
        .map(|&i| (group_path(&atoms[i]).get(level).map(|a| Arc::clone(*a)), i))
        .collect();

    let runs = group_adjacent(keyed.into_iter(), |(ancestor, _)| {
        ancestor.as_ref().map(|a| a.unid.clone())
    });

    let mut units = Vec::new();
    for run in runs {
        let members: Vec<usize> = run.iter().map(|(_, i)| *i).collect();
        match &run[0].0 {
            Some(ancestor) => {
                let children = build_level(atoms, &members, level + 1, settings);
                units.push(ComparisonUnit::Group(group(ancestor, children)));
            }
            None => units.extend(words(atoms, &members, settings)),
        }
    }
    units
}

fn group(ancestor: &Arc<Ancestor>, children: Vec<ComparisonUnit>) -> GroupUnit {
    let kind = GroupKind::of(ancestor.kind).unwrap_or(GroupKind::Paragraph);
    let hash = sha1_hash_parts(std::iter::once(kind.tag()).chain(children.iter().map(|c| c.hash())));
    let atom_count = children.iter().map(ComparisonUnit::atom_count).sum();
    GroupUnit {
        kind,
        ancestor: Arc::clone(ancestor),
        children,
        hash,
        atom_count,
    }
}

/// Consecutive word-character text atoms form one word; every other atom
/// stands alone.
fn words(atoms: &[ComparisonAtom], members: &[usize], settings: &WmlComparerSettings) -> Vec<ComparisonUnit> {
    let mut units = Vec::new();
    let mut word: Vec<usize> = Vec::new();

    let flush = |word: &mut Vec<usize>, units: &mut Vec<ComparisonUnit>| {
        if word.is_empty() {
            return;
        }
        let text: String = word
            .iter()
            .filter_map(|&i| atoms[i].text())
            .collect();
        units.push(ComparisonUnit::Word(WordUnit {
            atoms: std::mem::take(word),
            kind: WordKind::Word,
            hash: sha1_hash_parts(["w", normalize_text(&text, settings).as_str()]),
        }));
    };

    for &i in members {
        let atom = &atoms[i];
        if atom.is_word_text(settings) {
            word.push(i);
            continue;
        }
        flush(&mut word, &mut units);
        let kind = if atom.is_paragraph_mark() {
            WordKind::ParagraphMark
        } else if atom.text().is_some() {
            WordKind::Separator
        } else {
            WordKind::Object
        };
        units.push(ComparisonUnit::Word(WordUnit {
            atoms: vec![i],
            kind,
            hash: atom.hash.clone(),
        }));
    }
    flush(&mut word, &mut units);
    units
}

/// Indented listing of a unit tree, for debug output.
pub fn describe_units(units: &[ComparisonUnit], atoms: &[ComparisonAtom]) -> String {
    let mut out = String::new();
    describe(units, atoms, 0, &mut out);
    out
}

fn describe(units: &[ComparisonUnit], atoms: &[ComparisonAtom], depth: usize, out: &mut String) {
    for unit in units {
        let indent = "  ".repeat(depth);
        match unit {
            ComparisonUnit::Group(g) => {
                let _ = writeln!(out, "{}{:?} {} ({} atoms) {}", indent, g.kind, &g.hash[..8], g.atom_count, g.unid());
                describe(&g.children, atoms, depth + 1, out);
            }
            ComparisonUnit::Word(w) => {
                let text: Vec<String> = w.atoms.iter().map(|&i| atoms[i].to_string()).collect();
                let _ = writeln!(out, "{}{:?} {} {}", indent, w.kind, &w.hash[..8], text.join(" "));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wml::decompose::decompose;
    use crate::wml::document::WmlDocument;
    use crate::xml::namespaces::W;

    fn units_of(body: &str) -> (Vec<ComparisonAtom>, Vec<ComparisonUnit>) {
        let settings = WmlComparerSettings::default();
        let doc = WmlDocument::from_main_xml(&format!(
            r#"<w:document xmlns:w="{}"><w:body>{}</w:body></w:document>"#,
            W::NS,
            body
        ))
        .unwrap();
        let snap = doc.snapshot().unwrap();
        let atoms = decompose(&snap, 0, &settings).unwrap();
        let units = build_units(&atoms, &settings);
        (atoms, units)
    }

    #[test]
    fn paragraphs_group_their_words() {
        let (_, units) = units_of(
            "<w:p><w:r><w:t>one two</w:t></w:r></w:p><w:p><w:r><w:t>three</w:t></w:r></w:p>",
        );
        assert_eq!(units.len(), 2);
        let first = units[0].as_group().unwrap();
        assert_eq!(first.kind, GroupKind::Paragraph);
        let kinds: Vec<_> = first.children.iter().map(|c| c.word_kind().unwrap()).collect();
        assert_eq!(
            kinds,
            vec![WordKind::Word, WordKind::Separator, WordKind::Word, WordKind::ParagraphMark]
        );
        assert_eq!(first.atom_count, 4);
    }

    #[test]
    fn a_word_split_by_formatting_hashes_like_the_whole_word() {
        let (_, split) = units_of(
            "<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Hel</w:t></w:r><w:r><w:t>lo</w:t></w:r></w:p>",
        );
        let (_, whole) = units_of("<w:p><w:r><w:t>Hello</w:t></w:r></w:p>");

        let split_word = &split[0].as_group().unwrap().children[0];
        let whole_word = &whole[0].as_group().unwrap().children[0];
        assert_eq!(split_word.atom_count(), 2);
        assert_eq!(whole_word.atom_count(), 1);
        assert_eq!(split_word.hash(), whole_word.hash());
        assert_eq!(split[0].hash(), whole[0].hash());
    }

    #[test]
    fn tables_nest_rows_cells_and_paragraphs() {
        let (atoms, units) = units_of(
            "<w:tbl><w:tblGrid><w:gridCol/><w:gridCol/></w:tblGrid><w:tr><w:tc><w:p><w:r><w:t>a</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>b</w:t></w:r></w:p></w:tc></w:tr></w:tbl>",
        );
        let table = units[0].as_group().unwrap();
        assert_eq!(table.kind, GroupKind::Table);
        assert_eq!(table.grid_columns(), 2);
        let row = table.child_groups().next().unwrap();
        assert_eq!(row.child_groups().count(), 2);
        assert_eq!(units[0].atoms(), (0..atoms.len()).collect::<Vec<_>>());
    }

    #[test]
    fn hashes_are_content_only() {
        let (_, a) = units_of("<w:p><w:pPr><w:jc w:val=\"center\"/></w:pPr><w:r><w:t>same</w:t></w:r></w:p>");
        let (_, b) = units_of("<w:p><w:r><w:rPr><w:i/></w:rPr><w:t>same</w:t></w:r></w:p>");
        assert_eq!(a[0].hash(), b[0].hash());
    }
}
