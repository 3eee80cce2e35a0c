//! Hierarchical alignment of two atom lists.
//!
//! Work items sit on an explicit stack. Each unresolved item is split
//! around a common prefix/suffix or the longest common run of units; when
//! nothing matches, single containers of the same kind are descended into
//! and everything else becomes a deletion followed by an insertion.

use super::atom::ComparisonAtom;
use super::script::{EditScript, ScriptEntry};
use super::settings::WmlComparerSettings;
use super::units::{build_units, ComparisonUnit, GroupKind, GroupUnit, WordKind};
use crate::error::{CompareError, Result};
use crate::util::{common_prefix_len, common_suffix_len, longest_common_run, MatchResult};
use log::{debug, trace};

/// Both atom lists in script order plus the script over them. Words that
/// match but were split differently on the two sides come back re-split at
/// the same boundaries.
#[derive(Debug, Clone)]
pub struct Alignment {
    pub left: Vec<ComparisonAtom>,
    pub right: Vec<ComparisonAtom>,
    pub script: EditScript,
}

type Seq<'u> = Vec<&'u ComparisonUnit>;

enum Correlated<'u> {
    Equal(Seq<'u>, Seq<'u>),
    Deleted(Seq<'u>),
    Inserted(Seq<'u>),
    Unknown(Seq<'u>, Seq<'u>),
}

pub fn align(
    left: &[ComparisonAtom],
    right: &[ComparisonAtom],
    settings: &WmlComparerSettings,
) -> Result<Alignment> {
    let left_units = build_units(left, settings);
    let right_units = build_units(right, settings);

    let mut out = Emitter {
        left,
        right,
        settings,
        alignment: Alignment {
            left: Vec::with_capacity(left.len()),
            right: Vec::with_capacity(right.len()),
            script: EditScript::default(),
        },
    };

    let mut stack = vec![Correlated::Unknown(
        left_units.iter().collect(),
        right_units.iter().collect(),
    )];
    while let Some(item) = stack.pop() {
        match item {
            Correlated::Equal(l, r) => {
                for (a, b) in l.into_iter().zip(r) {
                    out.equal_unit(a, b);
                }
            }
            Correlated::Deleted(l) => l.into_iter().for_each(|u| out.deleted(u)),
            Correlated::Inserted(r) => r.into_iter().for_each(|u| out.inserted(u)),
            Correlated::Unknown(l, r) => {
                let mut parts = resolve(l, r, settings, &mut out.alignment.script);
                parts.reverse();
                stack.extend(parts);
            }
        }
    }

    let alignment = out.alignment;
    alignment
        .script
        .check_invariants(alignment.left.len(), alignment.right.len())
        .map_err(|message| CompareError::projection("edit script", "document", message))?;

    let counts = alignment.script.counts();
    debug!(
        "aligned {} / {} atoms: {} equal, {} deleted, {} inserted",
        alignment.left.len(),
        alignment.right.len(),
        counts.equal,
        counts.deleted,
        counts.inserted
    );
    Ok(alignment)
}

/// Splits one unresolved item into resolved and smaller unresolved items,
/// in document order.
fn resolve<'u>(
    l: Seq<'u>,
    r: Seq<'u>,
    settings: &WmlComparerSettings,
    script: &mut EditScript,
) -> Vec<Correlated<'u>> {
    if l.is_empty() {
        return vec![Correlated::Inserted(r)];
    }
    if r.is_empty() {
        return vec![Correlated::Deleted(l)];
    }

    let word_only = is_word_only(&l) && is_word_only(&r);
    let longest = l.len().max(r.len());

    // Common prefix and suffix.
    let prefix = common_prefix_len(&l, &r);
    let mut suffix = common_suffix_len(&l[prefix..], &r[prefix..]);
    if suffix > 1 && l[l.len() - suffix].is_paragraph_mark() {
        suffix -= 1;
    }
    let covered = (prefix + suffix) as f64 / longest as f64;
    if prefix + suffix > 0 && (!word_only || covered >= settings.detail_threshold) {
        trace!("prefix {} suffix {} of {}x{}", prefix, suffix, l.len(), r.len());
        let mut l = l;
        let mut r = r;
        let l_suffix = l.split_off(l.len() - suffix);
        let r_suffix = r.split_off(r.len() - suffix);
        let l_mid = l.split_off(prefix);
        let r_mid = r.split_off(prefix);
        let mut parts = Vec::new();
        if prefix > 0 {
            parts.push(Correlated::Equal(l, r));
        }
        if !l_mid.is_empty() || !r_mid.is_empty() {
            parts.push(Correlated::Unknown(l_mid, r_mid));
        }
        if suffix > 0 {
            parts.push(Correlated::Equal(l_suffix, r_suffix));
        }
        return parts;
    }

    // Longest common run.
    let accept = |m: MatchResult| accept_run(m, &l, &r, word_only, longest, settings);
    if let Some(m) = longest_common_run(&l, &r, accept) {
        trace!("common run of {} at {}/{}", m.length, m.i1, m.i2);
        let mut l = l;
        let mut r = r;
        let l_after = l.split_off(m.i1 + m.length);
        let r_after = r.split_off(m.i2 + m.length);
        let l_run = l.split_off(m.i1);
        let r_run = r.split_off(m.i2);
        return vec![
            Correlated::Unknown(l, r),
            Correlated::Equal(l_run, r_run),
            Correlated::Unknown(l_after, r_after),
        ];
    }

    no_match(l, r, script)
}

fn accept_run(
    m: MatchResult,
    l: &[&ComparisonUnit],
    r: &[&ComparisonUnit],
    word_only: bool,
    longest: usize,
    settings: &WmlComparerSettings,
) -> Option<MatchResult> {
    let run = &l[m.i1..m.i1 + m.length];

    if run.iter().all(|u| u.is_separator()) && m.length <= 3 {
        return None;
    }

    let mut m = m;
    if run[0].is_paragraph_mark() {
        if m.length == 1 {
            let last_in_both = m.i1 + 1 == l.len() && m.i2 + 1 == r.len();
            return last_in_both.then_some(m);
        }
        m = MatchResult {
            i1: m.i1 + 1,
            i2: m.i2 + 1,
            length: m.length - 1,
        };
    }

    if word_only && (m.length as f64 / longest as f64) < settings.detail_threshold {
        return None;
    }

    let run = &l[m.i1..m.i1 + m.length];
    if run.iter().all(|u| u.group_kind() == Some(GroupKind::Paragraph)) {
        let atoms: usize = run.iter().map(|u| u.atom_count()).sum();
        let enough = match m.length {
            1 => atoms > 16,
            2 | 3 => atoms > 32,
            _ => true,
        };
        if !enough {
            return None;
        }
    }
    Some(m)
}

fn no_match<'u>(l: Seq<'u>, r: Seq<'u>, script: &mut EditScript) -> Vec<Correlated<'u>> {
    if let ([a], [b]) = (l.as_slice(), r.as_slice()) {
        if let (ComparisonUnit::Group(ga), ComparisonUnit::Group(gb)) = (*a, *b) {
            if ga.kind == gb.kind {
                if let Some(parts) = descend(ga, gb, script) {
                    return parts;
                }
            }
        }
    }

    let all_groups = |s: &Seq<'u>| s.iter().all(|u| u.as_group().is_some());
    let all_paragraphs = |s: &Seq<'u>| s.iter().all(|u| u.group_kind() == Some(GroupKind::Paragraph));

    if all_paragraphs(&l) && all_paragraphs(&r) {
        let flatten = |s: Seq<'u>| -> Seq<'u> {
            s.into_iter()
                .filter_map(ComparisonUnit::as_group)
                .flat_map(|g| g.children.iter())
                .collect()
        };
        return vec![Correlated::Unknown(flatten(l), flatten(r))];
    }

    if l.len() == r.len()
        && l.len() > 1
        && all_groups(&l)
        && all_groups(&r)
        && l.iter().zip(&r).all(|(a, b)| a.group_kind() == b.group_kind())
    {
        return l
            .into_iter()
            .zip(r)
            .map(|(a, b)| Correlated::Unknown(vec![a], vec![b]))
            .collect();
    }

    // Replace, keeping a shared trailing paragraph mark.
    let mut l = l;
    let mut r = r;
    let mut parts = Vec::new();
    let shared_mark = matches!(
        (l.last(), r.last()),
        (Some(a), Some(b)) if a.is_paragraph_mark() && b.is_paragraph_mark()
    );
    let marks = shared_mark.then(|| (l.split_off(l.len() - 1), r.split_off(r.len() - 1)));
    if !l.is_empty() {
        parts.push(Correlated::Deleted(l));
    }
    if !r.is_empty() {
        parts.push(Correlated::Inserted(r));
    }
    if let Some((a, b)) = marks {
        parts.push(Correlated::Equal(a, b));
    }
    parts
}

/// Compares two containers of the same kind by their content. `None` when
/// the containers are structurally incompatible and must be replaced.
fn descend<'u>(a: &'u GroupUnit, b: &'u GroupUnit, script: &mut EditScript) -> Option<Vec<Correlated<'u>>> {
    match a.kind {
        GroupKind::Table if a.grid_columns() != b.grid_columns() => None,
        GroupKind::Row => {
            let a_cells: Vec<&GroupUnit> = a.child_groups().collect();
            let b_cells: Vec<&GroupUnit> = b.child_groups().collect();
            if a_cells.len() != b_cells.len() || a_cells.len() != a.children.len() {
                return None;
            }
            pair(script, a, b);
            Some(
                a_cells
                    .into_iter()
                    .zip(b_cells)
                    .map(|(ca, cb)| {
                        pair(script, ca, cb);
                        Correlated::Unknown(ca.children.iter().collect(), cb.children.iter().collect())
                    })
                    .collect(),
            )
        }
        _ => {
            pair(script, a, b);
            Some(vec![Correlated::Unknown(
                a.children.iter().collect(),
                b.children.iter().collect(),
            )])
        }
    }
}

fn pair(script: &mut EditScript, a: &GroupUnit, b: &GroupUnit) {
    script
        .container_pairs
        .push((a.unid().to_string(), b.unid().to_string()));
}

fn is_word_only(s: &[&ComparisonUnit]) -> bool {
    s.iter().all(|u| u.word_kind().is_some())
}

/// Writes resolved units out as atoms and script entries.
struct Emitter<'a> {
    left: &'a [ComparisonAtom],
    right: &'a [ComparisonAtom],
    settings: &'a WmlComparerSettings,
    alignment: Alignment,
}

impl Emitter<'_> {
    fn push_left(&mut self, atom: ComparisonAtom) -> usize {
        self.alignment.left.push(atom);
        self.alignment.left.len() - 1
    }

    fn push_right(&mut self, atom: ComparisonAtom) -> usize {
        self.alignment.right.push(atom);
        self.alignment.right.len() - 1
    }

    fn entry(&mut self, entry: ScriptEntry) {
        self.alignment.script.entries.push(entry);
    }

    fn deleted(&mut self, unit: &ComparisonUnit) {
        for i in unit.atoms() {
            let left = self.push_left(self.left[i].clone());
            self.entry(ScriptEntry::Deleted { left });
        }
    }

    fn inserted(&mut self, unit: &ComparisonUnit) {
        for i in unit.atoms() {
            let right = self.push_right(self.right[i].clone());
            self.entry(ScriptEntry::Inserted { right });
        }
    }

    fn equal_unit(&mut self, a: &ComparisonUnit, b: &ComparisonUnit) {
        match (a, b) {
            (ComparisonUnit::Group(ga), ComparisonUnit::Group(gb)) => {
                pair(&mut self.alignment.script, ga, gb);
                for (ca, cb) in ga.children.iter().zip(&gb.children) {
                    self.equal_unit(ca, cb);
                }
            }
            (ComparisonUnit::Word(wa), ComparisonUnit::Word(wb)) => {
                let same_split = wa.atoms.len() == wb.atoms.len()
                    && wa
                        .atoms
                        .iter()
                        .zip(&wb.atoms)
                        .all(|(&i, &j)| self.left[i].hash == self.right[j].hash);
                if same_split {
                    for (&i, &j) in wa.atoms.iter().zip(&wb.atoms) {
                        self.equal_atoms(self.left[i].clone(), self.right[j].clone());
                    }
                } else if wa.kind == WordKind::Word {
                    self.resegment(&wa.atoms, &wb.atoms);
                } else {
                    self.deleted(a);
                    self.inserted(b);
                }
            }
            _ => {
                self.deleted(a);
                self.inserted(b);
            }
        }
    }

    fn equal_atoms(&mut self, a: ComparisonAtom, b: ComparisonAtom) {
        let left = self.push_left(a);
        let right = self.push_right(b);
        self.entry(ScriptEntry::Equal { left, right });
    }

    /// Re-splits an equal word at the union of both sides' fragment
    /// boundaries so each piece has a counterpart.
    fn resegment(&mut self, left: &[usize], right: &[usize]) {
        let settings = self.settings;
        let pieces = |atoms: &[ComparisonAtom], indices: &[usize], cuts: &[usize]| {
            let mut out = Vec::new();
            let mut offset = 0;
            for &i in indices {
                let text: Vec<char> = atoms[i].text().unwrap_or_default().chars().collect();
                let end = offset + text.len();
                let mut start = offset;
                for &cut in cuts.iter().filter(|&&c| c > offset && c < end) {
                    let piece: String = text[start - offset..cut - offset].iter().collect();
                    out.push(atoms[i].with_text(&piece, settings));
                    start = cut;
                }
                let piece: String = text[start - offset..].iter().collect();
                out.push(atoms[i].with_text(&piece, settings));
                offset = end;
            }
            out
        };

        let l_bounds = boundaries(self.left, left);
        let r_bounds = boundaries(self.right, right);
        if l_bounds.last() != r_bounds.last() {
            // Case folding changed the length; fall back to replacement.
            for &i in left {
                let idx = self.push_left(self.left[i].clone());
                self.entry(ScriptEntry::Deleted { left: idx });
            }
            for &j in right {
                let idx = self.push_right(self.right[j].clone());
                self.entry(ScriptEntry::Inserted { right: idx });
            }
            return;
        }

        let mut cuts: Vec<usize> = l_bounds.iter().chain(&r_bounds).copied().collect();
        cuts.sort_unstable();
        cuts.dedup();

        let l_pieces = pieces(self.left, left, &cuts);
        let r_pieces = pieces(self.right, right, &cuts);
        let matched = l_pieces.len() == r_pieces.len()
            && l_pieces.iter().zip(&r_pieces).all(|(a, b)| a.hash == b.hash);
        if matched {
            for (a, b) in l_pieces.into_iter().zip(r_pieces) {
                self.equal_atoms(a, b);
            }
        } else {
            for a in l_pieces {
                let idx = self.push_left(a);
                self.entry(ScriptEntry::Deleted { left: idx });
            }
            for b in r_pieces {
                let idx = self.push_right(b);
                self.entry(ScriptEntry::Inserted { right: idx });
            }
        }
    }
}

/// Cumulative character offsets at the end of each fragment.
fn boundaries(atoms: &[ComparisonAtom], indices: &[usize]) -> Vec<usize> {
    let mut total = 0;
    indices
        .iter()
        .map(|&i| {
            total += atoms[i].text().map_or(0, |t| t.chars().count());
            total
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wml::decompose::decompose;
    use crate::wml::document::WmlDocument;
    use crate::xml::namespaces::W;

    fn atoms(body: &str, side: usize) -> Vec<ComparisonAtom> {
        let doc = WmlDocument::from_main_xml(&format!(
            r#"<w:document xmlns:w="{}"><w:body>{}</w:body></w:document>"#,
            W::NS,
            body
        ))
        .unwrap();
        let snap = doc.snapshot().unwrap();
        decompose(&snap, side, &WmlComparerSettings::default()).unwrap()
    }

    fn para(text: &str) -> String {
        format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", text)
    }

    fn run(left: &str, right: &str) -> Alignment {
        align(&atoms(left, 0), &atoms(right, 1), &WmlComparerSettings::default()).unwrap()
    }

    fn rendered(alignment: &Alignment) -> Vec<String> {
        alignment
            .script
            .entries
            .iter()
            .map(|e| match *e {
                ScriptEntry::Equal { left, .. } => format!("={}", alignment.left[left]),
                ScriptEntry::Deleted { left } => format!("-{}", alignment.left[left]),
                ScriptEntry::Inserted { right } => format!("+{}", alignment.right[right]),
                ScriptEntry::MovedFrom { left, .. } => format!("<{}", alignment.left[left]),
                ScriptEntry::MovedTo { right, .. } => format!(">{}", alignment.right[right]),
            })
            .collect()
    }

    #[test]
    fn identical_documents_align_fully() {
        let body = format!("{}{}", para("one two"), para("three"));
        let alignment = run(&body, &body);
        assert!(alignment.script.is_identity());
        assert_eq!(alignment.script.entries.len(), 6);
    }

    #[test]
    fn a_changed_word_is_replaced_in_place() {
        let alignment = run(&para("The quick brown fox"), &para("The quick red fox"));
        assert_eq!(
            rendered(&alignment),
            vec![
                "=\"The\"", "=\" \"", "=\"quick\"", "=\" \"", "-\"brown\"", "+\"red\"", "=\" \"",
                "=\"fox\"", "=¶"
            ]
        );
    }

    #[test]
    fn an_inserted_paragraph_keeps_its_neighbours() {
        let left = format!("{}{}", para("first paragraph"), para("last paragraph"));
        let right = format!("{}{}{}", para("first paragraph"), para("middle"), para("last paragraph"));
        let alignment = run(&left, &right);
        let counts = alignment.script.counts();
        assert_eq!(counts.inserted, 2);
        assert_eq!(counts.deleted, 0);
    }

    #[test]
    fn differently_split_words_are_resegmented() {
        let left = "<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Hel</w:t></w:r><w:r><w:t>lo</w:t></w:r></w:p>";
        let right = "<w:p><w:r><w:t>H</w:t></w:r><w:r><w:rPr><w:i/></w:rPr><w:t>ello</w:t></w:r></w:p>";
        let alignment = run(left, right);
        assert!(alignment.script.is_identity());
        assert_eq!(
            rendered(&alignment),
            vec!["=\"H\"", "=\"el\"", "=\"lo\"", "=¶"]
        );
        assert_eq!(alignment.left.len(), alignment.right.len());
    }

    #[test]
    fn a_deleted_row_is_deleted_whole() {
        let row = |t: &str| format!("<w:tr><w:tc>{}</w:tc><w:tc>{}</w:tc></w:tr>", para(t), para(t));
        let table = |rows: &[&str]| {
            format!(
                "<w:tbl><w:tblGrid><w:gridCol/><w:gridCol/></w:tblGrid>{}</w:tbl>",
                rows.iter().map(|r| row(r)).collect::<String>()
            )
        };
        let alignment = run(&table(&["a", "b", "c"]), &table(&["a", "c"]));
        let deleted: Vec<String> = rendered(&alignment)
            .into_iter()
            .filter(|e| e.starts_with('-'))
            .collect();
        assert_eq!(deleted, vec!["-\"b\"", "-¶", "-\"b\"", "-¶"]);
        assert_eq!(alignment.script.counts().inserted, 0);
    }

    #[test]
    fn unrelated_paragraph_text_is_replaced_keeping_the_mark() {
        let alignment = run(&para("alpha beta gamma delta"), &para("one"));
        let entries = rendered(&alignment);
        assert_eq!(entries.last().map(String::as_str), Some("=¶"));
        assert!(entries.iter().any(|e| e == "+\"one\""));
    }

    #[test]
    fn container_pairs_cover_matched_tables() {
        let table = format!(
            "<w:tbl><w:tblGrid><w:gridCol/></w:tblGrid><w:tr><w:tc>{}</w:tc></w:tr></w:tbl>",
            para("x")
        );
        let alignment = run(&table, &table.replace(">x<", ">y<"));
        // table, row, cell, paragraph
        assert_eq!(alignment.script.container_pairs.len(), 4);
    }
}
