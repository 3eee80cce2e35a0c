//! Move detection.
//!
//! A deleted span whose content reappears as an inserted span elsewhere is
//! reported as a move instead. Spans are cut at paragraph marks, so a moved
//! paragraph pairs with its copy even when its neighbours were edited too.

use super::align::Alignment;
use super::atom::{normalize_text, ComparisonAtom};
use super::document::PartKind;
use super::script::ScriptEntry;
use super::settings::WmlComparerSettings;
use log::debug;

struct Chunk {
    /// Positions in the script.
    entries: Vec<usize>,
    part: PartKind,
    key: Vec<String>,
    words: usize,
}

/// Rewrites matching deleted/inserted spans as moves. Returns the number of
/// moves found.
pub fn detect_moves(alignment: &mut Alignment, settings: &WmlComparerSettings) -> u32 {
    if !settings.detect_moves {
        return 0;
    }

    let deleted = chunks(alignment, settings, |e| e.left().filter(|_| matches!(e, ScriptEntry::Deleted { .. })), &alignment.left);
    let inserted = chunks(alignment, settings, |e| e.right().filter(|_| matches!(e, ScriptEntry::Inserted { .. })), &alignment.right);

    let mut taken = vec![false; inserted.len()];
    let mut pairs: Vec<(usize, usize)> = Vec::new();
    for (d, from) in deleted.iter().enumerate() {
        if from.words < settings.move_min_words.max(1) {
            continue;
        }
        let found = inserted
            .iter()
            .enumerate()
            .find(|(i, to)| !taken[*i] && to.part == from.part && to.key == from.key);
        if let Some((i, _)) = found {
            taken[i] = true;
            pairs.push((d, i));
        }
    }

    let mut next_id = 0u32;
    for (d, i) in pairs {
        next_id += 1;
        for &pos in &deleted[d].entries {
            if let ScriptEntry::Deleted { left } = alignment.script.entries[pos] {
                alignment.script.entries[pos] = ScriptEntry::MovedFrom { left, move_id: next_id };
            }
        }
        for &pos in &inserted[i].entries {
            if let ScriptEntry::Inserted { right } = alignment.script.entries[pos] {
                alignment.script.entries[pos] = ScriptEntry::MovedTo { right, move_id: next_id };
            }
        }
    }

    if next_id > 0 {
        debug!("detected {} moves", next_id);
    }
    next_id
}

/// Maximal runs of entries selected by `select`, cut after paragraph marks.
fn chunks<F>(
    alignment: &Alignment,
    settings: &WmlComparerSettings,
    select: F,
    atoms: &[ComparisonAtom],
) -> Vec<Chunk>
where
    F: Fn(&ScriptEntry) -> Option<usize>,
{
    let mut out = Vec::new();
    let mut current: Vec<(usize, usize)> = Vec::new();
    for (pos, entry) in alignment.script.entries.iter().enumerate() {
        match select(entry) {
            Some(atom) => {
                let ends = atoms[atom].is_paragraph_mark();
                current.push((pos, atom));
                if ends {
                    out.extend(chunk(std::mem::take(&mut current), atoms, settings));
                }
            }
            None => {
                // The other side's entries of a replacement don't break a run.
                let other_side_change = matches!(entry, ScriptEntry::Inserted { .. } | ScriptEntry::Deleted { .. });
                if !other_side_change && !current.is_empty() {
                    out.extend(chunk(std::mem::take(&mut current), atoms, settings));
                }
            }
        }
    }
    out.extend(chunk(current, atoms, settings));
    out
}

fn chunk(members: Vec<(usize, usize)>, atoms: &[ComparisonAtom], settings: &WmlComparerSettings) -> Option<Chunk> {
    let (_, first) = *members.first()?;
    let part = atoms[first].source.part;
    if members.iter().any(|&(_, a)| atoms[a].source.part != part) {
        return None;
    }

    let mut key = Vec::new();
    let mut word = String::new();
    let mut words = 0;
    for &(_, a) in &members {
        let atom = &atoms[a];
        if atom.is_word_text(settings) {
            word.push_str(&normalize_text(atom.text().unwrap_or_default(), settings));
            continue;
        }
        if !word.is_empty() {
            key.push(format!("w:{}", std::mem::take(&mut word)));
            words += 1;
        }
        key.push(atom.hash.clone());
    }
    if !word.is_empty() {
        key.push(format!("w:{}", word));
        words += 1;
    }

    Some(Chunk {
        entries: members.into_iter().map(|(pos, _)| pos).collect(),
        part,
        key,
        words,
    })
}
