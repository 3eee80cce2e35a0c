//! The aligner's output: an ordered edit script over atom indices.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptEntry {
    Equal { left: usize, right: usize },
    Inserted { right: usize },
    Deleted { left: usize },
    MovedFrom { left: usize, move_id: u32 },
    MovedTo { right: usize, move_id: u32 },
}

impl ScriptEntry {
    pub fn left(&self) -> Option<usize> {
        match *self {
            ScriptEntry::Equal { left, .. }
            | ScriptEntry::Deleted { left }
            | ScriptEntry::MovedFrom { left, .. } => Some(left),
            _ => None,
        }
    }

    pub fn right(&self) -> Option<usize> {
        match *self {
            ScriptEntry::Equal { right, .. }
            | ScriptEntry::Inserted { right }
            | ScriptEntry::MovedTo { right, .. } => Some(right),
            _ => None,
        }
    }

    pub fn is_equal(&self) -> bool {
        matches!(self, ScriptEntry::Equal { .. })
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EditScript {
    pub entries: Vec<ScriptEntry>,
    /// Unids of containers matched as a whole or descended into together,
    /// left side first.
    pub container_pairs: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScriptCounts {
    pub equal: usize,
    pub inserted: usize,
    pub deleted: usize,
    pub moved: usize,
}

impl EditScript {
    pub fn counts(&self) -> ScriptCounts {
        let mut counts = ScriptCounts::default();
        for entry in &self.entries {
            match entry {
                ScriptEntry::Equal { .. } => counts.equal += 1,
                ScriptEntry::Inserted { .. } => counts.inserted += 1,
                ScriptEntry::Deleted { .. } => counts.deleted += 1,
                ScriptEntry::MovedFrom { .. } => counts.moved += 1,
                ScriptEntry::MovedTo { .. } => {}
            }
        }
        counts
    }

    /// True when the script records no change at all.
    pub fn is_identity(&self) -> bool {
        self.entries.iter().all(ScriptEntry::is_equal)
    }

    /// Every left atom appears exactly once, in order, and likewise every
    /// right atom; move ids pair up one-to-one.
    pub fn check_invariants(&self, left_len: usize, right_len: usize) -> Result<(), String> {
        let lefts: Vec<usize> = self.entries.iter().filter_map(ScriptEntry::left).collect();
        let rights: Vec<usize> = self.entries.iter().filter_map(ScriptEntry::right).collect();
        if lefts != (0..left_len).collect::<Vec<_>>() {
            return Err(format!("left atoms not covered in order ({} of {})", lefts.len(), left_len));
        }
        if rights != (0..right_len).collect::<Vec<_>>() {
            return Err(format!("right atoms not covered in order ({} of {})", rights.len(), right_len));
        }

        let mut from: Vec<u32> = Vec::new();
        let mut to: Vec<u32> = Vec::new();
        for entry in &self.entries {
            match *entry {
                ScriptEntry::MovedFrom { move_id, .. } => from.push(move_id),
                ScriptEntry::MovedTo { move_id, .. } => to.push(move_id),
                _ => {}
            }
        }
        from.sort_unstable();
        from.dedup();
        to.sort_unstable();
        to.dedup();
        if from != to {
            return Err("unpaired move ids".to_string());
        }
        Ok(())
    }
}
