//! Debug output of a comparison's intermediate state.

use super::align::Alignment;
use super::atom::ComparisonAtom;
use super::settings::WmlComparerSettings;
use super::units::{build_units, describe_units};
use crate::error::Result;
use log::debug;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Writes the atom lists, unit trees and edit script of a comparison into
/// `dir`, creating it if needed.
pub fn write_dumps(
    dir: &Path,
    left: &[ComparisonAtom],
    right: &[ComparisonAtom],
    alignment: &Alignment,
    settings: &WmlComparerSettings,
) -> Result<()> {
    fs::create_dir_all(dir)?;
    fs::write(dir.join("atoms-left.txt"), describe_atoms(left))?;
    fs::write(dir.join("atoms-right.txt"), describe_atoms(right))?;

    let mut units = String::from("# left\n");
    units.push_str(&describe_units(&build_units(left, settings), left));
    units.push_str("\n# right\n");
    units.push_str(&describe_units(&build_units(right, settings), right));
    fs::write(dir.join("units.txt"), units)?;

    let script = serde_json::to_string_pretty(&alignment.script).map_err(std::io::Error::from)?;
    fs::write(dir.join("script.json"), script)?;

    debug!("wrote comparison dumps to {}", dir.display());
    Ok(())
}

/// One line per atom: index, content, hash prefix and container chain.
pub fn describe_atoms(atoms: &[ComparisonAtom]) -> String {
    let mut out = String::new();
    for (i, atom) in atoms.iter().enumerate() {
        let chain: Vec<&str> = atom.ancestors.iter().map(|a| a.kind.label()).collect();
        let _ = writeln!(
            out,
            "{:>5} {:<24} {} {}",
            i,
            atom.to_string(),
            &atom.hash[..8.min(atom.hash.len())],
            chain.join("/")
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wml::align::align;
    use crate::wml::decompose::decompose;
    use crate::wml::document::WmlDocument;
    use crate::xml::namespaces::W;

    #[test]
    fn dumps_land_in_the_directory() {
        let settings = WmlComparerSettings::default();
        let doc = |text: &str| {
            WmlDocument::from_main_xml(&format!(
                r#"<w:document xmlns:w="{}"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>"#,
                W::NS,
                text
            ))
            .unwrap()
        };
        let (a, b) = (doc("one"), doc("two"));
        let (sa, sb) = (a.snapshot().unwrap(), b.snapshot().unwrap());
        let left = decompose(&sa, 0, &settings).unwrap();
        let right = decompose(&sb, 1, &settings).unwrap();
        let alignment = align(&left, &right, &settings).unwrap();

        let dir = std::env::temp_dir().join(format!("docdelta-dump-{}", std::process::id()));
        write_dumps(&dir, &left, &right, &alignment, &settings).unwrap();

        let atoms = fs::read_to_string(dir.join("atoms-left.txt")).unwrap();
        assert!(atoms.contains("\"one\""));
        assert!(atoms.contains("paragraph"));
        let script = fs::read_to_string(dir.join("script.json")).unwrap();
        assert!(script.contains("\"op\": \"deleted\""));
        assert!(dir.join("units.txt").exists());
        fs::remove_dir_all(&dir).unwrap();
    }
}
