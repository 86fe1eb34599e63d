/*!
 * Tests for glossary loading and lookup
 */

use anyhow::Result;
use std::fs;
use tempfile::TempDir;

use stringtable_translator::translation::{Glossary, GlossaryEntry, GlossaryResolver};

#[test]
fn test_load_withCsvHeader_shouldUseNamedColumns() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("terms.csv");
    fs::write(&path, "notes,target,source\nweapon,شمشیر,Sword\n,اژدها,Dragon\n")?;

    let glossary = Glossary::load(&path)?;

    assert_eq!(
        glossary.entries(),
        &[GlossaryEntry::new("Sword", "شمشیر"), GlossaryEntry::new("Dragon", "اژدها")]
    );
    Ok(())
}

#[test]
fn test_load_withJsonMap_shouldReadEveryTerm() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("terms.json");
    fs::write(&path, r#"{"Dragon Slayer": "اژدهاکش", "Dragon": "اژدها"}"#)?;

    let glossary = Glossary::load(&path)?;
    assert_eq!(glossary.len(), 2);
    Ok(())
}

#[test]
fn test_load_withMissingFile_shouldFail() {
    assert!(Glossary::load("/nonexistent/terms.csv").is_err());
    assert!(Glossary::load_optional(None::<&str>).unwrap().is_empty());
}

#[test]
fn test_version_shouldTrackContent() {
    let a = Glossary::new(vec![GlossaryEntry::new("Sword", "شمشیر")]);
    let b = Glossary::new(vec![GlossaryEntry::new("Sword", "تیغ")]);

    assert_eq!(a.version(), a.clone().version());
    assert_ne!(a.version(), b.version());
    assert_ne!(a.version(), Glossary::default().version());
}

#[test]
fn test_relevant_entries_shouldPreferLongestTerm() -> Result<()> {
    let resolver = GlossaryResolver::new(Glossary::new(vec![
        GlossaryEntry::new("Dragon", "اژدها"),
        GlossaryEntry::new("Dragon Slayer", "اژدهاکش"),
        GlossaryEntry::new("Sword", "شمشیر"),
    ]))?;

    let found = resolver.relevant_entries("The Dragon Slayer lost the sword");
    let sources: Vec<&str> = found.iter().map(|e| e.source.as_str()).collect();
    assert_eq!(sources, vec!["Dragon Slayer", "Sword"]);

    assert!(resolver.relevant_entries("Nothing relevant").is_empty());
    Ok(())
}
