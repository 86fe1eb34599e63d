/*!
 * Tests for placeholder masking
 */

use stringtable_translator::errors::IntegrityError;
use stringtable_translator::translation::placeholders::{
    is_reserved, mask, needs_translation, placeholder_literals, split_whitespace_bounds, unmask,
};

#[test]
fn test_unmask_ofMask_shouldRestoreEveryText() {
    let samples = [
        "Hello, [Player]!",
        "Gold: %d",
        "{count} arrows, {count} bolts",
        "<color=#ff0000>Danger</color> ahead\\nRun!",
        "100%% sure: %1$s beats %2$.2f",
        "No placeholders at all",
        "",
        "[unclosed {brace <tag",
    ];
    for text in samples {
        let masked = mask(text).unwrap();
        assert_eq!(unmask(&masked.text, &masked.substitutions).unwrap(), text);
    }
}

#[test]
fn test_mask_withRepeatedLiteral_shouldGiveEachOccurrenceItsOwnMarker() {
    let masked = mask("{count} arrows, {count} bolts").unwrap();
    assert_eq!(masked.substitutions.len(), 2);
    assert_ne!(masked.substitutions[0].marker, masked.substitutions[1].marker);
}

#[test]
fn test_unmask_withReorderedMarkers_shouldFollowIdentity() {
    let masked = mask("[Player] gives {item} to [Target]").unwrap();
    let swapped: String = masked
        .text
        .chars()
        .map(|c| match c {
            '\u{1}' => '\u{3}',
            '\u{3}' => '\u{1}',
            other => other,
        })
        .collect();

    assert_eq!(
        unmask(&swapped, &masked.substitutions).unwrap(),
        "[Target] gives {item} to [Player]"
    );
}

#[test]
fn test_unmask_withMarkerTrouble_shouldRaiseIntegrityError() {
    let masked = mask("Hello, [Player]!").unwrap();

    assert!(matches!(
        unmask("Salut !", &masked.substitutions),
        Err(IntegrityError::MissingMarker { index: 1, .. })
    ));
    assert!(matches!(
        unmask("Salut \u{1}\u{1}!", &masked.substitutions),
        Err(IntegrityError::DuplicateMarker { .. })
    ));
    assert!(matches!(
        unmask("Salut \u{1}\u{2}!", &masked.substitutions),
        Err(IntegrityError::UnknownMarker { codepoint: 2 })
    ));
}

#[test]
fn test_mask_withReservedCharacterInSource_shouldRefuse() {
    assert!(matches!(
        mask("bad \u{1} input"),
        Err(IntegrityError::ReservedCharacter { position: 4, codepoint: 1 })
    ));
}

#[test]
fn test_mask_withManyPlaceholders_shouldSpillIntoPrivateUse() {
    let text: String = (0..40).map(|i| format!("{{v{}}} ", i)).collect();
    let masked = mask(&text).unwrap();

    assert_eq!(masked.substitutions.len(), 40);
    assert!(masked.substitutions[..22].iter().all(|s| is_reserved(s.marker)));
    assert_eq!(masked.substitutions[22].marker as u32, 0xF0000);
    assert!(!is_reserved(masked.substitutions[22].marker));
    assert_eq!(unmask(&masked.text, &masked.substitutions).unwrap(), text);
}

#[test]
fn test_needs_translation_withOnlyPlaceholders_shouldBeFalse() {
    assert!(!needs_translation(&mask("%d / %d").unwrap()));
    assert!(!needs_translation(&mask("[Player]").unwrap()));
    assert!(needs_translation(&mask("Gold: %d").unwrap()));
}

#[test]
fn test_placeholder_literals_shouldCompareAsMultiset() {
    assert_eq!(
        placeholder_literals("{b} then {a} then {b}"),
        placeholder_literals("{a} {b} {b}")
    );
    assert_ne!(placeholder_literals("{a} {b}"), placeholder_literals("{a}"));
}

#[test]
fn test_split_whitespace_bounds_shouldKeepOuterWhitespace() {
    assert_eq!(split_whitespace_bounds("  Hi there \n"), ("  ", "Hi there", " \n"));
    assert_eq!(split_whitespace_bounds("   "), ("   ", "", ""));
    assert_eq!(split_whitespace_bounds("x"), ("", "x", ""));
}

#[test]
fn test_unmask_withTagAddedByBackend_shouldRefuse() {
    let masked = mask("Hello, [Player]!").unwrap();

    assert_eq!(
        unmask("<i>Salut</i> \u{1}!", &masked.substitutions),
        Err(IntegrityError::UnexpectedPlaceholder { literal: "<i>".to_string() })
    );
    assert_eq!(unmask("Salut \u{1} 100%", &masked.substitutions).unwrap(), "Salut [Player] 100%");
}

#[test]
fn test_mask_withPrivateUseIconInSource_shouldAccept() {
    let masked = mask("Press \u{E001}\u{F0041} for {action}").unwrap();

    assert_eq!(masked.text, "Press \u{E001}\u{F0041} for \u{1}");
    assert_eq!(
        unmask(&masked.text, &masked.substitutions).unwrap(),
        "Press \u{E001}\u{F0041} for {action}"
    );
}
