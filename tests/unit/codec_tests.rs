/*!
 * Tests for the string table codec
 */

use stringtable_translator::document::{reassemble, StringTableCodec, UnitKind};
use stringtable_translator::errors::CodecError;

use crate::common::QUEST_001;

const AWKWARD: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\r\n\
<!-- exported by the table editor -->\r\n\
<StringTableFile xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\"  >\r\n\
\t<Entries>\r\n\
\t\t<Entry><ID>7</ID><DefaultText>Fish &amp; Chips &#233;</DefaultText><FemaleText><![CDATA[<b>raw</b> & bare]]></FemaleText></Entry>\r\n\
\t\t<Entry><ID>8</ID><DefaultText>   </DefaultText><FemaleText/></Entry>\r\n\
\t</Entries>\r\n\
</StringTableFile>\r\n";

#[test]
fn test_reassemble_withSourceText_shouldReproduceQuestTable() {
    let codec = StringTableCodec::default();
    let extracted = codec.extract(QUEST_001).unwrap();

    assert_eq!(
        extracted.sources(),
        vec!["Hello, [Player]!".to_string(), "Gold: %d".to_string()]
    );
    let rebuilt = reassemble(&extracted.skeleton, &extracted.sources()).unwrap();
    assert_eq!(rebuilt, QUEST_001);
}

#[test]
fn test_reassemble_withEscapesCdataAndCrlf_shouldBeByteIdentical() {
    let codec = StringTableCodec::default();
    let extracted = codec.extract(AWKWARD).unwrap();

    assert_eq!(extracted.units.len(), 3);
    assert_eq!(extracted.units[0].source, "Fish & Chips é");
    assert_eq!(extracted.units[1].kind, UnitKind::CData);
    assert_eq!(extracted.units[1].source, "<b>raw</b> & bare");
    assert!(!extracted.units[2].is_translatable());

    let rebuilt = reassemble(&extracted.skeleton, &extracted.sources()).unwrap();
    assert_eq!(rebuilt, AWKWARD);
}

#[test]
fn test_reassemble_withTranslation_shouldEscapeAndKeepEverythingElse() {
    let codec = StringTableCodec::default();
    let extracted = codec.extract(QUEST_001).unwrap();

    let rebuilt = reassemble(
        &extracted.skeleton,
        &["Salut & <bienvenue>".to_string(), "Gold: %d".to_string()],
    )
    .unwrap();

    assert!(rebuilt.contains("<DefaultText>Salut &amp; &lt;bienvenue&gt;</DefaultText>"));
    assert!(rebuilt.contains("<Name>game\\quests\\quest_001</Name>"));
    assert_eq!(codec.extract(&rebuilt).unwrap().units[0].source, "Salut & <bienvenue>");
}

#[test]
fn test_extract_shouldLocateUnitsByEntryAndElement() {
    let extracted = StringTableCodec::default().extract(QUEST_001).unwrap();

    let locator = &extracted.units[1].locator;
    assert_eq!(locator.entry_id.as_deref(), Some("2"));
    assert_eq!(locator.element, "DefaultText");
    assert_eq!(locator.ordinal, 1);
}

#[test]
fn test_extract_withCustomElements_shouldOnlyTakeThose() {
    let codec = StringTableCodec::new(["FemaleText"]);
    let extracted = codec.extract(AWKWARD).unwrap();
    assert_eq!(extracted.units.len(), 1);
    assert_eq!(extracted.units[0].kind, UnitKind::CData);
}

#[test]
fn test_extract_withBrokenDocuments_shouldBeUnparseable() {
    let codec = StringTableCodec::default();
    for raw in [
        "",
        "<StringTableFile><Entries></StringTableFile>",
        "<Other><DefaultText>x</DefaultText></Other>",
        "<StringTableFile/><StringTableFile/>",
    ] {
        assert!(
            matches!(codec.extract(raw), Err(CodecError::Unparseable(_))),
            "accepted {:?}",
            raw
        );
    }
}

#[test]
fn test_reassemble_withWrongCount_shouldFail() {
    let extracted = StringTableCodec::default().extract(QUEST_001).unwrap();
    assert!(reassemble(&extracted.skeleton, &["only one".to_string()]).is_err());
}
