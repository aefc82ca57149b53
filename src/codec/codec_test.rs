use proptest::prelude::*;

use super::*;
use crate::CodecError;
use crate::SubjectType;

#[test]
fn seal_leaves_plain_text_untouched() {
    assert_eq!(seal("stat.active"), "stat.active");
    assert_eq!(unseal("stat.active").unwrap(), "stat.active");
}

#[test]
fn seal_escapes_reserved_characters() {
    let sealed = seal("a&b=c|d~e%f#g");
    assert_eq!(sealed, "a#a#b#e#c#p#d#t#e#c#f#h#g");
    assert_eq!(unseal(&sealed).unwrap(), "a&b=c|d~e%f#g");
}

#[test]
fn unseal_rejects_unknown_and_unterminated_tokens() {
    assert!(matches!(unseal("abc#x#"), Err(CodecError::InvalidEscape(_))));
    assert!(matches!(unseal("abc#a"), Err(CodecError::InvalidEscape(_))));
}

#[test]
fn update_encodes_in_legacy_layout() {
    let message = WireMessage::update(
        "/eos/fst1",
        SubjectType::Hash,
        vec![WirePair::new("stat.boot", "booted", 3), WirePair::new("id", "7", 1)],
    );

    assert_eq!(
        message.encode(),
        "mqsh.cmd=update&mqsh.subject=/eos/fst1&mqsh.type=hash&mqsh.pairs=|stat.boot~booted%3|id~7%1"
    );
}

#[test]
fn delete_and_remove_encode_their_payloads() {
    let delete = WireMessage::delete("q1", SubjectType::Queue, vec!["1".into(), "2".into()]);
    assert_eq!(
        delete.encode(),
        "mqsh.cmd=delete&mqsh.subject=q1&mqsh.type=queue&mqsh.keys=|1|2"
    );

    let remove = WireMessage::remove("q1", SubjectType::Queue);
    assert_eq!(remove.encode(), "mqsh.cmd=remove&mqsh.subject=q1&mqsh.type=queue");
}

#[test]
fn mux_update_prefixes_keys_with_subject_index() {
    let message = WireMessage::mux_update(
        vec!["A".into(), "B".into()],
        vec![
            WirePair::new("a1", "v1", 1).with_subject_index(0),
            WirePair::new("b1", "v2", 5).with_subject_index(1),
        ],
    );

    let encoded = message.encode();
    assert_eq!(
        encoded,
        "mqsh.cmd=muxupdate&mqsh.subject=A%B&mqsh.type=hash&mqsh.pairs=|#0#a1~v1%1|#1#b1~v2%5"
    );

    let decoded = WireMessage::decode(&encoded).unwrap();
    assert_eq!(decoded, message);
}

#[test]
fn single_subject_mux_update_has_no_prefix() {
    let message = WireMessage::mux_update(vec!["A".into()], vec![WirePair::new("a1", "v1", 1)]);
    assert!(!message.is_multiplexed());
    assert!(message.encode().ends_with("mqsh.pairs=|a1~v1%1"));
}

#[test]
fn broadcast_request_carries_reply_address() {
    let message = WireMessage::broadcast_request("grp/*", SubjectType::Hash, "/eos/mgm&x");
    let decoded = WireMessage::decode(&message.encode()).unwrap();

    assert_eq!(decoded.command, WireCommand::BroadcastRequest);
    assert_eq!(decoded.body, WireBody::Reply("/eos/mgm&x".into()));
    assert_eq!(
        decoded.subject_patterns().unwrap(),
        vec![SubjectPattern::Prefix("grp/".into())]
    );
}

#[test]
fn decode_accepts_empty_pairs_field() {
    let decoded = WireMessage::decode("mqsh.cmd=update&mqsh.subject=s&mqsh.type=hash&mqsh.pairs=").unwrap();
    assert_eq!(decoded.body, WireBody::Pairs(vec![]));
}

#[test]
fn decode_ignores_unknown_fields() {
    let decoded =
        WireMessage::decode("mqsh.cmd=remove&mqsh.subject=s&mqsh.type=queue&mqsh.sender=/eos/fst2").unwrap();
    assert_eq!(decoded.command, WireCommand::Remove);
    assert_eq!(decoded.subject_type, SubjectType::Queue);
}

#[test]
fn decode_reports_missing_fields() {
    assert_eq!(
        WireMessage::decode("mqsh.subject=s&mqsh.type=hash"),
        Err(CodecError::MissingField("mqsh.cmd"))
    );
    assert_eq!(
        WireMessage::decode("mqsh.cmd=update&mqsh.type=hash&mqsh.pairs="),
        Err(CodecError::MissingField("mqsh.subject"))
    );
    assert_eq!(
        WireMessage::decode("mqsh.cmd=update&mqsh.subject=s&mqsh.pairs="),
        Err(CodecError::MissingField("mqsh.type"))
    );
    assert_eq!(
        WireMessage::decode("mqsh.cmd=update&mqsh.subject=s&mqsh.type=hash"),
        Err(CodecError::MissingField("mqsh.pairs"))
    );
    assert_eq!(
        WireMessage::decode("mqsh.cmd=delete&mqsh.subject=s&mqsh.type=hash"),
        Err(CodecError::MissingField("mqsh.keys"))
    );
    assert_eq!(
        WireMessage::decode("mqsh.cmd=bcrequest&mqsh.subject=s&mqsh.type=hash"),
        Err(CodecError::MissingField("mqsh.reply"))
    );
}

#[test]
fn decode_rejects_unknown_command_and_type() {
    assert_eq!(
        WireMessage::decode("mqsh.cmd=merge&mqsh.subject=s&mqsh.type=hash"),
        Err(CodecError::UnknownCommand("merge".into()))
    );
    assert_eq!(
        WireMessage::decode("mqsh.cmd=remove&mqsh.subject=s&mqsh.type=set"),
        Err(CodecError::UnknownType("set".into()))
    );
}

#[test]
fn decode_rejects_malformed_pairs() {
    let base = "mqsh.cmd=update&mqsh.subject=s&mqsh.type=hash&mqsh.pairs=";

    assert!(matches!(
        WireMessage::decode(&format!("{base}|novalue")),
        Err(CodecError::MalformedPair(_))
    ));
    assert!(matches!(
        WireMessage::decode(&format!("{base}|k~v")),
        Err(CodecError::MalformedPair(_))
    ));
    assert!(matches!(
        WireMessage::decode(&format!("{base}|k~v%abc")),
        Err(CodecError::InvalidChangeId(_))
    ));
    assert!(matches!(
        WireMessage::decode(&format!("{base}|~v%1")),
        Err(CodecError::MalformedPair(_))
    ));
    assert!(matches!(
        WireMessage::decode(&format!("{base}k~v%1")),
        Err(CodecError::MalformedField(_))
    ));
}

#[test]
fn decode_validates_mux_prefixes() {
    let base = "mqsh.cmd=muxupdate&mqsh.subject=A%B&mqsh.type=hash&mqsh.pairs=";

    assert!(matches!(
        WireMessage::decode(&format!("{base}|a1~v%1")),
        Err(CodecError::MissingMuxPrefix(_))
    ));
    assert_eq!(
        WireMessage::decode(&format!("{base}|#2#a1~v%1")),
        Err(CodecError::MuxIndexOutOfRange { index: 2, subjects: 2 })
    );
    assert!(matches!(
        WireMessage::decode(&format!("{base}|#h#a1~v%1")),
        Err(CodecError::MissingMuxPrefix(_))
    ));
}

#[test]
fn decode_rejects_wildcards_inside_subject_lists() {
    assert!(matches!(
        WireMessage::decode("mqsh.cmd=remove&mqsh.subject=A%grp/*&mqsh.type=hash"),
        Err(CodecError::InvalidSubjectPattern(_))
    ));
    assert!(matches!(
        WireMessage::decode("mqsh.cmd=remove&mqsh.subject=a*b*&mqsh.type=hash"),
        Err(CodecError::InvalidSubjectPattern(_))
    ));
}

#[test]
fn subject_patterns_match_prefix_and_suffix() {
    let prefix = SubjectPattern::parse("grp/*").unwrap();
    assert!(prefix.matches("grp/a"));
    assert!(!prefix.matches("other"));

    let suffix = SubjectPattern::parse("*/fsck").unwrap();
    assert!(suffix.matches("node1/fsck"));
    assert!(!suffix.matches("node1/fsck/x"));

    assert_eq!(SubjectPattern::parse("*").unwrap(), SubjectPattern::All);
    assert!(!SubjectPattern::parse("exact").unwrap().is_wildcard());
}

fn text() -> impl Strategy<Value = String> {
    // reserved characters are deliberately over-represented
    proptest::string::string_regex("[a-z0-9&=|~%#/. ]{0,24}").unwrap()
}

fn non_empty_text() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z0-9&=|~%#/. ]{1,24}").unwrap()
}

proptest! {
    #[test]
    fn seal_roundtrips_any_text(raw in any::<String>()) {
        prop_assert_eq!(unseal(&seal(&raw)).unwrap(), raw);
    }

    #[test]
    fn sealed_text_never_contains_structural_characters(raw in text()) {
        let sealed = seal(&raw);
        prop_assert!(!sealed.contains(|c| matches!(c, '&' | '=' | '|' | '~' | '%')));
    }

    #[test]
    fn mux_messages_survive_encoding(
        subjects in proptest::collection::btree_set(non_empty_text().prop_filter("no wildcard", |s| !s.contains('*')), 1..4),
        entries in proptest::collection::vec((non_empty_text(), text(), any::<u64>(), 0usize..4), 0..8),
    ) {
        let subjects: Vec<String> = subjects.into_iter().collect();
        let pairs = entries
            .into_iter()
            .map(|(k, v, id, idx)| WirePair::new(k, v, id).with_subject_index(idx % subjects.len()))
            .collect::<Vec<_>>();
        let message = WireMessage::mux_update(subjects, pairs);

        prop_assert_eq!(WireMessage::decode(&message.encode()).unwrap(), message);
    }

    #[test]
    fn decode_never_panics_on_garbage(body in any::<String>()) {
        let _ = WireMessage::decode(&body);
    }
}
