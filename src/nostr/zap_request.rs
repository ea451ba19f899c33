use std::fmt;

use nostr_sdk::{Event, JsonUtil, Kind};
use serde::Serialize;

/// Why a zap request was refused. The `Display` text ends up in the LNURL
/// error reason returned to the paying wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZapRequestError {
    MalformedEvent(String),
    BadSignature,
    WrongKind(u16),
    NoTags,
    MissingRecipient,
    MultipleRecipients,
    MultipleEventTags,
    MultipleSenders,
    SenderMismatch,
    MultipleAmounts,
    InvalidAmount(String),
    AmountMismatch { tag_msat: u64, query_msat: u64 },
}

impl fmt::Display for ZapRequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedEvent(e) => write!(f, "malformed nostr event: {e}"),
            Self::BadSignature => write!(f, "It MUST have a valid nostr signature"),
            Self::WrongKind(kind) => write!(f, "Not a zap request: kind={kind}"),
            Self::NoTags => write!(f, "It MUST have tags"),
            Self::MissingRecipient => write!(f, "It MUST have one p tag"),
            Self::MultipleRecipients => write!(f, "It MUST have only one p tag"),
            Self::MultipleEventTags => write!(f, "It MUST have 0 or 1 e tags"),
            Self::MultipleSenders => write!(f, "There MUST be 0 or 1 P tags"),
            Self::SenderMismatch => write!(f, "P tag MUST be equal to the zap sender's pubkey"),
            Self::MultipleAmounts => write!(f, "multiple amount tags"),
            Self::InvalidAmount(value) => write!(f, "amount tag is not an integer: {value}"),
            Self::AmountMismatch {
                tag_msat,
                query_msat,
            } => write!(
                f,
                "If there is an amount tag, it MUST be equal to the amount query parameter: \
                 {query_msat} != {tag_msat}"
            ),
        }
    }
}

impl std::error::Error for ZapRequestError {}

/// A zap request that passed validation.
///
/// `raw` is the exact JSON the client sent; the receipt's `description` tag
/// must carry it byte for byte.
#[derive(Debug, Clone, Serialize)]
pub struct ValidatedZapRequest {
    pub raw: String,
    pub sender: String,
    pub recipient: String,
    pub event_id: Option<String>,
    pub coordinate: Option<String>,
    pub sender_tag: Option<String>,
    pub kind_tag: Option<String>,
    pub relays: Vec<String>,
}

/// Check a kind 9734 event against the NIP-57 rules a zap recipient's LNURL
/// server has to enforce.
///
/// The `a` tag coordinate is passed through without checking its format.
pub fn validate_zap_request(
    raw: &str,
    amount_msat: u64,
) -> Result<ValidatedZapRequest, ZapRequestError> {
    let event =
        Event::from_json(raw).map_err(|e| ZapRequestError::MalformedEvent(e.to_string()))?;

    event
        .verify()
        .map_err(|_| ZapRequestError::BadSignature)?;

    if event.kind != Kind::ZapRequest {
        return Err(ZapRequestError::WrongKind(event.kind.as_u16()));
    }

    let tags: Vec<&[String]> = event.tags.iter().map(|tag| tag.as_slice()).collect();
    if tags.is_empty() {
        return Err(ZapRequestError::NoTags);
    }

    let p_tags = valued_tags(&tags, "p");
    let recipient = match p_tags.as_slice() {
        [] => return Err(ZapRequestError::MissingRecipient),
        [p] => p[1].clone(),
        _ => return Err(ZapRequestError::MultipleRecipients),
    };

    let e_tags: Vec<&[String]> = tags
        .iter()
        .copied()
        .filter(|tag| tag.first().map(String::as_str) == Some("e"))
        .collect();
    if e_tags.len() > 1 {
        return Err(ZapRequestError::MultipleEventTags);
    }
    let event_id = e_tags.first().and_then(|tag| tag.get(1)).cloned();

    let sender = event.pubkey.to_hex();
    let sender_tags = valued_tags(&tags, "P");
    let sender_tag = match sender_tags.as_slice() {
        [] => None,
        [tag] if tag[1] == sender => Some(tag[1].clone()),
        [_] => return Err(ZapRequestError::SenderMismatch),
        _ => return Err(ZapRequestError::MultipleSenders),
    };

    match valued_tags(&tags, "amount").as_slice() {
        [] => {}
        [tag] => {
            let tag_msat: u64 = tag[1]
                .trim()
                .parse()
                .map_err(|_| ZapRequestError::InvalidAmount(tag[1].clone()))?;
            if tag_msat != amount_msat {
                return Err(ZapRequestError::AmountMismatch {
                    tag_msat,
                    query_msat: amount_msat,
                });
            }
        }
        _ => return Err(ZapRequestError::MultipleAmounts),
    }

    let first_value = |name: &str| {
        valued_tags(&tags, name)
            .first()
            .map(|tag| tag[1].clone())
    };

    let relays = tags
        .iter()
        .find(|tag| tag.first().map(String::as_str) == Some("relays"))
        .map(|tag| tag[1..].to_vec())
        .unwrap_or_default();

    Ok(ValidatedZapRequest {
        raw: raw.to_string(),
        sender,
        recipient,
        event_id,
        coordinate: first_value("a"),
        sender_tag,
        kind_tag: first_value("k"),
        relays,
    })
}

/// Tags named `name` that carry at least one value.
fn valued_tags<'a>(tags: &[&'a [String]], name: &str) -> Vec<&'a [String]> {
    tags.iter()
        .copied()
        .filter(|tag| tag.len() > 1 && tag[0] == name)
        .collect()
}

#[cfg(test)]
mod tests {
    use nostr_sdk::{EventBuilder, Keys, Tag};
    use serde_json::Value;

    use super::*;

    const RECIPIENT: &str = "9630f464cca6a5147aa8a35f0bcdd3ce485324e732fd39e09233b1d848238f31";

    fn tag(values: &[&str]) -> Tag {
        Tag::parse(values.iter().map(|v| v.to_string())).unwrap()
    }

    fn signed_request(keys: &Keys, kind: Kind, tags: Vec<Tag>) -> String {
        EventBuilder::new(kind, "zap!")
            .tags(tags)
            .sign_with_keys(keys)
            .unwrap()
            .as_json()
    }

    fn zap_request(tags: Vec<Tag>) -> String {
        signed_request(&Keys::generate(), Kind::ZapRequest, tags)
    }

    #[test]
    fn test_valid_request_returns_raw_json_unchanged() {
        let keys = Keys::generate();
        let sender = keys.public_key().to_hex();
        let raw = signed_request(
            &keys,
            Kind::ZapRequest,
            vec![
                tag(&["p", RECIPIENT]),
                tag(&["e", "ab".repeat(32).as_str()]),
                tag(&["P", sender.as_str()]),
                tag(&["amount", "21000"]),
                tag(&["k", "1"]),
                tag(&["a", "30023:abc:slug"]),
                tag(&["relays", "wss://relay.one", "wss://relay.two"]),
            ],
        );

        let validated = validate_zap_request(&raw, 21_000).unwrap();
        assert_eq!(validated.raw, raw);
        assert_eq!(validated.sender, sender);
        assert_eq!(validated.recipient, RECIPIENT);
        assert_eq!(validated.event_id, Some("ab".repeat(32)));
        assert_eq!(validated.sender_tag, Some(sender));
        assert_eq!(validated.kind_tag, Some("1".to_string()));
        assert_eq!(validated.coordinate, Some("30023:abc:slug".to_string()));
        assert_eq!(validated.relays, vec!["wss://relay.one", "wss://relay.two"]);
    }

    #[test]
    fn test_amount_tag_is_optional() {
        let raw = zap_request(vec![tag(&["p", RECIPIENT])]);
        let validated = validate_zap_request(&raw, 5_000).unwrap();
        assert!(validated.relays.is_empty());
        assert!(validated.event_id.is_none());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            validate_zap_request("{not json", 1000),
            Err(ZapRequestError::MalformedEvent(_))
        ));
        assert!(matches!(
            validate_zap_request(r#"{"kind": 9734}"#, 1000),
            Err(ZapRequestError::MalformedEvent(_))
        ));
    }

    #[test]
    fn test_tampered_event_fails_signature() {
        let raw = zap_request(vec![tag(&["p", RECIPIENT])]);
        let mut value: Value = serde_json::from_str(&raw).unwrap();
        value["content"] = Value::String("tampered".to_string());
        let tampered = value.to_string();

        assert_eq!(
            validate_zap_request(&tampered, 1000).unwrap_err(),
            ZapRequestError::BadSignature
        );
    }

    #[test]
    fn test_wrong_kind() {
        let raw = signed_request(
            &Keys::generate(),
            Kind::TextNote,
            vec![tag(&["p", RECIPIENT])],
        );
        assert_eq!(
            validate_zap_request(&raw, 1000).unwrap_err(),
            ZapRequestError::WrongKind(1)
        );
    }

    #[test]
    fn test_no_tags() {
        let raw = zap_request(vec![]);
        assert_eq!(
            validate_zap_request(&raw, 1000).unwrap_err(),
            ZapRequestError::NoTags
        );
    }

    #[test]
    fn test_recipient_rules() {
        let missing = zap_request(vec![tag(&["amount", "1000"])]);
        assert_eq!(
            validate_zap_request(&missing, 1000).unwrap_err(),
            ZapRequestError::MissingRecipient
        );

        let twice = zap_request(vec![tag(&["p", RECIPIENT]), tag(&["p", RECIPIENT])]);
        assert_eq!(
            validate_zap_request(&twice, 1000).unwrap_err(),
            ZapRequestError::MultipleRecipients
        );
    }

    #[test]
    fn test_multiple_event_tags() {
        let raw = zap_request(vec![
            tag(&["p", RECIPIENT]),
            tag(&["e", "aa".repeat(32).as_str()]),
            tag(&["e", "bb".repeat(32).as_str()]),
        ]);
        assert_eq!(
            validate_zap_request(&raw, 1000).unwrap_err(),
            ZapRequestError::MultipleEventTags
        );
    }

    #[test]
    fn test_sender_tag_must_match_pubkey() {
        let other = Keys::generate().public_key().to_hex();
        let raw = zap_request(vec![tag(&["p", RECIPIENT]), tag(&["P", other.as_str()])]);
        assert_eq!(
            validate_zap_request(&raw, 1000).unwrap_err(),
            ZapRequestError::SenderMismatch
        );
    }

    #[test]
    fn test_multiple_sender_tags() {
        let keys = Keys::generate();
        let sender = keys.public_key().to_hex();
        let raw = signed_request(
            &keys,
            Kind::ZapRequest,
            vec![
                tag(&["p", RECIPIENT]),
                tag(&["P", sender.as_str()]),
                tag(&["P", sender.as_str()]),
            ],
        );
        assert_eq!(
            validate_zap_request(&raw, 1000).unwrap_err(),
            ZapRequestError::MultipleSenders
        );
    }

    #[test]
    fn test_amount_rules() {
        let raw = zap_request(vec![tag(&["p", RECIPIENT]), tag(&["amount", "2000"])]);
        assert!(validate_zap_request(&raw, 2000).is_ok());
        assert_eq!(
            validate_zap_request(&raw, 3000).unwrap_err(),
            ZapRequestError::AmountMismatch {
                tag_msat: 2000,
                query_msat: 3000
            }
        );

        let twice = zap_request(vec![
            tag(&["p", RECIPIENT]),
            tag(&["amount", "2000"]),
            tag(&["amount", "2000"]),
        ]);
        assert_eq!(
            validate_zap_request(&twice, 2000).unwrap_err(),
            ZapRequestError::MultipleAmounts
        );

        let garbage = zap_request(vec![tag(&["p", RECIPIENT]), tag(&["amount", "lots"])]);
        assert!(matches!(
            validate_zap_request(&garbage, 2000),
            Err(ZapRequestError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_error_text_is_user_facing() {
        let text = ZapRequestError::AmountMismatch {
            tag_msat: 1,
            query_msat: 2,
        }
        .to_string();
        assert!(text.contains("MUST be equal to the amount query parameter"));
    }
}
