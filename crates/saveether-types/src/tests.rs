// Cross-module tests for the types crate

#[cfg(test)]
mod tests {
    use crate::*;
    use proptest::prelude::*;

    #[test]
    fn test_event_serialization() {
        let event = SavingEvent::SavingSuccessful {
            depositor: AccountId::from_label("owner"),
            amount: Amount::from_wei(1),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "SavingSuccessful");
        assert_eq!(json["amount"], 1);
        assert_eq!(json["depositor"], AccountId::from_label("owner").to_string());

        let back: SavingEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_account_id_json_is_hex_string() {
        let id = AccountId::from_label("other");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));

        let bad: std::result::Result<AccountId, _> = serde_json::from_str("\"0xnothex\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(SavingsError::ZeroAmount.to_string(), "can't save zero value");

        let err = SavingsError::InsufficientBalance {
            account: AccountId::ZERO,
            available: Amount::from_wei(1),
            requested: Amount::from_wei(3),
        };
        assert!(err.to_string().contains("available=1"));
        assert!(err.to_string().contains("requested=3"));
    }

    #[test]
    fn test_event_accessors() {
        let event = SavingEvent::SavingSentOut {
            sender: AccountId::from_label("a"),
            recipient: AccountId::from_label("b"),
            amount: Amount::from_wei(3),
        };
        assert_eq!(event.name(), "SavingSentOut");
        assert_eq!(event.amount(), Amount::from_wei(3));
        assert!(event.to_string().starts_with("SavingSentOut(0x"));
    }

    proptest! {
        #[test]
        fn prop_add_then_sub_restores(a in any::<u64>(), b in any::<u64>()) {
            let x = Amount::from(a);
            let y = Amount::from(b);
            let sum = x.checked_add(y).unwrap();
            prop_assert_eq!(sum.checked_sub(y), Some(x));
            prop_assert!(sum >= x);
        }

        #[test]
        fn prop_account_hex_parses_back(bytes in any::<[u8; 20]>()) {
            let id = AccountId::from_bytes(bytes);
            prop_assert_eq!(id.to_string().parse::<AccountId>().unwrap(), id);
        }
    }
}
