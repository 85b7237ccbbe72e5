//! Unit tests for the Identifiers module

use core_kernel::{AccountId, InvoiceId, TransactionId};
use uuid::Uuid;

mod account_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        assert_ne!(AccountId::new(), AccountId::new());
    }

    #[test]
    fn test_new_ids_are_time_ordered() {
        let id1 = AccountId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = AccountId::new();
        assert!(id1 < id2);
    }

    #[test]
    fn test_display_has_prefix() {
        let uuid = Uuid::new_v4();
        let id = AccountId::from_uuid(uuid);
        assert_eq!(id.to_string(), format!("ACC-{}", uuid));
    }

    #[test]
    fn test_parse_with_and_without_prefix() {
        let id = AccountId::new();
        let with_prefix: AccountId = id.to_string().parse().unwrap();
        let bare: AccountId = id.as_uuid().to_string().parse().unwrap();
        assert_eq!(with_prefix, id);
        assert_eq!(bare, id);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("ACC-not-a-uuid".parse::<AccountId>().is_err());
    }

    #[test]
    fn test_uuid_conversions() {
        let uuid = Uuid::new_v4();
        let id: AccountId = uuid.into();
        let back: Uuid = id.into();
        assert_eq!(uuid, back);
    }
}

mod prefixes {
    use super::*;

    #[test]
    fn test_each_entity_has_its_own_prefix() {
        assert_eq!(AccountId::prefix(), "ACC");
        assert_eq!(InvoiceId::prefix(), "INV");
        assert_eq!(TransactionId::prefix(), "TX");
    }

    #[test]
    fn test_foreign_prefix_is_rejected() {
        let invoice = InvoiceId::new();
        assert!(invoice.to_string().parse::<TransactionId>().is_err());
    }
}

mod serialization {
    use super::*;

    #[test]
    fn test_json_is_bare_uuid() {
        let uuid = Uuid::new_v4();
        let json = serde_json::to_string(&TransactionId::from_uuid(uuid)).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));
    }
}
