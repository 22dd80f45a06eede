//! Identifier newtypes shared across the deal core.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id! {
    /// Unique identifier for a deal
    DealId
}

string_id! {
    /// Unique identifier for an extraction claim
    ClaimId
}

string_id! {
    /// Identifier of one extraction run over a source document
    ExtractionId
}

string_id! {
    /// Unique identifier for a source or generated document
    DocumentId
}

string_id! {
    /// Unique identifier for a document version
    DocumentVersionId
}

string_id! {
    /// Unique identifier for an approval record
    ApprovalId
}

string_id! {
    /// Unique identifier for an evidence pack
    EvidencePackId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(DealId::generate(), DealId::generate());
    }

    #[test]
    fn ids_round_trip_through_serde() {
        let id = ClaimId::new("claim-7");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"claim-7\"");
    }
}
