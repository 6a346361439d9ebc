use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of customer account.
///
/// Only single-session (anonymous) customers are ever purged. Registered
/// customers are kept regardless of age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    /// Anonymous shopper created for a single browsing session
    SingleSession,
    /// Customer with credentials
    Registered,
}

impl CustomerType {
    /// Convert to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerType::SingleSession => "single_session",
            CustomerType::Registered => "registered",
        }
    }
}

impl std::fmt::Display for CustomerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CustomerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single_session" => Ok(CustomerType::SingleSession),
            "registered" => Ok(CustomerType::Registered),
            _ => Err(format!("Invalid customer type: {}", s)),
        }
    }
}

/// Identifier of one anonymous-customer aggregate selected for purging.
///
/// Carries both keys the dependent record sets use to reference their owner:
/// the numeric uid and the guid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateId {
    pub uid: i64,
    pub guid: Uuid,
}

impl std::fmt::Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.uid)
    }
}

/// Shopping cart keys, resolved from a shopper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartRef {
    pub id: i64,
    pub guid: Uuid,
}

/// A cart line item and the bundle parent it belongs to, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineItem {
    pub id: i64,
    pub parent_item_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_type_round_trips_through_storage_string() {
        for ty in [CustomerType::SingleSession, CustomerType::Registered] {
            assert_eq!(ty.as_str().parse::<CustomerType>(), Ok(ty));
        }
    }

    #[test]
    fn test_customer_type_rejects_unknown() {
        let err = "guest".parse::<CustomerType>().unwrap_err();
        assert!(err.contains("guest"));
    }
}
