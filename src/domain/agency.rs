//! Agency (tenant) profile used when rendering documents.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const DEFAULT_LEGAL_MENTIONS: &str = "Document generated via NexaPro";
pub const DEFAULT_CURRENCY: &str = "EUR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgencyType {
    RealEstate,
    Marketing,
}

impl AgencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgencyType::RealEstate => "real_estate",
            AgencyType::Marketing => "marketing",
        }
    }

    /// Kinds an agency of this type can generate from scratch.
    pub fn document_kinds(&self) -> &'static [&'static str] {
        match self {
            AgencyType::RealEstate => &["quote", "invoice", "mandate"],
            AgencyType::Marketing => &["quote", "invoice", "report"],
        }
    }

    /// Parses a stored tag. Unknown tags fall back to real estate.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "marketing" | "smma" => AgencyType::Marketing,
            _ => AgencyType::RealEstate,
        }
    }
}

impl fmt::Display for AgencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgencyProfile {
    pub tenant_id: Uuid,
    pub name: String,
    pub agency_type: AgencyType,
    pub legal_address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub siret: Option<String>,
    pub logo_url: Option<String>,
    pub legal_mentions: Option<String>,
    pub currency: Option<String>,
}

impl AgencyProfile {
    pub fn legal_mentions_or_default(&self) -> &str {
        self.legal_mentions
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_LEGAL_MENTIONS)
    }

    pub fn currency_or_default(&self) -> &str {
        self.currency
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(DEFAULT_CURRENCY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_legacy_agency_tags() {
        assert_eq!(AgencyType::parse("smma"), AgencyType::Marketing);
        assert_eq!(AgencyType::parse("immobilier"), AgencyType::RealEstate);
        assert_eq!(AgencyType::parse("marketing"), AgencyType::Marketing);
    }

    #[test]
    fn each_trade_has_its_own_kinds() {
        assert!(AgencyType::RealEstate.document_kinds().contains(&"mandate"));
        assert!(!AgencyType::RealEstate.document_kinds().contains(&"report"));
        assert!(AgencyType::Marketing.document_kinds().contains(&"report"));
    }

    #[test]
    fn blank_profile_fields_fall_back() {
        let profile = AgencyProfile {
            tenant_id: Uuid::new_v4(),
            name: "Agence du Port".to_string(),
            agency_type: AgencyType::RealEstate,
            legal_address: None,
            phone: None,
            email: None,
            siret: None,
            logo_url: None,
            legal_mentions: Some("  ".to_string()),
            currency: None,
        };
        assert_eq!(profile.legal_mentions_or_default(), DEFAULT_LEGAL_MENTIONS);
        assert_eq!(profile.currency_or_default(), "EUR");
    }
}
