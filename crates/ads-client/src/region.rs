//! Marketplace and auth region model.
//!
//! Every marketplace authenticates against one of three OAuth realms and is
//! served by that realm's API endpoint. Region codes coming from the outside
//! world are parsed into closed enums; unknown codes are errors.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};

/// OAuth realm a marketplace authenticates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AuthRegion {
    #[serde(rename = "NA")]
    Na,
    #[serde(rename = "EU")]
    Eu,
    #[serde(rename = "FE")]
    Fe,
}

impl AuthRegion {
    pub const ALL: [AuthRegion; 3] = [AuthRegion::Na, AuthRegion::Eu, AuthRegion::Fe];

    pub fn code(&self) -> &'static str {
        match self {
            AuthRegion::Na => "NA",
            AuthRegion::Eu => "EU",
            AuthRegion::Fe => "FE",
        }
    }

    /// Default Advertising API endpoint for this realm.
    pub fn default_api_endpoint(&self) -> &'static str {
        match self {
            AuthRegion::Na => "https://advertising-api.amazon.com",
            AuthRegion::Eu => "https://advertising-api-eu.amazon.com",
            AuthRegion::Fe => "https://advertising-api-fe.amazon.com",
        }
    }

    /// Default Login with Amazon token endpoint for this realm.
    pub fn default_token_url(&self) -> &'static str {
        match self {
            AuthRegion::Na => "https://api.amazon.com/auth/o2/token",
            AuthRegion::Eu => "https://api.amazon.co.uk/auth/o2/token",
            AuthRegion::Fe => "https://api.amazon.co.jp/auth/o2/token",
        }
    }
}

impl fmt::Display for AuthRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for AuthRegion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NA" => Ok(AuthRegion::Na),
            "EU" => Ok(AuthRegion::Eu),
            "FE" => Ok(AuthRegion::Fe),
            other => Err(Error::new(ErrorKind::Config(format!(
                "Unknown auth region '{}'. Expected NA, EU or FE",
                other
            )))),
        }
    }
}

macro_rules! regions {
    ($($variant:ident => $code:literal, $auth:ident;)+) => {
        /// Country-level storefront.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum Region {
            $(
                #[serde(rename = $code)]
                $variant,
            )+
        }

        impl Region {
            pub const ALL: &'static [Region] = &[$(Region::$variant),+];

            /// Two-letter marketplace code (`US`, `DE`, ...).
            pub fn code(&self) -> &'static str {
                match self {
                    $(Region::$variant => $code,)+
                }
            }

            /// Auth realm this marketplace belongs to.
            pub fn auth_region(&self) -> AuthRegion {
                match self {
                    $(Region::$variant => AuthRegion::$auth,)+
                }
            }
        }

        impl FromStr for Region {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($code => Ok(Region::$variant),)+
                    // The UK storefront is commonly written as UK.
                    "UK" => Ok(Region::Gb),
                    other => Err(Error::new(ErrorKind::Config(format!(
                        "Unknown region '{}'",
                        other
                    )))),
                }
            }
        }
    };
}

regions! {
    Us => "US", Na;
    Ca => "CA", Na;
    Mx => "MX", Na;
    Br => "BR", Na;
    Gb => "GB", Eu;
    De => "DE", Eu;
    Fr => "FR", Eu;
    Es => "ES", Eu;
    It => "IT", Eu;
    Nl => "NL", Eu;
    Se => "SE", Eu;
    Pl => "PL", Eu;
    Be => "BE", Eu;
    Tr => "TR", Eu;
    Ae => "AE", Eu;
    Sa => "SA", Eu;
    Eg => "EG", Eu;
    In => "IN", Eu;
    Jp => "JP", Fe;
    Au => "AU", Fe;
    Sg => "SG", Fe;
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One marketplace's API configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionProfile {
    /// Advertising profile id sent as `Amazon-Advertising-API-Scope`.
    pub profile_id: String,
    /// Base URL for API calls.
    pub api_endpoint: String,
    /// Realm used to obtain credentials.
    pub auth_region: AuthRegion,
}

impl RegionProfile {
    /// Profile with the realm's default endpoint.
    pub fn new(region: Region, profile_id: impl Into<String>) -> Self {
        let auth_region = region.auth_region();
        Self {
            profile_id: profile_id.into(),
            api_endpoint: auth_region.default_api_endpoint().to_string(),
            auth_region,
        }
    }

    pub fn with_api_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.api_endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }
}

/// Immutable marketplace → profile table handed to the client at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionTable {
    profiles: BTreeMap<Region, RegionProfile>,
}

impl RegionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, region: Region, profile: RegionProfile) -> Self {
        self.profiles.insert(region, profile);
        self
    }

    /// Look up a configured region.
    pub fn get(&self, region: Region) -> Result<&RegionProfile> {
        self.profiles.get(&region).ok_or_else(|| {
            let available: Vec<&str> = self.profiles.keys().map(|r| r.code()).collect();
            Error::new(ErrorKind::Config(format!(
                "Region '{}' is not configured. Available: {}",
                region,
                available.join(", ")
            )))
        })
    }

    /// Configured regions in code order.
    pub fn regions(&self) -> Vec<Region> {
        self.profiles.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl FromIterator<(Region, RegionProfile)> for RegionTable {
    fn from_iter<I: IntoIterator<Item = (Region, RegionProfile)>>(iter: I) -> Self {
        Self {
            profiles: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_parsing() {
        assert_eq!("us".parse::<Region>().unwrap(), Region::Us);
        assert_eq!(" DE ".parse::<Region>().unwrap(), Region::De);
        assert_eq!("UK".parse::<Region>().unwrap(), Region::Gb);

        let err = "XX".parse::<Region>().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Config(_)));
    }

    #[test]
    fn test_auth_region_mapping() {
        assert_eq!(Region::Us.auth_region(), AuthRegion::Na);
        assert_eq!(Region::Ca.auth_region(), AuthRegion::Na);
        assert_eq!(Region::De.auth_region(), AuthRegion::Eu);
        assert_eq!(Region::Gb.auth_region(), AuthRegion::Eu);
        assert_eq!(Region::Jp.auth_region(), AuthRegion::Fe);
        assert_eq!(Region::Au.auth_region(), AuthRegion::Fe);
    }

    #[test]
    fn test_region_serde_uses_codes() {
        let json = serde_json::to_string(&Region::De).unwrap();
        assert_eq!(json, "\"DE\"");
        let parsed: AuthRegion = serde_json::from_str("\"FE\"").unwrap();
        assert_eq!(parsed, AuthRegion::Fe);
    }

    #[test]
    fn test_region_table_lookup() {
        let table = RegionTable::new()
            .with_profile(Region::Us, RegionProfile::new(Region::Us, "111"))
            .with_profile(Region::De, RegionProfile::new(Region::De, "222"));

        let us = table.get(Region::Us).unwrap();
        assert_eq!(us.profile_id, "111");
        assert_eq!(us.api_endpoint, "https://advertising-api.amazon.com");
        assert_eq!(table.get(Region::De).unwrap().auth_region, AuthRegion::Eu);

        let err = table.get(Region::Jp).unwrap_err();
        assert!(err.to_string().contains("US, DE"));
    }

    #[test]
    fn test_profile_endpoint_override_trims_slash() {
        let profile = RegionProfile::new(Region::Us, "1").with_api_endpoint("http://localhost:9000/");
        assert_eq!(profile.api_endpoint, "http://localhost:9000");
    }
}
