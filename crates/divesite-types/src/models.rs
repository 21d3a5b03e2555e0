use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A stored value that does not name any variant of the target enum.
#[derive(Debug, Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: impl fmt::Display) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// -- Sites --

/// The three kinds of geotagged place a user can register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteKind {
    Divesite,
    Slipway,
    Compressor,
}

impl SiteKind {
    pub const ALL: [SiteKind; 3] = [SiteKind::Divesite, SiteKind::Slipway, SiteKind::Compressor];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Divesite => "divesite",
            Self::Slipway => "slipway",
            Self::Compressor => "compressor",
        }
    }

    /// Collection segment used in URLs, e.g. `/divesites/{id}`.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Divesite => "divesites",
            Self::Slipway => "slipways",
            Self::Compressor => "compressors",
        }
    }
}

impl fmt::Display for SiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SiteKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "divesite" => Ok(Self::Divesite),
            "slipway" => Ok(Self::Slipway),
            "compressor" => Ok(Self::Compressor),
            other => Err(UnknownVariant::new("site kind", other)),
        }
    }
}

// -- Activity stream --

/// Anything an action can point at, either as its object or its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Divesite,
    Slipway,
    Compressor,
    Dive,
    Comment,
    Image,
    Profile,
}

impl ObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Divesite => "divesite",
            Self::Slipway => "slipway",
            Self::Compressor => "compressor",
            Self::Dive => "dive",
            Self::Comment => "comment",
            Self::Image => "image",
            Self::Profile => "profile",
        }
    }

    pub fn site_kind(self) -> Option<SiteKind> {
        match self {
            Self::Divesite => Some(SiteKind::Divesite),
            Self::Slipway => Some(SiteKind::Slipway),
            Self::Compressor => Some(SiteKind::Compressor),
            _ => None,
        }
    }
}

impl From<SiteKind> for ObjectKind {
    fn from(kind: SiteKind) -> Self {
        match kind {
            SiteKind::Divesite => Self::Divesite,
            SiteKind::Slipway => Self::Slipway,
            SiteKind::Compressor => Self::Compressor,
        }
    }
}

impl FromStr for ObjectKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dive" => Ok(Self::Dive),
            "comment" => Ok(Self::Comment),
            "image" => Ok(Self::Image),
            "profile" => Ok(Self::Profile),
            other => other
                .parse::<SiteKind>()
                .map(Self::from)
                .map_err(|_| UnknownVariant::new("object kind", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verb {
    #[serde(rename = "created")]
    Created,
    #[serde(rename = "logged a dive at")]
    LoggedDive,
    #[serde(rename = "commented on")]
    Commented,
    #[serde(rename = "added an image")]
    AddedImage,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::LoggedDive => "logged a dive at",
            Self::Commented => "commented on",
            Self::AddedImage => "added an image",
        }
    }
}

impl FromStr for Verb {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "logged a dive at" => Ok(Self::LoggedDive),
            "commented on" => Ok(Self::Commented),
            "added an image" => Ok(Self::AddedImage),
            other => Err(UnknownVariant::new("verb", other)),
        }
    }
}

// -- Divesite attributes --

/// Diver certification level a divesite is suited to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
}

impl TryFrom<u8> for Level {
    type Error = UnknownVariant;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Beginner),
            1 => Ok(Self::Intermediate),
            2 => Ok(Self::Advanced),
            other => Err(UnknownVariant::new("level", other)),
        }
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        match level {
            Level::Beginner => 0,
            Level::Intermediate => 1,
            Level::Advanced => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BottomType {
    #[serde(rename = "Blds")]
    Boulders,
    #[serde(rename = "Cl")]
    Clay,
    #[serde(rename = "Co")]
    Coral,
    #[serde(rename = "M")]
    Mud,
    #[serde(rename = "Rk")]
    Rocky,
    #[serde(rename = "S")]
    Sand,
}

impl BottomType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Boulders => "Blds",
            Self::Clay => "Cl",
            Self::Coral => "Co",
            Self::Mud => "M",
            Self::Rocky => "Rk",
            Self::Sand => "S",
        }
    }
}

impl FromStr for BottomType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Blds" => Ok(Self::Boulders),
            "Cl" => Ok(Self::Clay),
            "Co" => Ok(Self::Coral),
            "M" => Ok(Self::Mud),
            "Rk" => Ok(Self::Rocky),
            "S" => Ok(Self::Sand),
            other => Err(UnknownVariant::new("bottom type", other)),
        }
    }
}

/// Wind force on the Beaufort scale, 0 (calm) to 12 (hurricane).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Wind(u8);

impl Wind {
    pub const MAX: u8 = 12;

    pub fn force(self) -> u8 {
        self.0
    }

    pub fn description(self) -> &'static str {
        const NAMES: [&str; 13] = [
            "Calm",
            "Light air",
            "Light breeze",
            "Gentle breeze",
            "Moderate breeze",
            "Fresh breeze",
            "Strong breeze",
            "High wind",
            "Gale",
            "Strong gale",
            "Storm",
            "Violent storm",
            "Hurricane",
        ];
        NAMES[self.0 as usize]
    }
}

impl TryFrom<u8> for Wind {
    type Error = UnknownVariant;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value <= Self::MAX {
            Ok(Self(value))
        } else {
            Err(UnknownVariant::new("wind force", value))
        }
    }
}

impl From<Wind> for u8 {
    fn from(wind: Wind) -> Self {
        wind.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_kind_parses_site_kinds() {
        assert_eq!("slipway".parse::<ObjectKind>().unwrap(), ObjectKind::Slipway);
        assert_eq!("dive".parse::<ObjectKind>().unwrap(), ObjectKind::Dive);
        assert!("boat".parse::<ObjectKind>().is_err());
        assert_eq!(ObjectKind::from(SiteKind::Compressor).site_kind(), Some(SiteKind::Compressor));
        assert_eq!(ObjectKind::Image.site_kind(), None);
    }

    #[test]
    fn verbs_serialize_as_phrases() {
        let json = serde_json::to_string(&Verb::LoggedDive).unwrap();
        assert_eq!(json, "\"logged a dive at\"");
        assert_eq!("commented on".parse::<Verb>().unwrap(), Verb::Commented);
    }

    #[test]
    fn level_and_wind_reject_out_of_range() {
        assert!(serde_json::from_str::<Level>("2").is_ok());
        assert!(serde_json::from_str::<Level>("3").is_err());
        assert_eq!(serde_json::from_str::<Wind>("12").unwrap().description(), "Hurricane");
        assert!(serde_json::from_str::<Wind>("13").is_err());
    }

    #[test]
    fn bottom_type_uses_short_codes() {
        assert_eq!(serde_json::to_string(&BottomType::Rocky).unwrap(), "\"Rk\"");
        assert_eq!("Co".parse::<BottomType>().unwrap(), BottomType::Coral);
    }
}
