//! Regions, care-home types and their regulators.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Jurisdiction a care home is registered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Region {
    England,
    Wales,
    Scotland,
    NorthernIreland,
    Ireland,
}

impl Region {
    pub const ALL: [Region; 5] = [
        Region::England,
        Region::Wales,
        Region::Scotland,
        Region::NorthernIreland,
        Region::Ireland,
    ];

    /// Parse a region label. Case, spaces and hyphens are ignored.
    pub fn parse(s: &str) -> Option<Self> {
        let key: String = s
            .trim()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c.to_ascii_uppercase() })
            .collect();
        match key.as_str() {
            "ENGLAND" => Some(Region::England),
            "WALES" => Some(Region::Wales),
            "SCOTLAND" => Some(Region::Scotland),
            "NORTHERN_IRELAND" | "NI" => Some(Region::NorthernIreland),
            "IRELAND" | "ROI" => Some(Region::Ireland),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::England => "ENGLAND",
            Region::Wales => "WALES",
            Region::Scotland => "SCOTLAND",
            Region::NorthernIreland => "NORTHERN_IRELAND",
            Region::Ireland => "IRELAND",
        }
    }

    /// Regulator inspecting children's homes in this region.
    pub fn children_regulator(&self) -> Regulator {
        match self {
            Region::England => Regulator::Ofsted,
            Region::Wales => Regulator::Ciw,
            Region::Scotland => Regulator::CareInspectorate,
            Region::NorthernIreland => Regulator::Rqia,
            Region::Ireland => Regulator::Hiqa,
        }
    }

    /// Regulator inspecting adult care homes in this region.
    pub fn adult_regulator(&self) -> Regulator {
        match self {
            Region::England => Regulator::Cqc,
            other => other.children_regulator(),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type of care home, which decides whether regulator checks apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CareHomeType {
    Adult,
    Children,
}

impl CareHomeType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "adult" | "adults" | "residential" | "nursing" => Some(CareHomeType::Adult),
            "children" | "childrens" | "children's" | "child" => Some(CareHomeType::Children),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CareHomeType::Adult => "ADULT",
            CareHomeType::Children => "CHILDREN",
        }
    }
}

/// Care inspection bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regulator {
    Cqc,
    Ofsted,
    Ciw,
    CareInspectorate,
    Rqia,
    Hiqa,
}

impl Regulator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regulator::Cqc => "CQC",
            Regulator::Ofsted => "OFSTED",
            Regulator::Ciw => "CIW",
            Regulator::CareInspectorate => "CARE_INSPECTORATE",
            Regulator::Rqia => "RQIA",
            Regulator::Hiqa => "HIQA",
        }
    }
}

impl fmt::Display for Regulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_region() {
        assert_eq!(Region::parse("ENGLAND"), Some(Region::England));
        assert_eq!(Region::parse("england"), Some(Region::England));
        assert_eq!(Region::parse("Northern Ireland"), Some(Region::NorthernIreland));
        assert_eq!(Region::parse("northern-ireland"), Some(Region::NorthernIreland));
        assert_eq!(Region::parse("ATLANTIS"), None);
        assert_eq!(Region::parse(""), None);
    }

    #[test]
    fn test_children_regulators() {
        assert_eq!(Region::England.children_regulator(), Regulator::Ofsted);
        assert_eq!(Region::Wales.children_regulator(), Regulator::Ciw);
        assert_eq!(Region::Scotland.children_regulator(), Regulator::CareInspectorate);
        assert_eq!(Region::NorthernIreland.children_regulator(), Regulator::Rqia);
        assert_eq!(Region::Ireland.children_regulator(), Regulator::Hiqa);
        assert_eq!(Region::England.adult_regulator(), Regulator::Cqc);
    }

    #[test]
    fn test_care_home_type() {
        assert_eq!(CareHomeType::parse("ADULT"), Some(CareHomeType::Adult));
        assert_eq!(CareHomeType::parse("children's"), Some(CareHomeType::Children));
        assert_eq!(CareHomeType::parse("hotel"), None);
    }
}
