//! Static metadata for the nine Lyon arrondissement chat zones.
//!
//! Labels and risk categories are presentation data only; sync logic never
//! consults them. Rooms are implicit: any id passed to the engine works,
//! unknown ids just render with a fallback label.

/// Risk category attached to a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskCategory {
    Seismic,
    Flood,
    SeismicAndFlood,
    Unknown,
}

impl RiskCategory {
    pub fn label(self) -> &'static str {
        match self {
            RiskCategory::Seismic => "Séisme",
            RiskCategory::Flood => "Inondation",
            RiskCategory::SeismicAndFlood => "Séisme + Inondation",
            RiskCategory::Unknown => "Inconnu",
        }
    }
}

/// One municipal zone, identified by its arrondissement id.
#[derive(Debug, Clone, Copy)]
pub struct Zone {
    pub id: &'static str,
    pub name: &'static str,
    pub risk: RiskCategory,
}

pub const ALL: [Zone; 9] = [
    Zone { id: "1", name: "Lyon 1er", risk: RiskCategory::SeismicAndFlood },
    Zone { id: "2", name: "Lyon 2ème", risk: RiskCategory::SeismicAndFlood },
    Zone { id: "3", name: "Lyon 3ème", risk: RiskCategory::Flood },
    Zone { id: "4", name: "Lyon 4ème", risk: RiskCategory::SeismicAndFlood },
    Zone { id: "5", name: "Lyon 5ème", risk: RiskCategory::Seismic },
    Zone { id: "6", name: "Lyon 6ème", risk: RiskCategory::Flood },
    Zone { id: "7", name: "Lyon 7ème", risk: RiskCategory::Flood },
    Zone { id: "8", name: "Lyon 8ème", risk: RiskCategory::Flood },
    Zone { id: "9", name: "Lyon 9ème", risk: RiskCategory::Seismic },
];

/// Display label for a zone id, with a fallback for unknown ids.
#[derive(Debug, Clone)]
pub struct ZoneLabel {
    pub name: String,
    pub risk: RiskCategory,
}

pub fn lookup(id: &str) -> ZoneLabel {
    ALL.iter()
        .find(|zone| zone.id == id)
        .map(|zone| ZoneLabel { name: zone.name.to_string(), risk: zone.risk })
        .unwrap_or_else(|| ZoneLabel { name: format!("Zone {id}"), risk: RiskCategory::Unknown })
}
