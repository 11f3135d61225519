//! Carrier policy shims and per-room priors.
//!
//! Both tables are optional knowledge inputs. Policy shims force certain
//! facts to be asked first for a carrier (optionally refined by province)
//! and room; room priors seed the posterior with non-uniform weights.

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

const CARRIER_KEY_PATTERN: &str = r"^carrier:(\d+)(?::province:(\d+))?$";

fn carrier_key_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(CARRIER_KEY_PATTERN)
            .map_err(|e| warn!(error = %e, "invalid carrier key pattern"))
            .ok()
    })
    .as_ref()
}

fn normalize_room(room: &str) -> String {
    room.trim().to_ascii_uppercase()
}

/// A must-ask list as written in the policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MustAskEntry {
    /// `["fact", ...]`
    Plain(Vec<String>),
    /// `{"must_asks": ["fact", ...]}`
    Wrapped {
        #[serde(default)]
        must_asks: Vec<String>,
    },
}

impl MustAskEntry {
    fn into_list(self) -> Vec<String> {
        match self {
            Self::Plain(list) => list,
            Self::Wrapped { must_asks } => must_asks,
        }
    }
}

/// Raw policy-shim document: `"carrier:<id>"` -> room type -> must-ask list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyShims(pub BTreeMap<String, BTreeMap<String, MustAskEntry>>);

/// Carrier discriminator parsed from a policy key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CarrierKey {
    pub carrier: u32,
    /// Present only for province refinements.
    pub province: Option<u32>,
}

impl CarrierKey {
    /// Parses `carrier:<c>` or `carrier:<c>:province:<p>`.
    #[must_use]
    pub fn parse(key: &str) -> Option<Self> {
        let caps = carrier_key_regex()?.captures(key.trim())?;
        let carrier = caps.get(1)?.as_str().parse().ok()?;
        let province = match caps.get(2) {
            Some(m) => Some(m.as_str().parse().ok()?),
            None => None,
        };
        Some(Self { carrier, province })
    }
}

/// Policy shims indexed for lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyTable {
    by_key: HashMap<CarrierKey, BTreeMap<String, Vec<String>>>,
}

impl PolicyTable {
    /// Indexes a policy document. Keys that are not carrier keys are skipped.
    #[must_use]
    pub fn from_shims(shims: PolicyShims) -> Self {
        let mut by_key = HashMap::new();
        for (raw_key, rooms) in shims.0 {
            let Some(key) = CarrierKey::parse(&raw_key) else {
                warn!(key = %raw_key, "ignoring malformed policy shim key");
                continue;
            };
            let rooms: BTreeMap<String, Vec<String>> = rooms
                .into_iter()
                .map(|(room, entry)| (normalize_room(&room), entry.into_list()))
                .collect();
            by_key.insert(key, rooms);
        }
        Self { by_key }
    }

    /// Ordered must-ask facts for a carrier/province/room combination.
    ///
    /// A province-specific entry wins over the carrier-wide one. Returns an
    /// empty slice when nothing is configured.
    #[must_use]
    pub fn must_asks(&self, carrier: u32, province: Option<u32>, room: &str) -> &[String] {
        let room = normalize_room(room);
        let lookup = |key: CarrierKey| {
            self.by_key
                .get(&key)
                .and_then(|rooms| rooms.get(&room))
                .filter(|list| !list.is_empty())
        };

        province
            .and_then(|p| lookup(CarrierKey { carrier, province: Some(p) }))
            .or_else(|| lookup(CarrierKey { carrier, province: None }))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// Room type -> cluster id -> non-negative prior weight.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomPriors(pub BTreeMap<String, BTreeMap<String, f64>>);

impl RoomPriors {
    /// Weights for a room, matched case-insensitively.
    #[must_use]
    pub fn for_room(&self, room: &str) -> Option<&BTreeMap<String, f64>> {
        let room = room.trim();
        self.0
            .iter()
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(room))
            .map(|(_, weights)| weights)
    }
}
