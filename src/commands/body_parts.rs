//! Two independent ways of naming the groups of an avatar mesh.
//!
//! [`BodyPart`] is an exact lookup of the `Player1`..`Player15` / `Handle1`
//! group names and feeds the mapping text files. [`PartKind`] is a loose
//! keyword match over any group name and feeds `metadata.json` and the 3D
//! README. The two schemes disagree for several groups (`Player7` is a left
//! hand in one and a hat in the other) and are kept separate on purpose.

use serde::{Deserialize, Serialize};

// ── Exact-name table ────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyPart {
    HeadFace,
    TorsoFront,
    TorsoBack,
    LeftArmUpper,
    RightArmUpper,
    LeftArmLower,
    RightArmLower,
    LeftHand,
    RightHand,
    LeftLegUpper,
    RightLegUpper,
    LeftLegLower,
    RightLegLower,
    LeftFoot,
    RightFoot,
    AccessoryHandle,
    Unknown,
}

const GROUP_TABLE: [(&str, BodyPart); 16] = [
    ("Player1", BodyPart::HeadFace),
    ("Player2", BodyPart::TorsoFront),
    ("Player3", BodyPart::LeftArmUpper),
    ("Player4", BodyPart::RightArmUpper),
    ("Player5", BodyPart::LeftArmLower),
    ("Player6", BodyPart::RightArmLower),
    ("Player7", BodyPart::LeftHand),
    ("Player8", BodyPart::RightHand),
    ("Player9", BodyPart::TorsoBack),
    ("Player10", BodyPart::LeftLegUpper),
    ("Player11", BodyPart::RightLegUpper),
    ("Player12", BodyPart::LeftLegLower),
    ("Player13", BodyPart::RightLegLower),
    ("Player14", BodyPart::LeftFoot),
    ("Player15", BodyPart::RightFoot),
    ("Handle1", BodyPart::AccessoryHandle),
];

/// Anatomical bucket used to section the mapping report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Region {
    HeadFace,
    Torso,
    ArmHand,
    LegFoot,
    Accessory,
    Unknown,
}

impl Region {
    pub const ALL: [Region; 6] = [
        Region::HeadFace,
        Region::Torso,
        Region::ArmHand,
        Region::LegFoot,
        Region::Accessory,
        Region::Unknown,
    ];

    pub fn heading(self) -> &'static str {
        match self {
            Region::HeadFace => "🟡 HEAD & FACE REGION",
            Region::Torso => "🟢 TORSO REGION",
            Region::ArmHand => "🔵 ARM & HAND REGION",
            Region::LegFoot => "🟣 LEG & FOOT REGION",
            Region::Accessory => "⭐ ACCESSORY REGION",
            Region::Unknown => "❓ UNKNOWN REGION",
        }
    }

    pub fn stat_label(self) -> &'static str {
        match self {
            Region::HeadFace => "Head/Face",
            Region::Torso => "Torso",
            Region::ArmHand => "Arms/Hands",
            Region::LegFoot => "Legs/Feet",
            Region::Accessory => "Accessories",
            Region::Unknown => "Unclassified",
        }
    }
}

impl BodyPart {
    /// Exact, case-sensitive lookup. Anything outside the table is `Unknown`.
    pub fn from_group_name(name: &str) -> Self {
        GROUP_TABLE
            .iter()
            .find(|(group, _)| *group == name)
            .map(|(_, part)| *part)
            .unwrap_or(BodyPart::Unknown)
    }

    pub fn label(self) -> &'static str {
        match self {
            BodyPart::HeadFace => "Head/Face",
            BodyPart::TorsoFront => "Torso Front",
            BodyPart::TorsoBack => "Torso Back",
            BodyPart::LeftArmUpper => "Left Arm Upper",
            BodyPart::RightArmUpper => "Right Arm Upper",
            BodyPart::LeftArmLower => "Left Arm Lower",
            BodyPart::RightArmLower => "Right Arm Lower",
            BodyPart::LeftHand => "Left Hand",
            BodyPart::RightHand => "Right Hand",
            BodyPart::LeftLegUpper => "Left Leg Upper",
            BodyPart::RightLegUpper => "Right Leg Upper",
            BodyPart::LeftLegLower => "Left Leg Lower",
            BodyPart::RightLegLower => "Right Leg Lower",
            BodyPart::LeftFoot => "Left Foot",
            BodyPart::RightFoot => "Right Foot",
            BodyPart::AccessoryHandle => "Accessory Handle",
            BodyPart::Unknown => "Unknown",
        }
    }

    /// Colored marker shown in front of each mapping line.
    pub fn glyph(self) -> &'static str {
        match self {
            BodyPart::HeadFace => "🟡",
            BodyPart::TorsoFront | BodyPart::TorsoBack => "🟢",
            BodyPart::LeftArmUpper | BodyPart::RightArmUpper => "🔵",
            BodyPart::LeftArmLower | BodyPart::RightArmLower => "🔷",
            BodyPart::LeftHand | BodyPart::RightHand => "🟦",
            BodyPart::LeftLegUpper | BodyPart::RightLegUpper => "🟣",
            BodyPart::LeftLegLower | BodyPart::RightLegLower => "🟪",
            BodyPart::LeftFoot | BodyPart::RightFoot => "🟫",
            BodyPart::AccessoryHandle => "⭐",
            BodyPart::Unknown => "❓",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            BodyPart::HeadFace => "Head and face area (helmets, hats, glasses)",
            BodyPart::TorsoFront => "Upper body front (shirt and jacket front design)",
            BodyPart::TorsoBack => "Upper body back (back decorations, bags, wings)",
            BodyPart::LeftArmUpper => "Left upper arm (sleeve design)",
            BodyPart::RightArmUpper => "Right upper arm (sleeve design)",
            BodyPart::LeftArmLower => "Left forearm (bracelets, glove joint)",
            BodyPart::RightArmLower => "Right forearm (bracelets, glove joint)",
            BodyPart::LeftHand => "Left hand (gloves, rings)",
            BodyPart::RightHand => "Right hand (gloves, rings)",
            BodyPart::LeftLegUpper => "Left thigh (upper trousers)",
            BodyPart::RightLegUpper => "Right thigh (upper trousers)",
            BodyPart::LeftLegLower => "Left shin (lower trousers, sock top)",
            BodyPart::RightLegLower => "Right shin (lower trousers, sock top)",
            BodyPart::LeftFoot => "Left foot (shoes, socks)",
            BodyPart::RightFoot => "Right foot (shoes, socks)",
            BodyPart::AccessoryHandle => "Accessory handle (attachment point for tools and weapons)",
            BodyPart::Unknown => "Unrecognized body part",
        }
    }

    /// Sort key for the simple mapping file: head first, handle last, unknown after.
    pub fn priority(self) -> u8 {
        match self {
            BodyPart::HeadFace => 1,
            BodyPart::TorsoFront => 2,
            BodyPart::TorsoBack => 3,
            BodyPart::LeftArmUpper => 4,
            BodyPart::RightArmUpper => 5,
            BodyPart::LeftArmLower => 6,
            BodyPart::RightArmLower => 7,
            BodyPart::LeftHand => 8,
            BodyPart::RightHand => 9,
            BodyPart::LeftLegUpper => 10,
            BodyPart::RightLegUpper => 11,
            BodyPart::LeftLegLower => 12,
            BodyPart::RightLegLower => 13,
            BodyPart::LeftFoot => 14,
            BodyPart::RightFoot => 15,
            BodyPart::AccessoryHandle => 16,
            BodyPart::Unknown => 99,
        }
    }

    pub fn region(self) -> Region {
        match self {
            BodyPart::HeadFace => Region::HeadFace,
            BodyPart::TorsoFront | BodyPart::TorsoBack => Region::Torso,
            BodyPart::LeftArmUpper
            | BodyPart::RightArmUpper
            | BodyPart::LeftArmLower
            | BodyPart::RightArmLower
            | BodyPart::LeftHand
            | BodyPart::RightHand => Region::ArmHand,
            BodyPart::LeftLegUpper
            | BodyPart::RightLegUpper
            | BodyPart::LeftLegLower
            | BodyPart::RightLegLower
            | BodyPart::LeftFoot
            | BodyPart::RightFoot => Region::LegFoot,
            BodyPart::AccessoryHandle => Region::Accessory,
            BodyPart::Unknown => Region::Unknown,
        }
    }
}

// ── Keyword table ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartKind {
    Head,
    Torso,
    LeftArm,
    RightArm,
    LeftLeg,
    RightLeg,
    Hat,
    Hair,
    Face,
    Shirt,
    Pants,
    Shoes,
    Accessory,
    Handle,
    #[default]
    Unknown,
}

// Order matters: the first kind with a matching keyword wins, so
// "player10" (which contains "player1") is a head.
const KEYWORD_TABLE: [(PartKind, &[&str]); 14] = [
    (PartKind::Head, &["player1", "head"]),
    (PartKind::Torso, &["player2", "torso", "chest"]),
    (PartKind::LeftArm, &["player3", "leftarm", "left_arm"]),
    (PartKind::RightArm, &["player4", "rightarm", "right_arm"]),
    (PartKind::LeftLeg, &["player5", "leftleg", "left_leg"]),
    (PartKind::RightLeg, &["player6", "rightleg", "right_leg"]),
    (PartKind::Hat, &["player7", "hat", "cap", "helmet"]),
    (PartKind::Hair, &["player8", "hair"]),
    (PartKind::Face, &["player9", "face"]),
    (PartKind::Shirt, &["player10", "shirt", "top"]),
    (PartKind::Pants, &["player11", "pants", "bottom"]),
    (PartKind::Shoes, &["player12", "shoes", "boot"]),
    (
        PartKind::Accessory,
        &["player13", "player14", "player15", "accessory", "gear"],
    ),
    (PartKind::Handle, &["handle", "grip", "tool"]),
];

impl PartKind {
    pub fn classify(group_name: &str) -> Self {
        let lower = group_name.to_lowercase();
        KEYWORD_TABLE
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(kind, _)| *kind)
            .unwrap_or(PartKind::Unknown)
    }

    /// The snake_case identifier, as written to JSON.
    pub fn as_str(self) -> &'static str {
        match self {
            PartKind::Head => "head",
            PartKind::Torso => "torso",
            PartKind::LeftArm => "left_arm",
            PartKind::RightArm => "right_arm",
            PartKind::LeftLeg => "left_leg",
            PartKind::RightLeg => "right_leg",
            PartKind::Hat => "hat",
            PartKind::Hair => "hair",
            PartKind::Face => "face",
            PartKind::Shirt => "shirt",
            PartKind::Pants => "pants",
            PartKind::Shoes => "shoes",
            PartKind::Accessory => "accessory",
            PartKind::Handle => "handle",
            PartKind::Unknown => "unknown",
        }
    }

    /// Title-cased form for README headings ("left_arm" → "Left Arm").
    pub fn title(self) -> String {
        self.as_str()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
