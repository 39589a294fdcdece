//! The structured roll-result tree.
//!
//! A formula evaluation produces a recursive tree: leaf dice groups holding
//! individual die outcomes (each tagged with modifier strings), composed
//! with operator tokens and literal numbers, optionally nested into
//! keep/drop sub-expression groups. The tree is immutable once built and
//! every node's `value` is fully determined by its children.
//!
//! On the wire and in storage the tree travels JSON-encoded inside
//! [`RoomEvent::rolls`](crate::RoomEvent). The serde shapes below match the
//! evaluator's output format exactly (`type` tags `"result"`,
//! `"roll-results"`, `"result-group"`, camelCase fields).

use serde::{Deserialize, Serialize};

/// Modifier strings that can appear on a die or group.
///
/// The evaluator emits these verbatim; the renderer keys its visual
/// classification off them.
pub mod modifier {
    pub const DROP: &str = "drop";
    pub const EXPLODE: &str = "explode";
    pub const RE_ROLL: &str = "re-roll";
    pub const CRITICAL_SUCCESS: &str = "critical-success";
    pub const CRITICAL_FAILURE: &str = "critical-failure";
    pub const TARGET_SUCCESS: &str = "target-success";
    pub const TARGET_FAILURE: &str = "target-failure";
}

/// The outcome of a single die.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "result", rename_all = "camelCase")]
pub struct DieRoll {
    /// The value after modifiers (e.g. post-explode).
    pub value: f64,
    /// The face that actually landed.
    pub initial_value: f64,
    /// The value used when summing the parent group.
    pub calculation_value: f64,
    /// Compact flag string, e.g. `"!"` for an explode, `"d"` for dropped.
    pub modifier_flags: String,
    /// Full modifier names; see [`modifier`].
    pub modifiers: Vec<String>,
    /// `false` when this die was dropped from the total.
    pub use_in_total: bool,
}

impl DieRoll {
    /// A plain, unmodified die showing `value`.
    pub fn plain(value: f64) -> Self {
        Self {
            value,
            initial_value: value,
            calculation_value: value,
            modifier_flags: String::new(),
            modifiers: Vec::new(),
            use_in_total: true,
        }
    }

    /// Whether this die carries the named modifier.
    pub fn has_modifier(&self, name: &str) -> bool {
        self.modifiers.iter().any(|m| m == name)
    }
}

/// A group of dice rolled together, such as the three dice of `3d6`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "roll-results")]
pub struct DiceGroup {
    pub rolls: Vec<DieRoll>,
    /// Sum of the member dice, respecting drops.
    pub value: f64,
}

/// A keep/drop sub-expression group, e.g. one arm of `{3d8, 2d10}k1`.
///
/// The outer container produced by roll-group notation has
/// `is_roll_group: true` and holds the inner per-expression groups as
/// children; inner groups carry their own `use_in_total` for group-level
/// keep/drop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "result-group", rename_all = "camelCase")]
pub struct RollGroup {
    pub is_roll_group: bool,
    pub modifier_flags: String,
    pub modifiers: Vec<String>,
    pub use_in_total: bool,
    pub calculation_value: f64,
    pub value: f64,
    pub results: Vec<RollEntry>,
}

/// One element of a roll expression.
///
/// A regular roll like `2d6+3` becomes
/// `[Dice(..), Operator("+"), Literal(3.0)]`; roll-group notation becomes a
/// single `Group` entry with `is_roll_group: true`.
///
/// Untagged: the struct variants disambiguate on their internal `type`
/// tags, strings become operators, numbers become literals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RollEntry {
    Dice(DiceGroup),
    Group(RollGroup),
    Operator(String),
    Literal(f64),
}

/// The top-level rolls array of one evaluation.
pub type StructuredRolls = Vec<RollEntry>;

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn die(value: f64, modifiers: &[&str], use_in_total: bool) -> DieRoll {
        DieRoll {
            value,
            initial_value: value,
            calculation_value: value,
            modifier_flags: String::new(),
            modifiers: modifiers.iter().map(|m| m.to_string()).collect(),
            use_in_total,
        }
    }

    #[test]
    fn test_die_roll_json_shape() {
        let json: serde_json::Value = serde_json::to_value(DieRoll::plain(4.0)).unwrap();
        assert_eq!(json["type"], "result");
        assert_eq!(json["initialValue"], 4.0);
        assert_eq!(json["calculationValue"], 4.0);
        assert_eq!(json["modifierFlags"], "");
        assert_eq!(json["useInTotal"], true);
    }

    #[test]
    fn test_dice_group_json_shape() {
        let group = DiceGroup { rolls: vec![DieRoll::plain(2.0)], value: 2.0 };
        let json: serde_json::Value = serde_json::to_value(&group).unwrap();
        assert_eq!(json["type"], "roll-results");
        assert_eq!(json["rolls"][0]["type"], "result");
    }

    #[test]
    fn test_roll_entry_untagged_dispatch() {
        // 2d6+3 shape: dice group, operator, literal.
        let json = r#"[
            {"type":"roll-results","value":7.0,"rolls":[
                {"type":"result","value":4.0,"initialValue":4.0,
                 "calculationValue":4.0,"modifierFlags":"","modifiers":[],
                 "useInTotal":true},
                {"type":"result","value":3.0,"initialValue":3.0,
                 "calculationValue":3.0,"modifierFlags":"","modifiers":[],
                 "useInTotal":true}
            ]},
            "+",
            3.0
        ]"#;
        let entries: StructuredRolls = serde_json::from_str(json).unwrap();
        assert!(matches!(entries[0], RollEntry::Dice(_)));
        assert_eq!(entries[1], RollEntry::Operator("+".into()));
        assert_eq!(entries[2], RollEntry::Literal(3.0));
    }

    #[test]
    fn test_nested_result_group_round_trip() {
        // {3d8, 2d10}k1 shape: an outer roll-group containing two inner
        // sub-expression groups, one of which was dropped by keep-highest.
        let kept = RollGroup {
            is_roll_group: false,
            modifier_flags: String::new(),
            modifiers: vec![],
            use_in_total: true,
            calculation_value: 14.0,
            value: 14.0,
            results: vec![RollEntry::Dice(DiceGroup {
                rolls: vec![die(6.0, &[], true), die(8.0, &[], true)],
                value: 14.0,
            })],
        };
        let dropped = RollGroup {
            is_roll_group: false,
            modifier_flags: "d".into(),
            modifiers: vec![modifier::DROP.into()],
            use_in_total: false,
            calculation_value: 5.0,
            value: 5.0,
            results: vec![RollEntry::Dice(DiceGroup {
                rolls: vec![die(5.0, &[], true)],
                value: 5.0,
            })],
        };
        let outer = RollGroup {
            is_roll_group: true,
            modifier_flags: "k".into(),
            modifiers: vec!["keep-highest".into()],
            use_in_total: true,
            calculation_value: 14.0,
            value: 14.0,
            results: vec![RollEntry::Group(kept), RollEntry::Group(dropped)],
        };

        let entries: StructuredRolls = vec![RollEntry::Group(outer)];
        let bytes = serde_json::to_vec(&entries).unwrap();
        let decoded: StructuredRolls = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(entries, decoded);

        let RollEntry::Group(group) = &decoded[0] else {
            panic!("expected result-group");
        };
        assert!(group.is_roll_group);
        assert_eq!(group.results.len(), 2);
    }

    #[test]
    fn test_has_modifier() {
        let d = die(8.0, &[modifier::EXPLODE], true);
        assert!(d.has_modifier(modifier::EXPLODE));
        assert!(!d.has_modifier(modifier::DROP));
    }
}
