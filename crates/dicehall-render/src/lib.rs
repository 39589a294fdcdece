//! Pure mapping from a roll-result tree to a display-ready structure.
//!
//! No I/O and no mutation: given an event's formula, stored rolls JSON, and
//! total, produce an annotated node sequence a frontend can walk directly.
//! Unparseable or absent rolls JSON degrades to a bare `formula = total`
//! rendering instead of failing.

use std::fmt;

use dicehall_protocol::{modifier, DieRoll, RollEntry, RollGroup, RoomEvent, StructuredRolls};

// ---------------------------------------------------------------------------
// Die classification
// ---------------------------------------------------------------------------

/// The single visual category assigned to one die outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DieTag {
    Plain,
    Dropped,
    CriticalSuccess,
    CriticalFailure,
    TargetSuccess,
    TargetFailure,
    Exploded,
    Rerolled,
}

/// Classifies a die into at most one category.
///
/// Fixed precedence: dropped beats everything, then critical
/// success/failure, then target success/failure, then explode, then
/// re-roll. A die dropped by a keep modifier stays visually "dropped" even
/// if it also exploded on the way.
pub fn classify(die: &DieRoll) -> DieTag {
    if !die.use_in_total || die.has_modifier(modifier::DROP) {
        DieTag::Dropped
    } else if die.has_modifier(modifier::CRITICAL_SUCCESS) {
        DieTag::CriticalSuccess
    } else if die.has_modifier(modifier::CRITICAL_FAILURE) {
        DieTag::CriticalFailure
    } else if die.has_modifier(modifier::TARGET_SUCCESS) {
        DieTag::TargetSuccess
    } else if die.has_modifier(modifier::TARGET_FAILURE) {
        DieTag::TargetFailure
    } else if die.has_modifier(modifier::EXPLODE) {
        DieTag::Exploded
    } else if die.has_modifier(modifier::RE_ROLL) {
        DieTag::Rerolled
    } else {
        DieTag::Plain
    }
}

// ---------------------------------------------------------------------------
// Rendered structure
// ---------------------------------------------------------------------------

/// One die, ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDie {
    pub value: f64,
    pub tag: DieTag,
}

/// One node of the rendered expression.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderNode {
    /// A run of dice chips (one `NdM` group).
    Dice(Vec<RenderedDie>),
    /// A keep/drop sub-expression with its computed value.
    Group {
        children: Vec<RenderNode>,
        value: f64,
        dropped: bool,
    },
    /// An operator token: `+`, `-`, `*`, `/`.
    Operator(String),
    /// A literal modifier, e.g. the 3 in `2d6+3`.
    Literal(f64),
}

/// How the total should be labeled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TotalLabel {
    /// A bare number.
    Number(f64),
    /// The roll used success/failure targets; the total counts successes.
    Successes(f64),
}

impl fmt::Display for TotalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Successes(n) if *n == 1.0 => write!(f, "{n} success"),
            Self::Successes(n) => write!(f, "{n} successes"),
        }
    }
}

/// A fully annotated roll, or the `formula = total` fallback when `nodes`
/// is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedRoll {
    pub formula: String,
    pub nodes: Vec<RenderNode>,
    pub total: TotalLabel,
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Renders an event's roll. Returns `None` for pure text messages (no
/// formula or no total — nothing to draw).
pub fn render_event(event: &RoomEvent) -> Option<RenderedRoll> {
    render(event.formula.as_deref(), event.rolls.as_deref(), event.total)
}

/// Renders a roll from its raw parts.
///
/// Absent or unparseable rolls JSON yields an empty node list — the caller
/// shows `formula = total` — rather than an error.
pub fn render(
    formula: Option<&str>,
    rolls_json: Option<&str>,
    total: Option<f64>,
) -> Option<RenderedRoll> {
    let formula = formula?;
    let total = total?;

    let entries = rolls_json.and_then(parse_rolls);
    let (nodes, targeted) = match &entries {
        Some(entries) => (entries.iter().map(render_entry).collect(), uses_targets(entries)),
        None => (Vec::new(), false),
    };

    let total = if targeted {
        TotalLabel::Successes(total)
    } else {
        TotalLabel::Number(total)
    };

    Some(RenderedRoll { formula: formula.to_owned(), nodes, total })
}

fn parse_rolls(json: &str) -> Option<StructuredRolls> {
    serde_json::from_str(json).ok()
}

fn render_entry(entry: &RollEntry) -> RenderNode {
    match entry {
        RollEntry::Dice(group) => RenderNode::Dice(
            group
                .rolls
                .iter()
                .map(|die| RenderedDie { value: die.value, tag: classify(die) })
                .collect(),
        ),
        RollEntry::Group(group) => render_group(group),
        RollEntry::Operator(op) => RenderNode::Operator(op.clone()),
        RollEntry::Literal(n) => RenderNode::Literal(*n),
    }
}

fn render_group(group: &RollGroup) -> RenderNode {
    RenderNode::Group {
        children: group.results.iter().map(render_entry).collect(),
        value: group.value,
        dropped: !group.use_in_total,
    }
}

/// Whether any die anywhere in the tree carries a target modifier.
fn uses_targets(entries: &[RollEntry]) -> bool {
    entries.iter().any(|entry| match entry {
        RollEntry::Dice(group) => group.rolls.iter().any(|die| {
            die.has_modifier(modifier::TARGET_SUCCESS)
                || die.has_modifier(modifier::TARGET_FAILURE)
        }),
        RollEntry::Group(group) => uses_targets(&group.results),
        RollEntry::Operator(_) | RollEntry::Literal(_) => false,
    })
}

// =========================================================================
// Tests
// =========================================================================
