//! Dice evaluator seam.
//!
//! The room logic only needs three things from a roll: a total, a summary
//! string, and the structured result tree. Everything about formula grammar
//! lives behind [`DiceEvaluator`]; the built-in [`TableDice`] understands
//! just `NdM`, `NdM+K`, and `NdM-K`, enough for the demo server and tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use dicehall_protocol::{DiceGroup, DieRoll, RollEntry, StructuredRolls};

/// Errors from formula evaluation. Never fatal to the room: the event is
/// still created with null result fields and the raw formula preserved.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// The formula did not parse.
    #[error("unparseable formula: {0}")]
    Parse(String),

    /// The formula parsed but asks for an unsupported size.
    #[error("formula out of range: {0}")]
    OutOfRange(String),
}

/// One evaluated roll.
#[derive(Debug, Clone)]
pub struct RollOutcome {
    /// Grand total.
    pub total: f64,
    /// Human-readable summary, e.g. `3d6: [4, 2, 6] = 12`.
    pub output: String,
    /// Structured result tree for the renderer.
    pub rolls: StructuredRolls,
}

/// Turns a formula string into a [`RollOutcome`].
///
/// Takes `&mut self` so implementations can own an RNG.
pub trait DiceEvaluator: Send + 'static {
    fn evaluate(&mut self, formula: &str) -> Result<RollOutcome, EvalError>;
}

const MAX_DICE: u32 = 100;
const MAX_SIDES: u32 = 1000;

/// Minimal `NdM±K` evaluator over a seedable RNG.
pub struct TableDice {
    rng: StdRng,
}

impl TableDice {
    /// OS-seeded evaluator for real use.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }

    /// Deterministic evaluator for tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for TableDice {
    fn default() -> Self {
        Self::new()
    }
}

impl DiceEvaluator for TableDice {
    fn evaluate(&mut self, formula: &str) -> Result<RollOutcome, EvalError> {
        let spec = parse(formula)?;

        let mut dice = Vec::with_capacity(spec.count as usize);
        let mut sum: i64 = 0;
        for _ in 0..spec.count {
            let value = self.rng.random_range(1..=spec.sides) as i64;
            sum += value;
            dice.push(DieRoll::plain(value as f64));
        }

        let faces: Vec<String> = dice.iter().map(|d| d.value.to_string()).collect();
        let total = sum + spec.modifier;

        let mut rolls: StructuredRolls = vec![RollEntry::Dice(DiceGroup {
            rolls: dice,
            value: sum as f64,
        })];
        let output = if spec.modifier == 0 {
            format!("{}: [{}] = {}", spec.display, faces.join(", "), total)
        } else {
            let (op, magnitude) = if spec.modifier > 0 {
                ("+", spec.modifier)
            } else {
                ("-", -spec.modifier)
            };
            rolls.push(RollEntry::Operator(op.to_owned()));
            rolls.push(RollEntry::Literal(magnitude as f64));
            format!(
                "{}: [{}] {} {} = {}",
                spec.display,
                faces.join(", "),
                op,
                magnitude,
                total
            )
        };

        Ok(RollOutcome {
            total: total as f64,
            output,
            rolls,
        })
    }
}

struct DiceSpec {
    display: String,
    count: u32,
    sides: u32,
    modifier: i64,
}

fn parse(formula: &str) -> Result<DiceSpec, EvalError> {
    let trimmed: String = formula.chars().filter(|c| !c.is_whitespace()).collect();
    if trimmed.is_empty() {
        return Err(EvalError::Parse(formula.to_owned()));
    }

    let (dice_part, modifier) = match trimmed
        .char_indices()
        .skip(1) // a leading sign would belong to the count
        .find(|(_, c)| *c == '+' || *c == '-')
    {
        Some((at, _)) => {
            let (head, tail) = trimmed.split_at(at);
            let modifier: i64 = tail
                .parse()
                .map_err(|_| EvalError::Parse(formula.to_owned()))?;
            (head.to_owned(), modifier)
        }
        None => (trimmed.clone(), 0),
    };

    let (count_str, sides_str) = dice_part
        .split_once(['d', 'D'])
        .ok_or_else(|| EvalError::Parse(formula.to_owned()))?;
    let count: u32 = if count_str.is_empty() {
        1
    } else {
        count_str
            .parse()
            .map_err(|_| EvalError::Parse(formula.to_owned()))?
    };
    let sides: u32 = sides_str
        .parse()
        .map_err(|_| EvalError::Parse(formula.to_owned()))?;

    if count == 0 || count > MAX_DICE || sides < 2 || sides > MAX_SIDES {
        return Err(EvalError::OutOfRange(formula.to_owned()));
    }

    Ok(DiceSpec {
        display: trimmed,
        count,
        sides,
        modifier,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_roll_is_in_range_and_consistent() {
        let mut dice = TableDice::seeded(7);
        let outcome = dice.evaluate("3d6").unwrap();

        assert!(outcome.total >= 3.0 && outcome.total <= 18.0);

        // The tree's dice sum to the total.
        let RollEntry::Dice(group) = &outcome.rolls[0] else {
            panic!("expected dice group");
        };
        let leaf_sum: f64 = group.rolls.iter().map(|d| d.value).sum();
        assert_eq!(leaf_sum, outcome.total);

        // Same seed, same dice.
        let again = TableDice::seeded(7).evaluate("3d6").unwrap();
        assert_eq!(again.total, outcome.total);
    }

    #[test]
    fn test_modifier_lands_in_tree_and_output() {
        let outcome = TableDice::seeded(1).evaluate("2d6+3").unwrap();

        assert_eq!(outcome.rolls.len(), 3);
        assert_eq!(outcome.rolls[1], RollEntry::Operator("+".into()));
        assert_eq!(outcome.rolls[2], RollEntry::Literal(3.0));
        assert!(outcome.output.contains("+ 3 ="), "{}", outcome.output);

        let RollEntry::Dice(group) = &outcome.rolls[0] else {
            panic!("expected dice group");
        };
        assert_eq!(group.value + 3.0, outcome.total);
    }

    #[test]
    fn test_output_format() {
        // Shape only; face values depend on the seed.
        let outcome = TableDice::seeded(3).evaluate(" 3d6 ").unwrap();
        assert!(outcome.output.starts_with("3d6: ["), "{}", outcome.output);
        assert!(outcome.output.contains("] = "), "{}", outcome.output);
    }

    #[test]
    fn test_bare_die_defaults_to_one() {
        let outcome = TableDice::seeded(5).evaluate("d20").unwrap();
        assert!(outcome.total >= 1.0 && outcome.total <= 20.0);
    }

    #[test]
    fn test_negative_modifier() {
        let outcome = TableDice::seeded(5).evaluate("1d6-2").unwrap();
        assert!(outcome.total >= -1.0 && outcome.total <= 4.0);
        assert_eq!(outcome.rolls[1], RollEntry::Operator("-".into()));
    }

    #[test]
    fn test_rejects_garbage_and_out_of_range() {
        let mut dice = TableDice::seeded(0);
        assert!(matches!(dice.evaluate("hello"), Err(EvalError::Parse(_))));
        assert!(matches!(dice.evaluate(""), Err(EvalError::Parse(_))));
        assert!(matches!(dice.evaluate("3dsix"), Err(EvalError::Parse(_))));
        assert!(matches!(
            dice.evaluate("0d6"),
            Err(EvalError::OutOfRange(_))
        ));
        assert!(matches!(
            dice.evaluate("1d1"),
            Err(EvalError::OutOfRange(_))
        ));
        assert!(matches!(
            dice.evaluate("101d6"),
            Err(EvalError::OutOfRange(_))
        ));
    }
}
