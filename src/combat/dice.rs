//! Dice rolling system
//!
//! Parses and rolls dice notation like "2d6+3", "1d20", "d8-1" or a flat "4".
//! Every roll takes the caller's RNG so encounters can be replayed from a seed.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static DICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d*)d(\d+))?\s*(?:([+-])\s*(\d+))?$").expect("dice regex compiles")
});

static FLAT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+$").expect("flat regex compiles"));

/// Upper bound on dice in one expression; keeps a typo from allocating millions of rolls.
const MAX_DICE: u32 = 100;

/// Largest die accepted
pub const MAX_SIDES: u32 = 1000;

/// Largest flat modifier, in either direction, accepted in dice notation and
/// as an attack or initiative bonus
pub const MAX_MODIFIER: i32 = 1000;

/// Dice notation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("empty dice expression")]
    Empty,
    #[error("invalid dice expression: {0}")]
    Invalid(String),
    #[error("dice count must be between 1 and 100")]
    BadCount,
    #[error("die sides must be between 1 and 1000")]
    BadSides,
    #[error("modifier must be between -1000 and 1000")]
    BadModifier,
}

/// A parsed dice expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRoll {
    /// Number of dice to roll
    pub count: u32,
    /// Number of sides per die
    pub sides: u32,
    /// Modifier to add/subtract
    pub modifier: i32,
}

/// Individual dice plus the summed total
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceOutcome {
    pub rolls: Vec<u32>,
    pub modifier: i32,
    pub total: i32,
}

/// Roll mode for a d20 test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Advantage {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

impl Advantage {
    /// Combine two sources; opposing sources cancel out.
    pub fn combine(self, other: Advantage) -> Advantage {
        match (self, other) {
            (Advantage::Normal, x) | (x, Advantage::Normal) => x,
            (a, b) if a == b => a,
            _ => Advantage::Normal,
        }
    }
}

impl DiceRoll {
    /// Create a new dice roll
    pub fn new(count: u32, sides: u32, modifier: i32) -> Self {
        Self {
            count,
            sides,
            modifier,
        }
    }

    /// A flat amount with no dice
    pub fn flat(modifier: i32) -> Self {
        Self::new(0, 0, modifier)
    }

    /// Roll the dice and return individual results plus total
    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> DiceOutcome {
        self.roll_times(self.count, rng)
    }

    /// Critical roll: the dice count doubles, the flat modifier does not
    pub fn roll_critical<R: Rng + ?Sized>(&self, rng: &mut R) -> DiceOutcome {
        self.roll_times(self.count.saturating_mul(2), rng)
    }

    fn roll_times<R: Rng + ?Sized>(&self, count: u32, rng: &mut R) -> DiceOutcome {
        let rolls: Vec<u32> = if self.sides == 0 {
            Vec::new()
        } else {
            (0..count).map(|_| rng.random_range(1..=self.sides)).collect()
        };
        let sum: i64 = rolls.iter().map(|&r| i64::from(r)).sum();
        let total =
            (sum + i64::from(self.modifier)).clamp(i64::from(i32::MIN), i64::from(i32::MAX));

        DiceOutcome {
            total: total as i32,
            modifier: self.modifier,
            rolls,
        }
    }
}

impl FromStr for DiceRoll {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_dice(s)
    }
}

impl fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            return write!(f, "{}", self.modifier);
        }
        if self.modifier > 0 {
            write!(f, "{}d{}+{}", self.count, self.sides, self.modifier)
        } else if self.modifier < 0 {
            write!(f, "{}d{}{}", self.count, self.sides, self.modifier)
        } else {
            write!(f, "{}d{}", self.count, self.sides)
        }
    }
}

/// Parse a dice notation string like "2d6+3"
pub fn parse_dice(notation: &str) -> Result<DiceRoll, DiceError> {
    let notation = notation.trim().to_lowercase();
    if notation.is_empty() {
        return Err(DiceError::Empty);
    }

    if FLAT_RE.is_match(&notation) {
        let modifier = notation.parse().map_err(|_| DiceError::BadModifier)?;
        return Ok(DiceRoll::flat(check_modifier(modifier)?));
    }

    let caps = DICE_RE
        .captures(&notation)
        .ok_or_else(|| DiceError::Invalid(notation.clone()))?;

    // The regex allows a bare modifier ("+3"); require the dice part otherwise.
    let Some(sides) = caps.get(2) else {
        return Err(DiceError::Invalid(notation.clone()));
    };

    let count = match caps.get(1).map(|m| m.as_str()) {
        None | Some("") => 1, // "d6" means "1d6"
        Some(c) => c.parse().map_err(|_| DiceError::BadCount)?,
    };
    if count == 0 || count > MAX_DICE {
        return Err(DiceError::BadCount);
    }

    let sides: u32 = sides.as_str().parse().map_err(|_| DiceError::BadSides)?;
    if sides == 0 || sides > MAX_SIDES {
        return Err(DiceError::BadSides);
    }

    let modifier = match (caps.get(3), caps.get(4)) {
        (Some(sign), Some(value)) => {
            let value: i32 = value.as_str().parse().map_err(|_| DiceError::BadModifier)?;
            if sign.as_str() == "-" {
                -value
            } else {
                value
            }
        }
        _ => 0,
    };

    Ok(DiceRoll::new(count, sides, check_modifier(modifier)?))
}

fn check_modifier(modifier: i32) -> Result<i32, DiceError> {
    if (-MAX_MODIFIER..=MAX_MODIFIER).contains(&modifier) {
        Ok(modifier)
    } else {
        Err(DiceError::BadModifier)
    }
}

/// Roll a single d20
pub fn roll_d20<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    rng.random_range(1..=20)
}

/// Roll a d20 test under the given mode, returning the kept die
pub fn roll_d20_with<R: Rng + ?Sized>(rng: &mut R, mode: Advantage) -> u32 {
    let first = roll_d20(rng);
    match mode {
        Advantage::Normal => first,
        Advantage::Advantage => first.max(roll_d20(rng)),
        Advantage::Disadvantage => first.min(roll_d20(rng)),
    }
}

/// Check if a d20 roll is a natural 20 (critical hit)
pub fn is_critical(roll: u32) -> bool {
    roll == 20
}

/// Check if a d20 roll is a natural 1 (critical fail)
pub fn is_fumble(roll: u32) -> bool {
    roll == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_parse_basic() {
        let roll = parse_dice("2d6").unwrap();
        assert_eq!(roll, DiceRoll::new(2, 6, 0));
    }

    #[test]
    fn test_parse_modifiers() {
        assert_eq!(parse_dice("1d20+5").unwrap(), DiceRoll::new(1, 20, 5));
        assert_eq!(parse_dice("3d8-2").unwrap(), DiceRoll::new(3, 8, -2));
        assert_eq!(parse_dice("  2D10 + 3 ").unwrap(), DiceRoll::new(2, 10, 3));
    }

    #[test]
    fn test_parse_implicit_one_and_flat() {
        assert_eq!(parse_dice("d6").unwrap(), DiceRoll::new(1, 6, 0));
        assert_eq!(parse_dice("7").unwrap(), DiceRoll::flat(7));
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(parse_dice(""), Err(DiceError::Empty));
        assert!(parse_dice("abc").is_err());
        assert!(parse_dice("2d").is_err());
        assert!(parse_dice("+3").is_err());
        assert_eq!(parse_dice("0d6"), Err(DiceError::BadCount));
        assert_eq!(parse_dice("2d0"), Err(DiceError::BadSides));
        assert_eq!(parse_dice("500d6"), Err(DiceError::BadCount));
    }

    #[test]
    fn test_parse_rejects_huge_values() {
        assert_eq!(parse_dice("1d6+2147483647"), Err(DiceError::BadModifier));
        assert_eq!(parse_dice("1d6+99999999999"), Err(DiceError::BadModifier));
        assert_eq!(parse_dice("1d6-1001"), Err(DiceError::BadModifier));
        assert_eq!(parse_dice("2147483647"), Err(DiceError::BadModifier));
        assert_eq!(parse_dice("100d4294967295"), Err(DiceError::BadSides));
        assert_eq!(parse_dice("1d1001"), Err(DiceError::BadSides));
        assert_eq!(parse_dice("100d1000+1000").unwrap(), DiceRoll::new(100, 1000, 1000));
        assert_eq!(parse_dice("-1000").unwrap(), DiceRoll::flat(-1000));
    }

    #[test]
    fn test_roll_total_saturates() {
        let mut rng = StdRng::seed_from_u64(5);
        let out = DiceRoll::new(3, 1, i32::MAX).roll_critical(&mut rng);
        assert_eq!(out.rolls, vec![1; 6]);
        assert_eq!(out.total, i32::MAX);
    }

    #[test]
    fn test_roll_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let roll = DiceRoll::new(2, 6, 1);
        for _ in 0..200 {
            let out = roll.roll(&mut rng);
            assert_eq!(out.rolls.len(), 2);
            assert!((3..=13).contains(&out.total));
        }
    }

    #[test]
    fn test_critical_doubles_dice_not_modifier() {
        let mut rng = StdRng::seed_from_u64(11);
        let roll = DiceRoll::new(2, 6, 3);
        let out = roll.roll_critical(&mut rng);
        assert_eq!(out.rolls.len(), 4);
        let sum: u32 = out.rolls.iter().sum();
        assert_eq!(out.total, sum as i32 + 3);
    }

    #[test]
    fn test_flat_roll_has_no_dice() {
        let mut rng = StdRng::seed_from_u64(1);
        let out = DiceRoll::flat(4).roll_critical(&mut rng);
        assert!(out.rolls.is_empty());
        assert_eq!(out.total, 4);
    }

    #[test]
    fn test_display() {
        assert_eq!(DiceRoll::new(2, 6, 3).to_string(), "2d6+3");
        assert_eq!(DiceRoll::new(3, 8, -2).to_string(), "3d8-2");
        assert_eq!(DiceRoll::flat(5).to_string(), "5");
    }

    #[test]
    fn test_advantage_modes() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let r = roll_d20_with(&mut rng, Advantage::Advantage);
            assert!((1..=20).contains(&r));
        }
        assert_eq!(
            Advantage::Advantage.combine(Advantage::Disadvantage),
            Advantage::Normal
        );
        assert_eq!(
            Advantage::Normal.combine(Advantage::Disadvantage),
            Advantage::Disadvantage
        );
    }

    #[test]
    fn test_critical_fumble() {
        assert!(is_critical(20));
        assert!(!is_critical(19));
        assert!(is_fumble(1));
        assert!(!is_fumble(2));
    }
}
