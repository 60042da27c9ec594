//! Built-in narration used when the narrative service is unavailable

use crate::combat::{AttackResolution, DamageReport, DeathSaveOutcome};

/// One line describing an attack and its consequences
pub fn attack_line(
    attacker: &str,
    target: &str,
    resolution: &AttackResolution,
    report: &DamageReport,
) -> String {
    let mut line = if resolution.is_fumble {
        format!("{} swings wildly at {} and fumbles.", attacker, target)
    } else if !resolution.is_hit {
        format!(
            "{} attacks {} but misses ({} vs AC {}).",
            attacker, target, resolution.attack_total, resolution.target_ac
        )
    } else if resolution.is_critical {
        format!(
            "{} lands a critical hit on {} for {} damage!",
            attacker, target, resolution.damage_total
        )
    } else {
        format!(
            "{} hits {} for {} damage.",
            attacker, target, resolution.damage_total
        )
    };

    if report.killed {
        line.push_str(&format!(" {} falls and does not rise.", target));
    } else if report.dropped {
        line.push_str(&format!(" {} collapses, unconscious.", target));
    } else if let Some(DeathSaveOutcome::Dying) = report.death {
        line.push_str(&format!(" {} slips closer to death.", target));
    }
    line
}

/// Narration for a monster turn that could not be resolved
pub fn fault_line(actor: &str) -> String {
    format!("{} hesitates, and the moment passes.", actor)
}

/// Narration for a monster with nobody left to attack
pub fn idle_line(actor: &str) -> String {
    format!("{} looks around for a foe but finds none standing.", actor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::Advantage;

    fn resolution(hit: bool, critical: bool, damage: i32) -> AttackResolution {
        AttackResolution {
            d20: if critical { 20 } else { 12 },
            attack_total: 16,
            target_ac: 15,
            advantage: Advantage::Normal,
            is_hit: hit,
            is_critical: critical,
            is_fumble: false,
            damage_rolls: vec![],
            damage_total: damage,
        }
    }

    #[test]
    fn test_attack_lines() {
        let report = DamageReport::default();
        assert_eq!(
            attack_line("Goblin", "Fighter", &resolution(true, false, 4), &report),
            "Goblin hits Fighter for 4 damage."
        );
        assert!(attack_line("Goblin", "Fighter", &resolution(false, false, 0), &report)
            .contains("misses"));
        assert!(attack_line("Goblin", "Fighter", &resolution(true, true, 9), &report)
            .contains("critical"));
    }

    #[test]
    fn test_consequence_suffix() {
        let report = DamageReport {
            dropped: true,
            ..DamageReport::default()
        };
        let line = attack_line("Orc", "Wizard", &resolution(true, false, 8), &report);
        assert!(line.ends_with("Wizard collapses, unconscious."));
    }
}
