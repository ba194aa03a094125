//! Cron job resource (spec.md §4.6 + SPEC_FULL.md supplement): either a
//! standard 5-field crontab expression or an `every <N>m` shorthand whose
//! `N` must divide a day evenly.

use crate::diagnostics::{Diagnostic, DiagnosticList};
use crate::source::Position;

#[derive(Debug, Clone)]
pub struct CronJob {
    pub name: String,
    pub title: Option<String>,
    pub schedule: Schedule,
    /// The package the cron-decorated function lives in; `//encore:cron`
    /// targets the function it annotates directly, so this doubles as the
    /// job's "endpoint" for spec.md §4.10's service-membership check.
    pub package_import_path: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    Crontab(String),
    Every(u32),
}

/// Minutes values `every` accepts: every one must divide 1440 (minutes per
/// day) evenly so the job lands on the same wall-clock minutes every day
/// (SPEC_FULL.md supplement, grounded in the canonical resolution of the
/// "every" allowed-minutes open question in spec.md §9).
const ALLOWED_EVERY_MINUTES: &[u32] = &[
    1, 2, 3, 4, 5, 6, 8, 9, 10, 12, 15, 16, 18, 20, 24, 30, 32, 36, 40, 45, 48, 60, 72, 80, 90, 96, 120, 144, 160,
    180, 240, 288, 360, 480, 720, 1440,
];

/// Parses and validates a schedule string. `"every 15m"` is the shorthand
/// form; anything else is treated as a 5-field crontab expression and
/// validated only for field count (full crontab semantics are the build
/// toolchain's responsibility once emitted).
pub fn parse_schedule(raw: &str, position: Position, diags: &mut DiagnosticList) -> Schedule {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix("every ") {
        let rest = rest.trim();
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        let suffix = &rest[digits.len()..];
        let Ok(n) = digits.parse::<u32>() else {
            diags.report(Diagnostic::error(position, format!("invalid every-schedule {raw:?}")));
            return Schedule::Every(0);
        };
        if suffix.trim() != "m" {
            diags.report(Diagnostic::error(
                position,
                format!("every-schedule must use minute units, got {raw:?}"),
            ));
        }
        if !ALLOWED_EVERY_MINUTES.contains(&n) {
            let nearest = nearest_allowed(n);
            diags.report(
                Diagnostic::error(position, format!("every {n}m does not evenly divide a day"))
                    .with_suggestion(format!("every {nearest}m")),
            );
        }
        return Schedule::Every(n);
    }

    let field_count = trimmed.split_whitespace().count();
    if field_count != 5 {
        diags.report(Diagnostic::error(
            position,
            format!("cron expression must have 5 fields, got {field_count}"),
        ));
    }
    Schedule::Crontab(trimmed.to_string())
}

fn nearest_allowed(n: u32) -> u32 {
    *ALLOWED_EVERY_MINUTES
        .iter()
        .min_by_key(|&&candidate| candidate.abs_diff(n))
        .unwrap_or(&ALLOWED_EVERY_MINUTES[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> Position {
        Position::new(0, 0, 1, 1)
    }

    #[test]
    fn accepts_allowed_every_value() {
        let mut diags = DiagnosticList::new(10);
        let s = parse_schedule("every 15m", pos(), &mut diags);
        assert_eq!(s, Schedule::Every(15));
        assert!(!diags.has_errors());
    }

    #[test]
    fn rejects_non_divisor_with_suggestion() {
        let mut diags = DiagnosticList::new(10);
        let _ = parse_schedule("every 7m", pos(), &mut diags);
        assert!(diags.has_errors());
        let d = &diags.as_slice()[0];
        assert!(d.suggestion.is_some());
    }

    #[test]
    fn accepts_five_field_crontab() {
        let mut diags = DiagnosticList::new(10);
        let s = parse_schedule("0 9 * * *", pos(), &mut diags);
        assert_eq!(s, Schedule::Crontab("0 9 * * *".to_string()));
        assert!(!diags.has_errors());
    }

    #[test]
    fn rejects_wrong_field_count() {
        let mut diags = DiagnosticList::new(10);
        let _ = parse_schedule("0 9 * *", pos(), &mut diags);
        assert!(diags.has_errors());
    }
}
