//! Oracle reply grammar.
//!
//! Each non-blank line is read on its own and is one of:
//!
//! - an assignment, `Compound => Group`
//! - a move, `move <compound> from <old group> to <new group>`
//! - anything else, which is rejected with a warning
//!
//! Parsing never fails. A line that cannot be turned into a command becomes a
//! [`Warning`] and the rest of the reply is still read.

use std::fmt;
use std::sync::LazyLock;

use lipidsort_shared::NormalizationKey;
use regex::Regex;

use crate::session::SessionState;

/// Leading bullet or numbering the oracle likes to add (`- `, `* `, `3. `).
static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+").expect("valid regex"));

static MOVE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bmove\b").expect("valid regex"));

static FROM_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bfrom\b").expect("valid regex"));

static TO_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bto\b").expect("valid regex"));

const ASSIGN_TOKEN: &str = "=>";

/// A store mutation proposed by the oracle and validated against the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationCommand {
    Assign {
        key: NormalizationKey,
        group: String,
    },
    Move {
        key: NormalizationKey,
        from: String,
        to: String,
    },
}

/// A recoverable problem with one reply line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// The line looked like a command but did not split into its parts.
    Malformed { line: String },
    /// The compound does not match anything in the input.
    Unrecognized { compound: String },
    /// The compound was already placed; the assignment was ignored.
    AlreadySorted { compound: String },
    /// The compound is not in the group the move names as its origin.
    MoveFailed { compound: String, group: String },
    /// The line is neither an assignment nor a move.
    NoCommand { line: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { line } => write!(f, "could not split line into a command: '{line}'"),
            Self::Unrecognized { compound } => write!(f, "compound '{compound}' not recognized"),
            Self::AlreadySorted { compound } => {
                write!(f, "skipping '{compound}'; already sorted into a group")
            }
            Self::MoveFailed { compound, group } => {
                write!(f, "move failed; compound '{compound}' not found in group '{group}'")
            }
            Self::NoCommand { line } => write!(f, "no valid command found in line: '{line}'"),
        }
    }
}

/// What a single line turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Blank,
    Command(MutationCommand),
    Warning(Warning),
}

/// Commands and warnings for a whole reply, in line order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedReply {
    pub commands: Vec<MutationCommand>,
    pub warnings: Vec<Warning>,
}

/// Parse every line of `text` against a fixed snapshot of the session.
///
/// Moves are validated against the store as it is now, so a move of a
/// compound assigned earlier in the same reply is rejected here. Use
/// [`SessionState::apply_reply`] to apply lines as they are read.
pub fn parse_reply(text: &str, state: &SessionState) -> ParsedReply {
    let mut parsed = ParsedReply::default();
    for line in text.lines() {
        match parse_line(line, state) {
            LineOutcome::Blank => {}
            LineOutcome::Command(cmd) => parsed.commands.push(cmd),
            LineOutcome::Warning(w) => parsed.warnings.push(w),
        }
    }
    parsed
}

/// Classify and validate one reply line.
pub fn parse_line(line: &str, state: &SessionState) -> LineOutcome {
    let original = line.trim();
    if original.is_empty() {
        return LineOutcome::Blank;
    }
    let body = LIST_MARKER.replace(original, "");
    let body = body.trim();

    if body.contains(ASSIGN_TOKEN) {
        return parse_assignment(original, body, state);
    }
    if MOVE_WORD.is_match(body) {
        return parse_move(original, body, state);
    }

    LineOutcome::Warning(Warning::NoCommand {
        line: original.to_string(),
    })
}

fn parse_assignment(original: &str, body: &str, state: &SessionState) -> LineOutcome {
    let Some((compound, group)) = body.split_once(ASSIGN_TOKEN) else {
        return malformed(original);
    };
    let compound = compound.trim();
    let group = clean_label(group);
    if compound.is_empty() || group.is_empty() {
        return malformed(original);
    }

    let Some(key) = state.known().resolve(&compound.replace('-', "")) else {
        return LineOutcome::Warning(Warning::Unrecognized {
            compound: compound.to_string(),
        });
    };

    if state.is_sorted(&key) {
        return LineOutcome::Warning(Warning::AlreadySorted {
            compound: state.known().raw_name(&key).unwrap_or(compound).to_string(),
        });
    }

    LineOutcome::Command(MutationCommand::Assign {
        key,
        group: group.to_string(),
    })
}

fn parse_move(original: &str, body: &str, state: &SessionState) -> LineOutcome {
    let Some((compound, from, to)) = split_move(body) else {
        return malformed(original);
    };

    let failed = || {
        LineOutcome::Warning(Warning::MoveFailed {
            compound: compound.to_string(),
            group: from.to_string(),
        })
    };

    let Some(key) = state.known().resolve(compound) else {
        return failed();
    };
    let Some(raw) = state.known().raw_name(&key) else {
        return failed();
    };
    if !state.store().holds(from, raw) {
        return failed();
    }

    LineOutcome::Command(MutationCommand::Move {
        key,
        from: from.to_string(),
        to: to.to_string(),
    })
}

/// `move <compound> from <old> to <new>`, each keyword splitting the rest
/// into exactly two non-empty parts.
fn split_move(body: &str) -> Option<(&str, &str, &str)> {
    let after_move = split_two(&MOVE_WORD, body)?.1;
    let (compound, rest) = split_two(&FROM_WORD, after_move)?;
    let (from, to) = split_two(&TO_WORD, rest)?;

    let (compound, from, to) = (compound.trim(), clean_label(from), clean_label(to));
    if compound.is_empty() || from.is_empty() || to.is_empty() {
        return None;
    }
    Some((compound, from, to))
}

fn split_two<'a>(word: &Regex, text: &'a str) -> Option<(&'a str, &'a str)> {
    let parts: Vec<&str> = word.split(text).collect();
    match parts.as_slice() {
        [left, right] => Some((left, right)),
        _ => None,
    }
}

/// Group labels lose surrounding whitespace, emphasis markers and a
/// trailing full stop; everything else is kept verbatim.
fn clean_label(label: &str) -> &str {
    label
        .trim()
        .trim_end_matches('.')
        .trim_matches(|c: char| c == '*' || c.is_whitespace())
}

fn malformed(line: &str) -> LineOutcome {
    LineOutcome::Warning(Warning::Malformed {
        line: line.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lipidsort_shared::{Compound, normalize};

    fn session(names: &[&str]) -> SessionState {
        SessionState::new(names.iter().map(|n| Compound::new(*n)).collect())
    }

    fn fixture_session() -> SessionState {
        let text = std::fs::read_to_string("../../../fixtures/compounds/names.txt").unwrap();
        SessionState::new(text.lines().map(Compound::new).collect())
    }

    fn assign(name: &str, group: &str) -> MutationCommand {
        MutationCommand::Assign {
            key: normalize(name),
            group: group.into(),
        }
    }

    #[test]
    fn well_formed_reply() {
        let state = fixture_session();
        let text = std::fs::read_to_string("../../../fixtures/replies/well_formed.txt").unwrap();
        let parsed = parse_reply(&text, &state);

        assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);
        assert_eq!(
            parsed.commands,
            vec![
                assign("Oleic Acid", "Fatty Acids"),
                assign("Palmitic Acid", "Fatty Acids"),
                assign("Cholesterol", "Sterols"),
            ]
        );
    }

    #[test]
    fn noisy_reply_against_empty_store() {
        let state = fixture_session();
        let text = std::fs::read_to_string("../../../fixtures/replies/noisy.txt").unwrap();
        let parsed = parse_reply(&text, &state);

        assert_eq!(
            parsed.commands,
            vec![assign("Oleic Acid", "Fatty Acids"), assign("Cholesterol", "Sterols")]
        );

        let count = |pred: fn(&Warning) -> bool| parsed.warnings.iter().filter(|w| pred(w)).count();
        assert_eq!(count(|w| matches!(w, Warning::NoCommand { .. })), 2);
        assert_eq!(count(|w| matches!(w, Warning::Unrecognized { .. })), 1);
        assert_eq!(count(|w| matches!(w, Warning::Malformed { .. })), 2);
        // Nothing is in any group yet, so both moves fail.
        assert_eq!(count(|w| matches!(w, Warning::MoveFailed { .. })), 2);
    }

    #[test]
    fn assignment_splits_on_first_arrow_only() {
        let state = session(&["Oleic Acid"]);
        let parsed = parse_reply("Oleic Acid => Fatty Acids => Extra", &state);
        assert_eq!(parsed.commands, vec![assign("Oleic Acid", "Fatty Acids => Extra")]);
    }

    #[test]
    fn assignment_with_empty_side_is_malformed() {
        let state = session(&["Oleic Acid"]);
        for line in ["=> Fatty Acids", "Oleic Acid =>", "=>"] {
            let parsed = parse_reply(line, &state);
            assert!(parsed.commands.is_empty());
            assert!(matches!(parsed.warnings[..], [Warning::Malformed { .. }]), "{line}");
        }
    }

    #[test]
    fn assignment_ignores_hyphens_and_case() {
        let state = session(&["trans-2-Hexenal", "alpha-Tocopherol"]);
        let parsed = parse_reply(
            "TRANS-2-HEXENAL => Aldehydes\nAlpha Tocopherol => Vitamins",
            &state,
        );
        assert_eq!(
            parsed.commands,
            vec![
                assign("trans-2-Hexenal", "Aldehydes"),
                assign("alpha-Tocopherol", "Vitamins"),
            ]
        );
    }

    #[test]
    fn assignment_matches_annotated_input() {
        let state = session(&["Palmitic Acid, 16:0"]);
        let parsed = parse_reply("palmitic acid => Fatty Acids", &state);
        assert_eq!(parsed.commands, vec![assign("Palmitic Acid", "Fatty Acids")]);
    }

    #[test]
    fn already_sorted_is_skipped() {
        let mut state = session(&["Cholesterol"]);
        state.apply_reply("Cholesterol => Sterols");

        let parsed = parse_reply("Cholesterol => Lipids", &state);
        assert!(parsed.commands.is_empty());
        assert_eq!(
            parsed.warnings,
            vec![Warning::AlreadySorted {
                compound: "Cholesterol".into()
            }]
        );
    }

    #[test]
    fn move_of_placed_compound() {
        let mut state = session(&["Cholesterol"]);
        state.apply_reply("Cholesterol => Lipids");

        let parsed = parse_reply("MOVE cholesterol FROM lipids TO Sterols", &state);
        assert_eq!(
            parsed.commands,
            vec![MutationCommand::Move {
                key: normalize("Cholesterol"),
                from: "lipids".into(),
                to: "Sterols".into(),
            }]
        );
    }

    #[test]
    fn move_from_wrong_group_fails() {
        let mut state = session(&["Cholesterol"]);
        state.apply_reply("Cholesterol => Lipids");

        let parsed = parse_reply("move Cholesterol from Steroids to Sterols", &state);
        assert!(parsed.commands.is_empty());
        assert_eq!(
            parsed.warnings,
            vec![Warning::MoveFailed {
                compound: "Cholesterol".into(),
                group: "Steroids".into(),
            }]
        );
    }

    #[test]
    fn move_missing_keyword_is_malformed() {
        let state = session(&["Retinol"]);
        for line in [
            "move Retinol to Vitamins",
            "move Retinol from Lipids",
            "move from Lipids to Vitamins",
            "move Retinol from Lipids to",
        ] {
            let parsed = parse_reply(line, &state);
            assert!(parsed.commands.is_empty(), "{line}");
            assert!(matches!(parsed.warnings[..], [Warning::Malformed { .. }]), "{line}");
        }
    }

    #[test]
    fn keywords_inside_words_do_not_split() {
        let mut state = session(&["Tocopherol"]);
        state.apply_reply("Tocopherol => Antioxidants");

        let parsed = parse_reply(
            "move Tocopherol from Antioxidants to Tocopherols and Tocotrienols",
            &state,
        );
        assert_eq!(
            parsed.commands,
            vec![MutationCommand::Move {
                key: normalize("Tocopherol"),
                from: "Antioxidants".into(),
                to: "Tocopherols and Tocotrienols".into(),
            }]
        );
    }

    #[test]
    fn lines_without_tokens_each_warn_once() {
        let state = session(&["Oleic Acid"]);
        for line in ["Oleic Acid", "Here you go:", "removed duplicates", "Fatty Acids -> Oleic"] {
            let parsed = parse_reply(line, &state);
            assert!(parsed.commands.is_empty(), "{line}");
            assert_eq!(parsed.warnings.len(), 1, "{line}");
            assert!(matches!(parsed.warnings[0], Warning::NoCommand { .. }));
        }
    }

    #[test]
    fn blank_reply_yields_nothing() {
        let state = session(&["Oleic Acid"]);
        assert_eq!(parse_reply("", &state), ParsedReply::default());
        assert_eq!(parse_reply("\n  \n\t\n", &state), ParsedReply::default());
    }

    #[test]
    fn labels_are_cleaned() {
        let state = session(&["Retinol"]);
        let parsed = parse_reply("1. Retinol => **Vitamins**.", &state);
        assert_eq!(parsed.commands, vec![assign("Retinol", "Vitamins")]);
    }

    #[test]
    fn warning_messages() {
        let w = Warning::MoveFailed {
            compound: "Cholesterol".into(),
            group: "Lipids".into(),
        };
        assert_eq!(
            w.to_string(),
            "move failed; compound 'Cholesterol' not found in group 'Lipids'"
        );
    }
}
