use once_cell::sync::Lazy;
use regex::Regex;

pub const DEFAULT_ROTATION_DEGREES: u32 = 45;
pub const SCALE_STEP: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalEdge {
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalEdge {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    Deck,
    Patio,
    Lawn,
}

impl SurfaceKind {
    pub fn label(self) -> &'static str {
        match self {
            SurfaceKind::Deck => "deck",
            SurfaceKind::Patio => "patio",
            SurfaceKind::Lawn => "lawn",
        }
    }
}

/// A single placement intent extracted from free text.
///
/// Every move becomes an instruction for the model. `tracked` marks the moves
/// that also shift the informational [`Position`](super::position::Position).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdjustCommand {
    MoveLeft { tracked: bool },
    MoveRight { tracked: bool },
    MoveBack { tracked: bool },
    MoveForward { tracked: bool },
    Rotate(u32),
    Scale(f64),
    Center,
    Corner(VerticalEdge, HorizontalEdge),
    SetSurface(SurfaceKind),
}

static FIRST_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+").expect("valid rotation regex"));

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

// Reduced digit by digit so arbitrarily long numbers still land in 0..360.
fn parse_rotation(lowered: &str) -> u32 {
    FIRST_NUMBER
        .find(lowered)
        .map(|found| {
            found
                .as_str()
                .bytes()
                .fold(0, |degrees, digit| (degrees * 10 + u32::from(digit - b'0')) % 360)
        })
        .unwrap_or(DEFAULT_ROTATION_DEGREES)
}

fn parse_corner(lowered: &str) -> Option<(VerticalEdge, HorizontalEdge)> {
    if !lowered.contains("corner") {
        return None;
    }
    let vertical = if lowered.contains("top") {
        VerticalEdge::Top
    } else if lowered.contains("bottom") {
        VerticalEdge::Bottom
    } else {
        return None;
    };
    let horizontal = if lowered.contains("left") {
        HorizontalEdge::Left
    } else if lowered.contains("right") {
        HorizontalEdge::Right
    } else {
        return None;
    };
    Some((vertical, horizontal))
}

/// Parses case-insensitive keywords into commands, emitted in a fixed order:
/// horizontal, vertical, rotation, scale, placement override, surface.
///
/// Opposing move keywords do not cancel: both instructions are emitted, but only
/// one per axis is tracked ("left" over "right", "up"/"top" over "down"/"bottom").
/// "back" and "forward" only instruct the model. Shrinking wins over growing. A
/// recognised corner replaces the separate moves its words would produce.
pub fn parse_commands(text: &str) -> Vec<AdjustCommand> {
    let lowered = text.to_lowercase();
    let mut commands = Vec::new();
    let corner = parse_corner(&lowered);

    if corner.is_none() {
        let left = lowered.contains("left");
        if left {
            commands.push(AdjustCommand::MoveLeft { tracked: true });
        }
        if lowered.contains("right") {
            commands.push(AdjustCommand::MoveRight { tracked: !left });
        }

        let up = contains_any(&lowered, &["up", "top"]);
        if up || lowered.contains("back") {
            commands.push(AdjustCommand::MoveBack { tracked: up });
        }
        let down = contains_any(&lowered, &["down", "bottom"]);
        if down || lowered.contains("forward") {
            commands.push(AdjustCommand::MoveForward {
                tracked: down && !up,
            });
        }
    }

    if lowered.contains("rotate") {
        commands.push(AdjustCommand::Rotate(parse_rotation(&lowered)));
    }

    if contains_any(&lowered, &["smaller", "shrink"]) {
        commands.push(AdjustCommand::Scale(-SCALE_STEP));
    } else if contains_any(&lowered, &["larger", "bigger"]) {
        commands.push(AdjustCommand::Scale(SCALE_STEP));
    }

    if lowered.contains("center") {
        commands.push(AdjustCommand::Center);
    } else if let Some((vertical, horizontal)) = corner {
        commands.push(AdjustCommand::Corner(vertical, horizontal));
    }

    if lowered.contains("deck") {
        commands.push(AdjustCommand::SetSurface(SurfaceKind::Deck));
    } else if lowered.contains("patio") {
        commands.push(AdjustCommand::SetSurface(SurfaceKind::Patio));
    } else if contains_any(&lowered, &["grass", "lawn"]) {
        commands.push(AdjustCommand::SetSurface(SurfaceKind::Lawn));
    }

    commands
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_moves() {
        assert_eq!(
            parse_commands("Move LEFT"),
            vec![AdjustCommand::MoveLeft { tracked: true }]
        );
        assert_eq!(
            parse_commands("move right"),
            vec![AdjustCommand::MoveRight { tracked: true }]
        );
        assert_eq!(
            parse_commands("move up"),
            vec![AdjustCommand::MoveBack { tracked: true }]
        );
        assert_eq!(
            parse_commands("move down"),
            vec![AdjustCommand::MoveForward { tracked: true }]
        );
    }

    #[test]
    fn back_and_forward_only_instruct() {
        assert_eq!(
            parse_commands("push it back"),
            vec![AdjustCommand::MoveBack { tracked: false }]
        );
        assert_eq!(
            parse_commands("bring forward"),
            vec![AdjustCommand::MoveForward { tracked: false }]
        );
    }

    #[test]
    fn opposing_moves_are_both_emitted() {
        assert_eq!(
            parse_commands("move left then right"),
            vec![
                AdjustCommand::MoveLeft { tracked: true },
                AdjustCommand::MoveRight { tracked: false },
            ]
        );
        assert_eq!(
            parse_commands("up a bit, no, down"),
            vec![
                AdjustCommand::MoveBack { tracked: true },
                AdjustCommand::MoveForward { tracked: false },
            ]
        );
        assert_eq!(
            parse_commands("back and down"),
            vec![
                AdjustCommand::MoveBack { tracked: false },
                AdjustCommand::MoveForward { tracked: true },
            ]
        );
    }

    #[test]
    fn rotation_uses_first_number_or_default() {
        assert_eq!(parse_commands("rotate 90"), vec![AdjustCommand::Rotate(90)]);
        assert_eq!(parse_commands("rotate 370"), vec![AdjustCommand::Rotate(10)]);
        assert_eq!(parse_commands("rotate"), vec![AdjustCommand::Rotate(45)]);
        // 10^23 - 1 is 279 mod 360.
        assert_eq!(
            parse_commands("rotate 99999999999999999999999"),
            vec![AdjustCommand::Rotate(279)]
        );
        assert_eq!(parse_commands("rotate 007"), vec![AdjustCommand::Rotate(7)]);
    }

    #[test]
    fn combined_commands_follow_fixed_order() {
        let commands = parse_commands("make it bigger, rotate 30 and move left");
        assert_eq!(
            commands,
            vec![
                AdjustCommand::MoveLeft { tracked: true },
                AdjustCommand::Rotate(30),
                AdjustCommand::Scale(SCALE_STEP),
            ]
        );
    }

    #[test]
    fn corner_replaces_individual_moves() {
        assert_eq!(
            parse_commands("top left corner"),
            vec![AdjustCommand::Corner(VerticalEdge::Top, HorizontalEdge::Left)]
        );
        assert_eq!(
            parse_commands("bottom right corner"),
            vec![AdjustCommand::Corner(VerticalEdge::Bottom, HorizontalEdge::Right)]
        );
    }

    #[test]
    fn incomplete_corner_falls_back_to_moves() {
        assert_eq!(
            parse_commands("left corner"),
            vec![AdjustCommand::MoveLeft { tracked: true }]
        );
    }

    #[test]
    fn center_and_surface_hints() {
        assert_eq!(parse_commands("center it"), vec![AdjustCommand::Center]);
        assert_eq!(
            parse_commands("put it on the lawn"),
            vec![AdjustCommand::SetSurface(SurfaceKind::Lawn)]
        );
        assert_eq!(
            parse_commands("on the deck"),
            vec![AdjustCommand::SetSurface(SurfaceKind::Deck)]
        );
    }

    #[test]
    fn unrelated_text_yields_nothing() {
        assert!(parse_commands("looks great").is_empty());
    }
}
