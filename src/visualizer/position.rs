use std::fmt;

use serde::Serialize;

use crate::visualizer::command::{parse_commands, AdjustCommand, HorizontalEdge, VerticalEdge};

pub const MOVE_STEP: f64 = 10.0;
pub const MIN_COORDINATE: f64 = 10.0;
pub const MAX_COORDINATE: f64 = 90.0;
pub const MIN_SCALE: f64 = 0.5;
pub const MAX_SCALE: f64 = 2.0;
const CORNER_NEAR: f64 = 20.0;
const CORNER_FAR: f64 = 80.0;

/// Intended placement of the spa on the canvas. Informational only: the
/// generation service decides the real layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
    pub rotation: f64,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            x: 50.0,
            y: 50.0,
            scale: 1.0,
            rotation: 0.0,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x={}% y={}% scale={:.1} rotation={}°",
            self.x, self.y, self.scale, self.rotation
        )
    }
}

// Keeps repeated 0.1 steps from drifting (1.2000000000000002 and friends).
fn round_scale(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn apply_command(current: Position, command: AdjustCommand) -> Position {
    let mut next = current;
    match command {
        AdjustCommand::MoveLeft { tracked: true } => {
            next.x = (current.x - MOVE_STEP).max(MIN_COORDINATE)
        }
        AdjustCommand::MoveRight { tracked: true } => {
            next.x = (current.x + MOVE_STEP).min(MAX_COORDINATE)
        }
        AdjustCommand::MoveBack { tracked: true } => {
            next.y = (current.y - MOVE_STEP).max(MIN_COORDINATE)
        }
        AdjustCommand::MoveForward { tracked: true } => {
            next.y = (current.y + MOVE_STEP).min(MAX_COORDINATE)
        }
        AdjustCommand::MoveLeft { tracked: false }
        | AdjustCommand::MoveRight { tracked: false }
        | AdjustCommand::MoveBack { tracked: false }
        | AdjustCommand::MoveForward { tracked: false } => {}
        AdjustCommand::Rotate(degrees) => {
            next.rotation = (current.rotation + f64::from(degrees)).rem_euclid(360.0)
        }
        AdjustCommand::Scale(delta) => {
            next.scale = round_scale(current.scale + delta).clamp(MIN_SCALE, MAX_SCALE)
        }
        AdjustCommand::Center => {
            next.x = 50.0;
            next.y = 50.0;
        }
        AdjustCommand::Corner(vertical, horizontal) => {
            next.x = match horizontal {
                HorizontalEdge::Left => CORNER_NEAR,
                HorizontalEdge::Right => CORNER_FAR,
            };
            next.y = match vertical {
                VerticalEdge::Top => CORNER_NEAR,
                VerticalEdge::Bottom => CORNER_FAR,
            };
        }
        AdjustCommand::SetSurface(_) => {}
    }
    next
}

pub fn apply_commands(current: Position, commands: &[AdjustCommand]) -> Position {
    commands
        .iter()
        .fold(current, |position, command| apply_command(position, *command))
}

pub fn adjust_position(command: &str, current: Position) -> Position {
    apply_commands(current, &parse_commands(command))
}
