use crate::catalog::SpaModel;
use crate::visualizer::command::{AdjustCommand, HorizontalEdge, SurfaceKind, VerticalEdge};

const SCALE_REFERENCES: &str = "Use the objects in the photo as size references: doors are about \
2 m high, windows about 1-1.5 m wide, outdoor chairs about 0.8 m high and railings about 1 m high.";

fn color_clause(spa: &SpaModel) -> String {
    match spa.selected_color.as_deref().map(str::trim) {
        Some(color) if !color.is_empty() => format!("in the {color} finish"),
        _ => "in the color and finish shown in the reference image".to_string(),
    }
}

fn dimensions_clause(spa: &SpaModel) -> String {
    let d = spa.dimensions;
    format!(
        "{}m long x {}m wide x {}m high",
        d.length, d.width, d.height
    )
}

fn fidelity_rules() -> Vec<String> {
    vec![
        "Copy the spa from the reference image exactly. Do not add logos, text, badges, \
         graphics or branding that are not visible in the reference."
            .to_string(),
        "Place exactly ONE spa in the scene. Never duplicate it or add a second spa.".to_string(),
        "Show the spa filled with clear water.".to_string(),
        "Leave everything else in the photo untouched: keep the background, buildings, \
         plants, furniture and ground exactly as they are."
            .to_string(),
    ]
}

fn scale_rule(spa: &SpaModel) -> String {
    format!(
        "Size the spa to its real dimensions ({}). {SCALE_REFERENCES}",
        dimensions_clause(spa)
    )
}

fn numbered(rules: &[String]) -> String {
    rules
        .iter()
        .enumerate()
        .map(|(index, rule)| format!("{}. {}", index + 1, rule))
        .collect::<Vec<_>>()
        .join("\n")
}

fn lighting_line(lighting: &str) -> Option<String> {
    let trimmed = lighting.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("Apply this lighting: {trimmed}"))
    }
}

/// Instruction for a fresh composite of the first image (the space) and the second (the spa).
pub fn composite_prompt(spa: &SpaModel, lighting: &str) -> String {
    let mut rules = fidelity_rules();
    rules.insert(
        1,
        "This is an above-ground spa: it stands on top of the deck, patio or ground surface."
            .to_string(),
    );
    rules.insert(2, scale_rule(spa));
    rules.push(
        "Where the space has straight architectural lines (deck boards, walls, fences, paving \
         edges), align the spa with them."
            .to_string(),
    );

    let mut sections = vec![
        format!(
            "Place the {} from the second image into the outdoor space shown in the first \
             image, {}.",
            spa.name,
            color_clause(spa)
        ),
        format!("RULES:\n{}", numbered(&rules)),
    ];
    if let Some(lighting) = lighting_line(lighting) {
        sections.push(lighting);
    }
    sections.push(
        "If the result contains more than one spa or any logo or text that is not in the \
         reference image, it is wrong."
            .to_string(),
    );
    sections.join("\n\n")
}

pub fn command_instruction(command: &AdjustCommand) -> String {
    match command {
        AdjustCommand::MoveLeft { .. } => "Move the spa to the left.".to_string(),
        AdjustCommand::MoveRight { .. } => "Move the spa to the right.".to_string(),
        AdjustCommand::MoveBack { .. } => {
            "Move the spa back, further from the camera.".to_string()
        }
        AdjustCommand::MoveForward { .. } => {
            "Move the spa forward, closer to the camera.".to_string()
        }
        AdjustCommand::Rotate(degrees) => format!("Rotate the spa by {degrees} degrees."),
        AdjustCommand::Scale(delta) if *delta < 0.0 => {
            "Make the spa slightly smaller while keeping it believable for its real size."
                .to_string()
        }
        AdjustCommand::Scale(_) => {
            "Make the spa slightly larger while keeping it believable for its real size."
                .to_string()
        }
        AdjustCommand::Center => "Move the spa to the center of the usable space.".to_string(),
        AdjustCommand::Corner(vertical, horizontal) => {
            let vertical = match vertical {
                VerticalEdge::Top => "back",
                VerticalEdge::Bottom => "front",
            };
            let horizontal = match horizontal {
                HorizontalEdge::Left => "left",
                HorizontalEdge::Right => "right",
            };
            format!("Move the spa to the {vertical}-{horizontal} corner of the space.")
        }
        AdjustCommand::SetSurface(surface) => match surface {
            SurfaceKind::Lawn => {
                "Place the spa on the lawn, sitting flat on the grass.".to_string()
            }
            other => format!("Place the spa on the {} surface.", other.label()),
        },
    }
}

/// Instruction for a fresh composite that nudges the placement.
pub fn adjustment_prompt(spa: &SpaModel, commands: &[AdjustCommand], lighting: &str) -> String {
    let mut sections = vec![format!(
        "Place the {} from the second image into the outdoor space shown in the first \
         image, {}, then adjust its placement as described below. Keep its appearance \
         identical to the reference image.",
        spa.name,
        color_clause(spa)
    )];

    let moves: Vec<String> = commands.iter().map(command_instruction).collect();
    if moves.is_empty() {
        sections.push("PLACEMENT: choose a natural, realistic placement.".to_string());
    } else {
        sections.push(format!("PLACEMENT:\n{}", moves.join("\n")));
    }

    let mut rules = fidelity_rules();
    rules.insert(
        1,
        "Keep this above-ground spa standing on top of the deck, patio or ground surface."
            .to_string(),
    );
    rules.insert(2, scale_rule(spa));
    sections.push(format!("RULES:\n{}", numbered(&rules)));

    if let Some(lighting) = lighting_line(lighting) {
        sections.push(lighting);
    }
    sections.join("\n\n")
}

/// Instruction for a conversational edit that only relights the previous result.
pub fn lighting_only_prompt(lighting: &str) -> String {
    let rules = vec![
        "There is exactly ONE spa in this image. Keep exactly one spa; never add, copy or \
         duplicate it."
            .to_string(),
        "Do not move, resize, rotate or restyle the spa or anything else.".to_string(),
        "Change only the lighting, shadows and sky.".to_string(),
        "Keep the background, buildings, plants and furniture exactly as they are.".to_string(),
    ];
    let mut sections = vec![
        "LIGHTING-ONLY EDIT of this image.".to_string(),
        format!("RULES:\n{}", numbered(&rules)),
    ];
    if let Some(lighting) = lighting_line(lighting) {
        sections.push(lighting);
    }
    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin_spa_models;
    use crate::visualizer::command::parse_commands;

    fn bergen() -> SpaModel {
        builtin_spa_models().remove(0)
    }

    #[test]
    fn composite_prompt_carries_all_constraints() {
        let prompt = composite_prompt(&bergen(), "Warm evening light.");
        assert!(prompt.contains("Bergen Portable Spa"));
        assert!(prompt.contains("2.04m long x 2.04m wide x 0.8m high"));
        assert!(prompt.contains("doors are about 2 m high"));
        assert!(prompt.contains("exactly ONE spa"));
        assert!(prompt.contains("clear water"));
        assert!(prompt.contains("Do not add logos"));
        assert!(prompt.contains("align the spa"));
        assert!(prompt.contains("Apply this lighting: Warm evening light."));
        assert!(prompt.contains("shown in the reference image"));
    }

    #[test]
    fn selected_color_replaces_reference_wording() {
        let spa = bergen().with_color("Teak").unwrap();
        assert!(composite_prompt(&spa, "").contains("in the Teak finish"));
        assert!(!composite_prompt(&spa, "").contains("Apply this lighting"));
    }

    #[test]
    fn adjustment_prompt_lists_moves_in_order() {
        let commands = parse_commands("rotate 90 and move left on the deck");
        let prompt = adjustment_prompt(&bergen(), &commands, "Noon sun.");
        let left = prompt.find("Move the spa to the left.").unwrap();
        let rotate = prompt.find("Rotate the spa by 90 degrees.").unwrap();
        let deck = prompt.find("Place the spa on the deck surface.").unwrap();
        assert!(left < rotate && rotate < deck);
        assert!(prompt.contains("exactly ONE spa"));
        assert!(prompt.contains("Apply this lighting: Noon sun."));
    }

    #[test]
    fn adjustment_prompt_keeps_opposing_moves() {
        let commands = parse_commands("move left then right, back then forward");
        let prompt = adjustment_prompt(&bergen(), &commands, "");
        assert!(prompt.contains("Move the spa to the left."));
        assert!(prompt.contains("Move the spa to the right."));
        assert!(prompt.contains("Move the spa back, further from the camera."));
        assert!(prompt.contains("Move the spa forward, closer to the camera."));
    }

    #[test]
    fn lighting_only_prompt_forbids_moves() {
        let prompt = lighting_only_prompt("Night sky.");
        assert!(prompt.contains("Do not move, resize"));
        assert!(prompt.contains("Change only the lighting, shadows and sky."));
        assert!(prompt.contains("exactly ONE spa"));
        assert!(prompt.ends_with("Apply this lighting: Night sky."));
    }
}
