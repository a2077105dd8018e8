pub const MIN_HOUR: u8 = 0;
pub const MAX_HOUR: u8 = 23;

const SUBTLETY_CLAUSE: &str =
    "Keep every lighting effect subtle and realistic, avoiding oversaturation.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfDay {
    Sunrise,
    Morning,
    Midday,
    Afternoon,
    GoldenHour,
    Sunset,
    Night,
    Daylight,
}

impl TimeOfDay {
    pub fn from_hour(hour: u8) -> Self {
        match hour {
            6..=7 => TimeOfDay::Sunrise,
            8..=10 => TimeOfDay::Morning,
            11..=14 => TimeOfDay::Midday,
            15..=17 => TimeOfDay::Afternoon,
            18..=19 => TimeOfDay::GoldenHour,
            20..=21 => TimeOfDay::Sunset,
            22..=23 | 0..=5 => TimeOfDay::Night,
            _ => TimeOfDay::Daylight,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeOfDay::Sunrise => "sunrise",
            TimeOfDay::Morning => "morning",
            TimeOfDay::Midday => "midday",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::GoldenHour => "golden hour",
            TimeOfDay::Sunset => "sunset/dusk",
            TimeOfDay::Night => "night",
            TimeOfDay::Daylight => "daylight",
        }
    }

    fn paragraph(self, region: &str) -> String {
        match self {
            TimeOfDay::Sunrise => format!(
                "{region} sunrise lighting: the sun sits just above the horizon and throws \
                 medium-length shadows across the ground. The sky carries soft orange and pale \
                 pink tones typical of an early {region} morning. Surfaces pick up a warm but \
                 natural glow, and the spa water reflects the low morning light."
            ),
            TimeOfDay::Morning => format!(
                "{region} morning lighting: clear, fresh sunlight with crisp, well-defined \
                 shadows. The sky is a bright clean blue as seen in {region}'s clear air, and \
                 colors look natural with good visibility across the whole scene."
            ),
            TimeOfDay::Midday => format!(
                "{region} midday lighting: strong sun from almost directly overhead, so shadows \
                 are short and sit right under objects. Illumination is bright and clear, as in \
                 {region}'s UV-rich summer light, with a deep blue sky. The spa water reflects \
                 the overhead light naturally."
            ),
            TimeOfDay::Afternoon => format!(
                "{region} afternoon lighting: warm natural sunlight from a lowering sun with \
                 moderately long shadows. Surfaces show golden-warm tones under a blue sky that \
                 may carry a few afternoon clouds, giving the relaxed feel of a {region} \
                 afternoon."
            ),
            TimeOfDay::GoldenHour => format!(
                "{region} golden hour: soft golden side-lighting with long shadows and warm \
                 highlights on surfaces. The sky shows golden-orange hues and the spa water \
                 catches the evening glow, as on a calm {region} evening."
            ),
            TimeOfDay::Sunset => format!(
                "{region} sunset lighting: the sun is setting, painting the sky in orange, soft \
                 pink and gentle purple. Surfaces take on warm orange tones with long, soft \
                 shadows, and the spa water shows gentle reflections of the sunset sky."
            ),
            TimeOfDay::Night => format!(
                "{region} night lighting: a properly dark sky, deep blue to black, with stars \
                 where appropriate and no visible daylight. Light the scene with the outdoor \
                 lighting a {region} home would have: warm deck lights, landscape path lights, \
                 light spilling from the house, and soft underwater lighting in the spa. Keep \
                 natural contrast between dark areas and lit spaces."
            ),
            TimeOfDay::Daylight => format!(
                "{region} daylight: neutral, natural daytime sunlight with realistic shadows \
                 and a clear sky, matching the conditions already visible in the photo."
            ),
        }
    }
}

/// Canned lighting paragraph for an hour of the day.
pub fn lighting_description(hour: u8, region: &str) -> String {
    let region = region.trim();
    let region = if region.is_empty() { "Local" } else { region };
    let paragraph = TimeOfDay::from_hour(hour).paragraph(region);
    format!("{paragraph} {SUBTLETY_CLAUSE}")
}

pub fn format_hour_12(hour: u8) -> String {
    match hour {
        0 => "12:00 AM".to_string(),
        1..=11 => format!("{hour}:00 AM"),
        12 => "12:00 PM".to_string(),
        _ => format!("{}:00 PM", hour - 12),
    }
}

pub fn parse_hour(value: &str) -> Option<u8> {
    value
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|hour| (MIN_HOUR..=MAX_HOUR).contains(hour))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_cover_the_day() {
        assert_eq!(TimeOfDay::from_hour(6), TimeOfDay::Sunrise);
        assert_eq!(TimeOfDay::from_hour(7), TimeOfDay::Sunrise);
        assert_eq!(TimeOfDay::from_hour(8), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(12), TimeOfDay::Midday);
        assert_eq!(TimeOfDay::from_hour(15), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(19), TimeOfDay::GoldenHour);
        assert_eq!(TimeOfDay::from_hour(20), TimeOfDay::Sunset);
        assert_eq!(TimeOfDay::from_hour(22), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(3), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(24), TimeOfDay::Daylight);
    }

    #[test]
    fn description_names_region_and_stays_subtle() {
        let text = lighting_description(21, "New Zealand");
        assert!(text.starts_with("New Zealand sunset lighting"));
        assert!(text.ends_with("avoiding oversaturation."));
    }

    #[test]
    fn blank_region_still_reads_naturally() {
        assert!(lighting_description(12, "  ").starts_with("Local midday lighting"));
    }

    #[test]
    fn twelve_hour_labels() {
        assert_eq!(format_hour_12(0), "12:00 AM");
        assert_eq!(format_hour_12(9), "9:00 AM");
        assert_eq!(format_hour_12(12), "12:00 PM");
        assert_eq!(format_hour_12(23), "11:00 PM");
    }

    #[test]
    fn hour_parsing_rejects_out_of_range() {
        assert_eq!(parse_hour(" 18 "), Some(18));
        assert_eq!(parse_hour("24"), None);
        assert_eq!(parse_hour("noon"), None);
    }
}
