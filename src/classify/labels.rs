/// Label catalog offered by the CLI when no classifier is loaded to report
/// its own label set. Mirrors the display names of the common AudioSet
/// classes that sound classifiers in this space are trained on.
pub const FALLBACK_LABELS: &[&str] = &[
    "Throat clearing",
    "Cough",
    "Burping, eructation",
    "Sneeze",
    "Hiccup",
    "Speech",
    "Dog",
    "Bark",
    "Cat",
    "Meow",
    "Door",
    "Knock",
    "Glass",
    "Breaking",
    "Baby cry, infant cry",
    "Gargling",
    "Siren",
    "Alarm",
    "Vehicle horn, car horn, honking",
    "Car",
    "Conversation",
    "Walk, footsteps",
    "Rain",
    "Thunderstorm",
    "Fire",
    "Explosion",
    "Gunshot, gunfire",
    "Screaming",
    "Laughter",
    "Clapping",
    "Cheering",
    "Crowd",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_no_duplicates() {
        let mut seen = std::collections::HashSet::new();
        for label in FALLBACK_LABELS {
            assert!(seen.insert(*label), "duplicate label {label}");
        }
    }
}
