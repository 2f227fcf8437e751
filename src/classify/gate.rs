use super::{ClassifyOutcome, LabelScore, Settlement};

/// Verdict for one finished capture.
#[derive(Clone, Debug, PartialEq)]
pub struct GateDecision {
    /// Keep the recording.
    pub accept: bool,
    /// Ranked labels carried forward into metadata and events. Empty when
    /// the capture was accepted without a usable classification.
    pub labels: Vec<LabelScore>,
    /// The label that justified acceptance. With no filter this is the
    /// overall top label; with a filter it is the best matching one.
    pub primary: Option<LabelScore>,
    pub settled_by: Settlement,
}

/// Applies the sound-type filter to a classification outcome.
///
/// An empty filter accepts everything and keeps whatever labels arrived as
/// best-effort metadata. A non-empty filter demands a ranked result that
/// contains a filtered label at or above `min_score`. Every non-ranked
/// outcome falls back to the no-filter policy: a monitor must not go deaf
/// because its classifier is slow, broken, or absent.
pub fn decide(
    outcome: &ClassifyOutcome,
    settled_by: Settlement,
    sound_type_filter: &[String],
    min_score: f32,
) -> GateDecision {
    let ranked = match outcome {
        ClassifyOutcome::Ranked(labels) => labels.clone(),
        ClassifyOutcome::TimedOut
        | ClassifyOutcome::Failed(_)
        | ClassifyOutcome::TooShort
        | ClassifyOutcome::Unavailable => {
            return GateDecision {
                accept: true,
                labels: Vec::new(),
                primary: None,
                settled_by,
            };
        }
    };

    if sound_type_filter.is_empty() {
        let primary = best_of(&ranked);
        return GateDecision {
            accept: true,
            labels: ranked,
            primary,
            settled_by,
        };
    }

    let qualifying: Vec<&LabelScore> = ranked
        .iter()
        .filter(|entry| entry.score >= min_score && sound_type_filter.contains(&entry.label))
        .collect();

    match best_ref(&qualifying) {
        Some(primary) => GateDecision {
            accept: true,
            labels: ranked.clone(),
            primary: Some(primary.clone()),
            settled_by,
        },
        None => GateDecision {
            accept: false,
            labels: ranked,
            primary: None,
            settled_by,
        },
    }
}

/// Labels that should raise a notification, independent of the accept
/// decision. The same confidence bar applies as for filtering.
pub fn notification_hits(
    labels: &[LabelScore],
    notification_sound_types: &[String],
    min_score: f32,
) -> Vec<String> {
    labels
        .iter()
        .filter(|entry| {
            entry.score >= min_score && notification_sound_types.contains(&entry.label)
        })
        .map(|entry| entry.label.clone())
        .collect()
}

/// Highest score wins; on a tie the earlier entry keeps its place, so the
/// classifier's own ranking breaks ties.
fn best_of(labels: &[LabelScore]) -> Option<LabelScore> {
    let refs: Vec<&LabelScore> = labels.iter().collect();
    best_ref(&refs).cloned()
}

fn best_ref<'a>(labels: &[&'a LabelScore]) -> Option<&'a LabelScore> {
    let mut best: Option<&LabelScore> = None;
    for candidate in labels {
        match best {
            Some(current) if candidate.score <= current.score => {}
            _ => best = Some(candidate),
        }
    }
    best
}
