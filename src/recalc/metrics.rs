use crate::core::{
    LearningStatus,
    MorphKey,
    Morpheme,
};

/// Learning breakdown of one card's morphs, the input to the tag/queue
/// state machine and the duplicate pass.
#[derive(Debug, Clone, Default)]
pub struct CardMorphsMetrics {
    /// Distinct keys of the card's unknown morphs, in first-seen order.
    pub unknown_keys: Vec<MorphKey>,
    pub has_learning_morphs: bool,
}

impl CardMorphsMetrics {
    /// Classify by lemma interval when `evaluate_lemma` is set,
    /// otherwise by inflection interval; the grouping key follows suit.
    pub fn from_morphs(
        morphs: &[Morpheme],
        evaluate_lemma: bool,
        interval_for_known_morphs: i64,
    ) -> Self {
        let mut metrics = Self::default();

        for morph in morphs {
            let interval = if evaluate_lemma {
                morph.highest_lemma_learning_interval
            } else {
                morph.highest_inflection_learning_interval
            }
            .unwrap_or(0);

            match LearningStatus::from_interval(interval, interval_for_known_morphs) {
                LearningStatus::Unknown => {
                    let key = if evaluate_lemma {
                        morph.lemma_key()
                    } else {
                        morph.inflection_key()
                    };
                    if !metrics.unknown_keys.contains(&key) {
                        metrics.unknown_keys.push(key);
                    }
                }
                LearningStatus::Learning => metrics.has_learning_morphs = true,
                LearningStatus::Known => {}
            }
        }

        metrics
    }

    pub fn unknown_count(&self) -> usize {
        self.unknown_keys.len()
    }

    /// The one key this card would introduce, when there is exactly one.
    pub fn single_unknown(&self) -> Option<&MorphKey> {
        if self.unknown_keys.len() == 1 {
            self.unknown_keys.first()
        } else {
            None
        }
    }
}
