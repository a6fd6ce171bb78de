use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The seven facial-expression classes, in classifier output order.
///
/// Index `i` of the classifier's probability vector corresponds to
/// `Emotion::ALL[i]`. The serialized form is the capitalized label.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Emotion {
    Angry,
    Disgusted,
    Fearful,
    Happy,
    #[default]
    Neutral,
    Sad,
    Surprised,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgusted,
        Emotion::Fearful,
        Emotion::Happy,
        Emotion::Neutral,
        Emotion::Sad,
        Emotion::Surprised,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Angry => "Angry",
            Self::Disgusted => "Disgusted",
            Self::Fearful => "Fearful",
            Self::Happy => "Happy",
            Self::Neutral => "Neutral",
            Self::Sad => "Sad",
            Self::Surprised => "Surprised",
        }
    }

    /// Index of the largest score mapped to a label.
    ///
    /// Returns `None` unless `scores` has exactly one entry per emotion.
    /// NaN scores never win.
    pub fn from_scores(scores: &[f32]) -> Option<Self> {
        if scores.len() != Self::COUNT {
            return None;
        }
        let mut best: Option<(usize, f32)> = None;
        for (i, &score) in scores.iter().enumerate() {
            if score.is_nan() {
                continue;
            }
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((i, score)),
            }
        }
        best.and_then(|(i, _)| Self::from_index(i))
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown emotion label: {0}")]
pub struct UnknownEmotion(pub String);

impl FromStr for Emotion {
    type Err = UnknownEmotion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|e| e.label().eq_ignore_ascii_case(needle))
            .ok_or_else(|| UnknownEmotion(s.to_owned()))
    }
}
