//! Canned replies used when the chat backend cannot answer.

use rand::Rng;

use moodchat_core::Emotion;

pub const GREETINGS_PER_EMOTION: usize = 4;

pub fn greetings(emotion: Emotion) -> &'static [&'static str; GREETINGS_PER_EMOTION] {
    match emotion {
        Emotion::Angry => &[
            "I notice you seem frustrated. Would you like to talk about what's bothering you?",
            "It's okay to feel angry. I'm here to listen if you want to share.",
            "Sometimes talking about what makes us angry can help. What's on your mind?",
            "I can see this is important to you. Would you like to discuss it?",
        ],
        Emotion::Disgusted => &[
            "That sounds unpleasant. What happened?",
            "Feeling disgusted can be strong. Want to talk about it?",
            "Something must have really put you off. Want to share?",
            "I hear you. What's making you feel this way?",
        ],
        Emotion::Fearful => &[
            "That sounds scary. Want to talk about what's making you feel this way?",
            "Fear is a natural emotion. I'm here to listen.",
            "You're not alone in this. Want to share what's worrying you?",
            "It's okay to feel afraid. I'm here to support you.",
        ],
        Emotion::Happy => &[
            "That's awesome! What's making you happy today?",
            "I'm glad to hear that! Want to share your good news?",
            "Happiness is contagious! Tell me more!",
            "That's great! I'd love to hear more about it.",
        ],
        Emotion::Neutral => &[
            "Hey there! How's your day going?",
            "I'm here to chat! What's on your mind?",
            "You seem calm today. Anything you'd like to talk about?",
            "I'm always here to listen. What's up?",
        ],
        Emotion::Sad => &[
            "I'm sorry you're feeling down. Want to talk about it?",
            "Feeling sad is okay. I'm here for you.",
            "If you need someone to listen, I'm right here.",
            "Sadness can be heavy, but you're not alone. Want to share?",
        ],
        Emotion::Surprised => &[
            "That sounds surprising! What happened?",
            "Wow! That must have caught you off guard. Want to share more?",
            "Surprises can be exciting or shocking. How are you feeling about it?",
            "Unexpected things happen all the time. How do you feel about this one?",
        ],
    }
}

/// A uniformly chosen greeting for `emotion`.
pub fn fallback_reply(emotion: Emotion) -> &'static str {
    let i = rand::thread_rng().gen_range(0..GREETINGS_PER_EMOTION);
    greetings(emotion)[i]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_emotion_has_four_distinct_greetings() {
        for e in Emotion::ALL {
            let g = greetings(e);
            let unique: HashSet<_> = g.iter().collect();
            assert_eq!(unique.len(), GREETINGS_PER_EMOTION, "{e}");
            assert!(g.iter().all(|s| !s.trim().is_empty()));
        }
    }

    #[test]
    fn reply_comes_from_the_emotion_table() {
        for e in Emotion::ALL {
            for _ in 0..20 {
                assert!(greetings(e).contains(&fallback_reply(e)));
            }
        }
    }

    #[test]
    fn all_greetings_eventually_chosen() {
        let seen: HashSet<_> = (0..400).map(|_| fallback_reply(Emotion::Sad)).collect();
        assert_eq!(seen.len(), GREETINGS_PER_EMOTION);
    }
}
