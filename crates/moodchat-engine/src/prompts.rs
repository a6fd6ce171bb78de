use moodchat_core::Emotion;

/// Opening turn recorded before a session's first message.
pub fn context_prompt(emotion: Emotion) -> String {
    format!(
        "You are a creative and empathetic AI counselor. The user is feeling {emotion}. \
         Respond in a friendly, supportive way, like talking to a friend. Keep it concise, \
         but also add some warmth, creativity, and empathy in your responses. Make the user feel heard."
    )
}

pub fn music_prompt(emotion: Emotion) -> &'static str {
    match emotion {
        Emotion::Angry => "Suggest 3 calming songs that might help someone who is feeling angry.",
        Emotion::Disgusted => {
            "Suggest 3 pleasant, positive songs to help shift someone's mood from disgust."
        }
        Emotion::Fearful => {
            "Recommend 3 comforting songs that might help someone who is feeling anxious or fearful."
        }
        Emotion::Happy => "Suggest 3 energetic, feel-good songs to match someone's happy mood.",
        Emotion::Neutral => "Suggest 3 balanced, melodic songs that maintain a calm, neutral mood.",
        Emotion::Sad => "Recommend 3 uplifting songs that could help someone who is feeling sad.",
        Emotion::Surprised => "Recommend 3 interesting songs that match an excited, surprised mood.",
    }
}

pub const MUSIC_UNAVAILABLE: &str =
    "I'm having trouble suggesting music right now. Please try again later.";
