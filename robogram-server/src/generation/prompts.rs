use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;

/// Scenes a persona may be photographed in when no scene is given
pub const SCENES: &[&str] = &[
    "at a sunlit cafe table by the window",
    "on a rooftop at golden hour",
    "walking through a busy night market",
    "in a cozy home kitchen",
    "on a misty mountain trail",
    "in a small record shop",
    "at the beach just after sunset",
    "in a quiet library corner",
    "on a rainy city street with neon reflections",
    "in a park full of autumn leaves",
];

pub const FALLBACK_CAPTIONS: &[&str] = &[
    "Just living in the moment ✨",
    "Today felt like a good day 🌤️",
    "Little things, big smiles 😊",
    "Out here making memories 📸",
    "Vibes only 🌈",
    "Caught this and had to share 💫",
];

pub const FALLBACK_COMMENTS: &[&str] = &[
    "Love this! 😍",
    "This is amazing 🔥",
    "Such a vibe ✨",
    "Wow, great shot! 📸",
    "Obsessed with this 💯",
    "Goals right here 🙌",
];

pub const FALLBACK_DM_LINES: &[&str] = &[
    "Hey! Saw your latest post, so good 👀",
    "How has your week been going?",
    "We should collab on something soon!",
    "Still thinking about that photo you shared 😄",
];

pub const FALLBACK_COMMUNITY_LINES: &[&str] = &[
    "Morning everyone! What's everyone up to today? ☀️",
    "Anyone else feeling super creative today?",
    "Shoutout to this community, you all are the best 💛",
    "Quick question: coffee or tea? ☕🍵",
];

/// Phrases that fight with the scene when left in an image style
static FRAMING_PHRASES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(centered in (the )?frame|close-up portrait|close-up shot|headshot|head and shoulders|portrait shot|plain (white |studio )?background|studio background|looking (directly )?at the camera|facing the camera)\b",
    )
    .expect("framing regex is valid")
});

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));

/// Remove framing instructions from a persona's visual description
pub fn strip_framing(visual_description: &str) -> String {
    visual_description
        .split(',')
        .map(|segment| {
            let stripped = FRAMING_PHRASES.replace_all(segment, " ");
            WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
        })
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Combine the persona's style with a scene into one image prompt
pub fn compose_image_prompt(visual_description: &str, scene: &str) -> String {
    let style = strip_framing(visual_description);
    let scene = WHITESPACE.replace_all(scene.trim(), " ");
    let prompt = match (style.is_empty(), scene.is_empty()) {
        (false, false) => format!(
            "{}. Scene: {}. Candid social media photo, natural lighting, no text or watermarks.",
            style.trim_end_matches('.'),
            scene
        ),
        (false, true) => format!(
            "{}. Candid social media photo, natural lighting, no text or watermarks.",
            style.trim_end_matches('.')
        ),
        (true, _) => format!(
            "Scene: {}. Candid social media photo, natural lighting, no text or watermarks.",
            scene
        ),
    };
    WHITESPACE.replace_all(&prompt, " ").into_owned()
}

pub fn random_scene<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    SCENES.choose(rng).copied().unwrap_or("outdoors on a sunny day")
}

pub fn pick_fallback<R: Rng + ?Sized>(pool: &[&'static str], rng: &mut R) -> String {
    pool.choose(rng).copied().unwrap_or("✨").to_string()
}

pub fn caption_instruction(scene: &str) -> String {
    format!(
        "Write an Instagram caption for a photo of you {}. Keep it under 200 characters, \
         include 1-3 emojis, and do not use hashtags. Reply with the caption only.",
        scene
    )
}

pub fn story_caption_instruction(scene: &str) -> String {
    format!(
        "Write a very short story overlay text (under 60 characters) for a quick snap of you {}. \
         One emoji at most. Reply with the text only.",
        scene
    )
}

pub fn comment_instruction(author: &str, caption: &str, recent_comments: &[String]) -> String {
    let mut instruction = format!(
        "You are scrolling your feed and see a post by @{} with the caption: \"{}\".",
        author, caption
    );
    if !recent_comments.is_empty() {
        instruction.push_str(" Other people already commented: ");
        instruction.push_str(&recent_comments.join(" | "));
        instruction.push('.');
    }
    instruction.push_str(
        " Write one short, friendly comment in your own voice (under 100 characters, \
         at most 1 emoji). Do not repeat the other comments. Reply with the comment only.",
    );
    instruction
}

pub fn dm_instruction(recipient: &str, history: &[(String, String)]) -> String {
    let mut instruction = format!("You are chatting in direct messages with @{}.", recipient);
    if history.is_empty() {
        instruction.push_str(" Start the conversation with a casual opener.");
    } else {
        instruction.push_str(" Recent messages:\n");
        for (sender, content) in history {
            instruction.push_str(&format!("@{}: {}\n", sender, content));
        }
        instruction.push_str("Reply naturally to the last message.");
    }
    instruction.push_str(" Keep it to one or two sentences. Reply with the message only.");
    instruction
}

pub fn community_instruction(recent: &[(String, String)]) -> String {
    let mut instruction =
        String::from("You are hanging out in the Robogram community chat room with other creators.");
    if !recent.is_empty() {
        instruction.push_str(" Latest messages:\n");
        for (sender, content) in recent {
            instruction.push_str(&format!("@{}: {}\n", sender, content));
        }
    }
    instruction.push_str(
        " Add one short message to the chat (under 150 characters). Reply with the message only.",
    );
    instruction
}

pub fn bio_instruction() -> String {
    "Write a short Instagram bio for yourself (under 150 characters, 1-2 emojis). \
     Reply with the bio only."
        .to_string()
}

/// Trim model output and strip quotes wrapped around the whole text
pub fn clean_output(raw: &str) -> String {
    let mut text = raw.trim();
    for (open, close) in [('"', '"'), ('\'', '\''), ('“', '”'), ('‘', '’')] {
        if text.len() >= 2 && text.starts_with(open) && text.ends_with(close) {
            text = &text[open.len_utf8()..text.len() - close.len_utf8()];
            text = text.trim();
        }
    }
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_strips_framing_phrases() {
        let prompt = compose_image_prompt(
            "Young woman with curly red hair, film camera around her neck, centered in frame, close-up portrait",
            "on a rooftop at golden hour",
        );
        assert!(!prompt.to_lowercase().contains("centered in frame"));
        assert!(!prompt.to_lowercase().contains("close-up portrait"));
        assert!(prompt.starts_with("Young woman with curly red hair, film camera around her neck."));
        assert!(prompt.contains("Scene: on a rooftop at golden hour."));
        assert!(!prompt.contains("  "));
    }

    #[test]
    fn test_strip_framing_is_case_insensitive() {
        assert_eq!(
            strip_framing("CLOSE-UP PORTRAIT of a chef,   Centered In Frame, warm kitchen light"),
            "of a chef, warm kitchen light"
        );
    }

    #[test]
    fn test_compose_with_empty_style() {
        let prompt = compose_image_prompt("close-up portrait", "in a quiet library corner");
        assert!(prompt.starts_with("Scene: in a quiet library corner."));
    }

    #[test]
    fn test_clean_output_strips_wrapping_quotes() {
        assert_eq!(clean_output("  \"Sunset therapy 🌅\"  "), "Sunset therapy 🌅");
        assert_eq!(clean_output("“Fresh pasta day 🍝”"), "Fresh pasta day 🍝");
        assert_eq!(clean_output("He said \"wow\" today"), "He said \"wow\" today");
        assert_eq!(clean_output("\"\""), "");
    }

    #[test]
    fn test_caption_instruction_mentions_limits() {
        let instruction = caption_instruction("in a cozy home kitchen");
        assert!(instruction.contains("under 200 characters"));
        assert!(instruction.contains("1-3 emojis"));
        assert!(instruction.contains("do not use hashtags"));
    }

    #[test]
    fn test_fallback_pools_are_never_empty() {
        let mut rng = rand::thread_rng();
        for pool in [FALLBACK_CAPTIONS, FALLBACK_COMMENTS, FALLBACK_DM_LINES, FALLBACK_COMMUNITY_LINES] {
            assert!(!pick_fallback(pool, &mut rng).is_empty());
        }
        assert!(SCENES.contains(&random_scene(&mut rng)));
    }
}
