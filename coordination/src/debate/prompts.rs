//! Prompt templates for participants and the moderator.

use super::state::{DebateState, HistoryEntry};

/// Prefix of a judge reply that ends the debate.
pub const CONSENSUS_PREFIX: &str = "CONSENSUS:";
/// Prefix of a judge reply that lets the debate continue.
pub const NO_CONSENSUS_PREFIX: &str = "NO_CONSENSUS";

/// Prompt for the participant taking the opening turn.
pub fn opener_prompt(others: &[&str], topic: &str, article_context: Option<&str>) -> String {
    let mut prompt = format!(
        "You're in a lively debate with {}. The topic is: \"{}\". You are an opinionated and confrontational AI. You often disagree with others but you always give strong arguments to back up your claims. You speak in a casual and informal style. You don't use long sentences or \"big words\". You avoid cliches and truisms. Your goal is to challenge their belief system. Keep your responses short, limited to 2-3 sentences. Don't introduce yourself.",
        others.join(", "),
        topic
    );
    if let Some(article) = article_context {
        prompt.push_str(&format!("\n\nArticle content being debated:\n{}", article));
    }
    prompt
}

/// Prompt for a participant answering mid-debate.
///
/// Human interjections stay in transcript order, tagged `(human)`, and the
/// most recent one is repeated so the model does not overlook it.
pub fn participant_prompt(identifier: &str, others: &[&str], state: &DebateState) -> String {
    let mut prompt = format!(
        "You're {} in a lively debate with {}. Topic: \"{}\"\n\nConversation so far:\n",
        identifier,
        others.join(", "),
        state.topic
    );

    for entry in &state.history {
        match entry {
            HistoryEntry::Turn(turn) => {
                prompt.push_str(&format!("{}: {}\n\n", turn.speaker, turn.content))
            }
            HistoryEntry::Human(human) => {
                prompt.push_str(&format!("{} (human): {}\n\n", human.author, human.content))
            }
        }
    }

    if let Some(human) = state.latest_interjection() {
        prompt.push_str(&format!(
            "A human just said: \"{}\" ({}). Respond to them directly if it's relevant.\n\n",
            human.content, human.author
        ));
    }

    if let Some(article) = &state.article_context {
        prompt.push_str(&format!("Article content being debated:\n{}\n\n", article));
    }

    prompt.push_str(&format!(
        "Now respond as {}. React to what was said, agree or disagree, add your perspective. Keep it to 2-3 sentences. Be conversational and engaging.",
        identifier
    ));
    prompt
}

/// Prompt asking the moderator's model for a consensus verdict.
pub fn judge_prompt(state: &DebateState, round: u32) -> String {
    format!(
        "You are moderating a debate on \"{}\". Round {} of {} just finished.\n\nTranscript:\n{}\n\nHave the participants reached consensus? Reply with exactly one line in one of these two formats and nothing else:\n{} <one-sentence summary>\n{}: <one-sentence disagreement>",
        state.topic,
        round,
        state.total_rounds,
        state.transcript(),
        CONSENSUS_PREFIX,
        NO_CONSENSUS_PREFIX
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debate::protocol::Turn;
    use crate::debate::state::{DebateStatus, HumanInterjection};

    fn state(history: Vec<HistoryEntry>, article: Option<&str>) -> DebateState {
        DebateState {
            topic: "Should cities ban cars?".to_string(),
            total_rounds: 2,
            current_round: 1,
            participant_turns: 1,
            history,
            article_context: article.map(str::to_string),
            status: DebateStatus::AwaitingTurn {
                next: "ChatGPT".to_string(),
                round: 1,
            },
        }
    }

    fn claude_turn() -> HistoryEntry {
        HistoryEntry::Turn(Turn {
            speaker: "Claude".to_string(),
            content: "Cars ate our streets.".to_string(),
            round: 1,
            turn: 1,
            next: Some("ChatGPT".to_string()),
        })
    }

    #[test]
    fn test_participant_prompt_lists_transcript() {
        let s = state(vec![claude_turn()], None);
        let prompt = participant_prompt("ChatGPT", &["Claude", "Gemini"], &s);
        assert!(prompt.starts_with("You're ChatGPT in a lively debate with Claude, Gemini."));
        assert!(prompt.contains("Topic: \"Should cities ban cars?\""));
        assert!(prompt.contains("Claude: Cars ate our streets.\n\n"));
        assert!(prompt.ends_with("Be conversational and engaging."));
        assert!(!prompt.contains("A human just said"));
        assert!(!prompt.contains("Article content"));
    }

    #[test]
    fn test_participant_prompt_highlights_latest_human() {
        let s = state(
            vec![
                HistoryEntry::Human(HumanInterjection {
                    author: "dana".to_string(),
                    content: "what about deliveries?".to_string(),
                }),
                claude_turn(),
                HistoryEntry::Human(HumanInterjection {
                    author: "eli".to_string(),
                    content: "and ambulances?".to_string(),
                }),
            ],
            Some("Paris cut traffic by 40%."),
        );
        let prompt = participant_prompt("ChatGPT", &["Claude", "Gemini"], &s);
        assert!(prompt.contains("dana (human): what about deliveries?"));
        assert!(prompt.contains("A human just said: \"and ambulances?\" (eli)"));
        assert!(prompt.contains("Article content being debated:\nParis cut traffic by 40%."));
    }

    #[test]
    fn test_opener_prompt() {
        let prompt = opener_prompt(&["ChatGPT", "Gemini"], "Tabs vs spaces", None);
        assert!(prompt.starts_with("You're in a lively debate with ChatGPT, Gemini."));
        assert!(prompt.contains("The topic is: \"Tabs vs spaces\""));
        assert!(prompt.ends_with("Don't introduce yourself."));
    }

    #[test]
    fn test_judge_prompt_excludes_humans() {
        let s = state(
            vec![
                claude_turn(),
                HistoryEntry::Human(HumanInterjection {
                    author: "dana".to_string(),
                    content: "boo".to_string(),
                }),
            ],
            None,
        );
        let prompt = judge_prompt(&s, 1);
        assert!(prompt.contains("Round 1 of 2"));
        assert!(prompt.contains("Claude: Cars ate our streets."));
        assert!(!prompt.contains("boo"));
        assert!(prompt.contains("CONSENSUS: <one-sentence summary>"));
        assert!(prompt.contains("NO_CONSENSUS: <one-sentence disagreement>"));
    }
}
