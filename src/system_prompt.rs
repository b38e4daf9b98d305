//! Instructions sent with every model consultation

use crate::config::AgentProfile;
use crate::state::ConversationState;

/// Static instructions of the basic profile
const BASIC_PROMPT: &str = "Be fun!";

/// Tool-use policy of the curated profile. Advisory: nothing enforces it.
const CURATED_POLICY: &str = r"You are a helpful assistant that maintains a list of proverbs.

Rules for using tools:
1. Call set_proverbs exactly once at the start of handling a request. Never call it twice in a row.
2. Only call add_proverbs when the user explicitly asks to add proverbs. If they ask you to add one but do not supply it, invent one proverb at random.
3. Never repeat the contents of the proverbs in your chat reply.
4. After any change to the proverbs, call display_proverbs. Never call it twice in a row.
5. End every turn with a one-sentence summary of what you did. Leave out the proverbs themselves unless you modified them.";

/// Render the system prompt for the current state
pub fn build_system_prompt(profile: AgentProfile, state: &ConversationState) -> String {
    match profile {
        AgentProfile::Basic => BASIC_PROMPT.to_string(),
        AgentProfile::Curated => {
            let rendered = serde_json::to_string_pretty(&state.proverbs)
                .unwrap_or_else(|_| "[]".to_string());
            format!("{CURATED_POLICY}\n\nThe current proverbs are:\n{rendered}")
        }
    }
}
