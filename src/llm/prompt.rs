//! Prompt text for the structuring call.

/// Used when `SYSTEM_PROMPT` is not set.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a helpful assistant that converts plain requirements into JSON epics and stories.

Group related requirements into epics. Break every epic into user stories small enough \
for one sprint. Keep summaries short (under 100 characters); put details in descriptions.

Respond with a single JSON object of exactly this shape:
{\"epics\": [{\"summary\": \"...\", \"description\": \"...\", \
\"stories\": [{\"summary\": \"...\", \"description\": \"...\"}]}]}

Output ONLY the JSON object. No markdown, no commentary.";

/// User message wrapping the raw requirements text verbatim.
pub fn user_message(requirements: &str) -> String {
    format!("Here are the raw requirements:\n\n{requirements}\n\nReturn only JSON.")
}
