// Prompt fragments shared by every caller of the LLM client.

/// Instruction appended to prompts whose answer is shown verbatim to end users.
pub const PLAIN_TEXT_INSTRUCTION: &str = "\
    Respond with plain prose only. \
    Do NOT use markdown, bullet points, headings, or emojis. \
    Do NOT restate the input or add a preamble.";
