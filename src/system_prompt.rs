//! System prompt construction with tool catalog injection
//!
//! The prompt is the assistant persona followed by a short catalog of the
//! registered tools. The backend also receives full tool schemas; the catalog
//! only nudges the model toward using them.

use crate::tools::ToolSpec;
use std::fmt::Write;

/// Base system prompt establishing the assistant's persona
const BASE_PROMPT: &str = r"You are Jarvis, a highly intelligent personal AI assistant.
You are helpful, concise, and proactive. You have access to various tools and skills.
You can remember facts about the user, answer questions, and assist with tasks.
Always be respectful and efficient. When uncertain, ask clarifying questions.
Keep responses conversational and natural, as if speaking to a friend.

Your replies may be read aloud, so avoid markdown, tables, and long lists.";

/// Build the complete system prompt for the given tool set.
pub fn build_system_prompt(tools: &[&ToolSpec]) -> String {
    let mut prompt = String::from(BASE_PROMPT);

    if !tools.is_empty() {
        prompt.push_str("\n\n<available_tools>\n");
        prompt.push_str(
            "Call a tool whenever it gives a better answer than guessing, e.g. for the current time, arithmetic, or recent events.\n",
        );
        for tool in tools {
            let _ = writeln!(prompt, "- {}: {}", tool.name, tool.description);
        }
        prompt.push_str("</available_tools>");
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_system_prompt_no_tools() {
        let prompt = build_system_prompt(&[]);
        assert!(prompt.starts_with("You are Jarvis"));
        assert!(!prompt.contains("<available_tools>"));
    }

    #[test]
    fn test_build_system_prompt_lists_tools_in_order() {
        let time = ToolSpec::new("time", "Get the current time or date");
        let calc = ToolSpec::new("calculator", "Perform mathematical calculations");
        let prompt = build_system_prompt(&[&time, &calc]);

        assert!(prompt.contains("<available_tools>"));
        assert!(prompt.ends_with("</available_tools>"));
        let time_pos = prompt.find("- time: Get the current time").unwrap();
        let calc_pos = prompt.find("- calculator: Perform").unwrap();
        assert!(time_pos < calc_pos);
    }
}
