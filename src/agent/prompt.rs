//! Prompt assembly for action decisions and forced answers.

use crate::contracts::llm::LlmRequest;

use super::actions::ActionPermissions;
use super::context::AgentContext;

const ACTION_SYSTEM: &str = "You are a deep-research agent. Each step you take \
exactly one action from the allowed set, expressed as a JSON object whose \
\"action\" field names the variant and whose remaining fields carry its \
parameters:\n\
- search: {\"action\": \"search\", \"queries\": [{\"q\": string}]}\n\
- read: {\"action\": \"read\", \"urls\": [string]}\n\
- reflect: {\"action\": \"reflect\", \"gap_questions\": [string]}\n\
- answer: {\"action\": \"answer\", \"answer\": string, \"references\": []}\n\
- coding: {\"action\": \"coding\", \"code\": string}\n\
Choosing an action outside the allowed set is an error.";

/// Build the per-step action prompt.
///
/// Carries the original question, the question under rotation, all
/// accumulated knowledge, the diary, and the allowed actions.
pub fn build_action_prompt(ctx: &AgentContext, permissions: &ActionPermissions) -> LlmRequest {
    let mut user = String::new();
    user.push_str(&format!(
        "Original question: {}\n",
        ctx.original_question.text
    ));
    if ctx.current_question.text != ctx.original_question.text {
        user.push_str(&format!("Current focus: {}\n", ctx.current_question.text));
    }

    let knowledge = ctx.knowledge.format_for_prompt();
    if !knowledge.is_empty() {
        user.push_str("\nKnowledge gathered so far:\n");
        user.push_str(&knowledge);
    }

    let diary = ctx.format_diary();
    if !diary.is_empty() {
        user.push_str("\nActions taken so far:\n");
        user.push_str(&diary);
        user.push('\n');
    }

    user.push_str(&format!(
        "\nAllowed actions this step: {}.\nChoose exactly one.",
        permissions.allowed_names().join(", ")
    ));

    LlmRequest::new(user)
        .with_system(ACTION_SYSTEM.to_string())
        .with_temperature(0.2)
}

/// Stricter re-prompt after a contract violation.
pub fn build_strict_reprompt(
    ctx: &AgentContext,
    permissions: &ActionPermissions,
    violation: &str,
) -> LlmRequest {
    let base = build_action_prompt(ctx, permissions);
    let user = format!(
        "{}\n\nYour previous response was invalid: {violation}\n\
         Respond with a single JSON object for one allowed action and nothing else.",
        base.user
    );
    LlmRequest::new(user)
        .with_system(ACTION_SYSTEM.to_string())
        .with_temperature(0.0)
}

/// Forced-answer prompt used under beast mode.
///
/// Targets the current question, which the machine retags as a beast
/// rewrite of the original before the first attempt.
pub fn build_beast_prompt(ctx: &AgentContext, temperature: f64) -> LlmRequest {
    let mut user = String::new();
    user.push_str(&format!(
        "Question: {}\n\n",
        ctx.current_question.text
    ));
    let knowledge = ctx.knowledge.format_for_prompt();
    if knowledge.is_empty() {
        user.push_str("No knowledge was gathered.\n");
    } else {
        user.push_str("Everything known:\n");
        user.push_str(&knowledge);
    }
    user.push_str(
        "\nThe research budget is exhausted. Produce the best possible answer \
         from the knowledge above, right now, as {\"action\": \"answer\", \
         \"answer\": string, \"references\": []}. Do not ask for more research.",
    );

    LlmRequest::new(user)
        .with_system(ACTION_SYSTEM.to_string())
        .with_temperature(temperature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::BudgetTracker;
    use crate::knowledge::types::KnowledgeItem;

    fn ctx() -> AgentContext {
        AgentContext::new("What is 2+2?", BudgetTracker::new(1_000))
    }

    #[test]
    fn test_action_prompt_lists_allowed_actions() {
        let perms = ActionPermissions {
            search: true,
            read: false,
            reflect: true,
            answer: true,
            coding: false,
        };
        let request = build_action_prompt(&ctx(), &perms);
        assert!(request.user.contains("search, reflect, answer"));
        assert!(!request.user.contains("coding"));
        assert!(request.system.as_deref().unwrap().contains("exactly one action"));
    }

    #[test]
    fn test_prompt_includes_knowledge_and_diary() {
        let mut ctx = ctx();
        ctx.knowledge.push(KnowledgeItem::SideInfo {
            question: "q".into(),
            answer: "four is the sum".into(),
            source_url: "https://example.com/".into(),
        });
        ctx.total_step = 1;
        ctx.add_diary("search", "2 queries ran");

        let request = build_action_prompt(&ctx, &ActionPermissions::answer_only());
        assert!(request.user.contains("four is the sum"));
        assert!(request.user.contains("2 queries ran"));
    }

    #[test]
    fn test_strict_reprompt_mentions_violation() {
        let request = build_strict_reprompt(
            &ctx(),
            &ActionPermissions::answer_only(),
            "chose disallowed action search",
        );
        assert!(request.user.contains("disallowed action search"));
        assert_eq!(request.temperature, Some(0.0));
    }

    #[test]
    fn test_beast_prompt_has_elevated_temperature() {
        let request = build_beast_prompt(&ctx(), 0.9);
        assert_eq!(request.temperature, Some(0.9));
        assert!(request.user.contains("budget is exhausted"));
    }
}
