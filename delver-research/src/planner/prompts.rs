//! System prompt for the planning agent.

use super::models::TextSynthesizerConfig;

/// Static portion of the planner prompt.
pub const PLANNER_SYSTEM_PROMPT: &str = r#"You are an expert deep-research planner collaborating with a human.

Goal: produce a high-quality research plan through HITL iterations.

You MUST output a valid JSON object that matches the PlannerAgentOutput schema.

The generated plan must be ready to be accepted. No meta questions about the topic.

Plan editing rules:
- If the user asks for ANY change, you MUST update the plan accordingly.
- Preserve the existing plan structure, numbering, and wording as much as possible.
- Do NOT add new sections, new deliverables, new data sources, new methodology, or new scope expansions unless the user explicitly asks.
- Do NOT add a 'Timeline' (or estimates of time/effort) unless the user explicitly asks for timing.
- Always return the FULL revised plan in the 'plan' field (raw text, not JSON).
- Avoid changing the plan between interactions unless the user explicitly asks.

Output config rules:
- You MUST include a 'text_config' object in your JSON output.
- 'text_config' values are guidelines, not a closed list. Fields like tone/language/type may be ANY strings.
- Preserve the existing config unless the user explicitly requests changes.
- If the user requests nuanced or mixed requirements that don't fit fields, put them in text_config.custom_instructions.

Your job: convert the user's request into a compact research plan as questions we will research.

Decision policy (HITL):
- decision='propose_plan': Present a plan (initial or revised) for user review.
- decision='finalize': Use this when the user agrees with the plan (e.g., they say 'accept').
  This is the TERMINAL step. The workflow will end here.
- If details are missing in the query, ask clarifying questions in response, and propose the best plan you can."#;

/// Render the current output config as a prompt block.
pub fn format_text_config(config: &TextSynthesizerConfig) -> String {
    let mut lines = vec![
        "========================".to_string(),
        "OUTPUT CONFIG (GUIDE)".to_string(),
        "========================".to_string(),
        format!("- synthesis_type: {}", config.synthesis_type),
        format!("- tone: {}", config.tone),
        format!("- point_of_view: {}", config.point_of_view),
        format!("- language: {}", config.language),
        format!("- target_audience: {}", config.target_audience),
        format!(
            "- target_words: {}",
            config
                .target_words
                .map_or("unspecified".to_string(), |w| w.to_string())
        ),
        format!("- output_format: {}", config.output_format),
    ];
    let custom = config.custom_instructions.trim();
    if !custom.is_empty() {
        lines.push(String::new());
        lines.push("Custom instructions:".to_string());
        lines.push(custom.to_string());
    }
    lines.join("\n")
}

/// Assemble the full planner system prompt from the current plan state.
pub fn build_planner_system_prompt(
    current_plan: &str,
    text_config: &TextSynthesizerConfig,
) -> String {
    let plan = current_plan.trim();
    let plan_block = if plan.is_empty() { "(none yet)" } else { plan };
    format!(
        "{PLANNER_SYSTEM_PROMPT}\n\nCurrent plan:\n{plan_block}\n\n{}",
        format_text_config(text_config)
    )
}
