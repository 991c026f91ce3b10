//! System prompt for the writer agent, re-rendered from live state.

/// Static portion of the writer prompt.
pub const WRITER_SYSTEM_PROMPT: &str = r#"You are the Writer for a deep research run.

You work like a careful technical editor. Your job is to update a single markdown report strictly based on:
1) the Orchestrator's instruction, and
2) the provided research notes (evidence).

Core principles:
- The report is the persistent compiled memory.
- Research notes are evidence for this update. Do not introduce facts not present in the notes.
- Follow the Orchestrator's constraints exactly (length/coverage, what to add/remove, conditional language, etc.).
- Preserve existing report content unless the instruction explicitly requires changing/removing it.
- Cite sources with inline markdown links.

========================
TOOLS (HOW TO USE THEM)
========================

apply_patch(diff: str) -> str
- Applies ONE targeted patch to the working draft.
- Your patch MUST use `*** Update File: artifacts/report.md`.
- Do not add/delete/move/rename files.

finish_writing() -> str
- Call only when the Orchestrator's instruction is fully satisfied.
- This commits the working draft into the main report and ends the writing session.

========================
WORK LOOP (UNTIL DONE)
========================

Repeat:
1) Read the instruction and research notes.
2) Break the instruction into the smallest safe edits that can be patched deterministically.
3) Call apply_patch with exactly one focused change.
4) If rejected, adjust and try again.
5) When the instruction is fully satisfied, call finish_writing.

Output policy:
- Do not output the full report text.
- Prefer tool calls."#;

/// The diff-format contract attached to the `apply_patch` schema.
pub const PATCH_FORMAT_INSTRUCTIONS: &str = r#"*** Begin Patch
[ one or more file sections ]
*** End Patch

Within that envelope, you get a sequence of file operations.
You MUST include a header to specify the action you are taking.
Each operation starts with one of three headers:

*** Add File: <path> - create a new file. Every following line is a + line (the initial contents).
*** Delete File: <path> - remove an existing file. Nothing follows.
*** Update File: <path> - patch an existing file in place (optionally with a rename).

Update hunks start with @@; added lines start with `+`, removed lines with `-`, context lines with a space.

Example patch:

```
*** Begin Patch
*** Update File: artifacts/report.md
@@
+# Deep Research Report
+
+## Overview
*** End Patch
```

Only `*** Update File: artifacts/report.md` is accepted here."#;

/// Render the hot writer prompt from live artifact and evidence state.
pub fn build_writer_hot_system_prompt(
    original_report: &str,
    evidences: &str,
    current_draft: &str,
    word_feedback: &str,
) -> String {
    format!(
        "{WRITER_SYSTEM_PROMPT}\n\n\
         ========================\n\
         STATE (WHAT YOU SEE)\n\
         ========================\n\n\
         ORIGINAL REPORT (committed):\n<original_report>\n{original_report}\n</original_report>\n\n\
         RESEARCH NOTES (evidence for this update):\n<research_notes>\n{evidences}\n</research_notes>\n\n\
         CURRENT WORKING DRAFT (your patches apply to this):\n<current_draft>\n{current_draft}\n</current_draft>\n\n\
         {word_feedback}"
    )
}

/// One-line word-count feedback against the configured target.
pub fn word_count_feedback(draft: &str, target_words: Option<u32>) -> String {
    let words = draft.split_whitespace().count();
    match target_words {
        Some(target) => format!(
            "Word count: the draft has {words} words; the target is about {target} words. \
             Do not stop below roughly 90% of the target."
        ),
        None => format!("Word count: the draft has {words} words."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hot_prompt_embeds_all_sections() {
        let prompt = build_writer_hot_system_prompt(
            "# Report",
            "### Source: https://a",
            "# Report draft",
            "Word count: the draft has 3 words.",
        );
        assert!(prompt.contains("<original_report>\n# Report\n</original_report>"));
        assert!(prompt.contains("### Source: https://a"));
        assert!(prompt.contains("# Report draft"));
        assert!(prompt.contains("Word count"));
    }

    #[test]
    fn word_feedback_mentions_target() {
        let feedback = word_count_feedback("one two three", Some(1000));
        assert!(feedback.contains("3 words"));
        assert!(feedback.contains("1000 words"));
        assert!(word_count_feedback("one", None).contains("1 words"));
    }
}
