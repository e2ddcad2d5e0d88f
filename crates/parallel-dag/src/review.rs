//! Review / revision sub-protocol: prompt assembly and the reviewer's
//! `APPROVED` / `REVISION_NEEDED` decision parser.

pub struct Decision {
    pub approved: bool,
    pub feedback: String,
}

pub const REVIEW_PROTOCOL_BLOCK: &str = "\n\n## Review Protocol\n\nEnd your response with exactly one line containing only APPROVED if the work is acceptable, or REVISION_NEEDED if changes are required.";

pub fn default_review_prompt(task: &str, worker_output: &str) -> String {
    format!(
        "Review the following work against the original task.\n\nOriginal task: {task}\n\nWork to review:\n{worker_output}"
    )
}

/// Render the reviewer's prompt, substituting `{task}`/`{output}` into
/// a custom template if one was supplied.
pub fn render_review_prompt(template: Option<&str>, task: &str, worker_output: &str) -> String {
    match template {
        Some(t) => t.replace("{output}", worker_output).replace("{task}", task),
        None => default_review_prompt(task, worker_output),
    }
}

pub fn iteration_note(iteration: u32, max_iterations: u32) -> String {
    format!("\n\n(iteration {iteration}/{max_iterations})")
}

pub fn previous_feedback_note(previous_reviewer_output: &str) -> String {
    format!("\n\nPrevious Review Feedback:\n{previous_reviewer_output}")
}

pub const FINAL_ITERATION_NOTE: &str =
    "\n\nThis is the final iteration; the work will be accepted regardless of this review.";

pub fn revision_prompt(original_task: &str, worker_previous_output: &str, reviewer_feedback: &str) -> String {
    format!(
        "Revise your previous work based on reviewer feedback.\n\nOriginal task: {original_task}\n\nYour previous output:\n{worker_previous_output}\n\nReviewer feedback:\n{reviewer_feedback}"
    )
}

/// Parse a reviewer's output into an approval decision. Never panics:
/// anything that doesn't match the expected tail markers defaults to
/// rejected with the whole output as feedback.
pub fn parse_decision(output: &str) -> Decision {
    let lines: Vec<&str> = output.lines().collect();
    if let Some(last_idx) = lines.iter().rposition(|line| !line.trim().is_empty()) {
        let candidate = lines[last_idx].trim();
        if candidate == "APPROVED" {
            return Decision {
                approved: true,
                feedback: lines[..last_idx].join("\n"),
            };
        }
        if candidate == "REVISION_NEEDED" {
            return Decision {
                approved: false,
                feedback: lines[..last_idx].join("\n"),
            };
        }
    }

    let tail_start = output.len().saturating_sub(200);
    let tail = realign_tail(output, tail_start).to_lowercase();
    if tail.contains("approved") && !tail.contains("not approved") && !tail.contains("revision") {
        return Decision {
            approved: true,
            feedback: output.to_string(),
        };
    }
    Decision {
        approved: false,
        feedback: output.to_string(),
    }
}

fn realign_tail(s: &str, mut idx: usize) -> &str {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    &s[idx.min(s.len())..]
}
