//! Human approval tokens and the final approval payload.

use crate::extract::CodeArtifact;

/// Sentinel that marks a turn as the terminal approval payload.
pub const APPROVAL_BANNER: &str = "Final Code Approved!";

/// Replies that count as human sign-off after trimming and lowercasing.
pub const APPROVAL_TOKENS: [&str; 5] = ["ok", "ok.", "yes", "looks good", "bye"];

/// Exact-set match of normalized feedback against [`APPROVAL_TOKENS`].
pub fn is_approval(feedback: &str) -> bool {
    let normalized = feedback.trim().to_lowercase();
    APPROVAL_TOKENS.contains(&normalized.as_str())
}

/// Whether a turn's content is a final approval payload.
pub fn is_final_payload(content: &str) -> bool {
    content.contains(APPROVAL_BANNER)
}

/// Render the approval message with each block re-wrapped in its fence.
pub fn render_final_payload(artifact: &CodeArtifact) -> String {
    format!(
        "{banner}\nHere is the complete and final code for your frontend:\n```html\n{html}\n```\n```css\n{css}\n```\n```javascript\n{js}\n```\n",
        banner = APPROVAL_BANNER,
        html = artifact.html,
        css = artifact.css,
        js = artifact.javascript,
    )
}
