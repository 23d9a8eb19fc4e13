//! Prompt template for CTD compliance review.
//!
//! Every chunk is wrapped in the same reviewer persona and response format so
//! that fragments from different chunks read as one consistent report.

/// Placeholder replaced with the chunk text.
pub const CONTENT_PLACEHOLDER: &str = "{content}";

/// Review prompt; `{content}` is replaced with the chunk.
pub const REVIEW_PROMPT_TEMPLATE: &str = r#"You are an expert in reviewing Common Technical Dossiers (CTDs) for regulatory compliance and quality.
Analyze the following CTD content and provide a structured review with detailed comments for improvement.

Content:
{content}

Provide your feedback in the format below:
- Section of CTD: [Section Name]
- Subsection of CTD: [Subsection Name]
- Review Comments: [Detailed Feedback]"#;

/// Build the review prompt for one chunk.
pub fn review_prompt(chunk: &str) -> String {
    REVIEW_PROMPT_TEMPLATE.replacen(CONTENT_PLACEHOLDER, chunk, 1)
}
