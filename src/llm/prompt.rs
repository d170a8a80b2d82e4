//! Prompt layout shared by the RAG orchestrator and the extractive generator.

pub const CONTEXT_HEADER: &str = "Context:";
pub const QUESTION_HEADER: &str = "Question:";
pub const ANSWER_HEADER: &str = "Answer:";

pub fn rag_prompt(question: &str, context: &str) -> String {
    format!(
        "{}\n{}\n\n{} {}\n{}",
        CONTEXT_HEADER,
        context.trim(),
        QUESTION_HEADER,
        question.trim(),
        ANSWER_HEADER
    )
}

/// Split a prompt built by `rag_prompt` into `(context, question)`.
/// A prompt without the layout is treated as all context, no question.
pub fn split_rag_prompt(prompt: &str) -> (&str, &str) {
    let body = prompt
        .trim()
        .strip_prefix(CONTEXT_HEADER)
        .unwrap_or(prompt.trim());

    match body.rfind(&format!("\n{} ", QUESTION_HEADER)) {
        Some(at) => {
            let context = &body[..at];
            let question = &body[at + QUESTION_HEADER.len() + 2..];
            let question = question
                .trim_end()
                .strip_suffix(ANSWER_HEADER)
                .unwrap_or(question);
            (context.trim(), question.trim())
        }
        None => (body.trim(), ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_layout_splits_back() {
        let prompt = rag_prompt(" What is Rosa canina? ", "Dog rose is a wild rose.\n\nIt grows in Europe.");
        assert!(prompt.starts_with("Context:\nDog rose"));
        assert!(prompt.ends_with("Question: What is Rosa canina?\nAnswer:"));

        let (context, question) = split_rag_prompt(&prompt);
        assert_eq!(context, "Dog rose is a wild rose.\n\nIt grows in Europe.");
        assert_eq!(question, "What is Rosa canina?");
    }

    #[test]
    fn free_text_is_all_context() {
        assert_eq!(split_rag_prompt("just text"), ("just text", ""));
    }
}
