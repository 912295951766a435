//! Prompt assembly for question answering.

/// Turns retrieved context and a question into a completion prompt.
///
/// Domain-specific framing (filings, transcripts) plugs in here.
pub trait PromptBuilder: Send + Sync {
    /// Build the prompt.
    fn build_prompt(&self, context: &str, question: &str) -> String;
}

/// Grounded question-answering template.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPromptBuilder;

impl PromptBuilder for DefaultPromptBuilder {
    fn build_prompt(&self, context: &str, question: &str) -> String {
        format!(
            "Answer the question using only the context below. If the context \
             does not contain the answer, say so.\n\nQuestion: {question}\n\nContext:\n{context}"
        )
    }
}

impl<F> PromptBuilder for F
where
    F: Fn(&str, &str) -> String + Send + Sync,
{
    fn build_prompt(&self, context: &str, question: &str) -> String {
        self(context, question)
    }
}

pub(crate) fn related_queries_prompt(question: &str, n: usize) -> String {
    format!(
        "In light of the original question: '{question}', write a JSON array of \
         {n} distinct but related search queries. Each query should look at the \
         question from a different angle. Respond with the JSON array only."
    )
}

/// Prompt merging per-query answers, given most relevant first as
/// `(query, answer)` pairs.
pub(crate) fn synthesis_prompt(question: &str, answers: &[(&str, &str)]) -> String {
    let mut prompt = format!(
        "The original question was: '{question}'. Below are answers to it and to \
         related questions, most relevant first. Write one complete answer to the \
         original question using all of them, giving more weight to earlier ones.\n\n"
    );
    for (rank, (query, answer)) in answers.iter().enumerate() {
        prompt.push_str(&format!("Answer {} (to '{query}'):\n{answer}\n\n", rank + 1));
    }
    prompt.push_str("Combined answer:");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_puts_context_last() {
        let prompt = DefaultPromptBuilder.build_prompt("the facts", "what?");
        assert!(prompt.contains("Question: what?"));
        assert!(prompt.ends_with("Context:\nthe facts"));
    }

    #[test]
    fn test_synthesis_lists_answers_in_order() {
        let prompt = synthesis_prompt("why?", &[("why?", "first"), ("how?", "second")]);
        assert!(prompt.contains("'why?'"));
        let first = prompt.find("Answer 1 (to 'why?'):\nfirst").unwrap();
        let second = prompt.find("Answer 2 (to 'how?'):\nsecond").unwrap();
        assert!(first < second);
        assert!(prompt.ends_with("Combined answer:"));
    }

    #[test]
    fn test_closures_are_builders() {
        let builder = |ctx: &str, q: &str| format!("{q}|{ctx}");
        assert_eq!(builder.build_prompt("c", "q"), "q|c");
    }
}
