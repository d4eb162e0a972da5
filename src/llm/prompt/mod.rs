
use itertools::Itertools;

pub const INST_OPEN: &str = "<s>[INST]";
pub const INST_CLOSE: &str = "[/INST]";

pub const DOCUMENTATION_HEADER: &str = "## Documentation Context:";
pub const WEB_CONTEXT_HEADER: &str = "## Additional Information From Web Search:";
pub const QUESTION_HEADER: &str = "## User Question:";

const SYSTEM_INSTRUCTIONS: &str = "\
You are an expert technical assistant specializing in MATLAB, programming, and data analysis.

System Instructions:
1. Answer the user's question based primarily on the provided documentation context.
2. If the documentation context is insufficient, use any additional web search information provided.
3. Provide practical, step-by-step solutions.
4. Include relevant code examples when helpful.
5. If you're unsure or if information is missing, acknowledge the limitations in your answer.
6. Format your response in well-structured Markdown to make it easily readable on the web.
7. Focus on technical accuracy and precision.
8. While responding write only the MATLAB code in ```matlab code blocks.
9. Do not include any other text in the code block.
10. Ensure good formatting and readability in your response and have good spacing too.";

/// Build the instruction prompt for one question.
///
/// `chunks` are the retrieved documentation texts in retrieval order. The web block is
/// left out entirely when `web_context` is blank.
#[inline]
pub fn format_prompt<S: AsRef<str>>(question: &str, chunks: &[S], web_context: &str) -> String {
    let documentation = chunks.iter().map(|c| c.as_ref().trim()).join("\n");

    let mut prompt = format!(
        "{INST_OPEN} {SYSTEM_INSTRUCTIONS}\n\n{DOCUMENTATION_HEADER}\n\n{}\n\n",
        documentation.trim()
    );

    let web_context = web_context.trim();
    if !web_context.is_empty() {
        prompt.push_str(WEB_CONTEXT_HEADER);
        prompt.push_str("\n\n");
        prompt.push_str(web_context);
        prompt.push_str("\n\n");
    }

    prompt.push_str(QUESTION_HEADER);
    prompt.push('\n');
    prompt.push_str(question.trim());
    prompt.push(' ');
    prompt.push_str(INST_CLOSE);

    prompt
}

/// The model's answer: the text after the first `[/INST]`, or the whole output
#[inline]
pub fn extract_answer(generated: &str) -> String {
    generated
        .find(INST_CLOSE)
        .map_or(generated, |start| &generated[start + INST_CLOSE.len()..])
        .trim()
        .to_string()
}

/// Rewrite Markdown code fences as `<pre>` blocks.
///
/// Fences alternate between opening and closing; an opening fence drops its language tag.
#[inline]
pub fn render_code_blocks(answer: &str) -> String {
    let mut rendered = String::with_capacity(answer.len());
    let mut rest = answer;
    let mut inside = false;

    while let Some(pos) = rest.find("```") {
        rendered.push_str(&rest[..pos]);
        rest = &rest[pos + 3..];

        if inside {
            rendered.push_str("</pre>");
        } else {
            rendered.push_str("<pre>");
            if let Some(line_end) = rest.find('\n') {
                let tag = rest[..line_end].trim();
                if tag
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '+' || c == '-')
                {
                    rest = &rest[line_end..];
                }
            }
        }
        inside = !inside;
    }

    rendered.push_str(rest);
    rendered
}
