//! 提示词构造
//!
//! 所有生成步骤的提示词集中在这里，输出格式统一要求为 JSON

/// 章节列表输出格式
pub const CHAPTER_LIST_SCHEMA: &str = r#"{
  "chapters": [
    {
      "title": "String",
      "idea": "String"
    }
  ]
}"#;

/// 段落构思列表输出格式
pub const PARAGRAPH_IDEAS_SCHEMA: &str = r#"{
  "paragraphs": [
    {
      "idea": "String"
    }
  ]
}"#;

/// 段落正文输出格式
pub const PARAGRAPH_TEXT_SCHEMA: &str = r#"{
  "text": "String"
}"#;

/// 若是合法 JSON 则缩进输出，否则原样返回
fn pretty(data: &str) -> String {
    serde_json::from_str::<serde_json::Value>(data)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| data.to_string())
}

/// 请模型修正非法 JSON
pub fn json_correction_prompt(
    input: &str,
    parser_error: &str,
    schema: Option<&str>,
    example: Option<&str>,
) -> String {
    let mut prompt = String::from(
        "**Role:**\n\
         - You are a global expert in correcting an invalid JSON string to a valid JSON string that is parsable by a JSON parser\n\
         **Instructions:**\n\
         - You will be provided with an invalid JSON string that needs to be corrected.\n\
         - You will be provided with an error message given by the parser that will help you identify the issue in the JSON string.\n",
    );
    if schema.is_some() {
        prompt.push_str(
            "- You will be provided with a JSON schema that the corrected JSON string should adhere to.\n",
        );
        if example.is_some() {
            prompt.push_str(
                "- You will be provided with an example of a correct JSON string that adheres to the schema.\n",
            );
        }
    }

    prompt.push_str(&format!(
        "\n**Input JSON string that needs to be corrected:**\n\"{}\"\n\n**Error message given by the parser:**\n\"{}\"\n",
        input, parser_error
    ));

    if let Some(schema) = schema {
        prompt.push_str(&format!("\n**JSON Schema Template:**\n\"{}\"\n", schema));
        if let Some(example) = example {
            prompt.push_str(&format!(
                "\n**Example of a correct JSON string that adheres to the schema:**\n\"{}\"\n",
                example
            ));
        }
    }

    prompt.push_str(
        "\n**Output Specifications:**\n\
         - Provide the corrected JSON string that is valid and parsable by a JSON parser.\n\
         - Your answer should not include any code block markers (e.g., ```json).\n\
         - Your answer should not include additional text, information, metadata or meta-commentary\n",
    );
    prompt
}

/// 章节列表（标题 + 主题构思）
pub fn chapter_list_prompt(directive: Option<&str>, book_data: &str) -> String {
    let directive = directive
        .map(|d| format!("\n**Directive**:\n{}\n", d))
        .unwrap_or_default();
    format!(
        "You are a book content manager. Your task is to generate the list of chapters of a book based on the user specifications.\n\
         {directive}\n\
         **Instructions**:\n\
         - Output your response **only** in JSON format matching the following schema:\n\
         {schema}\n\
         - **Do not** include any text outside of the JSON output.\n\
         - Each chapter must have a title and a short thematic idea.\n\n\
         **Book Data**:\n\
         {book}\n\n\
         Please generate the JSON output now.",
        directive = directive,
        schema = CHAPTER_LIST_SCHEMA,
        book = pretty(book_data),
    )
}

/// 单章的段落构思列表
pub fn paragraph_ideas_prompt(
    book_data: &str,
    chapter_title: &str,
    chapter_idea: &str,
    count: Option<u32>,
) -> String {
    let count_rule = match count {
        Some(n) => format!("- Generate **exactly** {} paragraphs.\n", n),
        None => "- Generate **exactly** the number of paragraphs specified in the book data (ideas per chapter).\n"
            .to_string(),
    };
    let chapter = serde_json::json!({ "title": chapter_title, "idea": chapter_idea });
    format!(
        "You are a book content manager. Your task is to generate a list of paragraphs based on the user specifications, which will be part of a chapter in a book.\n\n\
         **Instructions**:\n\
         - Output your response **only** in JSON format matching the following schema:\n\
         {schema}\n\n\
         - **Do not** include any text outside of the JSON output.\n\
         {count_rule}\
         - **Ignore any personal biases** toward the number of paragraphs.\n\n\
         **Book Data**:\n\
         {book}\n\n\
         **Chapter Data**:\n\
         {chapter}\n\n\
         Please generate the JSON output now.",
        schema = PARAGRAPH_IDEAS_SCHEMA,
        count_rule = count_rule,
        book = pretty(book_data),
        chapter = serde_json::to_string_pretty(&chapter).unwrap_or_default(),
    )
}

/// 把一行段落构思扩写为正文
pub fn paragraph_expansion_prompt(
    book_data: &str,
    chapter_title: &str,
    chapter_idea: &str,
    paragraph_idea: &str,
) -> String {
    let chapter = serde_json::json!({ "chapterTitle": chapter_title, "chapterIdea": chapter_idea });
    format!(
        "You are a book content manager. Your task is to write a comprehensive and detailed paragraph that will be part of a chapter in a book.\n\n\
         **Instructions**:\n\
         - Output your response **only** in JSON format matching the following schema:\n\
         {schema}\n\
         - **Do not** include any text outside of the JSON output.\n\
         - The paragraph should expand on the given idea.\n\n\
         **Book Details**:\n\
         {book}\n\n\
         **Chapter Details**:\n\
         {chapter}\n\n\
         **Paragraph Idea**:\n\
         \"{idea}\"\n\n\
         Please generate the JSON output now.",
        schema = PARAGRAPH_TEXT_SCHEMA,
        book = pretty(book_data),
        chapter = serde_json::to_string_pretty(&chapter).unwrap_or_default(),
        idea = paragraph_idea,
    )
}

/// 按位置润色段落
///
/// previous / next 为 None 时对应段落不出现在提示词中
pub fn refinement_prompt(
    book_abstract: &str,
    chapter_title: &str,
    chapter_idea: &str,
    previous: Option<&str>,
    current: &str,
    next: Option<&str>,
) -> String {
    let connect_rule = if next.is_some() {
        "- Ensure the paragraph connects logically with the surrounding paragraphs, chapter, and book content."
    } else {
        "- Ensure the paragraph connects logically with the chapter and book content."
    };
    let mut prompt = format!(
        "You are a book content manager. Your task is to refactor the current paragraph to blend seamlessly with the flow and content of the book and the chapter.\n\n\
         **Instructions**:\n\
         - Output your response **only** in JSON format matching the following schema:\n\
         {schema}\n\
         - **Do not** include any text outside of the JSON output.\n\
         {connect_rule}\n\n\
         **Book Abstract**:\n\
         \"{book}\"\n\n\
         **Chapter Details**:\n\
         {{\n  \"title\": \"{title}\",\n  \"idea\": \"{idea}\"\n}}\n\n",
        schema = PARAGRAPH_TEXT_SCHEMA,
        connect_rule = connect_rule,
        book = book_abstract,
        title = chapter_title,
        idea = chapter_idea,
    );
    if let Some(previous) = previous {
        prompt.push_str(&format!("**Previous Paragraph**:\n\"{}\"\n\n", previous));
    }
    prompt.push_str(&format!("**Current Paragraph**:\n\"{}\"\n\n", current));
    if let Some(next) = next {
        prompt.push_str(&format!("**Next Paragraph**:\n\"{}\"\n\n", next));
    }
    prompt.push_str("Please generate the refined paragraph in JSON format now.");
    prompt
}

/// 只调整段落开头，使其与前一段衔接
pub fn transition_prompt(previous: Option<&str>, current: &str) -> String {
    let previous = previous
        .map(|p| format!("**Previous Paragraph**:\n\"{}\"\n", p))
        .unwrap_or_default();
    format!(
        "You are an editor improving transitions between paragraphs.\n\n\
         **Instructions**:\n\
         - If applicable, adjust the beginning of the current paragraph to connect smoothly with the previous paragraph.\n\
         - Ensure logical progression and coherent flow.\n\
         - Output your response **only** in JSON format matching the following schema:\n\
         {schema}\n\
         - **Do not** include any text outside of the JSON output.\n\n\
         {previous}\
         **Current Paragraph**:\n\
         \"{current}\"\n\n\
         Please provide the refined paragraph in JSON format now.",
        schema = PARAGRAPH_TEXT_SCHEMA,
        previous = previous,
        current = current,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correction_prompt_includes_schema_and_example() {
        let prompt = json_correction_prompt("{oops", "EOF", Some(PARAGRAPH_TEXT_SCHEMA), Some(r#"{"text":"hi"}"#));
        assert!(prompt.contains("{oops"));
        assert!(prompt.contains("EOF"));
        assert!(prompt.contains("JSON Schema Template"));
        assert!(prompt.contains(r#"{"text":"hi"}"#));
    }

    #[test]
    fn test_correction_prompt_without_schema_skips_example() {
        let prompt = json_correction_prompt("{oops", "EOF", None, Some("ignored"));
        assert!(!prompt.contains("JSON Schema Template"));
        assert!(!prompt.contains("ignored"));
    }

    #[test]
    fn test_refinement_prompt_context_window() {
        let first = refinement_prompt("abs", "T", "I", None, "cur", None);
        assert!(!first.contains("**Previous Paragraph**"));
        assert!(!first.contains("**Next Paragraph**"));

        let middle = refinement_prompt("abs", "T", "I", Some("prev"), "cur", Some("next"));
        assert!(middle.contains("**Previous Paragraph**:\n\"prev\""));
        assert!(middle.contains("**Next Paragraph**:\n\"next\""));
        assert!(middle.contains("surrounding paragraphs"));
    }

    #[test]
    fn test_paragraph_ideas_prompt_states_count() {
        let prompt = paragraph_ideas_prompt(r#"{"title":"Orbit"}"#, "Launch", "Leaving earth", Some(2));
        assert!(prompt.contains("exactly** 2 paragraphs"));
        assert!(prompt.contains("\"title\": \"Orbit\""));
    }

    #[test]
    fn test_transition_prompt_without_previous() {
        let prompt = transition_prompt(None, "cur");
        assert!(!prompt.contains("Previous Paragraph"));
        assert!(prompt.contains("\"cur\""));
    }
}
