//! Prompt templates for the research loop
//!
//! Three prompts drive a session: the main prompt framing every model turn,
//! the info prompt used to summarise a scraped page, and the checker prompt
//! used when the model proposes a final answer.

use serde_json::{Map, Value};

use crate::schema::Schema;

/// Corrective message appended when a turn does not carry exactly one tool call.
pub const ONE_TOOL_CALL_REQUIRED: &str = "You must call one, and only one, tool!";

/// Known facts about the research subject, rendered into the main prompt.
#[derive(Debug, Clone, Copy)]
pub enum KnownInfo<'a> {
    CompanyName(&'a str),
    Fields(&'a Map<String, Value>),
}

impl KnownInfo<'_> {
    pub fn render(&self) -> String {
        match self {
            KnownInfo::CompanyName(name) => format!("Company Name: {}", name),
            KnownInfo::Fields(fields) => Value::Object((*fields).clone()).to_string(),
        }
    }
}

fn schema_block(schema: &Schema) -> String {
    // The schema is plain JSON built in-process; compact form keeps prompts short.
    schema.to_json_schema().to_string()
}

pub fn main_prompt(schema: &Schema, known: KnownInfo<'_>) -> String {
    format!(
        r#"You are doing research on companies. You are trying to figure out this information:

<info>
{info}
</info>


You have access to the following tools:

- `Search`: call a search tool and get back some results
- `ScrapeWebsite`: scrape a website and get relevant notes about the company. This will update the notes above.
- `{finalize}`: call this when you are done and have gathered all the relevant info

Here is the information you have about the company you are researching:

{known_info}"#,
        info = schema_block(schema),
        finalize = schema.title(),
        known_info = known.render(),
    )
}

pub fn info_prompt(schema: &Schema, url: &str, content: &str) -> String {
    format!(
        r#"You are doing research on companies. You are trying to figure out this information:

<info>
{info}
</info>

You just scraped the following website: {url}

Based on the website content below, jot down some notes about the website.

{content}"#,
        info = schema_block(schema),
    )
}

pub fn checker_prompt(presumed_info: &Value) -> String {
    format!(
        "I am thinking of calling the info tool with the info below. \
Is this good? Give your reasoning as well. \
You can encourage the Assistant to look at specific URLs if that seems relevant, or do more searches.\n\
If you don't think it is good, you should be very specific about what could be improved.\n\n{}",
        presumed_info
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_main_prompt_company() {
        let prompt = main_prompt(&Schema::company(), KnownInfo::CompanyName("Acme Corp"));

        assert!(prompt.starts_with("You are doing research on companies."));
        assert!(prompt.contains("\"headquarters\""));
        assert!(prompt.contains("- `Info`: call this when you are done"));
        assert!(prompt.ends_with("Company Name: Acme Corp"));
    }

    #[test]
    fn test_main_prompt_known_fields() {
        let mut fields = Map::new();
        fields.insert("target".to_string(), json!("Acme Corp"));
        fields.insert("website".to_string(), json!("acme.example"));

        let schema = Schema::single_field("ceo").unwrap();
        let prompt = main_prompt(&schema, KnownInfo::Fields(&fields));

        assert!(prompt.ends_with(r#"{"target":"Acme Corp","website":"acme.example"}"#));
        assert!(prompt.contains("\"ceo\""));
    }

    #[test]
    fn test_info_prompt() {
        let prompt = info_prompt(&Schema::company(), "https://acme.example", "Acme makes anvils.");
        assert!(prompt.contains("You just scraped the following website: https://acme.example"));
        assert!(prompt.ends_with("jot down some notes about the website.\n\nAcme makes anvils."));
    }

    #[test]
    fn test_checker_prompt_embeds_arguments() {
        let prompt = checker_prompt(&json!({"ceo": "Jane Doe"}));
        assert!(prompt.starts_with("I am thinking of calling the info tool"));
        assert!(prompt.contains("very specific about what could be improved."));
        assert!(prompt.ends_with(r#"{"ceo":"Jane Doe"}"#));
    }
}
