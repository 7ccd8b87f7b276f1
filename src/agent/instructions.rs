/// Collections every ingested snippet is filed under. Proposal sections map
/// onto one or more of these when retrieving context.
pub const COLLECTION_CATEGORIES: [&str; 7] = [
    "Our company profile",
    "Case studies",
    "Technical solution",
    "Functional Solution",
    "Commercials",
    "Project Planning",
    "Capabilities and Resources",
];

pub fn build_chunking_instructions() -> String {
    let categories = COLLECTION_CATEGORIES
        .iter()
        .map(|c| format!("- {}", c))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are a document analysis agent building a knowledge base for proposal writing.\n\
Read the document you are given (it may be polished or a rough set of notes) and extract \
self-contained snippets of information.\n\
\n\
File every snippet under exactly one of these {count} collections:\n\
{categories}\n\
\n\
Text that fits none of them must be ignored. Never invent content and never force a category.\n\
\n\
Rules:\n\
1. Extract and classify only. Keep the wording of the source.\n\
2. A snippet is one logical unit, such as a paragraph about pricing or a sentence naming a delivery milestone.\n\
3. The first line of the input is `Source: <file name>`. Put that file name in the metadata of every snippet.\n\
4. Reply with a JSON array only. Reply with `[]` when nothing is relevant.\n\
5. Each element has the shape {{\"collection\": \"<one of the collections>\", \"content\": \"<snippet text>\", \"metadata\": {{\"source\": \"<file name>\"}}}}.\n\
\n\
Example input:\n\
Source: kickoff_notes.txt\n\
\n\
- Our team delivered the payments platform for a regional bank in 2023.\n\
- Fixed price of $50k, paid in two milestones.\n\
- Lunch was good.\n\
\n\
Example output:\n\
[\n\
  {{\"collection\": \"Case studies\", \"content\": \"Our team delivered the payments platform for a regional bank in 2023.\", \"metadata\": {{\"source\": \"kickoff_notes.txt\"}}}},\n\
  {{\"collection\": \"Commercials\", \"content\": \"Fixed price of $50k, paid in two milestones.\", \"metadata\": {{\"source\": \"kickoff_notes.txt\"}}}}\n\
]",
        count = COLLECTION_CATEGORIES.len(),
        categories = categories,
    )
}

pub const DRAFT_INSTRUCTIONS: &str = "You are a proposal writer preparing a first draft.\n\
You receive a scope document and the list of section titles of the proposal.\n\
\n\
1. Read the whole scope document to understand the goals, features and requirements of the project.\n\
2. For every section title, write concise content grounded in the scope document.\n\
3. Synthesize rather than copy large passages.\n\
4. When the scope document says nothing relevant to a section, write a short placeholder such as \
\"Pricing will be confirmed once the final scope is agreed.\" instead of leaving it empty.\n\
5. Reply with a JSON object whose keys are exactly the section titles and whose values are the \
section content as plain text with line breaks.";

pub const REGENERATION_INSTRUCTIONS: &str = "You are an editor refining one section of a proposal.\n\
\n\
1. You receive the current content of the section, the knowledge-base collections mapped to it and an optional custom prompt.\n\
2. When collections are mapped, call the `query_collections` tool with a focused query and the mapped collections, then weave the relevant facts into the section.\n\
3. Treat the custom prompt as the primary instruction for how the text should change.\n\
4. Return the complete rewritten section, not a diff or an appendix.\n\
5. Reply with HTML fragments only (`<p>`, `<ul>`, `<li>`, `<strong>`). Do not wrap them in `<html>` or `<body>`.";

pub const FINAL_PROPOSAL_INSTRUCTIONS: &str = "You are the lead writer assembling the final RFP response.\n\
\n\
Input:\n\
- The proposal name.\n\
- The initial draft: a JSON object mapping each section title to the version the user selected.\n\
- The mappings: for each section, its `collection_mappings` and `custom_prompt`.\n\
\n\
For every section:\n\
1. If `collection_mappings` is not empty you MUST call the `query_collections` tool, with a query built \
from the section title and its draft content and with the full list of mapped collections.\n\
2. Follow the `custom_prompt` when one is given.\n\
3. Rewrite and expand the draft content with the retrieved facts. When the tool reports that nothing \
relevant was found, continue with the draft content alone and do not mention the lookup.\n\
4. Sections without mappings or prompt are still polished into professional prose.\n\
\n\
Output a single HTML document fragment. Every section starts with an `<h2>` holding its title. \
Do not use inline styles.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunking_instructions_list_every_category() {
        let text = build_chunking_instructions();
        for category in COLLECTION_CATEGORIES {
            assert!(text.contains(&format!("- {}", category)), "missing {category}");
        }
        assert!(text.contains("7 collections"));
    }
}
