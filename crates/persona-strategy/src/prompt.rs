/// Prompt builders for persona generation, query fan-out, strategy and funnel copy.
use crate::model::{ConversionGoal, PersonaRecord, QueryIntentRecord};
use crate::parser::{PERSONA_COLUMNS, QUERY_FAN_OUT_COLUMNS};

const QUERY_FAN_OUT_SIZE: usize = 15;

/// Prompt asking a model for 3-5 personas as a quoted CSV table.
pub fn persona_generation_prompt(topic: &str) -> String {
    let header = quoted_header(&PERSONA_COLUMNS);
    format!(
        r#"Act as a professional market researcher and content strategist.
My core business topic is: "{topic}".

Your task is to design 3-5 distinct, concrete target-audience personas for this topic. Together they should cover needs from beginner to expert.

Output strictly in the CSV format below, including the header, with no text before or after it. Wrap every field in double quotes `"`.

```csv
{header}
"Example persona 1 (e.g. anxious first-time parent)","Short description of background and traits.","1-2 main goals.","1-2 main pain points on the way to those goals.","3-5 search keywords, comma separated.","Preferred content formats, e.g. short video, carousel, blog post, podcast, comma separated."
"Example persona 2 (e.g. efficiency-minded professional)","...","...","...","...","..."
... (3-5 rows in total)
```

**Guidelines:**
- **persona_name:** a vivid name that reflects who they are.
- **summary:** their background, motivation and current situation.
- **goals:** what they want to achieve around "{topic}".
- **pain_points:** the main obstacles or confusion they run into.
- **keywords:** the words they would type into a search engine.
- **preferred_formats:** the kinds of content they like to consume.

Make the personas representative and clearly distinct from each other. Start now.
"#
    )
}

/// Prompt asking a model for a query fan-out table.
pub fn query_fan_out_prompt(topic: &str) -> String {
    let header = quoted_header(&QUERY_FAN_OUT_COLUMNS);
    format!(
        r#"Act as a senior SEO and content strategy expert. My core topic is: "{topic}".
Your task is to run a "query fan-out" analysis for this topic and produce {QUERY_FAN_OUT_SIZE} related queries users are likely to search for.
Output strictly in the CSV format below, including the header, with no text before or after it. Wrap every field in double quotes `"` to avoid formatting errors.
```csv
{header}
"Example query 1","Example type 1","Example intent 1","Example reasoning 1"
"Example query 2","Example type 2","Example intent 2","Example reasoning 2"
... (up to row {QUERY_FAN_OUT_SIZE})
```
**Guidelines:**
- **query:** the concrete search phrase.
- **type:** one of [Question, Comparison, Informational, Commercial, Navigational].
- **user_intent:** the real intent behind the search.
- **reasoning:** briefly, why this query relates to "{topic}".
Cover different query types and intents so the full shape of the topic is visible. Start now.
"#
    )
}

/// Prompt for a per-persona content strategy and a consolidated production checklist.
pub fn strategy_prompt(
    topic: &str,
    personas: &[&PersonaRecord],
    intents: &[QueryIntentRecord],
) -> String {
    let persona_details: String = personas
        .iter()
        .map(|p| {
            format!(
                "\n### Persona: {}\n- **Summary:** {}\n- **Goals:** {}\n- **Pain points:** {}\n- **Preferred formats:** {}\n",
                p.name,
                or_na(&p.summary),
                or_na(&p.goals),
                or_na(&p.pain_points),
                or_na(&p.preferred_formats),
            )
        })
        .collect();

    let (query_fan_out_section, idea_instruction, idea_structure) = if intents.is_empty() {
        (
            String::new(),
            "(Give 3-5 concrete content ideas that follow directly from the nexus analysis above. Every idea must include a \"topic/title direction\", a \"suggested format\" and a \"rationale\".)",
            r#"
* **Idea 1:**
    * **Topic/title direction:** [a concrete title that reflects the nexus analysis]
    * **Suggested format:** [picked from the persona's preferred formats]
    * **Rationale:** [why this idea and format solve this persona's specific problem within the topic]
"#,
        )
    } else {
        (
            format!(
                "\nAlso make sure to use the following \"query fan-out\" data from an SEO expert. It reflects the real intents and variations of users searching this topic:\n```\n{}\n```\n",
                query_intent_table(intents)
            ),
            "(Give 3-5 concrete content ideas that follow directly from the nexus analysis above. **Every idea must map to one specific 'query' or 'user_intent' in the query fan-out data.** Every idea must include a \"topic/title direction\", a \"matching user query\", a \"suggested format\" and a \"rationale\".)",
            r#"
* **Idea 1:**
    * **Topic/title direction:** [a concrete title that reflects the nexus analysis]
    * **Matching user query:** [the most relevant query/intent from the query fan-out]
    * **Suggested format:** [picked from the persona's preferred formats]
    * **Rationale:** [why this idea and format **answer the matching query** and solve the persona's problem]
"#,
        )
    };

    format!(
        r#"Act as a top content strategy consultant with sharp user insight. My core topic is: "{topic}".
Your task is to plan a **highly relevant and concrete** content strategy for the personas below.
{query_fan_out_section}
These are the personas to analyze:
{persona_details}
Give **each** persona its own strategy. While planning, think deeply about the **intersection** of the core topic, the query fan-out (if provided) and the persona's pain points and goals, and use that intersection as the starting point for every idea.
Follow this Markdown format strictly:
---
### **Content strategy for "[persona name]"**
**1. Topic-Persona Nexus:**
(In 2-3 sentences, analyze precisely how "{topic}" solves this persona's core pain point or helps them reach their goal. **This is the most important part; be specific about the connection.**)
**2. Core Angle:**
(Based on the analysis above, summarize the single communication angle most likely to move this persona.)
**3. Content Ideas & Formats:**
{idea_instruction}
{idea_structure}
---
### **Summary: Content Production Checklist**
Now act as a **head of content production**. Review **all** ideas generated above for the different personas and consolidate them into one clear table.
The table should let the team see at a glance which content types must be produced and which ideas belong to each type.
Group ideas with a **similar suggested format** together, following this table format:
| Media Format | Topic/Title Ideas |
| :--- | :--- |
| **[e.g. long-form YouTube video]** | - [title A]<br>- [title B]<br>- [title C] |
| **[e.g. podcast]** | - [title D]<br>- [title E] |
| **[e.g. carousel post]** | - [title F] |
Make sure the table covers every idea mentioned above.
"#
    )
}

/// Prompt turning a strategy into a TOFU/MOFU/BOFU funnel aimed at a conversion goal.
pub fn funnel_prompt(
    topic: &str,
    strategy_text: &str,
    goal: &ConversionGoal,
    intents: &[QueryIntentRecord],
) -> String {
    let query_fan_out_section = if intents.is_empty() {
        String::new()
    } else {
        format!(
            "\nWhile planning, prioritize queries in the following \"query fan-out\" data that show strong commercial intent or address deep problems, and weave them into the funnel:\n```\n{}\n```\n",
            query_intent_table(intents)
        )
    };

    let description = goal
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or("not provided");
    let name = &goal.product_name;
    let url = &goal.target_url;
    let action = goal.action.label();

    format!(
        r#"Act as a top Head of Digital Strategy who specializes in high-converting content marketing funnels.
My core topic is: "{topic}".
{query_fan_out_section}
**Important: final conversion goal**
Use the following product/service information as the final target for the conversion-stage (BOFU) content and CTA:
- **Product/service name:** {name}
- **Desired user action:** {action}
- **Final target URL:** {url}
- **Product/service description:** {description}
Make sure the last step of the funnel leads users to this goal.

This is a list of initial content ideas that a content strategy consultant produced for different personas:
```markdown
{strategy_text}
```
Your task is to turn these scattered ideas into one **tightly linked, seamless** marketing campaign.
Follow these steps and this format strictly:
---
### **Integrated marketing funnel: "{topic}"**
**📈 Overall Strategy & User Journey:**
(Tell, as a story line, the full path of a typical user from the first piece of content (awareness) to the final purchase (conversion). Name the conversion goal and hand-off mechanism of every stage.)
---
### **1. Awareness - Top of Funnel**
*Goal: attract a large audience interested in the topic with high-value, shareable content and establish expertise.*
**➡️ Content idea 1 (lead):** [the idea from the list best suited to attract traffic]
   - **Target persona:** [the persona this idea mainly serves]
   - **Reach & distribution:** [e.g. paid social for this topic; SEO for the keyword "..."; creator partnerships]
   - **➡️ CTA to the next stage:** **(key point)** [a clear call to action that moves users from this awareness piece to consideration content]
---
### **2. Consideration - Middle of Funnel**
*Goal: solve the core pain points with deeper, more specific content, build trust and capture leads.*
**➡️ Content idea 2 (lead):** [the idea best suited to build trust or capture leads, e.g. e-book, webinar, in-depth guide]
   - **Target persona:** [the persona this idea mainly serves]
   - **Incoming traffic:** [which awareness content feeds this piece]
   - **Lead magnet:** [e.g. a polished PDF e-book available in exchange for an email address]
   - **➡️ CTA to the next stage:** **(key point)** [the follow-up path after users get this content]
---
### **3. Conversion - Bottom of Funnel**
*Goal: close the deal with a direct value proposition and incentive.*
**➡️ Content idea 3 (lead):** [the idea best suited to drive purchase, e.g. comparison, testimonials, offer page]
   - **Target persona:** [the persona this idea mainly serves]
   - **Incoming traffic:** [which consideration content or follow-up messaging feeds this piece]
   - **CTA design:** [a strong CTA that **uses the product information and target URL above**, e.g. "Get started with {name} today: {url}"]
---
**📊 Summary: user journey map**
(Summarize the path from TOFU to BOFU as a flow)
* **[Awareness content]** (e.g. short video) → **CTA:** "Comment to get the full guide"
* → **[Consideration content]** (e.g. PDF guide via direct message) → **CTA:** "The guide includes an exclusive offer link"
* → **[Conversion content]** (e.g. offer page) → **Final goal:** {action}
"#
    )
}

/// Render query intents as a markdown table with the CSV column names.
pub fn query_intent_table(intents: &[QueryIntentRecord]) -> String {
    let mut out = format!(
        "| {} |\n|{}|\n",
        QUERY_FAN_OUT_COLUMNS.join(" | "),
        vec![":---"; QUERY_FAN_OUT_COLUMNS.len()].join("|")
    );
    for intent in intents {
        out.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            table_cell(&intent.query),
            table_cell(&intent.kind),
            table_cell(&intent.user_intent),
            table_cell(&intent.reasoning),
        ));
    }
    out
}

fn table_cell(value: &str) -> String {
    value.replace('|', "\\|").replace(['\r', '\n'], " ")
}

fn quoted_header(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(",")
}

fn or_na(value: &str) -> &str {
    if value.trim().is_empty() {
        "n/a"
    } else {
        value
    }
}
