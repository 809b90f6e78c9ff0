//! Built-in report-section templates
//!
//! The process-wide startup set. Applications with custom prompt shapes build
//! their own registry instead of extending this one at runtime.

use super::{Template, TemplateRegistry};

/// Registry containing the standard report-section templates
pub fn builtin_registry() -> TemplateRegistry {
    TemplateRegistry::builder()
        .register(Template::new(
            "introduction-academic",
            &["topic", "researchQuestion"],
            "Write an academic introduction for a report on ${topic}. \
             The central research question is: ${researchQuestion}. \
             Establish context, motivate the question, and outline the report's structure. \
             Use a formal register suitable for publication.\n\
             ${references}",
        ))
        .register(Template::new(
            "methodology-overview",
            &["topic", "methods"],
            "Describe the methodology of a study on ${topic}. \
             Methods used: ${methods}. \
             Explain data collection, analysis approach, and limitations.\n\
             ${references}",
        ))
        .register(Template::new(
            "results-discussion",
            &["topic", "findings"],
            "Discuss the following findings from a study on ${topic}: ${findings}. \
             Interpret the results, relate them to prior work, and note open questions.\n\
             ${references}",
        ))
        .register(Template::new(
            "conclusion-summary",
            &["topic"],
            "Write a conclusion for a report on ${topic}. \
             Summarize the key contributions and suggest directions for future work.\n\
             ${references}",
        ))
        .register(Template::new(
            "abstract-concise",
            &["topic", "findings"],
            "Write a concise abstract (150-250 words) for a report on ${topic} \
             whose main findings are: ${findings}.",
        ))
        .build()
}
