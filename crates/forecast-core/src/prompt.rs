//! Prompt construction for binary questions

use chrono::NaiveDate;

use crate::models::{Question, ResearchReport};

const NO_RESEARCH: &str = "No research is available for this question.";

/// Build the prediction prompt shared by every run of an ensemble
pub fn binary_prompt(question: &Question, research: &ResearchReport, today: NaiveDate) -> String {
    let research_text = if research.is_empty() {
        NO_RESEARCH
    } else {
        research.text.trim()
    };

    format!(
        r#"You are a professional forecaster interviewing for a job.

Your interview question is:
{title}

Question background:
{background}

This question's outcome will be determined by the specific criteria below. These criteria have not yet been satisfied:
{resolution_criteria}

{fine_print}

Your research assistant says:
{research}

Today is {today}.

Before answering you write:
(a) The time left until the outcome to the question is known.
(b) The status quo outcome if nothing changed.
(c) A brief description of a scenario that results in a No outcome.
(d) A brief description of a scenario that results in a Yes outcome.

You write your rationale remembering that good forecasters put extra weight on the status quo outcome since the world changes slowly most of the time.

The last thing you write is your final answer as: "Probability: ZZ%", 0-100"#,
        title = question.title.trim(),
        background = question.background.trim(),
        resolution_criteria = question.resolution_criteria.trim(),
        fine_print = question.fine_print.trim(),
        research = research_text,
        today = today.format("%Y-%m-%d"),
    )
}
