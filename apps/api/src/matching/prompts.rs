pub const RECOMMENDATION_SYSTEM: &str =
    "You are a career advisor specializing in UN and international organization jobs.";

pub const RECOMMENDATION_PROMPT_TEMPLATE: &str = r#"Based on the following information, provide a brief, actionable recommendation for the candidate (2-3 sentences).

Job Title: {job_title}
Organization: {organization}
Match Score: {score_percent}%
Missing Skills/Keywords: {missing_keywords}

Candidate Experience: {experience_years}
Candidate Skills: {skills}

Provide constructive advice on how to improve their chances or whether to apply.
{plain_text_instruction}"#;
