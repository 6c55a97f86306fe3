// Prompt for the scoring oracle. The labelled lines in the response format
// are what `screening::parser` decodes; keep the two in step.

use crate::models::profile::JobProfile;

pub const EVALUATION_PROMPT_TEMPLATE: &str = "\
You are a senior technical recruiter screening a resume against a job description \
and the recruiter's prioritised criteria. Judge only what the resume states. \
If any mandatory requirement is missing or unclear, REJECT.

Scoring (100 points):
1. Technical Skills & Experience (60): Technical Skills (15), Experience Level (15), \
Tools & Technologies (15), Domain Knowledge (15).
2. Impact & Achievements (40): Quantifiable Impact (20), Problem Solving (20).
SHORTLIST only when every mandatory requirement is met and the total is 66 or above.

Job Description:
{job_description}

Recruiter Criteria:
{recruiter_prompt}

Candidate Resume:
{candidate_resume}

Reply in exactly this format:

DECISION: [SHORTLIST / REJECT]

SCORES:
1. Technical Skills & Experience: [X]/60
   - Technical Skills: [X]/15
   - Experience Level: [X]/15
   - Tools & Technologies: [X]/15
   - Domain Knowledge: [X]/15

2. Impact & Achievements: [X]/40
   - Quantifiable Impact: [X]/20
   - Problem Solving: [X]/20

TOTAL SCORE: [X]

DETAILED ANALYSIS:
[Justify each score.]

RED FLAGS:
[List any, or None.]";

pub fn build_evaluation_prompt(profile: &JobProfile, candidate_resume: &str) -> String {
    EVALUATION_PROMPT_TEMPLATE
        .replace("{job_description}", &profile.description_text)
        .replace("{recruiter_prompt}", &profile.evaluator_instructions)
        .replace("{candidate_resume}", candidate_resume)
}
