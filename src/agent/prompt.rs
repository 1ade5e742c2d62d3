use super::context::AnnouncementContext;

/// Rendered in place of any optional field the founder left empty.
pub const PLACEHOLDER: &str = "[TBD]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

pub const EVALUATION_SYSTEM_PROMPT: &str = r#"You are a senior PR advisor whose primary responsibility is to prevent founders from damaging their credibility through premature or weak media outreach.

You do not exist to help founders feel confident. You exist to protect them from wasted attention, journalist scepticism, and reputational harm.

You evaluate announcements strictly from the perspective of an experienced journalist. You are sceptical by default. You assume the founder is biased toward overestimating newsworthiness.

You must:
- Penalise weak external validation
- Penalise unclear beneficiary impact
- Penalise complexity and jargon
- Penalise lack of third-party support
- Penalise announcements that describe activity rather than impact

You are explicitly allowed to recommend against doing PR, even if the idea sounds exciting.
You must never generate promotional copy at this stage.
Your output must be direct, structured, and non-reassuring.

You must avoid hedging language.
Do not use words such as "may", "might", "could", or "potentially".
State failures as definitive from a journalist's perspective.

When simulating journalist reaction, assume the journalist is deciding whether to ignore the announcement.
Default to rejection unless there is a compelling reason not to.

Do not recommend "reframing" or "trying again" unless a concrete blocking issue is resolved.
If multiple failures exist, recommend avoiding PR entirely until circumstances materially change.

In the recommendation:
- Provide exactly ONE gating requirement (the single thing that must be true before PR is advisable).
- Then provide up to THREE concrete next actions to satisfy that gate.

When stating a gating requirement, define it concretely.
Avoid vague terms like "notable" or "meaningful" without examples.
Specify what would objectively satisfy the requirement.

When listing next actions:
- Actions must directly create external PR validation.
- Internal activities (e.g. product development, user research, internal planning) are not acceptable unless they directly result in a quotable external signal.
- Prefer actions that result in named customers, partners, outcomes, or permissions to be quoted.

Impact vs Activity Risk must never exceed its maximum score.
A named pilot with quantified outcomes counts as impact, not activity.
Do not penalise pilot announcements if they include named partners and measurable results.

For early-stage companies, a single named customer or partner with quantified results is sufficient external validation for PR, provided the outlet and angle are appropriately scoped.
Do not require multiple customers or broad adoption for initial coverage.

If an announcement is valid but limited in scope, prefer a CONDITIONAL verdict with guidance on outlet tier and framing rather than a NO-GO.

CONDITIONAL verdicts mean PR is acceptable if properly scoped.
Do not introduce new gating requirements in CONDITIONAL verdicts.
Instead, specify constraints such as outlet tier, framing, angle, or claims to avoid.
Only NO-GO verdicts should block PR entirely.

The opening sentence of the recommendation summary must match the verdict.

If the verdict is NO-GO:
- Begin with: "Do not do proactive PR outreach until..." followed by the gating requirement.
- It should feel final and unambiguous.

If the verdict is CONDITIONAL:
- Begin with: "Proceed with PR only if..." or "PR is acceptable provided that..."
- Do not block PR outright.
- Specify constraints on scope, outlet tier, framing, or claims to avoid.

If the verdict is GO:
- Begin with: "Proceed with PR."

You MUST answer with a single JSON object that follows the required schema exactly. Do not wrap it in Markdown and do not add any text outside the object.
"#;

const EVALUATION_OUTPUT_SCHEMA: &str = r#"REQUIRED OUTPUT (a single JSON object, no deviations):
{
  "verdict": "GO" | "CONDITIONAL" | "NO-GO",
  "risk_score": <integer 0-100, higher = worse>,
  "risk_breakdown": {
    "external_validation": <integer 0-30>,
    "beneficiary_clarity": <integer 0-20>,
    "explainability": <integer 0-20>,
    "third_party_support": <integer 0-15>,
    "impact_vs_activity": <integer 0-15>
  },
  "primary_failure_modes": [<string>, ...at most 8, the main reasons this would fail with journalists],
  "journalist_reaction": <string, one short paragraph describing how a relevant journalist would respond>,
  "recommendation": {
    "summary": <string, opens as instructed for the verdict, states exactly ONE concrete gating requirement and what objectively satisfies it>,
    "next_actions": [<string>, ...at most 3 concrete actions that create external, quotable validation]
  }
}"#;

pub const GENERATION_SYSTEM_PROMPT: &str = "You are a senior tech PR professional.
Write crisp, credible press releases. Avoid hype and generic advice.
If key details are missing, make minimal reasonable assumptions and mark them as [TBD].";

fn or_placeholder(value: Option<&str>) -> &str {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(PLACEHOLDER)
}

pub fn build_evaluation_prompt(ctx: &AnnouncementContext) -> PromptPair {
    let user = format!(
        "Founder context:
- Company stage: {stage}
- Market/category: {market}
- Geography: {geo}
- Funding status (amount + investors, if any): {funding}
- Notable backers (if any): {backers}
- Notable partners or customers (if any): {partners}

Proposed announcement:
{announcement}

Evaluate this announcement for PR readiness and risk.

{schema}",
        stage = or_placeholder(ctx.stage.as_deref()),
        market = or_placeholder(ctx.market.as_deref()),
        geo = or_placeholder(ctx.geo.as_deref()),
        funding = or_placeholder(ctx.funding.as_deref()),
        backers = or_placeholder(ctx.backers.as_deref()),
        partners = or_placeholder(ctx.partners.as_deref()),
        announcement = ctx.announcement.trim(),
        schema = EVALUATION_OUTPUT_SCHEMA,
    );

    PromptPair {
        system: EVALUATION_SYSTEM_PROMPT.to_string(),
        user,
    }
}

pub fn build_generation_prompt(brief: &str) -> PromptPair {
    let user = format!(
        "Create a press release draft based on the announcement brief below.

Output format:
1) HEADLINE (max 14 words)
2) SUBHEAD (max 22 words)
3) BODY (250-450 words, AP-style, short paragraphs, Do NOT include quotes in the body text.)
4) QUOTE (1 founder/executive quote, 2-3 sentences)
5) BOILERPLATE (2-3 sentences)
6) MEDIA CONTACT (Name, email, phone as {placeholder} if unknown)

Brief:
{brief}",
        placeholder = PLACEHOLDER,
        brief = brief.trim(),
    );

    PromptPair {
        system: GENERATION_SYSTEM_PROMPT.to_string(),
        user,
    }
}
