//! Deterministic template generator: the cascade's terminal state.
//!
//! Never fails and always returns a complete, schema-valid result. Output
//! is seeded by an explicit hash-to-parameter function (SHA-256 of the
//! lowercased company name, first 8 bytes big-endian as a u64), so the
//! same subject produces the same ideas across runs and platforms.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use ideaforge_shared::{BuildStep, ContextBundle, EffortLevel, IdeaOutline};

use super::{FailureReason, GenerationOutput, GenerationTask, Provider};
use crate::schema::{IdeaDraft, PlanDraft};

/// Ideas produced per effort level.
const IDEAS_PER_LEVEL: usize = 3;

pub struct TemplateProvider;

#[async_trait]
impl Provider for TemplateProvider {
    fn id(&self) -> &'static str {
        "template"
    }

    fn available(&self) -> bool {
        true
    }

    async fn attempt(
        &self,
        task: &GenerationTask<'_>,
        _hint: Option<&str>,
    ) -> Result<GenerationOutput, FailureReason> {
        Ok(match task {
            GenerationTask::Ideas { bundle } => GenerationOutput::Ideas(generate_ideas(bundle)),
            GenerationTask::Plan { bundle, idea } => GenerationOutput::Plan(generate_plan(
                &bundle.company.name,
                &idea.title,
                &idea.summary,
                &bundle.brand.primary,
            )),
            GenerationTask::CustomIdea {
                bundle,
                description,
            } => GenerationOutput::Idea(generate_custom_idea(&bundle.company.name, description)),
        })
    }
}

/// Documented seed function: SHA-256 of the lowercased name, first 8
/// bytes big-endian.
pub fn seed_for(name: &str) -> u64 {
    let digest = Sha256::digest(name.trim().to_lowercase().as_bytes());
    u64::from_be_bytes(digest[..8].try_into().expect("digest is 32 bytes"))
}

// ---------------------------------------------------------------------------
// Idea templates
// ---------------------------------------------------------------------------

struct IdeaTemplate {
    title: &'static str,
    summary: &'static str,
    pages: &'static [&'static str],
    components: &'static [&'static str],
    data: &'static [&'static str],
    nice_to_haves: &'static [&'static str],
}

const STARTER_POOL: &[IdeaTemplate] = &[
    IdeaTemplate {
        title: "{name} link-in-bio page",
        summary: "A single polished page collecting {name}'s most important links, styled in the brand colors.",
        pages: &["Landing"],
        components: &["Link list", "Brand header"],
        data: &["Static link list"],
        nice_to_haves: &["Click counter"],
    },
    IdeaTemplate {
        title: "{name} status badge",
        summary: "A tiny embeddable badge showing whether {name}'s main service is up, refreshed on load.",
        pages: &["Badge preview"],
        components: &["Status pill", "Embed snippet"],
        data: &["Single status endpoint"],
        nice_to_haves: &["History sparkline"],
    },
    IdeaTemplate {
        title: "{name} FAQ card",
        summary: "One searchable card of the questions customers actually ask {name}, with copyable answers.",
        pages: &["FAQ"],
        components: &["Search box", "Answer card"],
        data: &["Hardcoded Q&A list"],
        nice_to_haves: &["Deep links per question"],
    },
    IdeaTemplate {
        title: "{name} pricing calculator",
        summary: "A one-screen calculator that estimates what {name} would cost for a given team size.",
        pages: &["Calculator"],
        components: &["Slider inputs", "Price summary"],
        data: &["Static pricing tiers"],
        nice_to_haves: &["Share-as-link"],
    },
];

const SPRINT_POOL: &[IdeaTemplate] = &[
    IdeaTemplate {
        title: "{name} onboarding checklist",
        summary: "An interactive checklist that walks a new {name} customer through their first session, with progress saved locally.",
        pages: &["Checklist", "Done screen"],
        components: &["Step list", "Progress bar", "Confetti state"],
        data: &["Checklist definition", "Local progress"],
        nice_to_haves: &["Email the remaining steps"],
    },
    IdeaTemplate {
        title: "{name} changelog feed",
        summary: "A clean, filterable what's-new feed for {name} releases with tags and an RSS view.",
        pages: &["Feed", "Entry detail"],
        components: &["Entry card", "Tag filter"],
        data: &["Release entries"],
        nice_to_haves: &["Subscribe box"],
    },
    IdeaTemplate {
        title: "{name} feedback wall",
        summary: "A lightweight wall where users drop feature requests for {name} and upvote each other's.",
        pages: &["Wall", "Submit form"],
        components: &["Request card", "Upvote button", "Sort toggle"],
        data: &["Requests with votes"],
        nice_to_haves: &["Duplicate detection"],
    },
    IdeaTemplate {
        title: "{name} comparison sheet",
        summary: "A side-by-side comparison of {name} against two named alternatives, built from a data file anyone can edit.",
        pages: &["Comparison"],
        components: &["Feature matrix", "Highlight row"],
        data: &["Feature comparison table"],
        nice_to_haves: &["Print stylesheet"],
    },
];

const DAY_BUILD_POOL: &[IdeaTemplate] = &[
    IdeaTemplate {
        title: "{name} customer dashboard",
        summary: "A one-day dashboard showing the handful of numbers a {name} customer checks daily, with mock data wired for real APIs later.",
        pages: &["Dashboard", "Settings"],
        components: &["Stat tiles", "Trend chart", "Date picker"],
        data: &["Metrics series", "User preferences"],
        nice_to_haves: &["Dark mode"],
    },
    IdeaTemplate {
        title: "{name} intake form flow",
        summary: "A multi-step intake flow that qualifies {name} leads and routes them to the right next step.",
        pages: &["Steps 1-3", "Summary", "Thanks"],
        components: &["Step wizard", "Validation", "Routing logic"],
        data: &["Form schema", "Submissions"],
        nice_to_haves: &["Save and resume"],
    },
    IdeaTemplate {
        title: "{name} internal directory",
        summary: "A searchable directory of {name}'s products, teams, or locations with detail pages and filters.",
        pages: &["Directory", "Detail"],
        components: &["Search", "Filter chips", "Detail card"],
        data: &["Directory records"],
        nice_to_haves: &["CSV import"],
    },
    IdeaTemplate {
        title: "{name} report generator",
        summary: "Pick a date range, get a branded PDF-ready report of {name} activity — the kind customers forward to their boss.",
        pages: &["Builder", "Preview"],
        components: &["Range picker", "Report preview", "Export button"],
        data: &["Activity records"],
        nice_to_haves: &["Scheduled email"],
    },
];

const WEEKENDER_POOL: &[IdeaTemplate] = &[
    IdeaTemplate {
        title: "{name} customer portal",
        summary: "A weekend-sized portal where {name} customers see their account, invoices, and support threads in one place.",
        pages: &["Overview", "Invoices", "Support"],
        components: &["Auth shell", "Invoice table", "Thread view"],
        data: &["Accounts", "Invoices", "Messages"],
        nice_to_haves: &["Notification bell"],
    },
    IdeaTemplate {
        title: "{name} marketplace sketch",
        summary: "A two-sided marketplace sketch around {name}'s ecosystem: listings, profiles, and a request flow.",
        pages: &["Browse", "Listing", "Profile", "Post"],
        components: &["Listing grid", "Messaging stub", "Review stars"],
        data: &["Listings", "Profiles", "Requests"],
        nice_to_haves: &["Saved searches"],
    },
    IdeaTemplate {
        title: "{name} analytics explorer",
        summary: "An explorable analytics surface for {name} data: segment, chart, and annotate without writing queries.",
        pages: &["Explorer", "Saved views"],
        components: &["Query builder", "Chart switcher", "Annotations"],
        data: &["Event series", "Saved views"],
        nice_to_haves: &["Shareable snapshots"],
    },
    IdeaTemplate {
        title: "{name} mobile companion",
        summary: "A responsive companion app covering the two {name} actions people actually need on the go.",
        pages: &["Home", "Action", "History"],
        components: &["Bottom nav", "Action sheet", "Offline banner"],
        data: &["Action queue", "History log"],
        nice_to_haves: &["Push notification stub"],
    },
];

const FLAGSHIP_POOL: &[IdeaTemplate] = &[
    IdeaTemplate {
        title: "{name} AI assistant",
        summary: "A flagship assistant that answers questions about {name} from its own docs and data, with citations and guardrails.",
        pages: &["Chat", "Sources", "Admin"],
        components: &["Chat thread", "Citation cards", "Ingestion panel"],
        data: &["Document index", "Chat history"],
        nice_to_haves: &["Feedback loop on answers"],
    },
    IdeaTemplate {
        title: "{name} automation studio",
        summary: "A visual builder where {name} users wire triggers to actions — the week-long version with runs, logs, and retries.",
        pages: &["Canvas", "Runs", "Templates"],
        components: &["Node editor", "Run log", "Template gallery"],
        data: &["Workflows", "Run history"],
        nice_to_haves: &["Version history"],
    },
    IdeaTemplate {
        title: "{name} partner platform",
        summary: "A full partner-facing platform: onboarding, co-branded assets, deal registration, and a leaderboard.",
        pages: &["Onboarding", "Assets", "Deals", "Leaderboard"],
        components: &["Multi-tenant shell", "Asset generator", "Deal form"],
        data: &["Partners", "Deals", "Assets"],
        nice_to_haves: &["Tiered rewards"],
    },
    IdeaTemplate {
        title: "{name} live operations center",
        summary: "A real-time operations view of everything moving through {name}: streams, alerts, drill-downs, and an incident timeline.",
        pages: &["Wallboard", "Incidents", "Drill-down"],
        components: &["Live tiles", "Alert rules", "Timeline"],
        data: &["Event stream", "Incidents"],
        nice_to_haves: &["TV mode"],
    },
];

fn pool_for(level: EffortLevel) -> &'static [IdeaTemplate] {
    match level {
        EffortLevel::Starter => STARTER_POOL,
        EffortLevel::Sprint => SPRINT_POOL,
        EffortLevel::DayBuild => DAY_BUILD_POOL,
        EffortLevel::Weekender => WEEKENDER_POOL,
        EffortLevel::Flagship => FLAGSHIP_POOL,
    }
}

/// 3 ideas per effort level, lowest effort first, seeded by company name.
fn generate_ideas(bundle: &ContextBundle) -> Vec<IdeaDraft> {
    let name = &bundle.company.name;
    let seed = seed_for(name);

    let inspired_by = bundle
        .press
        .first()
        .cloned()
        .or_else(|| bundle.news.first().map(|n| n.title.clone()));

    let mut drafts = Vec::with_capacity(EffortLevel::all().len() * IDEAS_PER_LEVEL);

    for (level_idx, level) in EffortLevel::all().into_iter().enumerate() {
        let pool = pool_for(level);
        let start = ((seed >> (level_idx * 8)) as usize) % pool.len();

        for i in 0..IDEAS_PER_LEVEL {
            let template = &pool[(start + i) % pool.len()];
            drafts.push(IdeaDraft {
                title: fill(template.title, name),
                summary: fill(template.summary, name),
                effort: level,
                outline: IdeaOutline {
                    pages: owned(template.pages),
                    components: owned(template.components),
                    data: owned(template.data),
                    nice_to_haves: owned(template.nice_to_haves),
                },
                inspired_by: inspired_by.clone(),
            });
        }
    }

    drafts
}

// ---------------------------------------------------------------------------
// Plan template
// ---------------------------------------------------------------------------

/// A fixed 6-step plan parameterized by the idea and brand.
fn generate_plan(company: &str, title: &str, summary: &str, primary: &str) -> PlanDraft {
    let folder = slugify(title);

    let steps = vec![
        BuildStep {
            role: "terminal".into(),
            title: "Scaffold the project".into(),
            instruction: format!("Run the setup script to create the `{folder}` project."),
            prompt: String::new(),
            done_looks_like: vec![
                format!("A `{folder}` folder exists"),
                "The dev server starts without errors".into(),
            ],
        },
        BuildStep {
            role: "agent".into(),
            title: "Lay out the shell".into(),
            instruction: "Paste this prompt into your coding agent.".into(),
            prompt: format!(
                "Build the page shell for \"{title}\" — a prototype for {company}. \
                 Add a header with the product name, a main content area, and a \
                 footer. Use {primary} as the primary brand color."
            ),
            done_looks_like: vec![
                "Header, main, and footer render".into(),
                "Brand color is applied to the header".into(),
            ],
        },
        BuildStep {
            role: "agent".into(),
            title: "Build the core flow".into(),
            instruction: "Paste this prompt into your coding agent.".into(),
            prompt: format!(
                "Implement the core of the prototype: {summary} Keep all data \
                 in-memory for now and make the main interaction work end to end."
            ),
            done_looks_like: vec!["The main flow works with sample data".into()],
        },
        BuildStep {
            role: "agent".into(),
            title: "Wire in sample data".into(),
            instruction: "Paste this prompt into your coding agent.".into(),
            prompt: format!(
                "Create realistic sample data for \"{title}\" ({company}) and load \
                 it where the prototype currently uses placeholders. Make the \
                 empty state look intentional."
            ),
            done_looks_like: vec![
                "Lists and views show realistic content".into(),
                "Empty states have copy".into(),
            ],
        },
        BuildStep {
            role: "agent".into(),
            title: "Polish the visuals".into(),
            instruction: "Paste this prompt into your coding agent.".into(),
            prompt: format!(
                "Do a visual polish pass: consistent spacing, {primary} for \
                 primary actions, readable typography, and a simple responsive \
                 layout down to mobile widths."
            ),
            done_looks_like: vec!["The prototype looks presentable on a phone".into()],
        },
        BuildStep {
            role: "you".into(),
            title: "Review and demo".into(),
            instruction: format!(
                "Click through every screen of \"{title}\" and note anything \
                 broken, then record a 60-second demo."
            ),
            prompt: String::new(),
            done_looks_like: vec!["A demo recording exists".into()],
        },
    ];

    PlanDraft {
        setup_script: format!(
            "npm create vite@latest {folder} -- --template react\ncd {folder}\nnpm install\nnpm run dev"
        ),
        folder_name: folder,
        steps,
    }
}

// ---------------------------------------------------------------------------
// Custom idea template
// ---------------------------------------------------------------------------

/// Synthesize a custom idea that provably references the description.
fn generate_custom_idea(company: &str, description: &str) -> IdeaDraft {
    let short = description.trim();
    let title_words: Vec<&str> = short.split_whitespace().take(6).collect();

    IdeaDraft {
        title: format!("{company}: {}", title_words.join(" ")),
        summary: format!("A prototype for {company} built to the request: {short}"),
        effort: EffortLevel::DayBuild,
        outline: IdeaOutline {
            pages: vec!["Main view".into(), "Detail view".into()],
            components: vec!["Core interaction".into(), "Brand header".into()],
            data: vec!["Sample records".into()],
            nice_to_haves: vec!["Shareable link".into()],
        },
        inspired_by: None,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn fill(template: &str, name: &str) -> String {
    template.replace("{name}", name)
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn slugify(text: &str) -> String {
    let slug: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();

    let slug = slug.trim_matches('-').to_string();
    let mut out = String::with_capacity(slug.len());
    let mut prev_dash = false;
    for c in slug.chars() {
        if c == '-' {
            if !prev_dash {
                out.push(c);
            }
            prev_dash = true;
        } else {
            out.push(c);
            prev_dash = false;
        }
    }

    if out.is_empty() { "prototype".into() } else { out }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{validate_custom_idea, validate_idea_set};
    use ideaforge_shared::{BundleBrand, BundleCompany, ThemeSource};

    fn bundle(name: &str) -> ContextBundle {
        ContextBundle {
            company: BundleCompany {
                name: name.into(),
                url: None,
                description: None,
                industry_hints: vec![],
            },
            pages: vec![],
            brand: BundleBrand {
                primary: "#336699".into(),
                accent: "#cc3366".into(),
                source: ThemeSource::Default,
            },
            press: vec![],
            news: vec![],
            products: vec![],
            product_patterns: vec![],
        }
    }

    #[test]
    fn fifteen_ideas_three_per_level_in_order() {
        let drafts = generate_ideas(&bundle("Acme"));
        assert_eq!(drafts.len(), 15);
        assert!(validate_idea_set(&drafts).is_ok());

        // Ordered lowest to highest effort
        for pair in drafts.windows(2) {
            assert!(pair[0].effort <= pair[1].effort);
        }
        assert_eq!(drafts[0].effort, EffortLevel::Starter);
        assert_eq!(drafts[14].effort, EffortLevel::Flagship);
    }

    #[test]
    fn output_is_deterministic_per_name() {
        let a: Vec<String> = generate_ideas(&bundle("Acme")).iter().map(|d| d.title.clone()).collect();
        let b: Vec<String> = generate_ideas(&bundle("acme")).iter().map(|d| d.title.clone()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_names_vary_selection() {
        let a: Vec<String> = generate_ideas(&bundle("Acme")).iter().map(|d| d.title.clone()).collect();
        let b: Vec<String> = generate_ideas(&bundle("Umbrella Corp")).iter().map(|d| d.title.clone()).collect();
        assert_ne!(a, b);
    }

    #[test]
    fn titles_no_duplicates_within_level() {
        let drafts = generate_ideas(&bundle("Acme"));
        for level in EffortLevel::all() {
            let titles: Vec<&String> = drafts
                .iter()
                .filter(|d| d.effort == level)
                .map(|d| &d.title)
                .collect();
            let mut deduped = titles.clone();
            deduped.dedup();
            assert_eq!(titles.len(), 3);
            assert_eq!(deduped.len(), 3, "duplicate titles at {level:?}");
        }
    }

    #[test]
    fn press_headline_becomes_inspired_angle() {
        let mut b = bundle("Acme");
        b.press = vec!["Acme raises series B".into()];
        let drafts = generate_ideas(&b);
        assert_eq!(drafts[0].inspired_by.as_deref(), Some("Acme raises series B"));
    }

    #[test]
    fn plan_has_setup_and_enough_steps() {
        let plan = generate_plan("Acme", "Acme customer portal", "A portal.", "#336699");
        assert!(plan.steps.len() >= 5);
        assert_eq!(plan.folder_name, "acme-customer-portal");
        assert!(plan.setup_script.contains("acme-customer-portal"));
        // Agent steps carry verbatim prompt text
        assert!(plan.steps.iter().any(|s| s.role == "agent" && !s.prompt.is_empty()));
    }

    #[test]
    fn custom_idea_references_description() {
        let draft = generate_custom_idea("Acme", "an inventory tracker for warehouse teams");
        assert!(validate_custom_idea(&draft, "an inventory tracker for warehouse teams").is_ok());
        assert_eq!(draft.effort, EffortLevel::DayBuild);
    }

    #[test]
    fn slugify_handles_punctuation() {
        assert_eq!(slugify("Acme: Customer Portal!"), "acme-customer-portal");
        assert_eq!(slugify("***"), "prototype");
    }

    #[tokio::test]
    async fn provider_contract_never_fails() {
        let b = bundle("Acme");
        let provider = TemplateProvider;
        let task = GenerationTask::Ideas { bundle: &b };
        let output = provider.attempt(&task, None).await.expect("never fails");
        match output {
            GenerationOutput::Ideas(drafts) => assert_eq!(drafts.len(), 15),
            _ => panic!("expected ideas"),
        }
    }
}
