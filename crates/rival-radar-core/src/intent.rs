//! Query intent classification and analysis.
//!
//! [`classify`] maps a raw query to one of five [`Intent`] labels by
//! matching fixed keyword sets. When several sets match, the label is
//! chosen by a fixed precedence:
//!
//! ```text
//! comparison > financial > product > market > general
//! ```
//!
//! [`analyze`] extends classification with the competitors mentioned, the
//! aspects requested, a complexity estimate, and a sub-goal plan.
//!
//! Everything here is a pure function of its inputs.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

/// Coarse purpose of a query, used to pick a prompt template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    General,
    Comparison,
    Financial,
    Product,
    Market,
}

impl Intent {
    /// Every label, in precedence order (highest first), `General` last.
    pub const PRECEDENCE: [Intent; 5] = [
        Intent::Comparison,
        Intent::Financial,
        Intent::Product,
        Intent::Market,
        Intent::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::General => "general",
            Intent::Comparison => "comparison",
            Intent::Financial => "financial",
            Intent::Product => "product",
            Intent::Market => "market",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const COMPARISON: &[&str] = &[
    "compare",
    "comparison",
    "versus",
    "vs",
    "difference",
    "differ",
    "better",
    "against",
    "between",
];
const FINANCIAL: &[&str] = &[
    "financial",
    "finance",
    "revenue",
    "profit",
    "funding",
    "valuation",
    "growth",
    "money",
    "margin",
    "ipo",
];
const PRODUCT: &[&str] = &[
    "product",
    "feature",
    "technolog",
    "solution",
    "platform",
    "service",
    "offering",
];
const MARKET: &[&str] = &[
    "market",
    "strateg",
    "promotion",
    "advertis",
    "campaign",
    "sales",
    "customer",
    "positioning",
];

/// Keyword stems match at a word start and extend to the end of the word.
fn stem_pattern(stems: &[&str]) -> String {
    format!(r"\b(?:{})\w*", stems.join("|"))
}

const ASPECT_MARKETING: &str =
    r"\b(?:marketing|strateg\w*|promotion\w*|advertis\w*|campaigns?|sales)\b";
const ASPECT_STRENGTHS: &str = r"\b(?:strengths?|advantages?|benefits?|strong|good|pros)\b";
const ASPECT_WEAKNESSES: &str =
    r"\b(?:weakness\w*|disadvantages?|problems?|weak|bad|cons|issues?)\b";

const ACTION_KEYWORDS: [&str; 7] = [
    "analyze",
    "explain",
    "describe",
    "summarize",
    "evaluate",
    "assess",
    "review",
];

struct Matchers {
    intents: Vec<(Intent, Regex)>,
    aspects: Vec<(Aspect, Regex)>,
}

fn matchers() -> &'static Matchers {
    static MATCHERS: OnceLock<Matchers> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        let ci = |p: &str| {
            Regex::new(&format!("(?i){p}")).unwrap_or_else(|e| panic!("bad keyword pattern {p}: {e}"))
        };
        let financial = stem_pattern(FINANCIAL);
        let product = stem_pattern(PRODUCT);
        Matchers {
            intents: vec![
                (Intent::Comparison, ci(&stem_pattern(COMPARISON))),
                (Intent::Financial, ci(&financial)),
                (Intent::Product, ci(&product)),
                (Intent::Market, ci(&stem_pattern(MARKET))),
            ],
            aspects: vec![
                (Aspect::Marketing, ci(ASPECT_MARKETING)),
                (Aspect::Financial, ci(&financial)),
                (Aspect::Product, ci(&product)),
                (Aspect::Strengths, ci(ASPECT_STRENGTHS)),
                (Aspect::Weaknesses, ci(ASPECT_WEAKNESSES)),
            ],
        }
    })
}

/// Classify a query. Returns [`Intent::General`] when no keyword set matches.
pub fn classify(query: &str) -> Intent {
    matchers()
        .intents
        .iter()
        .find(|(_, re)| re.is_match(query))
        .map(|(intent, _)| *intent)
        .unwrap_or(Intent::General)
}

/// Aspect of a competitor a query asks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Aspect {
    Marketing,
    Financial,
    Product,
    Strengths,
    Weaknesses,
}

impl Aspect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aspect::Marketing => "marketing",
            Aspect::Financial => "financial",
            Aspect::Product => "product",
            Aspect::Strengths => "strengths",
            Aspect::Weaknesses => "weaknesses",
        }
    }
}

/// Rough size of the answer a query needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

/// Planned step, reported in logs to show how a query will be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubGoal {
    RetrieveSpecificCompetitors,
    RetrieveRelevantData,
    AnalyzeCompetitorData,
    IdentifyComparisonCandidates,
    PerformComparison,
    GenerateInsights,
    AnalyzeSpecificAspects,
    ExtractRelevantInformation,
    ProvideComprehensiveAnalysis,
    AnalyzeMarketLandscape,
    ProvideGeneralInsights,
    SynthesizeComplexAnalysis,
}

/// Full analysis of a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryAnalysis {
    pub intent: Intent,
    /// Known competitor names found in the query, in the caller's order.
    pub competitors_mentioned: Vec<String>,
    pub aspects: Vec<Aspect>,
    pub action_keywords: Vec<String>,
    pub complexity: Complexity,
    pub sub_goals: Vec<SubGoal>,
}

impl QueryAnalysis {
    pub fn is_comparison(&self) -> bool {
        self.intent == Intent::Comparison
    }
}

/// Matcher for one competitor name, also accepting the name with its
/// spaces removed or replaced by `-`.
///
/// A word boundary is required only on a side where the name starts or ends
/// with a word character, so names like `Acme Inc.` or `Widgets (EU)` still
/// match.
fn name_matcher(name: &str) -> Option<Regex> {
    let lower = name.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }
    let mut variants = vec![lower.clone(), lower.replace(' ', ""), lower.replace(' ', "-")];
    variants.dedup();
    let alternatives: Vec<String> = variants
        .iter()
        .map(|v| {
            let starts_word = v.chars().next().is_some_and(is_word_char);
            let ends_word = v.chars().next_back().is_some_and(is_word_char);
            format!(
                "{}{}{}",
                if starts_word { r"\b" } else { "" },
                regex::escape(v),
                if ends_word { r"\b" } else { "" },
            )
        })
        .collect();
    Regex::new(&format!("(?:{})", alternatives.join("|"))).ok()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Analyze a query against the list of known competitor names.
pub fn analyze<S: AsRef<str>>(query: &str, known_competitors: &[S]) -> QueryAnalysis {
    let query_lower = query.to_lowercase();
    let intent = classify(query);

    let mut competitors_mentioned: Vec<String> = Vec::new();
    for name in known_competitors {
        let name = name.as_ref().trim();
        if competitors_mentioned.iter().any(|n| n == name) {
            continue;
        }
        if name_matcher(name).is_some_and(|re| re.is_match(&query_lower)) {
            competitors_mentioned.push(name.to_string());
        }
    }

    let aspects: Vec<Aspect> = matchers()
        .aspects
        .iter()
        .filter(|(_, re)| re.is_match(query))
        .map(|(a, _)| *a)
        .collect();

    let action_keywords: Vec<String> = ACTION_KEYWORDS
        .iter()
        .filter(|k| query_lower.contains(*k))
        .map(|k| k.to_string())
        .collect();

    let indicators = competitors_mentioned.len() + aspects.len();
    let complexity = if intent == Intent::Comparison || indicators > 2 {
        Complexity::Complex
    } else if indicators > 0 {
        Complexity::Moderate
    } else {
        Complexity::Simple
    };

    let mut analysis = QueryAnalysis {
        intent,
        competitors_mentioned,
        aspects,
        action_keywords,
        complexity,
        sub_goals: Vec::new(),
    };
    analysis.sub_goals = plan_sub_goals(&analysis);
    analysis
}

/// Plan the handling steps for an analyzed query.
pub fn plan_sub_goals(analysis: &QueryAnalysis) -> Vec<SubGoal> {
    use SubGoal::*;

    let mut goals = if analysis.is_comparison() {
        if analysis.competitors_mentioned.len() >= 2 {
            vec![
                RetrieveSpecificCompetitors,
                AnalyzeCompetitorData,
                PerformComparison,
                GenerateInsights,
            ]
        } else {
            vec![
                RetrieveRelevantData,
                IdentifyComparisonCandidates,
                PerformComparison,
            ]
        }
    } else if !analysis.competitors_mentioned.is_empty() {
        if analysis.aspects.is_empty() {
            vec![RetrieveSpecificCompetitors, ProvideComprehensiveAnalysis]
        } else {
            vec![
                RetrieveSpecificCompetitors,
                AnalyzeSpecificAspects,
                ExtractRelevantInformation,
            ]
        }
    } else {
        vec![
            RetrieveRelevantData,
            AnalyzeMarketLandscape,
            ProvideGeneralInsights,
        ]
    };

    if analysis.complexity == Complexity::Complex {
        goals.push(SynthesizeComplexAnalysis);
    }
    goals
}

/// Retrieval depth for a query: complex queries look a little wider.
pub fn retrieval_depth(base_top_k: usize, complexity: Complexity) -> usize {
    match complexity {
        Complexity::Complex => base_top_k.max((base_top_k + 3).min(8)),
        _ => base_top_k,
    }
}
