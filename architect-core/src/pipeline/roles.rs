//! Specialist role selection
//!
//! Requirements are scanned for keyword triggers; each trigger pulls in one
//! specialist. Backend and frontend developers always take part and the
//! integration role always closes the list.

use once_cell::sync::Lazy;
use regex_utils::keywords::KeywordMatcher;

/// A simulated domain expert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialistRole {
    pub name: &'static str,
    pub expertise: &'static str,
    pub keywords: &'static [&'static str],
}

pub const BACKEND_DEVELOPER: SpecialistRole = SpecialistRole {
    name: "Backend Developer",
    expertise: "Server-side development: API design, business logic, data access layers, \
                error handling, service boundaries and performance of request handling.",
    keywords: &[],
};

pub const FRONTEND_DEVELOPER: SpecialistRole = SpecialistRole {
    name: "Frontend Developer",
    expertise: "Client-side development: component architecture, state management, routing, \
                data fetching and the build tooling of the user-facing application.",
    keywords: &[],
};

/// The role that reconciles every specialist into one design
pub const INTEGRATION_ROLE: SpecialistRole = SpecialistRole {
    name: "Chief Technology Officer",
    expertise: "Technical leadership: reconciling competing designs, resolving conflicts in \
                structure and naming, and turning a set of proposals into one coherent, \
                buildable architecture with a clear implementation order.",
    keywords: &[],
};

/// Keyword-triggered roles, in declaration order
pub const TRIGGERED_ROLES: &[SpecialistRole] = &[
    SpecialistRole {
        name: "UI/UX Designer",
        expertise: "User interface and experience design: layout, navigation, accessibility, \
                    responsive behavior, design systems and interaction patterns.",
        keywords: &[
            "ui", "ux", "user interface", "user experience", "design", "layout", "responsive",
            "accessibility", "accessible", "dashboard", "theme", "styling", "wireframe",
            "wireframes",
        ],
    },
    SpecialistRole {
        name: "Database Architect",
        expertise: "Data modeling and storage: schema design, indexing, migrations, \
                    transactions, consistency and the choice of storage engines.",
        keywords: &[
            "database", "databases", "db", "data", "storage", "persist", "persistence", "sql",
            "nosql", "postgres", "postgresql", "mysql", "sqlite", "mongodb", "redis", "schema",
        ],
    },
    SpecialistRole {
        name: "Security Specialist",
        expertise: "Application security: authentication, authorization, secret handling, \
                    input validation, encryption and threat modeling.",
        keywords: &[
            "security", "secure", "auth", "authentication", "authorization", "login",
            "password", "passwords", "encryption", "encrypt", "oauth", "jwt", "permissions",
            "compliance", "gdpr",
        ],
    },
    SpecialistRole {
        name: "DevOps Engineer",
        expertise: "Delivery and operations: containerization, CI/CD, cloud infrastructure, \
                    scaling strategy, observability and deployment topology.",
        keywords: &[
            "scale", "scaling", "scalable", "scalability", "cloud", "deploy", "deployment",
            "aws", "azure", "gcp", "kubernetes", "k8s", "docker", "ci/cd", "devops",
            "infrastructure", "load balancing", "high availability", "microservices",
        ],
    },
    SpecialistRole {
        name: "Mobile Developer",
        expertise: "Mobile applications: native and cross-platform clients, offline support, \
                    device capabilities and app store constraints.",
        keywords: &["mobile", "ios", "android", "react native", "flutter", "smartphone", "tablet"],
    },
    SpecialistRole {
        name: "QA Engineer",
        expertise: "Quality assurance: test strategy, unit and integration test layout, \
                    end-to-end scenarios, fixtures and testability of the design.",
        keywords: &[
            "test", "tests", "testing", "qa", "quality assurance", "unit test", "unit tests",
            "e2e", "end-to-end",
        ],
    },
    SpecialistRole {
        name: "Machine Learning Engineer",
        expertise: "Machine learning systems: model selection, training and inference \
                    pipelines, feature stores, evaluation and model serving.",
        keywords: &[
            "machine learning", "ml", "ai", "artificial intelligence", "neural network",
            "deep learning", "llm", "nlp", "prediction", "predictions", "recommendation",
            "recommendations", "classifier",
        ],
    },
    SpecialistRole {
        name: "Blockchain Developer",
        expertise: "Blockchain applications: smart contracts, wallets, on-chain and off-chain \
                    data, transaction flows and chain-specific security concerns.",
        keywords: &[
            "blockchain", "smart contract", "smart contracts", "web3", "crypto",
            "cryptocurrency", "ethereum", "solidity", "nft", "nfts", "defi",
        ],
    },
];

static TRIGGER_MATCHERS: Lazy<Vec<(&'static SpecialistRole, KeywordMatcher)>> = Lazy::new(|| {
    TRIGGERED_ROLES
        .iter()
        .map(|role| {
            let matcher =
                KeywordMatcher::new(role.keywords).expect("escaped keywords always compile");
            (role, matcher)
        })
        .collect()
});

/// Ordered, duplicate-free list of role names relevant to `requirements`
pub fn select_roles<S: AsRef<str>>(requirements: &[S]) -> Vec<String> {
    let text = requirements.iter().map(|r| r.as_ref()).collect::<Vec<_>>().join("\n");
    let text = text.to_lowercase();

    let mut roles = vec![BACKEND_DEVELOPER.name.to_string(), FRONTEND_DEVELOPER.name.to_string()];

    for (role, matcher) in TRIGGER_MATCHERS.iter() {
        if matcher.is_match(&text) && !roles.iter().any(|r| r == role.name) {
            roles.push(role.name.to_string());
        }
    }

    roles.push(INTEGRATION_ROLE.name.to_string());
    roles
}

/// Look a role up by its display name, case-insensitively
pub fn role_by_name(name: &str) -> Option<&'static SpecialistRole> {
    let name = name.trim();
    [&BACKEND_DEVELOPER, &FRONTEND_DEVELOPER, &INTEGRATION_ROLE]
        .into_iter()
        .chain(TRIGGERED_ROLES.iter())
        .find(|role| role.name.eq_ignore_ascii_case(name))
}

pub fn is_integration_role(name: &str) -> bool {
    INTEGRATION_ROLE.name.eq_ignore_ascii_case(name.trim())
}

/// Roles that produce a Stage 1 vision
pub fn specialist_roles(selected: &[String]) -> Vec<String> {
    selected.iter().filter(|name| !is_integration_role(name)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_todo_app_scenario() {
        let roles = select_roles(&["Build a todo app with a REST API and a database"]);
        assert_eq!(
            roles,
            vec![
                "Backend Developer",
                "Frontend Developer",
                "Database Architect",
                "Chief Technology Officer"
            ]
        );
    }

    #[test]
    fn test_base_roles_without_triggers() {
        let roles = select_roles(&["A static page"]);
        assert_eq!(roles, vec!["Backend Developer", "Frontend Developer", "Chief Technology Officer"]);

        let empty: [&str; 0] = [];
        assert_eq!(select_roles(&empty).len(), 3);
    }

    #[test]
    fn test_triggered_roles_follow_declaration_order() {
        let roles = select_roles(&[
            "Deploy to AWS with Kubernetes",
            "Users log in with OAuth",
            "Responsive UI with a dashboard",
            "Store everything in Postgres",
        ]);
        assert_eq!(
            roles,
            vec![
                "Backend Developer",
                "Frontend Developer",
                "UI/UX Designer",
                "Database Architect",
                "Security Specialist",
                "DevOps Engineer",
                "Chief Technology Officer"
            ]
        );
    }

    #[test]
    fn test_every_role_appears_at_most_once() {
        let requirements = [
            "database data storage sql",
            "mobile ios android",
            "testing tests qa",
            "machine learning ai recommendation",
            "blockchain smart contract nft",
            "security auth encryption",
            "cloud scale docker",
            "ui ux design",
        ];
        let roles = select_roles(&requirements);
        assert_eq!(roles.len(), 2 + TRIGGERED_ROLES.len() + 1);

        let mut deduped = roles.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), roles.len());

        assert_eq!(roles.first().map(String::as_str), Some("Backend Developer"));
        assert_eq!(roles.last().map(String::as_str), Some("Chief Technology Officer"));
    }

    #[test]
    fn test_keywords_match_whole_words_only() {
        // "build" contains "ui" and "email" contains "ai"
        let roles = select_roles(&["Build an email digest"]);
        assert!(!roles.iter().any(|r| r == "UI/UX Designer"));
        assert!(!roles.iter().any(|r| r == "Machine Learning Engineer"));
    }

    #[test]
    fn test_role_lookup() {
        assert_eq!(role_by_name("database architect").map(|r| r.name), Some("Database Architect"));
        assert_eq!(role_by_name("Chief Technology Officer").map(|r| r.name), Some(INTEGRATION_ROLE.name));
        assert!(role_by_name("Astronaut").is_none());
    }

    #[test]
    fn test_specialist_roles_exclude_integration_role() {
        let selected = select_roles(&["A REST API"]);
        let specialists = specialist_roles(&selected);
        assert_eq!(specialists, vec!["Backend Developer", "Frontend Developer"]);
    }
}
