//! Analysis goals and the instructions that go with them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisGoal {
    #[default]
    Explain,
    Debug,
    Refactor,
    Review,
    TestGenerate,
}

impl AnalysisGoal {
    pub const ALL: [AnalysisGoal; 5] = [
        Self::Explain,
        Self::Debug,
        Self::Refactor,
        Self::Review,
        Self::TestGenerate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Explain => "explain",
            Self::Debug => "debug",
            Self::Refactor => "refactor",
            Self::Review => "review",
            Self::TestGenerate => "test_generate",
        }
    }

    /// Steers the action generator.
    pub fn action_instruction(&self) -> &'static str {
        match self {
            Self::Explain => {
                "Focus on clarity, architecture, and purpose. Explain what the code does and why."
            }
            Self::Debug => {
                "Identify the root cause of errors, potential edge cases, and crash risks. Be precise about the bug."
            }
            Self::Refactor => {
                "Focus on performance and readability. Suggest cleaner, faster, or more idiomatic code."
            }
            Self::Review => {
                "Perform a thorough PR-style review. Look for security, style, and correctness issues."
            }
            Self::TestGenerate => {
                "Write focused tests for the code in question. Cover the main path and the edge cases."
            }
        }
    }

    /// Steers the streamed analysis text.
    pub fn analysis_instruction(&self) -> &'static str {
        match self {
            Self::Explain => {
                "Explain the code architecture, logic flow, and purpose. Use analogies for complex parts."
            }
            Self::Debug => {
                "Analyze the potential bugs, trace the error path, and explain why it is failing."
            }
            Self::Refactor => "Suggest specific optimizations for performance, memory, or readability.",
            Self::Review => "Critique the code for naming, security and correctness.",
            Self::TestGenerate => {
                "Describe which behaviours need tests and what each test should assert."
            }
        }
    }

    pub fn follow_up_questions(&self) -> Vec<String> {
        let questions: &[&str] = match self {
            Self::Explain => &[
                "Would you like a walkthrough of how this code is called?",
                "Should I explain a related module next?",
            ],
            Self::Debug => &[
                "Would you like me to generate a test case for this fix?",
                "Should I check if this pattern exists in other files?",
                "Can you provide the full error traceback?",
            ],
            Self::Refactor => &[
                "Should I apply the refactor across similar call sites?",
                "Would you like tests to guard the current behaviour first?",
            ],
            Self::Review => &[
                "Should I draft review comments for each finding?",
                "Would you like me to check the rest of the change set?",
            ],
            Self::TestGenerate => &[
                "Should I run the generated tests?",
                "Would you like property-style tests for the edge cases?",
            ],
        };
        questions.iter().map(|q| q.to_string()).collect()
    }
}

impl fmt::Display for AnalysisGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisGoal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|g| g.as_str() == lower)
            .ok_or_else(|| {
                format!(
                    "unknown goal '{s}' (expected one of: explain, debug, refactor, review, test_generate)"
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cli_spellings() {
        assert_eq!("debug".parse::<AnalysisGoal>().unwrap(), AnalysisGoal::Debug);
        assert_eq!(
            "Test-Generate".parse::<AnalysisGoal>().unwrap(),
            AnalysisGoal::TestGenerate
        );
        assert!("optimize".parse::<AnalysisGoal>().is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&AnalysisGoal::TestGenerate).unwrap();
        assert_eq!(json, "\"test_generate\"");
    }

    #[test]
    fn every_goal_has_follow_ups() {
        for goal in AnalysisGoal::ALL {
            assert!(!goal.follow_up_questions().is_empty(), "{goal}");
        }
    }
}
