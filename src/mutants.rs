use serde::{Deserialize, Serialize};

/// One single-line substitution proposed by the generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutation {
    /// 1-based line in the source file.
    #[serde(deserialize_with = "line_number_from_reply")]
    pub line_number: usize,
    /// What the proposer believed the line said. Informational only.
    pub original_line: String,
    pub mutated_line: String,
    pub mutation_type: String,
}

/// Models occasionally quote the line number; accept `12` and `"12"`.
fn line_number_from_reply<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum LineNumber {
        Int(usize),
        Text(String),
    }

    match LineNumber::deserialize(deserializer)? {
        LineNumber::Int(n) => Ok(n),
        LineNumber::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid line number {s:?}"))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutantStatus {
    /// Tests failed with the mutation applied.
    Killed,
    /// Tests passed with the mutation applied.
    Survived,
    /// Tests ran past the configured timeout and were stopped.
    Timeout,
    /// The mutation could not be applied or tested.
    Error,
}

impl MutantStatus {
    /// Only a clean test pass counts as survival; everything else is
    /// attributed to the test suite.
    pub fn survived(self) -> bool {
        self == MutantStatus::Survived
    }

    pub fn label(self) -> &'static str {
        match self {
            MutantStatus::Killed => "Killed",
            MutantStatus::Survived => "Survived",
            MutantStatus::Timeout => "Killed (timeout)",
            MutantStatus::Error => "Killed (error)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    ControlFlow,
    ChangedBehavior,
    RemovedFunctionality,
    AddedBehavior,
    Modified,
}

impl Impact {
    pub fn classify(mutation_type: &str) -> Impact {
        let kind = mutation_type.to_lowercase();
        if kind.contains("comparison") {
            Impact::ControlFlow
        } else if kind.contains("changed") {
            Impact::ChangedBehavior
        } else if kind.contains("removed") {
            Impact::RemovedFunctionality
        } else if kind.contains("added") {
            Impact::AddedBehavior
        } else {
            Impact::Modified
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Impact::ControlFlow => "Modified condition affecting control flow",
            Impact::ChangedBehavior => "Changed implementation behavior",
            Impact::RemovedFunctionality => "Removed functionality",
            Impact::AddedBehavior => "Added additional behavior",
            Impact::Modified => "Modified program behavior",
        }
    }
}

/// Outcome of one mutate/test/restore cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationResult {
    #[serde(flatten)]
    pub mutation: Mutation,
    pub file_name: String,
    pub status: MutantStatus,
    pub impact: Impact,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub diff: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MutationResult {
    pub fn survived(&self) -> bool {
        self.status.survived()
    }
}
