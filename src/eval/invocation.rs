use serde::{Deserialize, Serialize};

/// The kind of tool call being gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Bash,
    Edit,
    Write,
}

impl ToolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolKind::Bash => "bash",
            ToolKind::Edit => "edit",
            ToolKind::Write => "write",
        }
    }

    /// Map a host tool name. Tools that are not gated return `None`.
    pub fn from_tool_name(name: &str) -> Option<Self> {
        match name {
            "Bash" => Some(ToolKind::Bash),
            "Edit" | "MultiEdit" => Some(ToolKind::Edit),
            "Write" => Some(ToolKind::Write),
            _ => None,
        }
    }
}

/// One tool call submitted for a verdict.
///
/// Bash invocations carry `raw_command`; Edit and Write carry `target_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub tool_kind: ToolKind,
    pub raw_command: Option<String>,
    pub target_path: Option<String>,
    pub working_dir: Option<String>,
}

impl Invocation {
    pub fn bash(command: impl Into<String>) -> Self {
        Self {
            tool_kind: ToolKind::Bash,
            raw_command: Some(command.into()),
            target_path: None,
            working_dir: None,
        }
    }

    pub fn edit(path: impl Into<String>) -> Self {
        Self::path(ToolKind::Edit, path)
    }

    pub fn write(path: impl Into<String>) -> Self {
        Self::path(ToolKind::Write, path)
    }

    fn path(tool_kind: ToolKind, path: impl Into<String>) -> Self {
        Self {
            tool_kind,
            raw_command: None,
            target_path: Some(path.into()),
            working_dir: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        let dir = dir.into();
        self.working_dir = (!dir.is_empty()).then_some(dir);
        self
    }

    /// The command or path under evaluation.
    pub fn subject(&self) -> &str {
        match self.tool_kind {
            ToolKind::Bash => self.raw_command.as_deref(),
            ToolKind::Edit | ToolKind::Write => self.target_path.as_deref(),
        }
        .unwrap_or("")
    }

    /// Short single-line description for prompts and logs.
    pub fn summary(&self) -> String {
        let subject = self.subject().replace('\n', " ");
        let truncated: String = subject.chars().take(200).collect();
        if truncated.len() < subject.len() {
            format!("{}: {truncated}...", self.tool_kind.as_str())
        } else {
            format!("{}: {truncated}", self.tool_kind.as_str())
        }
    }
}
