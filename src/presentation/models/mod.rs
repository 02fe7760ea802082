use poem_openapi::Enum;

use crate::domain::models::{ParseMode, SessionPhase};

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum ParseModeKind {
    #[default]
    #[oai(rename = "html")]
    Html,
    #[oai(rename = "markdown_v2")]
    MarkdownV2,
    #[oai(rename = "plain")]
    Plain,
}

impl From<ParseModeKind> for ParseMode {
    fn from(value: ParseModeKind) -> Self {
        match value {
            ParseModeKind::Html => ParseMode::Html,
            ParseModeKind::MarkdownV2 => ParseMode::MarkdownV2,
            ParseModeKind::Plain => ParseMode::Plain,
        }
    }
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum PhaseKind {
    #[oai(rename = "created")]
    Created,
    #[oai(rename = "sizing")]
    Sizing,
    #[oai(rename = "template_optimizing")]
    TemplateOptimizing,
    #[oai(rename = "dispatching")]
    Dispatching,
    #[oai(rename = "cancelling")]
    Cancelling,
    #[oai(rename = "completed")]
    Completed,
}

impl From<SessionPhase> for PhaseKind {
    fn from(value: SessionPhase) -> Self {
        match value {
            SessionPhase::Created => PhaseKind::Created,
            SessionPhase::Sizing => PhaseKind::Sizing,
            SessionPhase::TemplateOptimizing => PhaseKind::TemplateOptimizing,
            SessionPhase::Dispatching => PhaseKind::Dispatching,
            SessionPhase::Cancelling => PhaseKind::Cancelling,
            SessionPhase::Completed => PhaseKind::Completed,
        }
    }
}
