pub mod channel;
pub mod outcome;
pub mod payload;
pub mod report;

pub use channel::{ChannelCredential, ChatId, RecipientStats};
pub use outcome::{DeliveryFailure, DispatchOutcome, FailureKind};
pub use payload::{DispatchTask, ImageMessage, ParseMode, Payload, StagedMessage, TextMessage};
pub use report::{DispatchReport, ProgressSnapshot, SessionPhase};
