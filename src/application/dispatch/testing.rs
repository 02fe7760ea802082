//! Scripted bot API used by the engine tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::{
    application::services::messenger::{BotApi, BotConnector, BotIdentity, SentMessage},
    domain::{
        errors::BotApiError,
        models::{ChannelCredential, ChatId, ImageMessage, TextMessage},
    },
};

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Ok,
    Err(BotApiError),
    Delay(Duration, Box<Reply>),
    Panic,
}

impl Reply {
    pub(crate) fn rate_limited(retry_after: Option<u64>) -> Self {
        let description = match retry_after {
            Some(secs) => format!("Too Many Requests: retry after {secs}"),
            None => "Too Many Requests".to_string(),
        };
        Reply::Err(BotApiError::RateLimited {
            retry_after,
            description,
        })
    }

    pub(crate) fn delayed(delay: Duration, reply: Reply) -> Self {
        Reply::Delay(delay, Box::new(reply))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Text { chat_id: ChatId, text: String },
    Image { chat_id: ChatId, bytes: usize },
    Copy { chat_id: ChatId, from_chat_id: ChatId, message_id: i64 },
    GetMe,
}

impl Call {
    fn chat_id(&self) -> Option<ChatId> {
        match self {
            Call::Text { chat_id, .. } | Call::Image { chat_id, .. } | Call::Copy { chat_id, .. } => {
                Some(*chat_id)
            }
            Call::GetMe => None,
        }
    }
}

#[derive(Default)]
pub(crate) struct ScriptedBot {
    scripts: Mutex<HashMap<ChatId, VecDeque<Reply>>>,
    fallback: Mutex<Option<Reply>>,
    get_me: Mutex<Option<BotApiError>>,
    calls: Mutex<Vec<Call>>,
    next_message_id: AtomicI64,
}

impl ScriptedBot {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replies consumed in order for `chat_id`; once drained every call succeeds.
    pub(crate) fn script(&self, chat_id: ChatId, replies: Vec<Reply>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(chat_id, replies.into_iter().collect());
    }

    /// Reply used for chats without a script of their own.
    pub(crate) fn fallback(&self, reply: Reply) {
        *self.fallback.lock().unwrap() = Some(reply);
    }

    pub(crate) fn reject_credential(&self, error: BotApiError) {
        *self.get_me.lock().unwrap() = Some(error);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn calls_to(&self, chat_id: ChatId) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.chat_id() == Some(chat_id))
            .count()
    }

    fn next_reply(&self, chat_id: ChatId) -> Reply {
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&chat_id)
            .and_then(VecDeque::pop_front);
        scripted
            .or_else(|| self.fallback.lock().unwrap().clone())
            .unwrap_or(Reply::Ok)
    }

    async fn respond(&self, call: Call) -> Result<SentMessage, BotApiError> {
        let chat_id = call.chat_id().unwrap_or_default();
        self.calls.lock().unwrap().push(call);
        let mut reply = self.next_reply(chat_id);
        loop {
            match reply {
                Reply::Ok => {
                    let message_id = self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1;
                    return Ok(SentMessage {
                        message_id,
                        chat_id,
                    });
                }
                Reply::Err(error) => return Err(error),
                Reply::Delay(delay, next) => {
                    tokio::time::sleep(delay).await;
                    reply = *next;
                }
                Reply::Panic => panic!("scripted panic for chat {chat_id}"),
            }
        }
    }
}

#[async_trait]
impl BotApi for ScriptedBot {
    async fn send_text(
        &self,
        chat_id: ChatId,
        message: &TextMessage,
    ) -> Result<SentMessage, BotApiError> {
        self.respond(Call::Text {
            chat_id,
            text: message.text.clone(),
        })
        .await
    }

    async fn send_image(
        &self,
        chat_id: ChatId,
        image: &ImageMessage,
    ) -> Result<SentMessage, BotApiError> {
        self.respond(Call::Image {
            chat_id,
            bytes: image.bytes.len(),
        })
        .await
    }

    async fn copy_message(
        &self,
        chat_id: ChatId,
        from_chat_id: ChatId,
        message_id: i64,
    ) -> Result<SentMessage, BotApiError> {
        self.respond(Call::Copy {
            chat_id,
            from_chat_id,
            message_id,
        })
        .await
    }

    async fn get_me(&self) -> Result<BotIdentity, BotApiError> {
        self.calls.lock().unwrap().push(Call::GetMe);
        let rejection = self.get_me.lock().unwrap().clone();
        match rejection {
            Some(error) => Err(error),
            None => Ok(BotIdentity {
                id: 1,
                username: Some("scripted_bot".to_string()),
            }),
        }
    }
}

pub(crate) struct ScriptedConnector {
    bot: Arc<ScriptedBot>,
    connects: AtomicUsize,
    fail: bool,
}

impl ScriptedConnector {
    pub(crate) fn new(bot: Arc<ScriptedBot>) -> Arc<Self> {
        Arc::new(Self {
            bot,
            connects: AtomicUsize::new(0),
            fail: false,
        })
    }

    pub(crate) fn failing(bot: Arc<ScriptedBot>) -> Arc<Self> {
        Arc::new(Self {
            bot,
            connects: AtomicUsize::new(0),
            fail: true,
        })
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl BotConnector for ScriptedConnector {
    fn connect(&self, _credential: &ChannelCredential) -> anyhow::Result<Arc<dyn BotApi>> {
        if self.fail {
            anyhow::bail!("connector offline");
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.bot.clone() as Arc<dyn BotApi>)
    }
}
