use poem_openapi::Object;

use crate::presentation::models::ParseModeKind;

#[derive(Object, Debug)]
pub struct AuthRequestDto {
    #[oai(validator(min_length = 1))]
    pub api_key: String,
}

#[derive(Object, Debug)]
pub struct RegisterChannelRequestDto {
    #[oai(validator(min_length = 1, max_length = 128))]
    pub channel_id: String,
    #[oai(validator(min_length = 1))]
    pub token: String,
    pub display_name: Option<String>,
}

#[derive(Object, Debug)]
pub struct AddRecipientsRequestDto {
    #[oai(validator(min_items = 1, max_items = 10000))]
    pub recipients: Vec<i64>,
}

/// Exactly one of `text` or `image_base64` must be set.
#[derive(Object, Debug)]
pub struct StartBroadcastRequestDto {
    #[oai(validator(min_length = 1))]
    pub channel_id: String,
    #[oai(validator(max_length = 4096))]
    pub text: Option<String>,
    pub image_base64: Option<String>,
    #[oai(validator(max_length = 1024))]
    pub caption: Option<String>,
    #[oai(default)]
    pub parse_mode: ParseModeKind,
    #[oai(validator(minimum(value = "1"), maximum(value = "10")))]
    pub worker_count: Option<u32>,
    pub staging_chat_id: Option<i64>,
}
