use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "23abcd@stu.example.edu")]
    pub email: String,

    #[validate(length(min = 1, max = 128, message = "Device id is required"))]
    #[schema(example = "ios-7c2f1e90")]
    pub device_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    #[schema(example = 1)]
    pub device_count: usize,
    /// Signal for the client to offer a "log out other devices?" prompt.
    #[schema(example = false)]
    pub has_multiple_devices: bool,
}
