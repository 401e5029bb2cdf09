use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCountResponse {
    #[schema(example = 2)]
    pub device_count: usize,
    #[schema(example = true)]
    pub has_multiple_devices: bool,
    pub devices: Vec<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogoutOthersRequest {
    #[validate(length(min = 1, max = 128, message = "Current device id is required"))]
    #[schema(example = "ios-7c2f1e90")]
    pub current_device_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogoutOthersResponse {
    /// How many other devices were logged out.
    #[schema(example = 2)]
    pub logged_out_devices: usize,
    #[schema(example = "ios-7c2f1e90")]
    pub current_device: String,
}
