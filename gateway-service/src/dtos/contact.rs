use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ContactRequest {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    #[schema(example = "Jordan Lee")]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "parent@example.com")]
    pub email: String,

    #[validate(length(min = 1, max = 200, message = "Subject is required"))]
    #[schema(example = "Lab program question")]
    pub subject: String,

    #[validate(length(min = 1, max = 5000, message = "Message is required"))]
    #[schema(example = "Hello, I have a question about ...")]
    pub message: String,
}
