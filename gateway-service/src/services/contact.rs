use async_trait::async_trait;
use service_core::error::AppError;
use std::sync::Mutex;

/// Downstream collaborator that actually delivers contact-form submissions.
/// Delivery is outside the gateway's scope; the gateway only decides whether
/// a submission may pass.
#[async_trait]
pub trait ContactSink: Send + Sync {
    async fn submit(&self, from_email: &str, subject: &str, message: &str)
        -> Result<(), AppError>;
}

/// Default sink: records the accepted submission in the log and nothing
/// else. Deployments wire a real delivery service here.
pub struct LoggingContactSink;

#[async_trait]
impl ContactSink for LoggingContactSink {
    async fn submit(
        &self,
        from_email: &str,
        subject: &str,
        _message: &str,
    ) -> Result<(), AppError> {
        tracing::info!(from = %from_email, subject = %subject, "Contact submission accepted");
        Ok(())
    }
}

/// Test sink that records submissions for assertions.
#[derive(Default)]
pub struct MockContactSink {
    submissions: Mutex<Vec<(String, String, String)>>,
}

impl MockContactSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submissions(&self) -> Vec<(String, String, String)> {
        self.submissions
            .lock()
            .expect("mock submission log poisoned")
            .clone()
    }
}

#[async_trait]
impl ContactSink for MockContactSink {
    async fn submit(&self, from_email: &str, subject: &str, message: &str)
        -> Result<(), AppError> {
        self.submissions
            .lock()
            .expect("mock submission log poisoned")
            .push((
                from_email.to_string(),
                subject.to_string(),
                message.to_string(),
            ));
        Ok(())
    }
}
