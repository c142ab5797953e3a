use async_trait::async_trait;
use tracing::instrument;

use super::{ApiClient, ApiError};
use crate::checkout::{AccountRegistrar, RegistrationRequest, RegistrationResponse};

#[async_trait]
impl AccountRegistrar for ApiClient {
    #[instrument(skip_all)]
    async fn register(
        &self,
        request: &RegistrationRequest,
    ) -> Result<RegistrationResponse, ApiError> {
        self.send_enveloped("auth/register", request).await
    }
}
