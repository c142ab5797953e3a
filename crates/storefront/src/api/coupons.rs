use async_trait::async_trait;
use tracing::instrument;

use super::{ApiClient, ApiError};
use crate::checkout::{CouponRequest, CouponResponse, CouponService};

#[async_trait]
impl CouponService for ApiClient {
    #[instrument(skip_all, fields(code = %request.code))]
    async fn apply(&self, request: &CouponRequest) -> Result<CouponResponse, ApiError> {
        self.send_enveloped("coupons/apply", request).await
    }
}
