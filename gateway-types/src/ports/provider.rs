//! Payment provider port.

use crate::domain::{
    InitializePayment, PaymentInitialization, PayoutRequest, ProcessorPayment,
    ProviderCapabilities, ProviderReceipt, RefundRequest, WebhookNotification,
};
use crate::error::ProviderError;
use crate::ports::ExchangeRateProvider;

/// One external payment processor behind a uniform contract.
///
/// Implementations convert amounts to and from the provider's minor units,
/// apply bounded timeouts to every call, and map every failure into a
/// [`ProviderError`]. A response missing an expected field is a failure,
/// never a success with defaults.
#[async_trait::async_trait]
pub trait PaymentProvider: Send + Sync + 'static {
    /// Gateway code, the key methods are routed by.
    fn code(&self) -> &'static str;

    fn capabilities(&self) -> ProviderCapabilities;

    /// HTTP header carrying the webhook signature.
    fn signature_header(&self) -> &'static str;

    async fn initialize_payment(
        &self,
        req: &InitializePayment,
    ) -> Result<PaymentInitialization, ProviderError>;

    /// Polls the provider for a payment's current state.
    async fn verify_payment(&self, provider_reference: &str)
    -> Result<ProcessorPayment, ProviderError>;

    /// Checks a webhook's signature against the raw, unparsed body.
    ///
    /// Comparison is constant-time. Any error inside verification is `false`.
    fn verify_webhook_signature(&self, raw_body: &[u8], signature: &str) -> bool;

    /// Normalizes a webhook body that already passed signature verification.
    fn parse_webhook(&self, raw_body: &[u8]) -> Result<WebhookNotification, ProviderError>;

    async fn refund(&self, _req: &RefundRequest) -> Result<ProviderReceipt, ProviderError> {
        Err(ProviderError::Unsupported {
            provider: self.code(),
            operation: "refund",
        })
    }

    async fn payout(&self, _req: &PayoutRequest) -> Result<ProviderReceipt, ProviderError> {
        Err(ProviderError::Unsupported {
            provider: self.code(),
            operation: "payout",
        })
    }

    /// Polls the provider for a payout's current state.
    async fn verify_payout(
        &self,
        _provider_reference: &str,
    ) -> Result<ProcessorPayment, ProviderError> {
        Err(ProviderError::Unsupported {
            provider: self.code(),
            operation: "verify_payout",
        })
    }

    /// Polls the provider for a refund's current state, keyed by the id
    /// [`PaymentProvider::refund`] returned.
    async fn verify_refund(
        &self,
        _provider_reference: &str,
    ) -> Result<ProcessorPayment, ProviderError> {
        Err(ProviderError::Unsupported {
            provider: self.code(),
            operation: "verify_refund",
        })
    }

    /// Spot-rate source exposed by this adapter, if any.
    fn rates(&self) -> Option<&dyn ExchangeRateProvider> {
        None
    }
}
