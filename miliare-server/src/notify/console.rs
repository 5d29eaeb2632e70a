//! Console-based notifier for development

use miliare_core::PrincipalId;

use super::{Notice, Notifier};

/// Notifier that logs to console (for development)
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, recipient: &PrincipalId, notice: &Notice) -> Result<(), String> {
        match notice {
            Notice::StatusChanged {
                referral_id,
                status,
            } => {
                tracing::info!(recipient = %recipient, referral_id = %referral_id, status = %status, "Referral status changed");
            }
            Notice::PaymentProcessed {
                referral_id,
                amount,
            } => {
                tracing::info!(recipient = %recipient, referral_id = %referral_id, amount, "Commission payment processed");
            }
            Notice::PaymentFailed { referral_id } => {
                tracing::info!(recipient = %recipient, referral_id = %referral_id, "Commission payment could not be processed");
            }
        }

        Ok(())
    }
}
