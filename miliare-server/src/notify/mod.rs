//! Submitter-facing notifications

pub mod console;

pub use console::ConsoleNotifier;

use miliare_core::{PrincipalId, ReferralId, ReferralStatus};

/// What happened to a principal's referral
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    StatusChanged {
        referral_id: ReferralId,
        status: ReferralStatus,
    },
    PaymentProcessed {
        referral_id: ReferralId,
        amount: i64,
    },
    /// Generic failure notice; the operator-facing reason is never included
    PaymentFailed { referral_id: ReferralId },
}

/// Trait for delivering notices to principals
pub trait Notifier: Send + Sync {
    fn notify(&self, recipient: &PrincipalId, notice: &Notice) -> Result<(), String>;
}

/// Allow using Box<dyn Notifier> as a Notifier
impl Notifier for Box<dyn Notifier> {
    fn notify(&self, recipient: &PrincipalId, notice: &Notice) -> Result<(), String> {
        (**self).notify(recipient, notice)
    }
}

/// Deliver a notice without failing the request that triggered it
pub fn notify_best_effort<N: Notifier + ?Sized>(
    notifier: &N,
    recipient: &PrincipalId,
    notice: Notice,
) {
    if let Err(e) = notifier.notify(recipient, &notice) {
        tracing::warn!(recipient = %recipient, ?notice, error = %e, "Failed to deliver notice");
    }
}
