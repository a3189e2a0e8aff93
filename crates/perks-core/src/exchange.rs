// ── Points-for-voucher exchange ──
//
// Spends a user's points on a freshly minted single-use voucher. The
// deduction, the voucher insert and the entitlement grant commit as one
// unit or not at all.

use chrono::Utc;
use tracing::{debug, info};

use crate::code::generate_code;
use crate::error::CoreError;
use crate::model::{UserId, Voucher};
use crate::perks::Perks;
use crate::requests::ExchangeRequest;
use crate::store::Store;
use crate::validator::{Validator, validate_points, validate_voucher};

impl<S: Store> Perks<S> {
    /// Exchange `req.points` for a new voucher owned by `user`.
    ///
    /// Fails with `InsufficientPoints` when the balance does not cover
    /// the cost, and `VoucherAlreadyExists` when no free code could be
    /// found. Either way the balance is untouched.
    pub async fn exchange(&self, user: UserId, req: ExchangeRequest) -> Result<Voucher, CoreError> {
        let now = Utc::now();
        let expires = chrono::Duration::from_std(req.valid_for)
            .ok()
            .and_then(|valid_for| now.checked_add_signed(valid_for))
            .ok_or_else(|| CoreError::invalid("valid_for", "is too large"))?;
        let mut voucher = Voucher {
            code: generate_code(),
            created_at: now,
            updated_at: now,
            description: req.description,
            discount: req.discount,
            is_percentage: req.is_percentage,
            starts: now,
            expires,
            active: true,
            usage_limit: 1,
            usage_count: 0,
            min_spend: 0,
            category: req.category,
        };

        let mut v = Validator::new();
        validate_points(&mut v, req.points);
        v.check(!req.valid_for.is_zero(), "valid_for", "must be positive");
        validate_voucher(&mut v, &voucher);
        v.finish()?;

        voucher.code = self.free_code().await?;

        let points = req.points;
        let minted = voucher.clone();
        self.inner
            .store
            .transaction(move |tx| {
                tx.deduct_points(user, points)?;
                tx.insert_voucher(&minted).map_err(|e| match e {
                    CoreError::DuplicateCode => CoreError::VoucherAlreadyExists,
                    other => other,
                })?;
                tx.grant_entitlement(user, &minted.code, 1)
            })
            .await?;

        info!(user = %user, code = %voucher.code, points, "exchanged points for voucher");
        Ok(voucher)
    }

    /// A generated code no voucher currently uses.
    async fn free_code(&self) -> Result<String, CoreError> {
        let attempts = self.inner.config.code_attempts.max(1);
        for attempt in 1..=attempts {
            let code = generate_code();
            match self.inner.store.voucher(&code).await {
                Err(CoreError::NotFound { .. }) => return Ok(code),
                Ok(_) => debug!(attempt, "generated code already taken"),
                Err(e) => return Err(e),
            }
        }
        Err(CoreError::VoucherAlreadyExists)
    }
}
