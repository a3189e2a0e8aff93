// ── Redeeming and using vouchers ──

use chrono::Utc;
use tracing::info;

use crate::error::CoreError;
use crate::model::UserId;
use crate::perks::Perks;
use crate::requests::RedeemRequest;
use crate::store::Store;
use crate::validator::{Validator, validate_code};

impl<S: Store> Perks<S> {
    /// Add an existing, currently usable voucher to the user's wallet
    /// with `req.uses` uses.
    ///
    /// A code the user already holds is `AlreadyGranted`, whatever its
    /// remaining count.
    pub async fn redeem(&self, user: UserId, req: RedeemRequest) -> Result<(), CoreError> {
        let mut v = Validator::new();
        validate_code(&mut v, &req.code);
        v.check(req.uses > 0, "uses", "must be greater than 0");
        v.finish()?;

        let voucher = self.inner.store.voucher(&req.code).await?;
        if !voucher.is_usable(Utc::now()) {
            return Err(CoreError::VoucherNotAvailable);
        }
        self.inner
            .store
            .grant_entitlement(user, &req.code, req.uses)
            .await?;
        info!(user = %user, code = %req.code, uses = req.uses, "redeemed voucher");
        Ok(())
    }

    /// Spend one of the user's uses of `code` and count it against the
    /// voucher's limit, atomically. Returns the uses the user has left.
    ///
    /// `VoucherNotAvailable` if the user holds no remaining use;
    /// `EditConflict` if the voucher is inactive or exhausted. Neither
    /// side changes on failure.
    pub async fn use_voucher(&self, user: UserId, code: &str) -> Result<u32, CoreError> {
        let code = code.to_owned();
        let remaining = self
            .inner
            .store
            .transaction({
                let code = code.clone();
                move |tx| {
                    let remaining = tx.consume_entitlement(user, &code)?;
                    tx.increment_usage(&code)?;
                    Ok(remaining)
                }
            })
            .await?;
        info!(user = %user, code = %code, remaining, "used voucher");
        Ok(remaining)
    }
}
