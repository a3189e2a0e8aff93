// ── Wallet refresh ──
//
// Lists the vouchers a user can still use and drops the entitlements
// that point at missing, inactive or expired vouchers. The prune is a
// version-conditional write; a concurrent change to the user restarts
// the read.

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{OwnedVoucher, UserId, Voucher};
use crate::perks::Perks;
use crate::store::Store;

const REFRESH_ATTEMPTS: u32 = 3;

impl<S: Store> Perks<S> {
    /// The user's usable vouchers, ordered by code, each with the uses
    /// the user has left.
    ///
    /// Running it twice with no change in between returns the same list
    /// and writes nothing the second time.
    pub async fn my_vouchers(&self, id: UserId) -> Result<Vec<OwnedVoucher>, CoreError> {
        let mut attempt = 1;
        loop {
            let user = self.inner.store.user(id).await?;
            let codes: Vec<String> = user.vouchers.keys().cloned().collect();
            let now = Utc::now();
            let mut usable: BTreeMap<String, Voucher> = self
                .inner
                .store
                .vouchers_by_code(&codes)
                .await?
                .into_iter()
                .filter(|v| v.is_usable(now))
                .map(|v| (v.code.clone(), v))
                .collect();

            let kept: BTreeMap<String, u32> = user
                .vouchers
                .iter()
                .filter(|(code, _)| usable.contains_key(*code))
                .map(|(code, remaining)| (code.clone(), *remaining))
                .collect();

            if kept.len() != user.vouchers.len() {
                match self
                    .inner
                    .store
                    .set_entitlements(id, user.version, &kept)
                    .await
                {
                    Ok(()) => debug!(
                        user = %id,
                        pruned = user.vouchers.len() - kept.len(),
                        "pruned stale entitlements"
                    ),
                    Err(CoreError::EditConflict) if attempt < REFRESH_ATTEMPTS => {
                        warn!(user = %id, attempt, "user changed during refresh, retrying");
                        attempt += 1;
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }

            return Ok(kept
                .into_iter()
                .filter_map(|(code, remaining)| {
                    usable
                        .remove(&code)
                        .map(|voucher| OwnedVoucher { voucher, remaining })
                })
                .collect());
        }
    }
}
