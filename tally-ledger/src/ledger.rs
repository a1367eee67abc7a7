use rust_decimal::Decimal;
use serde_json::json;
use tally_core::{CurrencyCode, SplitId, UserId, UserProfile, Wallet};
use tracing::debug;

use crate::{LedgerEntry, LedgerError, LedgerResult, LedgerType};

/// Reference id linking settlement journal lines to a (split, participant) pair.
pub fn settlement_reference(split_id: &SplitId, participant_id: &UserId) -> String {
    format!("{split_id}:{participant_id}")
}

/// Stateless wallet operations.
///
/// Each call mutates the profiles it is handed and returns the journal lines
/// describing the movement; persisting both in one transaction is the
/// caller's job. Nothing here deduplicates, so a caller that invokes an
/// operation twice moves money twice.
pub struct WalletLedger;

impl WalletLedger {
    /// Add `amount` to the user's balance.
    pub fn credit(
        profile: &mut UserProfile,
        currency: &CurrencyCode,
        amount: Decimal,
        entry_type: LedgerType,
        reference_id: &str,
    ) -> LedgerResult<LedgerEntry> {
        let balance = profile
            .wallet
            .credit(currency, amount)
            .map_err(|err| LedgerError::from_wallet(&profile.id, err))?;
        debug!(user = %profile.id, %currency, %amount, %balance, "wallet credited");
        Ok(LedgerEntry::new(
            profile.id.clone(),
            currency.clone(),
            amount,
            entry_type,
            reference_id,
        )
        .with_meta(json!({ "balance_after": balance.to_string() })))
    }

    /// Remove `amount` from the user's balance. Fails without mutation when the
    /// balance is too low.
    pub fn debit(
        profile: &mut UserProfile,
        currency: &CurrencyCode,
        amount: Decimal,
        entry_type: LedgerType,
        reference_id: &str,
    ) -> LedgerResult<LedgerEntry> {
        let balance = profile
            .wallet
            .debit(currency, amount)
            .map_err(|err| LedgerError::from_wallet(&profile.id, err))?;
        debug!(user = %profile.id, %currency, %amount, %balance, "wallet debited");
        Ok(LedgerEntry::new(
            profile.id.clone(),
            currency.clone(),
            -amount,
            entry_type,
            reference_id,
        )
        .with_meta(json!({ "balance_after": balance.to_string() })))
    }

    /// External top-up. The only operation that grows the total held in wallets.
    pub fn add_funds(
        profile: &mut UserProfile,
        currency: &CurrencyCode,
        amount: Decimal,
        reference_id: &str,
    ) -> LedgerResult<LedgerEntry> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount));
        }
        Self::credit(profile, currency, amount, LedgerType::TopUp, reference_id)
    }

    /// Move `amount` from `debtor` to `creditor`. Either both wallets change or
    /// neither does.
    pub fn transfer(
        debtor: &mut UserProfile,
        creditor: &mut UserProfile,
        currency: &CurrencyCode,
        amount: Decimal,
        reference_id: &str,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        if debtor.id == creditor.id {
            return Err(LedgerError::InvalidState(format!(
                "{} cannot transfer to themselves",
                debtor.id
            )));
        }
        if amount < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount));
        }
        if amount.is_zero() {
            return Ok(Vec::new());
        }
        let debtor_wallet = debtor.wallet.clone();
        let debit = Self::debit(
            debtor,
            currency,
            amount,
            LedgerType::SettlementDebit,
            reference_id,
        )?;
        let credit = match Self::credit(
            creditor,
            currency,
            amount,
            LedgerType::SettlementCredit,
            reference_id,
        ) {
            Ok(credit) => credit,
            Err(err) => {
                debtor.wallet = debtor_wallet;
                return Err(err);
            }
        };
        Ok(vec![debit, credit])
    }

    /// Rebuild a wallet from its journal. Entries are applied in sequence order.
    pub fn replay_wallet(user_id: &UserId, entries: &[LedgerEntry]) -> LedgerResult<Wallet> {
        let mut ordered: Vec<&LedgerEntry> = entries
            .iter()
            .filter(|entry| &entry.user_id == user_id)
            .collect();
        ordered.sort_by_key(|entry| entry.sequence);
        let mut wallet = Wallet::new();
        for entry in ordered {
            let applied = if entry.amount < Decimal::ZERO {
                wallet.debit(&entry.currency, -entry.amount)
            } else {
                wallet.credit(&entry.currency, entry.amount)
            };
            applied.map_err(|err| {
                LedgerError::InvalidState(format!(
                    "journal entry {} for {user_id} cannot be replayed: {err}",
                    entry.sequence
                ))
            })?;
        }
        Ok(wallet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn usd() -> CurrencyCode {
        "USD".parse().unwrap()
    }

    fn eur() -> CurrencyCode {
        "EUR".parse().unwrap()
    }

    #[test]
    fn failed_transfer_leaves_wallets_untouched() {
        let mut debtor = UserProfile::new("bob", "Bob");
        let mut payer = UserProfile::new("alice", "Alice");
        WalletLedger::add_funds(&mut debtor, &usd(), dec!(29.99), "top").unwrap();
        let debtor_before = debtor.wallet.clone();
        let payer_before = payer.wallet.clone();

        let err = WalletLedger::transfer(&mut debtor, &mut payer, &usd(), dec!(30), "s1:bob")
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(debtor.wallet, debtor_before);
        assert_eq!(payer.wallet, payer_before);
    }

    #[test]
    fn currencies_are_isolated() {
        let mut debtor = UserProfile::new("bob", "Bob");
        let mut payer = UserProfile::new("alice", "Alice");
        WalletLedger::add_funds(&mut debtor, &eur(), dec!(100), "top").unwrap();
        assert!(WalletLedger::transfer(&mut debtor, &mut payer, &usd(), dec!(1), "ref").is_err());
        assert_eq!(debtor.wallet.balance(&eur()), dec!(100));
    }

    #[test]
    fn top_up_must_be_positive() {
        let mut profile = UserProfile::new("bob", "Bob");
        assert!(matches!(
            WalletLedger::add_funds(&mut profile, &usd(), Decimal::ZERO, "top"),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(profile.wallet.is_empty());
    }

    #[test]
    fn overflowing_credit_is_refused_on_both_sides() {
        let mut debtor = UserProfile::new("bob", "Bob");
        let mut payer = UserProfile::new("alice", "Alice");
        WalletLedger::add_funds(&mut payer, &usd(), Decimal::MAX, "top-1").unwrap();
        assert!(matches!(
            WalletLedger::add_funds(&mut payer, &usd(), Decimal::MAX, "top-2"),
            Err(LedgerError::Overflow { .. })
        ));
        assert_eq!(payer.wallet.balance(&usd()), Decimal::MAX);

        WalletLedger::add_funds(&mut debtor, &usd(), dec!(10), "top-3").unwrap();
        let err = WalletLedger::transfer(&mut debtor, &mut payer, &usd(), dec!(10), "s1:bob")
            .unwrap_err();
        assert!(matches!(err, LedgerError::Overflow { .. }));
        assert_eq!(debtor.wallet.balance(&usd()), dec!(10));
        assert_eq!(payer.wallet.balance(&usd()), Decimal::MAX);
    }

    #[test]
    fn replay_reports_overflowing_journal() {
        let user = UserId::from("alice");
        let mut journal = vec![
            LedgerEntry::new(user.clone(), usd(), Decimal::MAX, LedgerType::TopUp, "top-1"),
            LedgerEntry::new(user.clone(), usd(), Decimal::MAX, LedgerType::TopUp, "top-2"),
        ];
        for (idx, entry) in journal.iter_mut().enumerate() {
            entry.sequence = idx as u64 + 1;
        }
        assert!(matches!(
            WalletLedger::replay_wallet(&user, &journal),
            Err(LedgerError::InvalidState(_))
        ));
    }

    #[test]
    fn zero_transfer_moves_nothing() {
        let mut debtor = UserProfile::new("bob", "Bob");
        let mut payer = UserProfile::new("alice", "Alice");
        let lines =
            WalletLedger::transfer(&mut debtor, &mut payer, &usd(), Decimal::ZERO, "ref").unwrap();
        assert!(lines.is_empty());
        assert!(payer.wallet.is_empty());
    }

    #[test]
    fn replay_reproduces_wallet() {
        let mut debtor = UserProfile::new("bob", "Bob");
        let mut payer = UserProfile::new("alice", "Alice");
        let mut journal = Vec::new();
        journal.push(WalletLedger::add_funds(&mut debtor, &usd(), dec!(80), "top-1").unwrap());
        journal.push(WalletLedger::add_funds(&mut debtor, &eur(), dec!(5), "top-2").unwrap());
        journal.extend(
            WalletLedger::transfer(&mut debtor, &mut payer, &usd(), dec!(45.50), "s1:bob")
                .unwrap(),
        );
        for (idx, entry) in journal.iter_mut().enumerate() {
            entry.sequence = idx as u64 + 1;
        }

        let bob = WalletLedger::replay_wallet(&debtor.id, &journal).unwrap();
        let alice = WalletLedger::replay_wallet(&payer.id, &journal).unwrap();
        assert_eq!(bob, debtor.wallet);
        assert_eq!(alice, payer.wallet);
        assert_eq!(alice.balance(&usd()), dec!(45.50));
    }

    #[test]
    fn reference_format() {
        assert_eq!(
            settlement_reference(&SplitId::from("s1"), &UserId::from("bob")),
            "s1:bob"
        );
    }
}
